use rand::Rng;

use alexandria_types::BackoffConfig;

/// Exponential retry delay with jitter: `min * factor^attempt`, capped at
/// the maximum, plus up to `jitter_percent` of random spread to avoid
/// synchronized retry storms.
pub(crate) fn retry_delay_ms(cfg: &BackoffConfig, attempt: u32) -> u64 {
    let factor = u64::from(cfg.factor.max(1));
    let mut base = cfg.min_backoff_ms.max(1);
    for _ in 0..attempt {
        base = base.saturating_mul(factor);
        if base >= cfg.max_backoff_ms {
            base = cfg.max_backoff_ms;
            break;
        }
    }
    base = base.min(cfg.max_backoff_ms);
    jitter_wait(base, u32::from(cfg.jitter_percent))
}

/// Add up to `jitter_percent` percent of random spread on top of `base_ms`.
pub(crate) fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms + rng.random_range(0..jitter_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let cfg = BackoffConfig {
            min_backoff_ms: 100,
            max_backoff_ms: 1000,
            factor: 2,
            jitter_percent: 0,
        };
        assert_eq!(retry_delay_ms(&cfg, 0), 100);
        assert_eq!(retry_delay_ms(&cfg, 1), 200);
        assert_eq!(retry_delay_ms(&cfg, 2), 400);
        assert_eq!(retry_delay_ms(&cfg, 10), 1000);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            let delay = jitter_wait(1000, 20);
            assert!((1000..1200).contains(&delay));
        }
    }
}
