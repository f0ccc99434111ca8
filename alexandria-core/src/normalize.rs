//! Deterministic normalization of author names and titles, plus the fuzzy
//! similarity measures used for duplicate detection.
//!
//! Both normalization functions are idempotent: applying them twice yields
//! the same string as applying them once.

/// Suffixes stripped from the end of author names, compared after
/// lowercasing with trailing periods removed.
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "phd", "ph.d", "md", "m.d", "esq", "ii", "iii", "iv"];

/// Spellings that collapse into one canonical collective form.
const COLLECTIVE_FORMS: &[(&str, &str)] = &[
    ("various", "various authors"),
    ("various authors", "various authors"),
    ("anon", "anonymous"),
    ("anonymous", "anonymous"),
    ("unknown", "unknown"),
    ("unknown author", "unknown"),
];

/// Canonicalize an author display name for deduplication.
///
/// Steps, in order: lowercase and trim; straighten curly quotes; take the
/// primary author from co-author syntax (`"A & B"` → `"A"`); strip trailing
/// honorifics/suffixes; invert `"Last, First"` ordering; merge spaced
/// initials (`"j. k."` → `"j.k."`); drop punctuation other than periods,
/// apostrophes, and hyphens (non-ASCII letters and digits are preserved);
/// collapse whitespace; map known collective forms to one spelling.
#[must_use]
pub fn normalize_author_name(raw: &str) -> String {
    let mut name = raw.trim().to_lowercase();

    name = straighten_quotes(&name);
    name = primary_author(&name);
    name = strip_suffixes(&name);
    name = invert_comma_form(&name);
    name = merge_initials(&name);
    name = filter_name_chars(&name);
    name = collapse_whitespace(&name);

    let bare = name.trim_end_matches('.');
    for (variant, canonical) in COLLECTIVE_FORMS {
        if bare == *variant {
            return (*canonical).to_string();
        }
    }
    name
}

/// Normalize a title for fuzzy comparison: lowercase, strip punctuation,
/// drop leading English articles, collapse whitespace.
#[must_use]
pub fn normalize_title(raw: &str) -> String {
    let lowered = straighten_quotes(&raw.trim().to_lowercase());
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    let words: Vec<&str> = cleaned
        .split_whitespace()
        .enumerate()
        .filter(|(i, w)| !(*i == 0 && matches!(*w, "the" | "a" | "an")))
        .map(|(_, w)| w)
        .collect();
    words.join(" ")
}

/// Normalized-title Levenshtein similarity in [0, 1].
///
/// This is the permissive in-memory pass; the store-side trigram measure
/// is the final word for persisted data.
#[must_use]
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_title(a);
    let nb = normalize_title(b);
    if na.is_empty() && nb.is_empty() {
        return 1.0;
    }
    strsim::normalized_levenshtein(&na, &nb)
}

/// Trigram similarity in [0, 1], mirroring the storage layer's semantics:
/// shared trigrams over the union, with the input padded the way the
/// storage extension pads it.
#[must_use]
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        shared as f64 / union as f64
    }
}

fn trigrams(s: &str) -> std::collections::HashSet<[char; 3]> {
    let mut set = std::collections::HashSet::new();
    let cleaned = normalize_title(s);
    for word in cleaned.split_whitespace() {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }
    set
}

fn straighten_quotes(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{02bc}' => '\'',
            '\u{201c}' | '\u{201d}' => '"',
            other => other,
        })
        .collect()
}

// "A & B" and "A; B" credit lists keep only the primary author.
fn primary_author(s: &str) -> String {
    s.split(['&', ';'])
        .next()
        .unwrap_or(s)
        .trim()
        .to_string()
}

fn strip_suffixes(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    while let Some(last) = tokens.last() {
        let bare = last.trim_end_matches('.').trim_end_matches(',');
        if tokens.len() > 1 && NAME_SUFFIXES.contains(&bare) {
            tokens.pop();
        } else {
            break;
        }
    }
    tokens.join(" ").trim_end_matches(',').trim().to_string()
}

// "last, first" → "first last". Applies only to the single-comma form;
// anything else is left alone rather than guessed at.
fn invert_comma_form(s: &str) -> String {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() == 2 {
        let last = parts[0].trim();
        let first = parts[1].trim();
        if !last.is_empty() && !first.is_empty() {
            return format!("{first} {last}");
        }
    }
    s.to_string()
}

// Merge runs of single-letter initials: "j. k." → "j.k.".
fn merge_initials(s: &str) -> String {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if is_initial(tokens[i]) && i + 1 < tokens.len() && is_initial(tokens[i + 1]) {
            let mut merged = String::new();
            while i < tokens.len() && is_initial(tokens[i]) {
                merged.push_str(tokens[i]);
                i += 1;
            }
            out.push(merged);
        } else {
            out.push(tokens[i].to_string());
            i += 1;
        }
    }
    out.join(" ")
}

fn is_initial(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next(), chars.next()), (Some(c), Some('.'), None) if c.is_alphabetic())
}

fn filter_name_chars(s: &str) -> String {
    s.chars()
        .filter(|c| {
            c.is_alphanumeric() || c.is_whitespace() || matches!(c, '.' | '\'' | '-')
        })
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaced_initials_are_merged() {
        assert_eq!(normalize_author_name("J. K. Rowling"), "j.k. rowling");
        assert_eq!(normalize_author_name("J.K. Rowling"), "j.k. rowling");
    }

    #[test]
    fn comma_form_with_suffix_collapses() {
        assert_eq!(normalize_author_name("Rowling, J.K. Jr."), "j.k. rowling");
    }

    #[test]
    fn single_initial_is_left_alone() {
        assert_eq!(normalize_author_name("Ursula K. Le Guin"), "ursula k. le guin");
    }

    #[test]
    fn honorifics_and_numerals_are_stripped() {
        assert_eq!(normalize_author_name("Martin Luther King Jr."), "martin luther king");
        assert_eq!(normalize_author_name("John Smith PhD"), "john smith");
        assert_eq!(normalize_author_name("Henry Ford II"), "henry ford");
    }

    #[test]
    fn primary_author_wins_in_credit_lists() {
        assert_eq!(
            normalize_author_name("Terry Pratchett & Neil Gaiman"),
            "terry pratchett"
        );
    }

    #[test]
    fn collective_forms_canonicalize() {
        assert_eq!(normalize_author_name("Various"), "various authors");
        assert_eq!(normalize_author_name("Anon."), "anonymous");
    }

    #[test]
    fn curly_apostrophes_straighten() {
        assert_eq!(normalize_author_name("Flann O\u{2019}Brien"), "flann o'brien");
    }

    #[test]
    fn non_ascii_letters_survive() {
        assert_eq!(normalize_author_name("Gabriel Garc\u{ed}a M\u{e1}rquez"), "gabriel garc\u{ed}a m\u{e1}rquez");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "Rowling, J.K. Jr.",
            "J. K. Rowling",
            "Ursula K. Le Guin",
            "Terry Pratchett & Neil Gaiman",
            "Various",
        ] {
            let once = normalize_author_name(raw);
            assert_eq!(normalize_author_name(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn titles_drop_articles_and_punctuation() {
        assert_eq!(
            normalize_title("The Hitchhiker's Guide to the Galaxy!"),
            "hitchhiker s guide to the galaxy"
        );
    }

    #[test]
    fn similar_titles_clear_the_threshold() {
        let score = title_similarity(
            "Harry Potter and the Philosopher's Stone",
            "Harry Potter & the Philosophers Stone",
        );
        assert!(score >= 0.6, "score was {score}");
    }

    #[test]
    fn unrelated_titles_do_not() {
        let score = title_similarity("War and Peace", "The Very Hungry Caterpillar");
        assert!(score < 0.6, "score was {score}");
    }

    #[test]
    fn trigram_identical_is_one() {
        assert!((trigram_similarity("Dune", "Dune") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trigram_disjoint_is_zero() {
        assert!(trigram_similarity("abc", "xyz") < 0.01);
    }
}
