//! Per-capability fan-out coordinators.
//!
//! Every orchestrator follows the same contract: ask the registry for
//! capable, available providers; bound each call with its own timeout; drop
//! and debug-log individual failures without aborting siblings; deduplicate
//! the aggregate by ISBN with the priority winner kept; return an empty
//! list when every provider failed.

pub(crate) mod bibliography;
pub(crate) mod covers;
pub(crate) mod crosswalk;
pub(crate) mod generation;
pub(crate) mod merge;
pub(crate) mod variants;
