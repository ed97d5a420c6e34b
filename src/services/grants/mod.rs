pub mod probe;

pub use probe::{
    summarize_grants, verify_grants, GrantSummary, GrantsError, GRANT_QUERY_TIMEOUTS,
};
