//! Command implementations.

pub mod check;
pub mod fingerprint;
pub mod run;

pub use self::check::execute_check;
pub use self::fingerprint::execute_fingerprint;
pub use self::run::execute_run;

use crate::error::Result;
use reaper_store::{snapshot, StaticPolicies};
use std::path::Path;

/// Load a policy snapshot, or an empty policy set when none is given.
pub(crate) fn load_policies(path: Option<&Path>) -> Result<StaticPolicies> {
    match path {
        Some(path) => Ok(snapshot::load_policies(path)?),
        None => Ok(StaticPolicies::new()),
    }
}
