//! The engines driving a manifest towards its deployed state.
//!
//! Each engine mutates a [`StateStore`](crate::store::StateStore) or a
//! [`CallManifest`](crate::store::CallManifest) in memory and reports what it
//! did. Persisting the deployment state is left to the caller, which writes it
//! once per phase; the call engine commits after every confirmed call.

use std::fmt::{self, Display};

pub mod deploy;
pub mod setup;
pub mod status;
pub mod upgrade;
pub mod verify;

pub use deploy::deploy_units;
pub use setup::run_calls;
pub use status::StatusReport;
pub use upgrade::upgrade_units;
pub use verify::verify_units;

/// What a single pass over a manifest did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Entries brought forward by this pass
    pub completed: Vec<String>,
    /// Entries left untouched because they were already done or not eligible
    pub skipped: Vec<String>,
    /// Entries whose operation failed, with the reason
    pub failed: Vec<(String, String)>,
}

impl PassSummary {
    /// Whether every attempted entry succeeded
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Record a failed entry
    fn fail(&mut self, name: &str, reason: impl ToString) {
        self.failed.push((name.to_string(), reason.to_string()));
    }
}

impl Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} done, {} skipped, {} failed",
            self.completed.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}
