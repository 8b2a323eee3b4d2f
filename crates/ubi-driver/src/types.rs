use std::fmt;

use crate::Result;

/// Machine state as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running,
    Stopped,
    Unknown,
    /// The provider could not be queried.
    Error,
}

impl MachineState {
    /// Map a provider status string.
    pub fn from_status(status: &str) -> Self {
        match status {
            "online" => Self::Running,
            "offline" => Self::Stopped,
            _ => Self::Unknown,
        }
    }

    /// Collapse a state query into a state, mapping failures to `Error`.
    pub fn from_query(result: &Result<MachineState>) -> Self {
        match result {
            Ok(state) => *state,
            Err(_) => Self::Error,
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Unknown => "Unknown",
            Self::Error => "Error",
        })
    }
}

/// Outcome of one teardown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Removed,
    /// Nothing to remove: the id was never assigned or is already gone.
    Skipped,
    Failed(String),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-step result of a best-effort removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveReport {
    pub ssh_key: StepOutcome,
    pub instance: StepOutcome,
}

impl RemoveReport {
    /// True when no step failed.
    pub fn is_clean(&self) -> bool {
        !self.ssh_key.is_failed() && !self.instance.is_failed()
    }

    /// `(step, message)` for every failed step.
    pub fn failures(&self) -> Vec<(&'static str, &str)> {
        [("ssh key", &self.ssh_key), ("instance", &self.instance)]
            .into_iter()
            .filter_map(|(step, outcome)| match outcome {
                StepOutcome::Failed(msg) => Some((step, msg.as_str())),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn maps_provider_status() {
        assert_eq!(MachineState::from_status("online"), MachineState::Running);
        assert_eq!(MachineState::from_status("offline"), MachineState::Stopped);
        assert_eq!(MachineState::from_status("rebuilding"), MachineState::Unknown);
        assert_eq!(MachineState::from_status(""), MachineState::Unknown);
    }

    #[test]
    fn failed_query_is_error_state() {
        assert_eq!(MachineState::from_query(&Err(Error::NotCreated)), MachineState::Error);
        assert_eq!(
            MachineState::from_query(&Ok(MachineState::Stopped)),
            MachineState::Stopped
        );
    }

    #[test]
    fn report_lists_failures() {
        let report = RemoveReport {
            ssh_key: StepOutcome::Failed("boom".into()),
            instance: StepOutcome::Removed,
        };
        assert!(!report.is_clean());
        assert_eq!(report.failures(), vec![("ssh key", "boom")]);

        let clean = RemoveReport {
            ssh_key: StepOutcome::Skipped,
            instance: StepOutcome::Removed,
        };
        assert!(clean.is_clean());
        assert!(clean.failures().is_empty());
    }
}
