use serde::{Deserialize, Serialize};
use crate::models::Stage;

/// Progress within the current stage
///
/// NotStarted -> Prepared -> InProgress -> Finished -> Done | Failed
///
/// - Failed is terminal until an operator resets the record
/// - Done is terminal only at the final stage; otherwise the record rolls
///   forward to the next stage on the following pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    NotStarted,
    Prepared,
    InProgress,
    Finished,
    Failed,
    Done,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::NotStarted,
        Status::Prepared,
        Status::InProgress,
        Status::Finished,
        Status::Failed,
        Status::Done,
    ];

    /// Persisted integer code (0..=5)
    pub fn as_i64(&self) -> i64 {
        match self {
            Status::NotStarted => 0,
            Status::Prepared => 1,
            Status::InProgress => 2,
            Status::Finished => 3,
            Status::Failed => 4,
            Status::Done => 5,
        }
    }

    pub fn from_i64(code: i64) -> Option<Self> {
        match code {
            0 => Some(Status::NotStarted),
            1 => Some(Status::Prepared),
            2 => Some(Status::InProgress),
            3 => Some(Status::Finished),
            4 => Some(Status::Failed),
            5 => Some(Status::Done),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Status::NotStarted => "Not started",
            Status::Prepared => "Prepared",
            Status::InProgress => "In progress...",
            Status::Finished => "Finished",
            Status::Failed => "Failed",
            Status::Done => "Done",
        }
    }

    /// Whether the engine leaves a record in this status at `stage` alone
    pub fn is_terminal_for(&self, stage: Stage) -> bool {
        match self {
            Status::Failed => true,
            Status::Done => stage.is_final(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        for status in Status::ALL {
            assert_eq!(Status::from_i64(status.as_i64()), Some(status));
        }
        assert_eq!(Status::from_i64(6), None);
        assert_eq!(Status::from_i64(-1), None);
    }

    #[test]
    fn test_status_terminal() {
        assert!(Status::Failed.is_terminal_for(Stage::MdPreparation));
        assert!(Status::Failed.is_terminal_for(Stage::ResultProcessing));
        assert!(Status::Done.is_terminal_for(Stage::ResultProcessing));
        assert!(!Status::Done.is_terminal_for(Stage::Md));
        assert!(!Status::InProgress.is_terminal_for(Stage::ResultProcessing));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(Status::NotStarted.name(), "Not started");
        assert_eq!(Status::InProgress.to_string(), "In progress...");
    }
}
