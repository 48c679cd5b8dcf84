pub mod clarification;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Status label driven by the leave approval workflow. Stored as the
/// display string in `leave_applications.workflow_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum WorkflowState {
    Pending,
    #[strum(serialize = "Clarification Requested")]
    #[serde(rename = "Clarification Requested")]
    ClarificationRequested,
    Approved,
    Rejected,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Approved | WorkflowState::Rejected)
    }
}

/// Named workflow transitions. The clarification exchange only ever
/// requests AskClarification and Reply; Approve/Reject are issued by the
/// HR approval endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum WorkflowAction {
    #[strum(serialize = "Ask Clarification")]
    #[serde(rename = "Ask Clarification")]
    AskClarification,
    Reply,
    Approve,
    Reject,
}

/// Transition table. Returns None for an action that is not valid in the
/// given state.
pub fn next_state(state: WorkflowState, action: WorkflowAction) -> Option<WorkflowState> {
    match (state, action) {
        (WorkflowState::Pending, WorkflowAction::AskClarification) => {
            Some(WorkflowState::ClarificationRequested)
        }
        (WorkflowState::ClarificationRequested, WorkflowAction::Reply) => {
            Some(WorkflowState::Pending)
        }
        (WorkflowState::Pending, WorkflowAction::Approve) => Some(WorkflowState::Approved),
        (WorkflowState::Pending, WorkflowAction::Reject) => Some(WorkflowState::Rejected),
        _ => None,
    }
}

/// Submission lifecycle flag, independent of the workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocStatus {
    Draft = 0,
    Submitted = 1,
    Cancelled = 2,
}

impl DocStatus {
    pub fn from_flag(flag: i8) -> Option<Self> {
        match flag {
            0 => Some(DocStatus::Draft),
            1 => Some(DocStatus::Submitted),
            2 => Some(DocStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_flag(self) -> i8 {
        self as i8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_labels_round_trip() {
        assert_eq!(
            WorkflowState::ClarificationRequested.to_string(),
            "Clarification Requested"
        );
        assert_eq!(
            "Clarification Requested".parse::<WorkflowState>().unwrap(),
            WorkflowState::ClarificationRequested
        );
        assert_eq!("Pending".parse::<WorkflowState>().unwrap(), WorkflowState::Pending);
    }

    #[test]
    fn transition_table_covers_the_round_trip() {
        assert_eq!(
            next_state(WorkflowState::Pending, WorkflowAction::AskClarification),
            Some(WorkflowState::ClarificationRequested)
        );
        assert_eq!(
            next_state(WorkflowState::ClarificationRequested, WorkflowAction::Reply),
            Some(WorkflowState::Pending)
        );
        assert_eq!(
            next_state(WorkflowState::Pending, WorkflowAction::Approve),
            Some(WorkflowState::Approved)
        );
        // terminal states accept nothing
        assert_eq!(next_state(WorkflowState::Approved, WorkflowAction::Reply), None);
        assert_eq!(
            next_state(WorkflowState::Rejected, WorkflowAction::AskClarification),
            None
        );
    }

    #[test]
    fn docstatus_flags() {
        assert_eq!(DocStatus::from_flag(1), Some(DocStatus::Submitted));
        assert_eq!(DocStatus::from_flag(3), None);
        assert_eq!(DocStatus::Cancelled.as_flag(), 2);
    }
}
