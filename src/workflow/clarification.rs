//! Round-robin clarification exchange on a submitted leave application.
//!
//! HR raises a question, the employee answers, up to [`MAX_ROUNDS`] rounds.
//! Rounds live in `leave_clarification_rounds` as an ordered sequence of
//! question/reply pairs; all gating decisions here are pure functions of
//! (docstatus, workflow_state, role) so callers can re-apply them after any
//! refresh without drift.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use super::{DocStatus, WorkflowState};
use crate::model::role::Role;

pub const MAX_ROUNDS: u8 = 5;

/// Leave-content fields that stay locked after submit except during an
/// employee-side clarification.
pub const LEAVE_CONTENT_FIELDS: [&str; 6] = [
    "leave_type",
    "from_date",
    "to_date",
    "half_day",
    "reason",
    "attachment",
];

/// Built-in workflow menu entries that duplicate the dedicated buttons and
/// are dropped from the generic action menu.
pub const SUPPRESSED_MENU_ACTIONS: [&str; 4] = ["Ask Clarification", "Reply", "Reply to HR", "Help"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClarificationError {
    #[error("Maximum communication rounds ({MAX_ROUNDS}) reached.")]
    RoundLimitExceeded,
    #[error("No pending HR queries to reply to.")]
    NoPendingQuery,
    #[error("cannot {action} while the application is {state}")]
    WrongState {
        action: &'static str,
        state: WorkflowState,
    },
    #[error("{role:?} role is not allowed to {action}")]
    NotPermitted { action: &'static str, role: Role },
    #[error("clarification rounds are not contiguous from round 1")]
    CorruptThread,
}

/// One question/reply pair. `round_no` is 1-based; a row only exists once
/// HR has asked, so `hr_query` is never empty.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct ClarificationRound {
    pub round_no: u8,
    pub hr_query: String,
    pub employee_reply: Option<String>,
}

/// The ordered round sequence of one leave application.
#[derive(Debug, Clone, Default)]
pub struct ClarificationThread {
    rounds: Vec<ClarificationRound>,
}

impl ClarificationThread {
    /// Builds a thread from stored rows, enforcing the slot invariants:
    /// round numbers contiguous from 1, at most [`MAX_ROUNDS`].
    pub fn from_rows(mut rows: Vec<ClarificationRound>) -> Result<Self, ClarificationError> {
        rows.sort_by_key(|r| r.round_no);
        if rows.len() > MAX_ROUNDS as usize {
            return Err(ClarificationError::CorruptThread);
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.round_no != idx as u8 + 1 {
                return Err(ClarificationError::CorruptThread);
            }
        }
        Ok(Self { rounds: rows })
    }

    pub fn rounds(&self) -> &[ClarificationRound] {
        &self.rounds
    }

    /// Lowest open question slot. Rounds fill in strict order, so this is
    /// simply one past the last asked round.
    pub fn next_question_round(&self) -> Result<u8, ClarificationError> {
        if self.rounds.len() >= MAX_ROUNDS as usize {
            return Err(ClarificationError::RoundLimitExceeded);
        }
        Ok(self.rounds.len() as u8 + 1)
    }

    /// Lowest round with a question and no reply yet.
    pub fn next_pending_reply(&self) -> Result<u8, ClarificationError> {
        self.rounds
            .iter()
            .find(|r| r.employee_reply.is_none())
            .map(|r| r.round_no)
            .ok_or(ClarificationError::NoPendingQuery)
    }

    /// Records an HR question in the next open slot and returns its round
    /// number.
    pub fn push_query(&mut self, text: &str) -> Result<u8, ClarificationError> {
        let round_no = self.next_question_round()?;
        self.rounds.push(ClarificationRound {
            round_no,
            hr_query: text.to_owned(),
            employee_reply: None,
        });
        Ok(round_no)
    }

    /// Records the employee reply on the oldest unanswered round and
    /// returns its round number.
    pub fn push_reply(&mut self, text: &str) -> Result<u8, ClarificationError> {
        let round_no = self.next_pending_reply()?;
        self.rounds[round_no as usize - 1].employee_reply = Some(text.to_owned());
        Ok(round_no)
    }
}

/// Gate for "Reply to Employee" (HR asks a question).
pub fn ensure_can_ask(state: WorkflowState, role: Role) -> Result<(), ClarificationError> {
    if !role.has_hr_capability() {
        return Err(ClarificationError::NotPermitted {
            action: "ask a clarification",
            role,
        });
    }
    if state != WorkflowState::Pending {
        return Err(ClarificationError::WrongState {
            action: "ask a clarification",
            state,
        });
    }
    Ok(())
}

/// Gate for "Reply to HR" (employee answers).
pub fn ensure_can_reply(state: WorkflowState, role: Role) -> Result<(), ClarificationError> {
    if !role.has_employee_capability() {
        return Err(ClarificationError::NotPermitted {
            action: "reply to HR",
            role,
        });
    }
    if state != WorkflowState::ClarificationRequested {
        return Err(ClarificationError::WrongState {
            action: "reply to HR",
            state,
        });
    }
    Ok(())
}

/// Post-submit override for the leave-content fields: editable only while
/// HR is waiting on the employee and the actor is the employee. Pure, so
/// re-asserting after an external refresh always lands on the same answer.
pub fn leave_fields_editable(docstatus: DocStatus, state: WorkflowState, role: Role) -> bool {
    docstatus == DocStatus::Submitted
        && state == WorkflowState::ClarificationRequested
        && role.has_employee_capability()
}

/// Dedicated buttons offered on top of the generic workflow menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum ClarificationButton {
    #[serde(rename = "Reply to Employee")]
    ReplyToEmployee,
    #[serde(rename = "Reply to HR")]
    ReplyToHr,
}

pub fn visible_actions(state: WorkflowState, role: Role) -> Vec<ClarificationButton> {
    let mut actions = Vec::new();
    if state == WorkflowState::Pending && role.has_hr_capability() {
        actions.push(ClarificationButton::ReplyToEmployee);
    }
    if state == WorkflowState::ClarificationRequested && role.has_employee_capability() {
        actions.push(ClarificationButton::ReplyToHr);
    }
    actions
}

/// Strips the duplicated built-in entries from a generic action menu.
/// Returns None when nothing functional is left, in which case the menu
/// container is hidden rather than rendered empty.
pub fn prune_action_menu(entries: Vec<String>) -> Option<Vec<String>> {
    let kept: Vec<String> = entries
        .into_iter()
        .filter(|e| !SUPPRESSED_MENU_ACTIONS.contains(&e.as_str()))
        .collect();
    if kept.is_empty() { None } else { Some(kept) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(no: u8, query: &str, reply: Option<&str>) -> ClarificationRound {
        ClarificationRound {
            round_no: no,
            hr_query: query.to_owned(),
            employee_reply: reply.map(str::to_owned),
        }
    }

    #[test]
    fn next_question_fills_rounds_in_order() {
        let mut thread = ClarificationThread::default();
        for expected in 1..=MAX_ROUNDS {
            assert_eq!(thread.next_question_round(), Ok(expected));
            thread.push_query("why these dates?").unwrap();
        }
        assert_eq!(
            thread.next_question_round(),
            Err(ClarificationError::RoundLimitExceeded)
        );
    }

    #[test]
    fn round_limit_holds_regardless_of_reply_state() {
        // all five questions asked, replies mixed
        let rows = vec![
            round(1, "q1", Some("a1")),
            round(2, "q2", None),
            round(3, "q3", Some("a3")),
            round(4, "q4", None),
            round(5, "q5", None),
        ];
        let thread = ClarificationThread::from_rows(rows).unwrap();
        assert_eq!(
            thread.next_question_round(),
            Err(ClarificationError::RoundLimitExceeded)
        );
    }

    #[test]
    fn reply_targets_the_lowest_unanswered_round() {
        let rows = vec![
            round(1, "q1", Some("a1")),
            round(2, "q2", None),
            round(3, "q3", None),
        ];
        let mut thread = ClarificationThread::from_rows(rows).unwrap();
        assert_eq!(thread.next_pending_reply(), Ok(2));
        assert_eq!(thread.push_reply("because"), Ok(2));
        assert_eq!(thread.next_pending_reply(), Ok(3));
    }

    #[test]
    fn reply_without_a_question_is_rejected() {
        let thread = ClarificationThread::default();
        assert_eq!(
            thread.next_pending_reply(),
            Err(ClarificationError::NoPendingQuery)
        );

        let fully_answered =
            ClarificationThread::from_rows(vec![round(1, "q1", Some("a1"))]).unwrap();
        assert_eq!(
            fully_answered.next_pending_reply(),
            Err(ClarificationError::NoPendingQuery)
        );
    }

    #[test]
    fn non_contiguous_rows_are_rejected() {
        let rows = vec![round(1, "q1", None), round(3, "q3", None)];
        assert_eq!(
            ClarificationThread::from_rows(rows).unwrap_err(),
            ClarificationError::CorruptThread
        );
    }

    #[test]
    fn ask_gate_requires_pending_and_hr() {
        assert!(ensure_can_ask(WorkflowState::Pending, Role::Hr).is_ok());
        assert!(ensure_can_ask(WorkflowState::Pending, Role::Admin).is_ok());
        assert!(matches!(
            ensure_can_ask(WorkflowState::Pending, Role::Employee),
            Err(ClarificationError::NotPermitted { .. })
        ));
        assert!(matches!(
            ensure_can_ask(WorkflowState::ClarificationRequested, Role::Hr),
            Err(ClarificationError::WrongState { .. })
        ));
    }

    #[test]
    fn reply_gate_requires_clarification_requested_and_employee() {
        assert!(ensure_can_reply(WorkflowState::ClarificationRequested, Role::Employee).is_ok());
        assert!(matches!(
            ensure_can_reply(WorkflowState::Pending, Role::Employee),
            Err(ClarificationError::WrongState { .. })
        ));
        assert!(matches!(
            ensure_can_reply(WorkflowState::ClarificationRequested, Role::Hr),
            Err(ClarificationError::NotPermitted { .. })
        ));
    }

    #[test]
    fn editability_is_the_single_allowed_combination() {
        let states = [
            WorkflowState::Pending,
            WorkflowState::ClarificationRequested,
            WorkflowState::Approved,
            WorkflowState::Rejected,
        ];
        let roles = [Role::Admin, Role::Hr, Role::Employee];
        let statuses = [DocStatus::Draft, DocStatus::Submitted, DocStatus::Cancelled];

        for status in statuses {
            for state in states {
                for role in roles {
                    let editable = leave_fields_editable(status, state, role);
                    let expected = status == DocStatus::Submitted
                        && state == WorkflowState::ClarificationRequested
                        && role == Role::Employee;
                    assert_eq!(editable, expected, "{status:?}/{state:?}/{role:?}");
                }
            }
        }
    }

    #[test]
    fn buttons_follow_state_and_role() {
        assert_eq!(
            visible_actions(WorkflowState::Pending, Role::Hr),
            vec![ClarificationButton::ReplyToEmployee]
        );
        assert_eq!(
            visible_actions(WorkflowState::ClarificationRequested, Role::Employee),
            vec![ClarificationButton::ReplyToHr]
        );
        assert!(visible_actions(WorkflowState::Pending, Role::Employee).is_empty());
        assert!(visible_actions(WorkflowState::Approved, Role::Hr).is_empty());
    }

    #[test]
    fn menu_pruning_hides_an_emptied_menu() {
        let entries = vec!["Ask Clarification".to_owned(), "Reply".to_owned(), "Help".to_owned()];
        assert_eq!(prune_action_menu(entries), None);

        let entries = vec!["Reply to HR".to_owned(), "Cancel".to_owned()];
        assert_eq!(prune_action_menu(entries), Some(vec!["Cancel".to_owned()]));
    }
}
