//! Shape of the lifecycle workflow.
//!
//! ```text
//! ProcessByEventType
//!   ├─ Create ──▶ CreateResourceTask ─┐
//!   ├─ Update ──▶ UpdateResourceTask ─┤ success or caught error
//!   ├─ Delete ──▶ DeleteResourceTask ─┤
//!   └─ otherwise ─────────────────────┴─▶ SendResponseTask ─▶ Done
//!                                                          └─▶ RequestTypeNotSupported (otherwise only)
//! ```
//!
//! Every path goes through `SendResponseTask` exactly once, which is what
//! guarantees a single callback per execution.

use crate::context::ExecutionState;
use model::{LastOperation, RequestType};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const START: StateName = StateName::ProcessByEventType;

/// Error name recorded when the choice falls through to `otherwise`.
pub const UNSUPPORTED_REQUEST_TYPE: &str = "UnsupportedRequestType";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateName {
    ProcessByEventType,
    CreateResourceTask,
    UpdateResourceTask,
    DeleteResourceTask,
    SendResponseTask,
    Done,
    RequestTypeNotSupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Choice,
    Task,
    Pass,
    Fail,
}

impl StateName {
    pub fn kind(self) -> StateKind {
        match self {
            StateName::ProcessByEventType => StateKind::Choice,
            StateName::CreateResourceTask
            | StateName::UpdateResourceTask
            | StateName::DeleteResourceTask
            | StateName::SendResponseTask => StateKind::Task,
            StateName::Done => StateKind::Pass,
            StateName::RequestTypeNotSupported => StateKind::Fail,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StateName::Done | StateName::RequestTypeNotSupported)
    }

    /// The mutation a task state performs.
    pub fn mutation(self) -> Option<LastOperation> {
        match self {
            StateName::CreateResourceTask => Some(LastOperation::Create),
            StateName::UpdateResourceTask => Some(LastOperation::Update),
            StateName::DeleteResourceTask => Some(LastOperation::Delete),
            _ => None,
        }
    }

    /// Branches of `ProcessByEventType`, `None` being `otherwise`.
    pub fn choose(request_type: &RequestType) -> Option<StateName> {
        match request_type {
            RequestType::Create => Some(StateName::CreateResourceTask),
            RequestType::Update => Some(StateName::UpdateResourceTask),
            RequestType::Delete => Some(StateName::DeleteResourceTask),
            RequestType::Other(_) => None,
        }
    }

    /// The state following this one once it has written its result into `state`.
    pub fn next(self, state: &ExecutionState) -> Option<StateName> {
        match self {
            StateName::ProcessByEventType => Some(
                StateName::choose(&state.event().request_type)
                    .unwrap_or(StateName::SendResponseTask),
            ),
            // Success and the catch-all edge lead to the same state
            StateName::CreateResourceTask
            | StateName::UpdateResourceTask
            | StateName::DeleteResourceTask => Some(StateName::SendResponseTask),
            StateName::SendResponseTask if state.is_unsupported_request() => {
                Some(StateName::RequestTypeNotSupported)
            }
            StateName::SendResponseTask => Some(StateName::Done),
            StateName::Done | StateName::RequestTypeNotSupported => None,
        }
    }
}

impl Display for StateName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
