use std::fmt;

use reengage_core::{ReengageError, ReengageResult};
use serde::{Deserialize, Serialize};

/// Workflow progress as observed across step invocations. Ordered by
/// position in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Init,
    QueryStarted,
    QuerySucceeded,
    ImportStarted,
    ImportSucceeded,
    Tagged,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        *self == WorkflowState::Tagged
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Init => "INIT",
            WorkflowState::QueryStarted => "QUERY_STARTED",
            WorkflowState::QuerySucceeded => "QUERY_SUCCEEDED",
            WorkflowState::ImportStarted => "IMPORT_STARTED",
            WorkflowState::ImportSucceeded => "IMPORT_SUCCEEDED",
            WorkflowState::Tagged => "TAGGED",
        };
        f.write_str(name)
    }
}

/// Describes a single valid state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub trigger: String,
}

/// Guards workflow lifecycle by enforcing the forward-only chain
/// `INIT → QUERY_STARTED → QUERY_SUCCEEDED → IMPORT_STARTED →
/// IMPORT_SUCCEEDED → TAGGED`.
#[derive(Debug, Clone)]
pub struct WorkflowStateMachine {
    pub state: WorkflowState,
    pub transitions: Vec<StateTransition>,
}

impl WorkflowStateMachine {
    /// Creates a state machine starting in `Init`.
    pub fn new() -> Self {
        Self::resume(WorkflowState::Init)
    }

    /// Creates a state machine positioned at a persisted state.
    pub fn resume(state: WorkflowState) -> Self {
        let chain = [
            (WorkflowState::Init, WorkflowState::QueryStarted, "query_launched"),
            (WorkflowState::QueryStarted, WorkflowState::QuerySucceeded, "query_completed"),
            (WorkflowState::QuerySucceeded, WorkflowState::ImportStarted, "import_started"),
            (WorkflowState::ImportStarted, WorkflowState::ImportSucceeded, "import_completed"),
            (WorkflowState::ImportSucceeded, WorkflowState::Tagged, "segment_tagged"),
        ];
        let transitions = chain
            .iter()
            .map(|(from, to, trigger)| StateTransition {
                from: *from,
                to: *to,
                trigger: trigger.to_string(),
            })
            .collect();

        Self { state, transitions }
    }

    /// Returns `true` if the given transition is allowed.
    pub fn can_transition(&self, from: &WorkflowState, to: &WorkflowState) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from == *from && t.to == *to)
    }

    /// Check that the machine is in `expected` before a step runs.
    pub fn require(&self, expected: WorkflowState, next: WorkflowState) -> ReengageResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ReengageError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Attempts to move the state machine to `to`.
    pub fn transition(&mut self, to: WorkflowState) -> ReengageResult<()> {
        if self.can_transition(&self.state, &to) {
            self.state = to;
            Ok(())
        } else {
            Err(ReengageError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl Default for WorkflowStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
