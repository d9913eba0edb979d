//! Execution unit domain types
//!
//! An execution unit is the runtime object (a pod, in container terms) that
//! runs a build. It has an ordered list of init steps that run to completion
//! one after another, followed by the main steps.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Runtime unit executing a build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    pub namespace: String,
    pub name: String,

    #[serde(default = "Uuid::new_v4")]
    pub uid: Uuid,

    /// Setup steps, in execution order
    #[serde(default)]
    pub init_steps: Vec<Step>,

    /// Main steps; order carries no meaning
    #[serde(default)]
    pub main_steps: Vec<Step>,

    pub phase: UnitPhase,
}

impl ExecutionUnit {
    /// Creates an empty unit in the `Pending` phase
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: Uuid::new_v4(),
            init_steps: Vec::new(),
            main_steps: Vec::new(),
            phase: UnitPhase::Pending,
        }
    }

    pub fn with_init_step(mut self, step: Step) -> Self {
        self.init_steps.push(step);
        self
    }

    pub fn with_main_step(mut self, step: Step) -> Self {
        self.main_steps.push(step);
        self
    }

    pub fn with_phase(mut self, phase: UnitPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Finds a main step by name
    pub fn main_step(&self, name: &str) -> Option<&Step> {
        self.main_steps.iter().find(|s| s.name == name)
    }
}

/// A single init or main step of a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub state: StepState,
}

impl Step {
    pub fn new(name: impl Into<String>, state: StepState) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }

    pub fn waiting(name: impl Into<String>) -> Self {
        Self::new(name, StepState::Waiting)
    }

    pub fn running(name: impl Into<String>) -> Self {
        Self::new(name, StepState::Running)
    }

    pub fn terminated(name: impl Into<String>, exit_code: i32) -> Self {
        Self::new(name, StepState::Terminated { exit_code })
    }
}

/// Observed state of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    /// Not started; no log output exists yet
    Waiting,
    Running,
    Terminated { exit_code: i32 },
}

impl StepState {
    pub fn is_terminated(self) -> bool {
        matches!(self, StepState::Terminated { .. })
    }

    /// Terminated with a non-zero exit code
    pub fn is_failed(self) -> bool {
        matches!(self, StepState::Terminated { exit_code } if exit_code != 0)
    }
}

/// Overall phase of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl UnitPhase {
    /// Whether every step of the unit has stopped for good
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitPhase::Succeeded | UnitPhase::Failed)
    }
}

impl std::fmt::Display for UnitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitPhase::Pending => write!(f, "Pending"),
            UnitPhase::Running => write!(f, "Running"),
            UnitPhase::Succeeded => write!(f, "Succeeded"),
            UnitPhase::Failed => write!(f, "Failed"),
            UnitPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_state_predicates() {
        assert!(!StepState::Waiting.is_terminated());
        assert!(StepState::Terminated { exit_code: 0 }.is_terminated());
        assert!(!StepState::Terminated { exit_code: 0 }.is_failed());
        assert!(StepState::Terminated { exit_code: 2 }.is_failed());
        assert!(!StepState::Running.is_failed());
    }

    #[test]
    fn test_unit_builder_and_lookup() {
        let unit = ExecutionUnit::new("ci", "app-1-build")
            .with_init_step(Step::terminated("git-clone", 0))
            .with_main_step(Step::running("sti-build"))
            .with_phase(UnitPhase::Running);

        assert_eq!(unit.init_steps.len(), 1);
        assert!(unit.main_step("sti-build").is_some());
        assert!(unit.main_step("sidecar").is_none());
        assert!(!unit.phase.is_terminal());
    }
}
