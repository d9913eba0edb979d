//! Step Selector
//!
//! Decides which steps of an execution unit to stream, in which order and
//! with which follow flag. Everything here is pure: the aggregation loop
//! feeds in a unit snapshot plus the set of steps it already streamed.

use buildlog_core::domain::unit::{ExecutionUnit, Step, StepState};
use std::collections::HashSet;

/// Reserved names of the main step producing the build output
pub const BUILDER_STEP_NAMES: [&str; 3] = ["sti-build", "docker-build", "custom-build"];

/// How the steps of a unit are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepLayout {
    /// No init steps: the builder step holds the whole log
    SingleStep,
    /// Init steps run in order before the builder step
    MultiStep,
}

impl StepLayout {
    pub fn of(unit: &ExecutionUnit) -> Self {
        if unit.init_steps.is_empty() {
            StepLayout::SingleStep
        } else {
            StepLayout::MultiStep
        }
    }
}

/// First main step whose name is a reserved builder name
pub fn select_builder_step(steps: &[Step]) -> Option<&Step> {
    steps
        .iter()
        .find(|step| BUILDER_STEP_NAMES.contains(&step.name.as_str()))
}

/// Main step to stream for a unit
///
/// A requested step name wins. Otherwise the builder step is used, falling
/// back to the first main step for units that carry differently named
/// containers. The flag tells whether the fallback was taken.
pub fn select_main_step<'a>(
    unit: &'a ExecutionUnit,
    requested: Option<&str>,
) -> Option<(&'a Step, bool)> {
    if let Some(name) = requested {
        return unit.main_step(name).map(|step| (step, false));
    }

    match select_builder_step(&unit.main_steps) {
        Some(step) => Some((step, false)),
        None => unit.main_steps.first().map(|step| (step, true)),
    }
}

/// One step to stream in a round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub name: String,
    pub follow: bool,
}

/// Outcome of walking the init steps once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundPlan {
    /// Steps to stream now, in declared order
    pub steps: Vec<PlannedStep>,
    /// A step has not started yet; another round is needed
    pub waiting: bool,
    /// An init step terminated with a non-zero exit code
    pub failed: bool,
}

impl RoundPlan {
    /// Whether no further round can produce init output
    pub fn is_final(&self) -> bool {
        self.failed || !self.waiting
    }
}

/// Walks init steps in declared order and plans the next round
///
/// Steps in `streamed` are never planned again. The walk stops at the first
/// waiting step (no later step can have started) and right after a failed
/// step (no later step will run).
///
/// Stopping at a waiting step is deliberate even without `follow`: a later
/// step that already finished is left out rather than streamed out of order.
pub fn plan_round(init_steps: &[Step], streamed: &HashSet<String>, follow: bool) -> RoundPlan {
    let mut plan = RoundPlan::default();

    for step in init_steps {
        if streamed.contains(&step.name) {
            if step.state.is_failed() {
                plan.failed = true;
                break;
            }
            continue;
        }

        match step.state {
            StepState::Waiting => {
                plan.waiting = true;
                break;
            }
            StepState::Running => plan.steps.push(PlannedStep {
                name: step.name.clone(),
                follow,
            }),
            StepState::Terminated { exit_code } => {
                // A finished step cannot produce more output
                plan.steps.push(PlannedStep {
                    name: step.name.clone(),
                    follow: false,
                });
                if exit_code != 0 {
                    plan.failed = true;
                    break;
                }
            }
        }
    }

    plan
}
