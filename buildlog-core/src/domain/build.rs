//! Build domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Annotation holding the sequential number of a build within its config
pub const BUILD_NUMBER_ANNOTATION: &str = "openshift.io/build.number";

/// Annotation identifying the build config a build was created from
pub const BUILD_CONFIG_ANNOTATION: &str = "openshift.io/build-config.name";

/// Label carrying the build config name (may be truncated to label length)
pub const BUILD_CONFIG_LABEL: &str = "openshift.io/build-config.name";

/// Label used for the build config name before namespaces were introduced
pub const BUILD_CONFIG_LABEL_DEPRECATED: &str = "buildconfig";

/// A build job snapshot
///
/// Builds are created and updated by an external controller. Consumers only
/// ever read them, either by fetching or by watching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub namespace: String,
    pub name: String,

    #[serde(default = "Uuid::new_v4")]
    pub uid: Uuid,

    /// Assigned by the registry on every write
    #[serde(default)]
    pub resource_version: u64,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub strategy: BuildStrategy,

    pub phase: BuildPhase,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Build {
    /// Creates a build in the `New` phase with no labels or annotations
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: Uuid::new_v4(),
            resource_version: 0,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            strategy: BuildStrategy::default(),
            phase: BuildPhase::New,
            created_at: Utc::now(),
        }
    }

    /// Returns a copy of this build in the given phase
    pub fn with_phase(mut self, phase: BuildPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Returns a copy of this build with the given annotation set
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Returns a copy of this build with the given label set
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Returns a copy of this build using the given strategy
    pub fn with_strategy(mut self, strategy: BuildStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// The `namespace/name` pair used in messages
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Coarse lifecycle state of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildPhase {
    /// Newly created, no execution unit assigned yet
    New,

    /// Execution unit assigned, waiting to be scheduled
    Pending,

    Running,
    Complete,
    Failed,

    /// Something prevented the build from executing at all
    Error,

    Cancelled,

    /// A phase value this version does not know about
    #[serde(other)]
    Unrecognized,
}

impl BuildPhase {
    /// Whether the build is still queued (no logs can exist yet)
    pub fn is_queued(self) -> bool {
        matches!(self, BuildPhase::New | BuildPhase::Pending)
    }

    /// Whether the build has left the queue for good
    pub fn is_active(self) -> bool {
        matches!(
            self,
            BuildPhase::Running
                | BuildPhase::Complete
                | BuildPhase::Failed
                | BuildPhase::Error
                | BuildPhase::Cancelled
        )
    }
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildPhase::New => write!(f, "New"),
            BuildPhase::Pending => write!(f, "Pending"),
            BuildPhase::Running => write!(f, "Running"),
            BuildPhase::Complete => write!(f, "Complete"),
            BuildPhase::Failed => write!(f, "Failed"),
            BuildPhase::Error => write!(f, "Error"),
            BuildPhase::Cancelled => write!(f, "Cancelled"),
            BuildPhase::Unrecognized => write!(f, "Unrecognized"),
        }
    }
}

/// How a build produces its output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStrategy {
    #[default]
    Source,
    Docker,
    Custom,

    /// Runs in an external Jenkins; there is no build unit to read logs from
    JenkinsPipeline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_classification() {
        assert!(BuildPhase::New.is_queued());
        assert!(BuildPhase::Pending.is_queued());
        assert!(!BuildPhase::Running.is_queued());

        for phase in [
            BuildPhase::Running,
            BuildPhase::Complete,
            BuildPhase::Failed,
            BuildPhase::Error,
            BuildPhase::Cancelled,
        ] {
            assert!(phase.is_active(), "{} should be active", phase);
        }

        assert!(!BuildPhase::Unrecognized.is_active());
        assert!(!BuildPhase::Unrecognized.is_queued());
    }

    #[test]
    fn test_unknown_phase_deserializes_as_unrecognized() {
        let phase: BuildPhase = serde_json::from_str("\"Paused\"").unwrap();
        assert_eq!(phase, BuildPhase::Unrecognized);
    }

    #[test]
    fn test_build_deserializes_with_defaults() {
        let build: Build = serde_json::from_value(serde_json::json!({
            "namespace": "ci",
            "name": "app-1",
            "phase": "Running"
        }))
        .unwrap();

        assert_eq!(build.qualified_name(), "ci/app-1");
        assert_eq!(build.strategy, BuildStrategy::Source);
        assert_eq!(build.resource_version, 0);
        assert!(build.annotations.is_empty());
    }
}
