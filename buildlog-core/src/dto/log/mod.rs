//! Log DTOs

use serde::{Deserialize, Serialize};

/// Options for a build log request
///
/// Deserialized straight from the query string of
/// `GET /namespaces/{namespace}/builds/{name}/log`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildLogOptions {
    /// Keep the stream open and deliver new output as it is produced
    #[serde(default)]
    pub follow: bool,

    /// Return an empty stream instead of waiting for a queued build
    #[serde(default)]
    pub no_wait: bool,

    /// Stream the build preceding the requested one
    #[serde(default)]
    pub previous: bool,

    /// Main step to stream instead of the builder step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    /// Stream the build with this number from the same config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,

    #[serde(default)]
    pub timestamps: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail_lines: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_bytes: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_seconds: Option<i64>,
}

impl BuildLogOptions {
    /// Checks option values and combinations
    ///
    /// # Returns
    /// All problems found, joined into one message
    pub fn validate(&self) -> Result<(), String> {
        let mut problems = Vec::new();

        if let Some(tail) = self.tail_lines.filter(|t| *t < 0) {
            problems.push(format!("tailLines: must be non-negative (got {})", tail));
        }

        if let Some(limit) = self.limit_bytes.filter(|l| *l < 1) {
            problems.push(format!("limitBytes: must be greater than 0 (got {})", limit));
        }

        if let Some(since) = self.since_seconds.filter(|s| *s < 1) {
            problems.push(format!(
                "sinceSeconds: must be greater than 0 (got {})",
                since
            ));
        }

        if let Some(version) = self.version {
            if version <= 0 {
                problems.push(format!(
                    "version: build version must be greater than 0 (got {})",
                    version
                ));
            }
            if self.previous {
                problems.push("previous: cannot use previous when a version is specified".into());
            }
        }

        if self.container.as_deref().is_some_and(|c| c.trim().is_empty()) {
            problems.push("container: must not be empty".into());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}

/// Request for the raw log of one step of an execution unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRequest {
    pub namespace: String,
    pub unit: String,
    pub step: String,
    pub follow: bool,
    pub timestamps: bool,
    pub tail_lines: Option<i64>,
    pub limit_bytes: Option<i64>,
    pub since_seconds: Option<i64>,
}

impl LogRequest {
    /// Builds a per-step request carrying the tuning options of a build request
    pub fn for_step(
        namespace: impl Into<String>,
        unit: impl Into<String>,
        step: impl Into<String>,
        follow: bool,
        options: &BuildLogOptions,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            unit: unit.into(),
            step: step.into(),
            follow,
            timestamps: options.timestamps,
            tail_lines: options.tail_lines,
            limit_bytes: options.limit_bytes,
            since_seconds: options.since_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(BuildLogOptions::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let opts = BuildLogOptions {
            tail_lines: Some(-1),
            limit_bytes: Some(0),
            since_seconds: Some(0),
            ..Default::default()
        };

        let err = opts.validate().unwrap_err();
        assert!(err.contains("tailLines"));
        assert!(err.contains("limitBytes"));
        assert!(err.contains("sinceSeconds"));
    }

    #[test]
    fn test_validate_version_rules() {
        let zero = BuildLogOptions {
            version: Some(0),
            ..Default::default()
        };
        assert!(zero.validate().unwrap_err().contains("version"));

        let with_previous = BuildLogOptions {
            version: Some(2),
            previous: true,
            ..Default::default()
        };
        assert!(with_previous.validate().unwrap_err().contains("previous"));

        let ok = BuildLogOptions {
            version: Some(2),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_options_from_query_names() {
        let opts: BuildLogOptions = serde_json::from_value(serde_json::json!({
            "follow": true,
            "noWait": true,
            "tailLines": 10
        }))
        .unwrap();

        assert!(opts.follow);
        assert!(opts.no_wait);
        assert_eq!(opts.tail_lines, Some(10));
        assert!(!opts.previous);
    }

    #[test]
    fn test_log_request_carries_tuning_options() {
        let opts = BuildLogOptions {
            follow: true,
            timestamps: true,
            limit_bytes: Some(512),
            ..Default::default()
        };

        let req = LogRequest::for_step("ci", "app-1-build", "git-clone", false, &opts);
        assert!(!req.follow);
        assert!(req.timestamps);
        assert_eq!(req.limit_bytes, Some(512));
        assert_eq!(req.step, "git-clone");
    }
}
