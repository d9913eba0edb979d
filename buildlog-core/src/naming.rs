//! Naming conventions
//!
//! Builds, their configs and their execution units are linked by name only.
//! These helpers are the single place where those names are derived.

use crate::domain::build::{
    BUILD_CONFIG_ANNOTATION, BUILD_CONFIG_LABEL, BUILD_CONFIG_LABEL_DEPRECATED,
    BUILD_NUMBER_ANNOTATION, Build,
};

/// Maximum length of a unit name (DNS-1123 label)
pub const MAX_UNIT_NAME_LENGTH: usize = 63;

/// Suffix appended to a build name to get its unit name
pub const UNIT_SUFFIX: &str = "build";

/// Why a related build name could not be derived
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// The build was not created from a config
    MissingConfig { build: String },

    /// The build carries no (or an unparsable) build number
    MissingNumber { build: String },

    /// The build is the first of its config
    NoPreviousBuild { build: String },
}

impl std::fmt::Display for NamingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamingError::MissingConfig { build } => {
                write!(f, "build {} was not created from a build config", build)
            }
            NamingError::MissingNumber { build } => {
                write!(f, "build {} has no valid build number", build)
            }
            NamingError::NoPreviousBuild { build } => {
                write!(f, "build {} is the first build of its config", build)
            }
        }
    }
}

impl std::error::Error for NamingError {}

/// Name of the execution unit that runs `build`
///
/// Names longer than a DNS label are shortened and disambiguated with a hash
/// of the full build name, so the result is stable for a given build.
pub fn unit_name_for_build(build: &Build) -> String {
    join_with_limit(&build.name, UNIT_SUFFIX, MAX_UNIT_NAME_LENGTH)
}

/// Name of the config `build` was created from, if any
pub fn config_name_for_build(build: &Build) -> Option<&str> {
    build
        .annotations
        .get(BUILD_CONFIG_ANNOTATION)
        .or_else(|| build.labels.get(BUILD_CONFIG_LABEL))
        .or_else(|| build.labels.get(BUILD_CONFIG_LABEL_DEPRECATED))
        .map(String::as_str)
        .filter(|name| !name.is_empty())
}

/// Sequential number of `build` within its config, if any
pub fn build_number(build: &Build) -> Option<i64> {
    build
        .annotations
        .get(BUILD_NUMBER_ANNOTATION)
        .and_then(|n| n.trim().parse::<i64>().ok())
}

/// Name of the build with the given number in a config
pub fn build_name_for_config_version(config: &str, version: i64) -> String {
    format!("{}-{}", config, version)
}

/// Name of the build that precedes `build` in its config
pub fn previous_build_name(build: &Build) -> Result<String, NamingError> {
    let config = config_name_for_build(build).ok_or_else(|| NamingError::MissingConfig {
        build: build.qualified_name(),
    })?;
    let number = build_number(build).ok_or_else(|| NamingError::MissingNumber {
        build: build.qualified_name(),
    })?;

    if number <= 1 {
        return Err(NamingError::NoPreviousBuild {
            build: build.qualified_name(),
        });
    }

    Ok(build_name_for_config_version(config, number - 1))
}

/// Name of the build numbered `version` in the config of `build`
pub fn versioned_build_name(build: &Build, version: i64) -> Result<String, NamingError> {
    let config = config_name_for_build(build).ok_or_else(|| NamingError::MissingConfig {
        build: build.qualified_name(),
    })?;

    Ok(build_name_for_config_version(config, version))
}

// =============================================================================
// Helper Functions
// =============================================================================

fn join_with_limit(base: &str, suffix: &str, max_len: usize) -> String {
    let name = format!("{}-{}", base, suffix);
    if name.len() <= max_len {
        return name;
    }

    // base[..n] + "-" + 8 hex chars + "-" + suffix
    let keep = max_len.saturating_sub(suffix.len() + 10);
    let mut cut = keep.min(base.len());
    while !base.is_char_boundary(cut) {
        cut -= 1;
    }

    format!("{}-{:08x}-{}", &base[..cut], fnv32a(base), suffix)
}

fn fnv32a(input: &str) -> u32 {
    input.bytes().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(name: &str, config: &str, number: &str) -> Build {
        Build::new("ci", name)
            .with_annotation(BUILD_CONFIG_ANNOTATION, config)
            .with_annotation(BUILD_NUMBER_ANNOTATION, number)
    }

    #[test]
    fn test_unit_name_short() {
        let build = Build::new("ci", "app-3");
        assert_eq!(unit_name_for_build(&build), "app-3-build");
    }

    #[test]
    fn test_unit_name_long_is_truncated_and_stable() {
        let long = "x".repeat(80);
        let build = Build::new("ci", long.as_str());

        let first = unit_name_for_build(&build);
        let second = unit_name_for_build(&build);

        assert_eq!(first, second);
        assert_eq!(first.len(), MAX_UNIT_NAME_LENGTH);
        assert!(first.ends_with("-build"));
    }

    #[test]
    fn test_previous_build_name() {
        let build = numbered("bc-3", "bc", "3");
        assert_eq!(previous_build_name(&build).unwrap(), "bc-2");
    }

    #[test]
    fn test_previous_of_first_build_fails() {
        let build = numbered("bc-1", "bc", "1");
        assert!(matches!(
            previous_build_name(&build),
            Err(NamingError::NoPreviousBuild { .. })
        ));
    }

    #[test]
    fn test_previous_requires_config_and_number() {
        let no_config = Build::new("ci", "x").with_annotation(BUILD_NUMBER_ANNOTATION, "4");
        assert!(matches!(
            previous_build_name(&no_config),
            Err(NamingError::MissingConfig { .. })
        ));

        let no_number = Build::new("ci", "x").with_annotation(BUILD_CONFIG_ANNOTATION, "bc");
        assert!(matches!(
            previous_build_name(&no_number),
            Err(NamingError::MissingNumber { .. })
        ));
    }

    #[test]
    fn test_config_name_falls_back_to_labels() {
        let labelled = Build::new("ci", "bc-1").with_label(BUILD_CONFIG_LABEL_DEPRECATED, "bc");
        assert_eq!(config_name_for_build(&labelled), Some("bc"));
        assert_eq!(versioned_build_name(&labelled, 7).unwrap(), "bc-7");
    }
}
