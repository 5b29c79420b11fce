use std::path::Path;

use serde::Deserialize;

#[derive(Default, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    pub execution: ExecutionDefaults,
    pub reporting: ReportingConfig,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct ExecutionDefaults {
    /// Upper bound a task's own `execution.timeout_seconds` is clamped to,
    /// mirroring `max_total_attempts_ceiling`'s guardrail against a
    /// misconfigured task descriptor.
    pub timeout_seconds_ceiling: u64,
    pub default_poll_interval_seconds: f64,
    pub max_total_attempts_ceiling: u32,
}

impl Default for ExecutionDefaults {
    fn default() -> Self {
        Self {
            timeout_seconds_ceiling: 60,
            default_poll_interval_seconds: 1.0,
            max_total_attempts_ceiling: 500,
        }
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ReportingConfig {
    pub pretty_json: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self { pretty_json: true }
    }
}

pub fn validate(config: &BenchConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.execution.timeout_seconds_ceiling == 0 {
        errors.push("execution.timeout_seconds_ceiling must be >= 1".to_string());
    }

    if config.execution.default_poll_interval_seconds <= 0.0 {
        errors.push("execution.default_poll_interval_seconds must be > 0".to_string());
    }

    if config.execution.max_total_attempts_ceiling == 0 {
        errors.push("execution.max_total_attempts_ceiling must be >= 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Load config from an explicit path (if provided) or fall back to
/// `{project_root}/phase-bench.toml`.
///
/// When `config_path` is `Some`, the file MUST exist — returns an error if missing.
/// When `config_path` is `None`, delegates to `load_config` (returns defaults if missing).
pub fn load_config_from(
    config_path: Option<&Path>,
    project_root: &Path,
) -> Result<BenchConfig, String> {
    match config_path {
        Some(path) => load_config_at(path),
        None => load_config(project_root),
    }
}

/// Load config from a specific file path. Errors if the file does not exist.
fn load_config_at(path: &Path) -> Result<BenchConfig, String> {
    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let config: BenchConfig = toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;

    validate(&config).map_err(|errors| {
        format!(
            "Config validation failed:\n{}",
            errors
                .iter()
                .map(|e| format!("  - {}", e))
                .collect::<Vec<_>>()
                .join("\n")
        )
    })?;

    Ok(config)
}

pub fn load_config(project_root: &Path) -> Result<BenchConfig, String> {
    let config_path = project_root.join("phase-bench.toml");

    if !config_path.exists() {
        return Ok(BenchConfig::default());
    }

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read {}: {}", config_path.display(), e))?;

    let config: BenchConfig = toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse {}: {}", config_path.display(), e))?;

    validate(&config).map_err(|errors| {
        format!(
            "Config validation failed:\n{}",
            errors
                .iter()
                .map(|e| format!("  - {}", e))
                .collect::<Vec<_>>()
                .join("\n")
        )
    })?;

    Ok(config)
}
