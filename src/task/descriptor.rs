//! Raw task descriptor parsing (`task.toml` -> [`TaskConfig`]).
//!
//! Mirrors `_parse_task_config` in the reference loader, but leans on serde's
//! `#[serde(default)]` field defaulting instead of hand-written `dict.get`
//! fallbacks — the TOML format was chosen over the original's YAML+dynamic
//! module loading specifically so this can be a plain derive (see
//! DESIGN.md's format-decision note).

use std::path::Path;

use crate::error::BenchError;
use crate::types::TaskConfig;

pub fn parse_task_config(contents: &str, source: &Path) -> Result<TaskConfig, BenchError> {
    toml::from_str(contents).map_err(|e| {
        BenchError::Load(format!("failed to parse {}: {}", source.display(), e))
    })
}
