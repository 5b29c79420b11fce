use crate::types::ErrorInfo;

/// Error taxonomy for the harness core (see SPEC_FULL.md §7).
///
/// Categories:
/// - Load: fatal, session never starts
/// - Prepare/Invoke: surfaced to the agent as a Feedback `error` (execution phase)
/// - Evaluation: surfaced to the agent as a Feedback `error` (evaluation phase)
/// - Workspace: I/O failures writing/reading mailbox files, always fatal to the session
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("task load error: {0}")]
    Load(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("import '{module}' is not allowed (allowed: {allowed:?})")]
    ImportViolation { module: String, allowed: Vec<String> },

    #[error("entry function '{0}' not found")]
    EntryMissing(String),

    #[error("'{0}' is not callable")]
    NotCallable(String),

    #[error("{kind}: {message}")]
    Runtime { kind: String, message: String },

    #[error("execution timed out after {0} seconds")]
    Timeout(u64),

    #[error("evaluation driver error: {0}")]
    Evaluation(String),

    #[error("workspace I/O error at {path}: {source}")]
    Workspace {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl BenchError {
    /// Returns true if this error belongs to sandbox preparation/invocation and
    /// should be surfaced as an `execution`-phase Feedback error rather than
    /// aborting the session.
    pub fn is_execution_error(&self) -> bool {
        matches!(
            self,
            BenchError::Syntax(_)
                | BenchError::ImportViolation { .. }
                | BenchError::EntryMissing(_)
                | BenchError::NotCallable(_)
                | BenchError::Runtime { .. }
                | BenchError::Timeout(_)
        )
    }

    /// Returns true if the session cannot continue and must halt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BenchError::Load(_) | BenchError::Workspace { .. } | BenchError::Config(_)
        )
    }

    /// Classify this error into the type/message/phase triple the Feedback
    /// schema expects for an execution- or evaluation-phase failure.
    pub fn to_error_info(&self) -> ErrorInfo {
        use crate::types::ErrorPhase;
        match self {
            BenchError::Syntax(msg) => ErrorInfo {
                kind: "SyntaxError".to_string(),
                message: msg.clone(),
                phase: ErrorPhase::Execution,
            },
            BenchError::ImportViolation { module, allowed } => ErrorInfo {
                kind: "ImportViolation".to_string(),
                message: format!(
                    "Import '{}' is not allowed. Allowed imports: {:?}",
                    module, allowed
                ),
                phase: ErrorPhase::Execution,
            },
            BenchError::EntryMissing(name) => ErrorInfo {
                kind: "EntryMissing".to_string(),
                message: format!("Function '{}' not found in code", name),
                phase: ErrorPhase::Execution,
            },
            BenchError::NotCallable(name) => ErrorInfo {
                kind: "NotCallable".to_string(),
                message: format!("'{}' is not callable", name),
                phase: ErrorPhase::Execution,
            },
            BenchError::Runtime { kind, message } => ErrorInfo {
                kind: kind.clone(),
                message: message.clone(),
                phase: ErrorPhase::Execution,
            },
            BenchError::Timeout(secs) => ErrorInfo {
                kind: "Timeout".to_string(),
                message: format!("Execution timed out after {} seconds", secs),
                phase: ErrorPhase::Execution,
            },
            BenchError::Evaluation(msg) => ErrorInfo {
                kind: "EvaluationError".to_string(),
                message: msg.clone(),
                phase: ErrorPhase::Evaluation,
            },
            other => ErrorInfo {
                kind: "InternalError".to_string(),
                message: other.to_string(),
                phase: ErrorPhase::Execution,
            },
        }
    }
}
