//! Typed error taxonomy for the allocation pipeline.
//!
//! Replaces the exception-unwinding control flow of the source system
//! (§9 redesign flag "Exceptions for control flow") with a `Result`-based
//! propagation: agents never attempt to recover from each other's errors,
//! only the run controller decides what a failure means for run status.

use thiserror::Error;

/// Top-level error returned by fallible core operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    InfeasibleAssignment(#[from] InfeasibleAssignmentError),
}

impl DispatchError {
    /// Message truncated to 500 chars, as required for `finalize_run` error
    /// payloads (§4.1, §7).
    pub fn truncated_message(&self) -> String {
        let full = self.to_string();
        if full.len() <= 500 {
            full
        } else {
            full.chars().take(500).collect()
        }
    }
}

/// Rejected before any run row is created. Surfaced to the caller as a
/// 400-class error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("driver list must not be empty")]
    EmptyDrivers,
    #[error("package list must not be empty")]
    EmptyPackages,
    #[error("invalid priority value: {0}")]
    InvalidPriority(i32),
    #[error("invalid language tag: {0}")]
    InvalidLanguageTag(String),
}

/// Any failure surfaced by an external collaborator (Store, clusterer,
/// stop orderer, event sink). Marks the run FAILED.
#[derive(Debug, Error)]
#[error("collaborator failure: {message}")]
pub struct CollaboratorError {
    pub message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// The planner exhausted every solver backend without covering every
/// route.
#[derive(Debug, Error)]
#[error("no solver backend could produce a feasible assignment: {reason}")]
pub struct InfeasibleAssignmentError {
    pub reason: String,
}

/// Failures in learning-episode creation (§4.9). Logged and swallowed by
/// the controller; the run still succeeds.
#[derive(Debug, Error)]
pub enum NonFatalLearningError {
    #[error("bandit arm selection failed: {0}")]
    BanditSelection(String),
    #[error("episode persistence failed: {0}")]
    EpisodePersistence(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_messages_to_500_chars() {
        let err = DispatchError::Collaborator(CollaboratorError::new("x".repeat(600)));
        assert_eq!(err.truncated_message().len(), 500);
    }

    #[test]
    fn short_messages_pass_through_unchanged() {
        let err = DispatchError::Validation(ValidationError::EmptyDrivers);
        assert_eq!(err.truncated_message(), "driver list must not be empty");
    }
}
