use thiserror::Error;

/// Configuration and data-integrity errors raised by the triage core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriageError {
    #[error("no category configured")]
    NoCategories,

    #[error("category '{0}' is configured more than once")]
    DuplicateCategory(String),

    #[error("category '{0}' has no trigger word")]
    EmptyTriggerSet(String),

    #[error("default category '{0}' is not one of the configured categories")]
    UnknownDefaultCategory(String),

    #[error("category '{0}' has no position in the category ordering")]
    MissingOrdering(String),

    #[error("record category '{0}' is not one of the configured categories")]
    UnknownCategory(String),
}
