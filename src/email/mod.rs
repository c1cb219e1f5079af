pub mod common;
pub mod file_source;
pub mod processor_base;

// Re-export commonly used items
pub use common::RunSummary;
pub use file_source::JsonFileSource;
pub use processor_base::{MailSource, NotificationSink, PrimaryClassifier, TriageProcessor};
