//! Email triage core: keyword lexicon, fallback classification, record
//! building and keyword analytics. Everything here is pure and synchronous.
pub mod analytics;
pub mod classifier;
pub mod error;
pub mod lexicon;
pub mod record;
pub mod text;

pub use analytics::{
    AnalyticsReport, Aggregator, CategoryAnalytics, KeywordFilter, ProcessingPeriod, ReportSummary,
};
pub use classifier::{FallbackClassifier, PrimaryVerdict, Triage};
pub use error::TriageError;
pub use lexicon::{CategoryRule, Lexicon};
pub use record::{ClassificationResult, ClassificationSource, Email, Record};
