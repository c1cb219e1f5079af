// Library exports for mailtriage crate
// This allows tests and other crates to use the modules

pub mod config;
pub mod connection_check;
pub mod email;
pub mod gemini_client;
pub mod imap_client;
pub mod report_writer;
pub mod slack_notifier;

// Keyword lexicon, fallback classification and analytics
pub mod triage;
