/// Common structures for a triage run
use std::path::PathBuf;

use crate::triage::{AnalyticsReport, Record};

/// Outcome of one pass over the mailbox
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: Vec<Record>,
    pub report: AnalyticsReport,
    pub log_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub ai_classified: usize,
    pub fallback_classified: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

impl RunSummary {
    pub fn emails_processed(&self) -> usize {
        self.records.len()
    }

    /// Per-category counts and top keywords, categories in `order`.
    pub fn analytics_lines(&self, order: &[String]) -> Vec<String> {
        let total = self.report.total_emails_processed;
        let mut lines = vec![format!("Total emails processed: {}", total)];

        for category in order {
            let Some(analytics) = self.report.category(category) else {
                continue;
            };
            lines.push(format!("📂 {}: {} emails", category, analytics.total_emails));
            if !analytics.top_keywords.is_empty() {
                let keywords: Vec<String> = analytics
                    .top_keywords
                    .iter()
                    .map(|(word, count)| format!("{}({})", word, count))
                    .collect();
                lines.push(format!("   🔑 Top keywords: {}", keywords.join(", ")));
            }
        }

        if let Some(category) = &self.report.summary.most_active_category {
            lines.push(format!("🏆 Most active category: {}", category));
        }

        lines
    }
}
