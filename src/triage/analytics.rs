use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TriageError;
use super::lexicon::Lexicon;
use super::record::Record;
use super::text::tokenize;

pub const DEFAULT_TOP_KEYWORDS: usize = 5;

/// Words left out of the keyword tally.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    stop_words: HashSet<String>,
    min_length: usize,
}

impl KeywordFilter {
    /// Keeps every token.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new<I, S>(stop_words: I, min_length: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        KeywordFilter {
            stop_words: stop_words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
            min_length,
        }
    }

    pub fn accepts(&self, word: &str) -> bool {
        word.chars().count() >= self.min_length && !self.stop_words.contains(word)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAnalytics {
    /// (word, count), most frequent first.
    pub top_keywords: Vec<(String, usize)>,
    pub total_emails: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingPeriod {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub most_active_category: Option<String>,
    pub processing_period: ProcessingPeriod,
}

/// Batch summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub total_emails_processed: usize,
    pub categories: BTreeMap<String, CategoryAnalytics>,
    pub summary: ReportSummary,
}

impl AnalyticsReport {
    pub fn category(&self, name: &str) -> Option<&CategoryAnalytics> {
        self.categories.get(name)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Copy)]
struct WordStat {
    count: usize,
    first_seen: usize,
}

/// Word counts of one category during a single aggregation.
#[derive(Debug, Default)]
struct KeywordTally {
    words: HashMap<String, WordStat>,
    emails: usize,
}

impl KeywordTally {
    fn add(&mut self, word: String, position: usize) {
        self.words
            .entry(word)
            .and_modify(|stat| stat.count += 1)
            .or_insert(WordStat {
                count: 1,
                first_seen: position,
            });
    }

    /// Descending count, ties by first appearance.
    fn ranked(&self, limit: usize) -> Vec<(String, usize)> {
        let mut ranked: Vec<(&String, &WordStat)> = self.words.iter().collect();
        ranked.sort_by(|(_, a), (_, b)| {
            b.count.cmp(&a.count).then(a.first_seen.cmp(&b.first_seen))
        });
        ranked
            .into_iter()
            .take(limit)
            .map(|(word, stat)| (word.clone(), stat.count))
            .collect()
    }
}

/// Builds analytics reports for a fixed category set.
#[derive(Debug, Clone)]
pub struct Aggregator {
    categories: Vec<String>,
    filter: KeywordFilter,
    top_keywords: usize,
}

impl Aggregator {
    pub fn new(lexicon: &Lexicon) -> Self {
        Aggregator {
            categories: lexicon.category_names(),
            filter: KeywordFilter::none(),
            top_keywords: DEFAULT_TOP_KEYWORDS,
        }
    }

    pub fn with_filter(mut self, filter: KeywordFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_top_keywords(mut self, top_keywords: usize) -> Self {
        self.top_keywords = top_keywords;
        self
    }

    /// Aggregates exactly `records`; nothing is carried over between calls.
    ///
    /// Fails on a record whose category is not configured.
    pub fn aggregate(
        &self,
        records: &[Record],
        generated_at: DateTime<Utc>,
    ) -> Result<AnalyticsReport, TriageError> {
        let index: HashMap<&str, usize> = self
            .categories
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let mut tallies: Vec<KeywordTally> =
            self.categories.iter().map(|_| KeywordTally::default()).collect();

        let mut position = 0;
        for record in records {
            let slot = *index
                .get(record.category.as_str())
                .ok_or_else(|| TriageError::UnknownCategory(record.category.clone()))?;
            let tally = &mut tallies[slot];
            tally.emails += 1;

            for word in tokenize(&record.summary) {
                if self.filter.accepts(&word) {
                    tally.add(word, position);
                    position += 1;
                }
            }
        }

        let categories: BTreeMap<String, CategoryAnalytics> = self
            .categories
            .iter()
            .zip(tallies.iter())
            .map(|(name, tally)| {
                (
                    name.clone(),
                    CategoryAnalytics {
                        top_keywords: tally.ranked(self.top_keywords),
                        total_emails: tally.emails,
                    },
                )
            })
            .collect();

        let most_active_category = if records.is_empty() {
            None
        } else {
            // BTreeMap iterates by name, so keeping the first maximum picks the
            // lexicographically smallest name among ties
            let mut best: Option<(&String, usize)> = None;
            for (name, analytics) in &categories {
                match best {
                    Some((_, total)) if total >= analytics.total_emails => {}
                    _ => best = Some((name, analytics.total_emails)),
                }
            }
            best.map(|(name, _)| name.clone())
        };

        let processing_period = ProcessingPeriod {
            start: records.iter().map(|r| r.timestamp).min(),
            end: records.iter().map(|r| r.timestamp).max(),
        };

        Ok(AnalyticsReport {
            generated_at,
            total_emails_processed: records.len(),
            categories,
            summary: ReportSummary {
                most_active_category,
                processing_period,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::lexicon::CategoryRule;
    use chrono::TimeZone;

    fn lexicon() -> Lexicon {
        Lexicon::new(
            vec![
                CategoryRule::new("Product Support", &["bug"]),
                CategoryRule::new("Billing", &["invoice"]),
                CategoryRule::new("General Inquiry", &[]),
            ],
            "General Inquiry",
        )
        .unwrap()
    }

    fn record(category: &str, summary: &str, hour: u32) -> Record {
        Record {
            timestamp: Utc.with_ymd_and_hms(2024, 9, 16, hour, 0, 0).unwrap(),
            category: category.to_string(),
            summary: summary.to_string(),
            sender: "customer@example.com".to_string(),
            subject: "subject".to_string(),
        }
    }

    #[test]
    fn test_filter_drops_stop_words_and_short_words() {
        let filter = KeywordFilter::new(["The", "with"], 3);
        assert!(filter.accepts("invoice"));
        assert!(!filter.accepts("the"));
        assert!(!filter.accepts("with"));
        assert!(!filter.accepts("is"));
        assert!(KeywordFilter::none().accepts("a"));
    }

    #[test]
    fn test_ranking_breaks_ties_by_first_appearance() {
        let records = vec![
            record("Billing", "zeta alpha", 1),
            record("Billing", "mid alpha zeta", 2),
            record("Billing", "late", 3),
        ];
        let report = Aggregator::new(&lexicon()).aggregate(&records, Utc::now()).unwrap();
        let billing = report.category("Billing").unwrap();
        assert_eq!(
            billing.top_keywords,
            vec![
                ("zeta".to_string(), 2),
                ("alpha".to_string(), 2),
                ("mid".to_string(), 1),
                ("late".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_top_keywords_are_truncated() {
        let records = vec![record("Billing", "one two three four five six seven", 1)];
        let report = Aggregator::new(&lexicon()).aggregate(&records, Utc::now()).unwrap();
        assert_eq!(report.category("Billing").unwrap().top_keywords.len(), 5);

        let report = Aggregator::new(&lexicon())
            .with_top_keywords(2)
            .aggregate(&records, Utc::now())
            .unwrap();
        assert_eq!(
            report.category("Billing").unwrap().top_keywords,
            vec![("one".to_string(), 1), ("two".to_string(), 1)]
        );
    }

    #[test]
    fn test_filter_applies_to_summaries() {
        let records = vec![record("Billing", "The invoice is with the bank", 1)];
        let report = Aggregator::new(&lexicon())
            .with_filter(KeywordFilter::new(["the", "is", "with"], 3))
            .aggregate(&records, Utc::now())
            .unwrap();
        assert_eq!(
            report.category("Billing").unwrap().top_keywords,
            vec![("invoice".to_string(), 1), ("bank".to_string(), 1)]
        );
    }

    #[test]
    fn test_most_active_tie_picks_smallest_name() {
        let records = vec![
            record("Product Support", "crash", 1),
            record("Billing", "invoice", 2),
        ];
        let report = Aggregator::new(&lexicon()).aggregate(&records, Utc::now()).unwrap();
        assert_eq!(report.summary.most_active_category.as_deref(), Some("Billing"));
    }

    #[test]
    fn test_processing_period_spans_record_timestamps() {
        let records = vec![
            record("Billing", "b", 5),
            record("Billing", "a", 2),
            record("General Inquiry", "c", 9),
        ];
        let report = Aggregator::new(&lexicon()).aggregate(&records, Utc::now()).unwrap();
        assert_eq!(report.summary.processing_period.start, Some(records[1].timestamp));
        assert_eq!(report.summary.processing_period.end, Some(records[2].timestamp));
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let records = vec![record("Sales", "lead", 1)];
        assert_eq!(
            Aggregator::new(&lexicon()).aggregate(&records, Utc::now()).unwrap_err(),
            TriageError::UnknownCategory("Sales".to_string())
        );
    }
}
