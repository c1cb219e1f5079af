use chrono::{DateTime, TimeZone, Utc};

use mailtriage::triage::{Aggregator, CategoryRule, KeywordFilter, Lexicon, Record, TriageError};

fn lexicon() -> Lexicon {
    Lexicon::new(
        vec![
            CategoryRule::new("Product Support", &["bug", "error"]),
            CategoryRule::new("Billing", &["invoice", "refund"]),
            CategoryRule::new("General Inquiry", &[]),
        ],
        "General Inquiry",
    )
    .expect("Failed to build lexicon")
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 16, 10, minute, 0).unwrap()
}

fn record(category: &str, summary: &str, minute: u32) -> Record {
    Record {
        timestamp: at(minute),
        category: category.to_string(),
        summary: summary.to_string(),
        sender: "customer@example.com".to_string(),
        subject: "Subject".to_string(),
    }
}

fn keywords(pairs: &[(&str, usize)]) -> Vec<(String, usize)> {
    pairs.iter().map(|(w, c)| (w.to_string(), *c)).collect()
}

#[test]
fn test_three_record_batch() {
    let records = vec![
        record("Billing", "invoice payment question", 0),
        record("Billing", "invoice overdue", 5),
        record("General Inquiry", "general question", 9),
    ];

    let report = Aggregator::new(&lexicon()).aggregate(&records, at(30)).unwrap();

    let billing = report.category("Billing").unwrap();
    assert_eq!(billing.total_emails, 2);
    let expected = keywords(&[("invoice", 2), ("payment", 1), ("question", 1)]);
    assert_eq!(&billing.top_keywords[..3], &expected[..]);
    assert_eq!(billing.top_keywords[3], ("overdue".to_string(), 1));

    let general = report.category("General Inquiry").unwrap();
    assert_eq!(general.total_emails, 1);
    assert_eq!(general.top_keywords, keywords(&[("general", 1), ("question", 1)]));

    assert_eq!(report.total_emails_processed, 3);
    assert_eq!(report.summary.most_active_category.as_deref(), Some("Billing"));
    assert_eq!(report.summary.processing_period.start, Some(at(0)));
    assert_eq!(report.summary.processing_period.end, Some(at(9)));
    assert_eq!(report.generated_at, at(30));
}

#[test]
fn test_empty_batch_lists_every_category() {
    let report = Aggregator::new(&lexicon()).aggregate(&[], at(0)).unwrap();

    assert_eq!(report.total_emails_processed, 0);
    assert_eq!(report.categories.len(), 3);
    for analytics in report.categories.values() {
        assert_eq!(analytics.total_emails, 0);
        assert!(analytics.top_keywords.is_empty());
    }
    assert_eq!(report.summary.most_active_category, None);
    assert_eq!(report.summary.processing_period.start, None);

    let json = report.to_json_pretty().unwrap();
    assert!(json.contains("\"most_active_category\": null"));
    assert!(json.contains("\"Product Support\""));
}

#[test]
fn test_majority_category_is_most_active() {
    let records = vec![
        record("Product Support", "app crash", 0),
        record("Billing", "refund", 1),
        record("Billing", "invoice", 2),
        record("General Inquiry", "hours", 3),
        record("Billing", "charge", 4),
    ];

    let report = Aggregator::new(&lexicon()).aggregate(&records, at(10)).unwrap();
    assert_eq!(report.summary.most_active_category.as_deref(), Some("Billing"));

    let totals: usize = report.categories.values().map(|c| c.total_emails).sum();
    assert_eq!(totals, report.total_emails_processed);
}

#[test]
fn test_most_active_tie_takes_smallest_name() {
    let records = vec![
        record("Product Support", "crash", 0),
        record("Billing", "refund", 1),
    ];

    let report = Aggregator::new(&lexicon()).aggregate(&records, at(10)).unwrap();
    assert_eq!(report.summary.most_active_category.as_deref(), Some("Billing"));
}

#[test]
fn test_top_keywords_capped_and_sorted() {
    let records = vec![
        record("Product Support", "alpha beta gamma delta epsilon zeta eta", 0),
        record("Product Support", "eta zeta eta", 1),
        record("Product Support", "gamma", 2),
    ];

    let report = Aggregator::new(&lexicon()).aggregate(&records, at(10)).unwrap();
    let support = report.category("Product Support").unwrap();

    assert_eq!(support.top_keywords.len(), 5);
    assert_eq!(
        support.top_keywords,
        keywords(&[("eta", 3), ("gamma", 2), ("zeta", 2), ("alpha", 1), ("beta", 1)])
    );
    assert!(support.top_keywords.windows(2).all(|w| w[0].1 >= w[1].1));
}

#[test]
fn test_keyword_filter_drops_stop_words() {
    let aggregator = Aggregator::new(&lexicon()).with_filter(KeywordFilter::new(["the", "for"], 3));
    let records = vec![record("Billing", "Refund for the damaged order, ok?", 0)];

    let report = aggregator.aggregate(&records, at(10)).unwrap();
    assert_eq!(
        report.category("Billing").unwrap().top_keywords,
        keywords(&[("refund", 1), ("damaged", 1), ("order", 1)])
    );
}

#[test]
fn test_aggregation_is_idempotent() {
    let aggregator = Aggregator::new(&lexicon());
    let records = vec![
        record("Billing", "invoice invoice refund charge fee", 0),
        record("Product Support", "error login app error", 1),
        record("General Inquiry", "question about hours", 2),
    ];

    let first = aggregator.aggregate(&records, at(10)).unwrap().to_json_pretty().unwrap();
    let second = aggregator.aggregate(&records, at(10)).unwrap().to_json_pretty().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unknown_category_is_rejected() {
    let records = vec![record("Sales", "new contract", 0)];

    let err = Aggregator::new(&lexicon()).aggregate(&records, at(10)).unwrap_err();
    assert_eq!(err, TriageError::UnknownCategory("Sales".to_string()));
}
