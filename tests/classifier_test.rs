use std::fs;

use mailtriage::config::Config;
use mailtriage::triage::{
    CategoryRule, ClassificationSource, Email, FallbackClassifier, Lexicon, PrimaryVerdict, Triage,
};

fn example_lexicon() -> Lexicon {
    let json =
        fs::read_to_string("config.example.json").expect("Failed to read config.example.json");
    let config = Config::from_json_str(&json).expect("Example configuration should be valid");
    config.triage.lexicon().expect("Example lexicon should be valid")
}

fn sample_emails() -> Vec<Email> {
    let json = fs::read_to_string("demos/sample_emails.json")
        .expect("Failed to read demos/sample_emails.json");
    serde_json::from_str(&json).expect("Failed to parse sample emails")
}

#[test]
fn test_sample_inbox_fallback_categories() {
    let lexicon = example_lexicon();
    let classifier = FallbackClassifier::new(&lexicon);

    let categories: Vec<(String, &str)> = sample_emails()
        .iter()
        .map(|email| (email.id.clone(), classifier.classify(&email.full_text())))
        .collect();

    assert_eq!(
        categories,
        vec![
            ("demo_1".to_string(), "Product Support"),
            ("demo_2".to_string(), "Billing"),
            ("demo_3".to_string(), "Product Support"),
            ("demo_4".to_string(), "Billing"),
            ("demo_5".to_string(), "General Inquiry"),
        ]
    );
}

#[test]
fn test_no_trigger_gives_default_category() {
    let lexicon = example_lexicon();
    let classifier = FallbackClassifier::new(&lexicon);

    assert_eq!(classifier.classify("Hello, do you ship to Canada?"), "General Inquiry");
    assert_eq!(classifier.classify(""), "General Inquiry");
}

#[test]
fn test_tie_goes_to_first_listed_category() {
    let support_first = Lexicon::new(
        vec![
            CategoryRule::new("Product Support", &["bug"]),
            CategoryRule::new("Billing", &["invoice"]),
            CategoryRule::new("General Inquiry", &[]),
        ],
        "General Inquiry",
    )
    .unwrap();
    let billing_first = Lexicon::new(
        vec![
            CategoryRule::new("Billing", &["invoice"]),
            CategoryRule::new("Product Support", &["bug"]),
            CategoryRule::new("General Inquiry", &[]),
        ],
        "General Inquiry",
    )
    .unwrap();

    let text = "Bug in the invoice page";
    assert_eq!(FallbackClassifier::new(&support_first).classify(text), "Product Support");
    assert_eq!(FallbackClassifier::new(&billing_first).classify(text), "Billing");

    // A strictly higher score wins whatever the order
    let text = "Invoice total wrong, second invoice also wrong, one bug";
    assert_eq!(FallbackClassifier::new(&support_first).classify(text), "Billing");
}

#[test]
fn test_triage_prefers_primary_verdict() {
    let triage = Triage::new(example_lexicon());
    let email = sample_emails().remove(4);

    let result = triage.classify_email(
        &email,
        Some(PrimaryVerdict {
            category: "product support".to_string(),
            summary: "Password reset emails are not arriving".to_string(),
        }),
    );
    assert_eq!(result.category, "Product Support");
    assert_eq!(result.summary, "Password reset emails are not arriving");
    assert_eq!(result.source, ClassificationSource::Ai);

    let result = triage.classify_email(&email, None);
    assert_eq!(result.category, "General Inquiry");
    assert_eq!(result.summary, "Email from newuser@gmail.com - How to reset my password?");
    assert_eq!(result.source, ClassificationSource::Fallback);
}
