use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Email as handed over by a mail source, already decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    #[serde(default)]
    pub id: String,
    pub sender: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl Email {
    /// Subject and body joined, the text both classifiers look at.
    pub fn full_text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: String,
    pub summary: String,
    pub source: ClassificationSource,
}

/// Durable per-email output, one line of the triage log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub summary: String,
    pub sender: String,
    pub subject: String,
}

impl Record {
    /// The timestamp is the processing time `now`, not the reception date.
    pub fn build(email: Email, classification: ClassificationResult, now: DateTime<Utc>) -> Self {
        Record {
            timestamp: now,
            category: classification.category,
            summary: classification.summary,
            sender: email.sender,
            subject: email.subject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_uses_processing_time_and_copies_verbatim() {
        let received = Utc.with_ymd_and_hms(2024, 9, 15, 8, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 9, 16, 10, 30, 0).unwrap();
        let email = Email {
            id: "42".to_string(),
            sender: "  Jane Doe <JANE@example.com> ".to_string(),
            subject: "RE: Invoice #12345 ".to_string(),
            body: "body".to_string(),
            received_at: received,
        };
        let classification = ClassificationResult {
            category: "Billing".to_string(),
            summary: "Customer disputes an invoice".to_string(),
            source: ClassificationSource::Ai,
        };

        let record = Record::build(email, classification, now);

        assert_eq!(record.timestamp, now);
        assert_eq!(record.category, "Billing");
        assert_eq!(record.summary, "Customer disputes an invoice");
        assert_eq!(record.sender, "  Jane Doe <JANE@example.com> ");
        assert_eq!(record.subject, "RE: Invoice #12345 ");
    }

    #[test]
    fn test_email_deserializes_without_optional_fields() {
        let email: Email = serde_json::from_str(
            r#"{"sender": "a@example.com", "subject": "Hello"}"#,
        ).unwrap();
        assert_eq!(email.id, "");
        assert_eq!(email.body, "");
        assert_eq!(email.full_text(), "Hello ");
    }
}
