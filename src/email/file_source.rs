use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use crate::email::MailSource;
use crate::triage::Email;

/// Emails read from a JSON array, for offline and demo runs.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileSource { path: path.into() }
    }

    pub async fn load(&self, limit: Option<usize>) -> Result<Vec<Email>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Unable to read {}", self.path.display()))?;

        let mut emails: Vec<Email> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid email list in {}", self.path.display()))?;

        if let Some(limit) = limit {
            emails.truncate(limit);
        }

        for (index, email) in emails.iter_mut().enumerate() {
            if email.id.is_empty() {
                email.id = format!("file-{}", index + 1);
            }
        }

        info!("✓ Loaded {} email(s) from {}", emails.len(), self.path.display());
        Ok(emails)
    }
}

impl MailSource for JsonFileSource {
    fn fetch_emails<'a>(
        &'a self,
        limit: Option<usize>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Email>>> + Send + 'a>> {
        Box::pin(self.load(limit))
    }

    fn source_name(&self) -> &str {
        "JSON file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_assigns_missing_ids_and_applies_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"sender": "a@example.com", "subject": "One", "body": "first"}},
                {{"id": "x-2", "sender": "b@example.com", "subject": "Two"}},
                {{"sender": "c@example.com", "subject": "Three"}}
            ]"#
        )
        .unwrap();

        let source = JsonFileSource::new(file.path());
        let emails = tokio_test::block_on(source.load(Some(2))).unwrap();

        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].id, "file-1");
        assert_eq!(emails[0].body, "first");
        assert_eq!(emails[1].id, "x-2");
    }

    #[test]
    fn test_load_reports_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = tokio_test::block_on(JsonFileSource::new(file.path()).load(None)).unwrap_err();
        assert!(err.to_string().starts_with("Invalid email list"));
    }
}
