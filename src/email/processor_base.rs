use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, error, info, warn};

use crate::config::{AnalyticsConfig, Config, TriageConfig};
use crate::gemini_client::GeminiClient;
use crate::report_writer::ReportWriter;
use crate::slack_notifier::SlackNotifier;
use crate::triage::text::truncate_with_ellipsis;
use crate::triage::{
    Aggregator, ClassificationResult, ClassificationSource, Email, PrimaryVerdict, Record, Triage,
};

use super::common::RunSummary;

/// Where emails come from
pub trait MailSource: Send + Sync {
    /// Fetch the emails to triage, at most `limit` when given
    fn fetch_emails<'a>(
        &'a self,
        limit: Option<usize>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Email>>> + Send + 'a>>;

    /// Get the name of this source (for logging)
    fn source_name(&self) -> &str;
}

/// AI classification and summary of one email
pub trait PrimaryClassifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        email: &'a Email,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<PrimaryVerdict>> + Send + 'a>>;

    /// Get the name of this classifier (for logging)
    fn classifier_name(&self) -> &str;
}

/// Chat delivery of triage results
pub trait NotificationSink: Send + Sync {
    /// Deliver one record to `channel`
    fn notify<'a>(
        &'a self,
        record: &'a Record,
        channel: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;

    /// Report a failed run
    fn notify_error<'a>(
        &'a self,
        channel: &'a str,
        message: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;
}

/// One triage pass: fetch, classify, notify, aggregate, persist.
pub struct TriageProcessor {
    triage: Triage,
    routing: TriageConfig,
    aggregator: Aggregator,
    mail_source: Box<dyn MailSource>,
    classifier: Option<Box<dyn PrimaryClassifier>>,
    notifier: Option<Box<dyn NotificationSink>>,
    writer: Option<ReportWriter>,
    request_delay: Duration,
    dry_run: bool,
}

impl TriageProcessor {
    /// Processor with keyword classification only, no notification and no
    /// file output.
    pub fn new(
        routing: TriageConfig,
        analytics: &AnalyticsConfig,
        mail_source: Box<dyn MailSource>,
    ) -> Result<Self> {
        let lexicon = routing.lexicon()?;
        let aggregator = analytics.aggregator(&lexicon);

        Ok(TriageProcessor {
            triage: Triage::new(lexicon),
            routing,
            aggregator,
            mail_source,
            classifier: None,
            notifier: None,
            writer: None,
            request_delay: Duration::ZERO,
            dry_run: false,
        })
    }

    /// Wires Gemini, Slack and the report writer from the configuration.
    /// In dry-run mode nothing is sent and nothing is written.
    pub fn from_config(
        config: &Config,
        mail_source: Box<dyn MailSource>,
        dry_run: bool,
    ) -> Result<Self> {
        if dry_run {
            info!("🧪 Initializing triage processor in dry-run mode");
            info!("   No Slack notification, no file output");
        } else {
            info!("Initializing triage processor ({})", mail_source.source_name());
        }

        let mut processor = Self::new(config.triage.clone(), &config.analytics, mail_source)?
            .with_request_delay(Duration::from_millis(config.request_delay_ms))
            .dry_run(dry_run);

        if let Some(gemini_config) = &config.gemini {
            let categories = processor.triage.lexicon().category_names();
            let client = GeminiClient::new(gemini_config, categories)
                .context("Unable to initialize Gemini client")?;
            processor = processor.with_classifier(Box::new(client));
        } else {
            info!("ℹ️  Gemini not configured, keyword fallback classification only");
        }

        if !dry_run {
            match &config.slack {
                Some(slack_config) => match SlackNotifier::new(slack_config, &config.triage) {
                    Ok(notifier) => {
                        info!("✅ Slack notifications enabled");
                        processor = processor.with_notifier(Box::new(notifier));
                    }
                    Err(e) => {
                        warn!(
                            "⚠️  Unable to initialize Slack notifier: {} - notifications disabled",
                            e
                        );
                    }
                },
                None => info!("ℹ️  Slack notifications not configured"),
            }

            processor = processor.with_writer(ReportWriter::new(&config.output_dir));
        }

        Ok(processor)
    }

    pub fn with_classifier(mut self, classifier: Box<dyn PrimaryClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_writer(mut self, writer: ReportWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn category_names(&self) -> Vec<String> {
        self.triage.lexicon().category_names()
    }

    pub async fn run(&self, limit: Option<usize>) -> Result<RunSummary> {
        if self.dry_run {
            println!("\n{}", "=".repeat(80));
            println!("🧪 MODE DRY-RUN - EMAIL TRIAGE");
            println!("{}", "=".repeat(80));
        } else {
            info!("🚀 Starting email triage ({})", self.mail_source.source_name());
        }

        let emails = match self.mail_source.fetch_emails(limit).await {
            Ok(emails) => emails,
            Err(e) => {
                error!("Error fetching emails: {:#}", e);
                if let Some(notifier) = &self.notifier {
                    let message = format!(
                        "Unable to fetch emails from {}: {:#}",
                        self.mail_source.source_name(),
                        e
                    );
                    let channel = &self.routing.default_channel;
                    if let Err(notify_err) = notifier.notify_error(channel, &message).await {
                        debug!("Failed to send error notification: {}", notify_err);
                    }
                }
                return Err(e.context("Error fetching emails"));
            }
        };

        let mut summary = RunSummary {
            records: Vec::with_capacity(emails.len()),
            report: self.aggregator.aggregate(&[], Utc::now())?,
            log_path: None,
            report_path: None,
            ai_classified: 0,
            fallback_classified: 0,
            notifications_sent: 0,
            notifications_failed: 0,
        };

        if emails.is_empty() {
            if self.dry_run {
                println!("📭 No unread emails found");
            } else {
                info!("📭 No unread emails found");
            }
            return Ok(summary);
        }

        let total = emails.len();
        info!("📧 Processing {} email(s)", total);

        for (index, email) in emails.into_iter().enumerate() {
            if index > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            if self.dry_run {
                println!("📧 Email {}/{} (ID: {})", index + 1, total, email.id);
                println!("{}", "-".repeat(60));
                println!("Subject: {}", email.subject);
                println!("From: {}", email.sender);
                println!("Preview: {}", truncate_with_ellipsis(&email.body, 100));
                println!();
            } else {
                debug!(
                    "Processing email {}: {}",
                    email.id,
                    truncate_with_ellipsis(&email.subject, 50)
                );
            }

            let classification = self.classify(&email).await;
            match classification.source {
                ClassificationSource::Ai => summary.ai_classified += 1,
                ClassificationSource::Fallback => summary.fallback_classified += 1,
            }
            info!(
                "✓ Email {} classified as: {} ({:?})",
                email.id, classification.category, classification.source
            );

            let record = Record::build(email, classification, Utc::now());
            self.deliver(&record, &mut summary).await;
            summary.records.push(record);
        }

        summary.report = self
            .aggregator
            .aggregate(&summary.records, Utc::now())
            .context("Unable to aggregate analytics")?;

        if let Some(writer) = &self.writer {
            let run_at = summary.report.generated_at;
            summary.log_path = Some(writer.write_records(&summary.records, run_at)?);
            summary.report_path = Some(writer.write_report(&summary.report)?);
        }

        if self.dry_run {
            println!("{}", "=".repeat(80));
            println!("🏁 Analysis completed: {} emails analyzed", summary.emails_processed());
            println!("{}", "=".repeat(80));
        } else {
            info!(
                "Triage completed: {} emails processed ({} AI, {} fallback), \
                 {} notification(s) sent, {} failed",
                summary.emails_processed(),
                summary.ai_classified,
                summary.fallback_classified,
                summary.notifications_sent,
                summary.notifications_failed
            );
        }

        Ok(summary)
    }

    async fn classify(&self, email: &Email) -> ClassificationResult {
        let verdict = match &self.classifier {
            Some(classifier) => match classifier.classify(email).await {
                Ok(verdict) => Some(verdict),
                Err(e) => {
                    warn!(
                        "✗ {} classification failed for email {}: {:#} - using keyword fallback",
                        classifier.classifier_name(),
                        email.id,
                        e
                    );
                    None
                }
            },
            None => None,
        };

        self.triage.classify_email(email, verdict)
    }

    async fn deliver(&self, record: &Record, summary: &mut RunSummary) {
        let channel = self.routing.channel_for(&record.category);

        if self.dry_run {
            println!("📢 [DRY-RUN SLACK] Would send to {}:", channel);
            println!("   📧 {}: {}", record.category, record.summary);
            println!("   👤 From: {}", record.sender);
            println!("   📝 Subject: {}", truncate_with_ellipsis(&record.subject, 50));
            println!();
            return;
        }

        let Some(notifier) = &self.notifier else {
            return;
        };

        match notifier.notify(record, channel).await {
            Ok(()) => summary.notifications_sent += 1,
            Err(e) => {
                error!("✗ Failed to send notification to {}: {:#}", channel, e);
                summary.notifications_failed += 1;
            }
        }
    }
}
