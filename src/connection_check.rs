//! Test de connexion aux services externes (Gemini, IMAP, Slack).
//!
//! Chaque service est testé indépendamment ; un échec n'empêche pas de tester
//! les suivants.

use anyhow::Result;
use log::{error, info, warn};

use crate::config::{Config, GeminiConfig, ImapConfig, SlackConfig, TriageConfig};
use crate::gemini_client::GeminiClient;
use crate::imap_client::ImapMailSource;
use crate::slack_notifier::SlackNotifier;

const SLACK_TEST_MESSAGE: &str = "🎉 Email Triage System Setup Test";

/// Résultat du test d'un service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Passed(String),
    Failed(String),
    /// Service non configuré, rien à tester
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCheck {
    pub service: String,
    pub status: CheckStatus,
}

impl ServiceCheck {
    fn from_result(service: &str, result: Result<String>) -> Self {
        let status = match result {
            Ok(detail) => CheckStatus::Passed(detail),
            Err(e) => CheckStatus::Failed(format!("{:#}", e)),
        };
        ServiceCheck {
            service: service.to_string(),
            status,
        }
    }

    fn skipped(service: &str, reason: &str) -> Self {
        ServiceCheck {
            service: service.to_string(),
            status: CheckStatus::Skipped(reason.to_string()),
        }
    }
}

/// Résultats agrégés, dans l'ordre des tests.
#[derive(Debug, Clone, Default)]
pub struct ConnectionReport {
    pub checks: Vec<ServiceCheck>,
}

impl ConnectionReport {
    pub fn push(&mut self, check: ServiceCheck) {
        self.checks.push(check);
    }

    /// Vrai si aucun service configuré n'a échoué.
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn failed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|check| matches!(check.status, CheckStatus::Failed(_)))
            .count()
    }

    /// Une ligne par service, prête à afficher.
    pub fn lines(&self) -> Vec<String> {
        self.checks
            .iter()
            .map(|check| match &check.status {
                CheckStatus::Passed(detail) => format!("✅ {}: OK ({})", check.service, detail),
                CheckStatus::Failed(reason) => format!("❌ {}: ÉCHEC ({})", check.service, reason),
                CheckStatus::Skipped(reason) => {
                    format!("ℹ️  {}: non testé ({})", check.service, reason)
                }
            })
            .collect()
    }
}

pub async fn check_gemini(config: Option<&GeminiConfig>) -> ServiceCheck {
    let config = match config {
        Some(config) => config,
        None => return ServiceCheck::skipped("Gemini", "GEMINI_API_KEY non défini"),
    };

    info!("🔍 Test de la connexion Gemini...");
    let result = async {
        let client = GeminiClient::new(config, Vec::new())?;
        let answer = client.test_connection().await?;
        Ok(format!("réponse: {}", answer))
    }
    .await;
    log_result("Gemini", &result);
    ServiceCheck::from_result("Gemini", result)
}

pub async fn check_imap(config: &ImapConfig) -> ServiceCheck {
    if config.username.trim().is_empty() || config.password.is_empty() {
        return ServiceCheck::skipped("IMAP", "EMAIL_USERNAME ou EMAIL_PASSWORD non défini");
    }

    info!("🔍 Test de la connexion IMAP {}:{}...", config.server, config.port);
    let result = ImapMailSource::new(config.clone())
        .check_mailbox()
        .await
        .map(|status| {
            format!(
                "{} email(s) dans {}, {} correspondant à {}",
                status.total, config.mailbox, status.matching, config.search
            )
        });
    log_result("IMAP", &result);
    ServiceCheck::from_result("IMAP", result)
}

pub async fn check_slack(config: Option<&SlackConfig>, triage: &TriageConfig) -> ServiceCheck {
    let config = match config {
        Some(config) => config,
        None => {
            return ServiceCheck::skipped("Slack", "SLACK_WEBHOOK_URL ou SLACK_BOT_TOKEN non défini")
        }
    };

    info!("🔍 Test de la connexion Slack...");
    let result = async {
        let notifier = SlackNotifier::new(config, triage)?;
        notifier
            .send_message(&triage.default_channel, SLACK_TEST_MESSAGE)
            .await?;
        Ok(format!("message de test envoyé sur {}", triage.default_channel))
    }
    .await;
    log_result("Slack", &result);
    ServiceCheck::from_result("Slack", result)
}

/// Teste les trois services l'un après l'autre.
pub async fn test_connections(config: &Config) -> ConnectionReport {
    let mut report = ConnectionReport::default();
    report.push(check_gemini(config.gemini.as_ref()).await);
    report.push(check_imap(&config.imap).await);
    report.push(check_slack(config.slack.as_ref(), &config.triage).await);

    if report.all_passed() {
        info!("✅ Tous les services configurés répondent");
    } else {
        warn!("⚠️  {} service(s) en échec", report.failed_count());
    }
    report
}

fn log_result(service: &str, result: &Result<String>) {
    match result {
        Ok(detail) => info!("✅ {}: {}", service, detail),
        Err(e) => error!("❌ Test {} échoué: {:#}", service, e),
    }
}
