use std::collections::HashMap;

use anyhow::{Context, Result};
use log::{error, info};
use serde_json::{json, Value};
use slack_morphism::prelude::*;

use crate::config::{SlackConfig, TriageConfig};
use crate::email::NotificationSink;
use crate::triage::text::truncate_with_ellipsis;
use crate::triage::Record;

const SUBJECT_PREVIEW_CHARS: usize = 50;

enum SlackTransport {
    /// Webhook entrant, le canal est donné dans le payload
    Webhook {
        http: reqwest::Client,
        url: String,
    },
    /// Token bot, `chat.postMessage`
    Bot {
        client: SlackClient<SlackClientHyperHttpsConnector>,
        token: SlackApiToken,
    },
}

/// Notifications Slack des emails triés, par webhook entrant ou token bot.
pub struct SlackNotifier {
    transport: SlackTransport,
    username: String,
    icon_emoji: String,
    colors: HashMap<String, String>,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig, triage: &TriageConfig) -> Result<Self> {
        info!("Initialisation du notifieur Slack");

        let transport = match (&config.bot_token, &config.webhook_url) {
            (Some(bot_token), _) => {
                info!("Transport Slack: token bot (chat.postMessage)");
                let client = SlackClient::new(SlackClientHyperHttpsConnector::new()?);
                let token = SlackApiToken::new(bot_token.clone().into());
                SlackTransport::Bot { client, token }
            }
            (None, Some(url)) => {
                info!("Transport Slack: webhook entrant");
                SlackTransport::Webhook {
                    http: reqwest::Client::new(),
                    url: url.clone(),
                }
            }
            (None, None) => {
                anyhow::bail!("Configuration Slack sans URL de webhook ni token bot")
            }
        };

        let colors = triage
            .categories
            .iter()
            .map(|c| (c.name.trim().to_string(), triage.color_for(c.name.trim()).to_string()))
            .collect();

        Ok(SlackNotifier {
            transport,
            username: config.username.clone(),
            icon_emoji: config.icon_emoji.clone(),
            colors,
        })
    }

    fn color_for(&self, category: &str) -> &str {
        self.colors.get(category).map(String::as_str).unwrap_or("#808080")
    }

    /// Envoie la notification de tri d'un enregistrement sur `channel`.
    pub async fn notify_record(&self, record: &Record, channel: &str) -> Result<()> {
        info!("Envoi de notification Slack vers {} ({})", channel, record.category);

        match &self.transport {
            SlackTransport::Webhook { http, url } => {
                let payload = webhook_payload(
                    record,
                    channel,
                    self.color_for(&record.category),
                    &self.username,
                    &self.icon_emoji,
                    chrono::Utc::now().timestamp(),
                );
                Self::post_webhook(http, url, &payload).await
            }
            SlackTransport::Bot { client, token } => {
                Self::post_chat_message(client, token, channel, format_record_text(record)).await
            }
        }
    }

    /// Envoie un message texte simple
    pub async fn send_message(&self, channel: &str, text: &str) -> Result<()> {
        match &self.transport {
            SlackTransport::Webhook { http, url } => {
                let payload = json!({
                    "channel": channel,
                    "username": self.username,
                    "icon_emoji": self.icon_emoji,
                    "text": text,
                });
                Self::post_webhook(http, url, &payload).await
            }
            SlackTransport::Bot { client, token } => {
                Self::post_chat_message(client, token, channel, text.to_string()).await
            }
        }
    }

    async fn post_webhook(http: &reqwest::Client, url: &str, payload: &Value) -> Result<()> {
        let response = http
            .post(url)
            .json(payload)
            .send()
            .await
            .context("Impossible de joindre le webhook Slack")?;

        let status = response.status();
        if status.is_success() {
            info!("✅ Message Slack envoyé avec succès");
            Ok(())
        } else {
            error!("❌ Le webhook Slack a répondu {}", status);
            Err(anyhow::anyhow!("Échec de l'envoi de la notification Slack: {}", status))
        }
    }

    async fn post_chat_message(
        client: &SlackClient<SlackClientHyperHttpsConnector>,
        token: &SlackApiToken,
        channel: &str,
        text: String,
    ) -> Result<()> {
        // Créer la requête de message
        let post_chat_req = SlackApiChatPostMessageRequest::new(
            SlackChannelId::new(channel.to_string()),
            SlackMessageContent::new().with_text(text),
        );

        // Créer une session avec le token
        let session = client.open_session(token);

        match session.chat_post_message(&post_chat_req).await {
            Ok(response) => {
                info!("✅ Message Slack envoyé avec succès: {:?}", response.ts);
                Ok(())
            }
            Err(e) => {
                error!("❌ Erreur lors de l'envoi du message Slack: {}", e);
                Err(anyhow::anyhow!("Impossible d'envoyer le message Slack: {}", e))
            }
        }
    }
}

impl NotificationSink for SlackNotifier {
    fn notify<'a>(
        &'a self,
        record: &'a Record,
        channel: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.notify_record(record, channel))
    }

    fn notify_error<'a>(
        &'a self,
        channel: &'a str,
        message: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let text = format!("❌ *Email triage failed*\n```{}```", message);
            self.send_message(channel, &text).await
        })
    }
}

/// Payload du webhook entrant : une pièce jointe colorée avec le résumé,
/// l'expéditeur et le sujet tronqué.
pub fn webhook_payload(
    record: &Record,
    channel: &str,
    color: &str,
    username: &str,
    icon_emoji: &str,
    ts: i64,
) -> Value {
    json!({
        "channel": channel,
        "username": username,
        "icon_emoji": icon_emoji,
        "attachments": [
            {
                "color": color,
                "fields": [
                    {
                        "title": format!("New {} Email", record.category),
                        "value": record.summary,
                        "short": false
                    },
                    {
                        "title": "From",
                        "value": record.sender,
                        "short": true
                    },
                    {
                        "title": "Subject",
                        "value": truncate_with_ellipsis(&record.subject, SUBJECT_PREVIEW_CHARS),
                        "short": true
                    }
                ],
                "footer": "Email Triage System",
                "ts": ts
            }
        ]
    })
}

/// Texte mrkdwn équivalent, utilisé avec le transport bot.
pub fn format_record_text(record: &Record) -> String {
    format!(
        "📧 *New {} Email*\n\
         {}\n\n\
         • From: {}\n\
         • Subject: {}",
        record.category,
        record.summary,
        record.sender,
        truncate_with_ellipsis(&record.subject, SUBJECT_PREVIEW_CHARS)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(subject: &str) -> Record {
        Record {
            timestamp: Utc::now(),
            category: "Billing".to_string(),
            summary: "Customer questions a premium fee".to_string(),
            sender: "billing.inquiry@company.com".to_string(),
            subject: subject.to_string(),
        }
    }

    #[test]
    fn test_webhook_payload_layout() {
        let payload = webhook_payload(
            &record("Question about my monthly invoice"),
            "#billing",
            "#4ecdc4",
            "Email Triage Bot",
            ":email:",
            1_700_000_000,
        );

        assert_eq!(payload["channel"], "#billing");
        assert_eq!(payload["username"], "Email Triage Bot");
        assert_eq!(payload["icon_emoji"], ":email:");

        let attachment = &payload["attachments"][0];
        assert_eq!(attachment["color"], "#4ecdc4");
        assert_eq!(attachment["footer"], "Email Triage System");
        assert_eq!(attachment["ts"], 1_700_000_000);
        assert_eq!(attachment["fields"][0]["title"], "New Billing Email");
        assert_eq!(attachment["fields"][0]["value"], "Customer questions a premium fee");
        assert_eq!(attachment["fields"][0]["short"], false);
        assert_eq!(attachment["fields"][1]["value"], "billing.inquiry@company.com");
        assert_eq!(attachment["fields"][2]["value"], "Question about my monthly invoice");
    }

    #[test]
    fn test_long_subject_is_truncated() {
        let subject = "A".repeat(60);
        let payload = webhook_payload(&record(&subject), "#billing", "#fff", "bot", ":email:", 0);
        let expected = format!("{}...", "A".repeat(50));
        assert_eq!(payload["attachments"][0]["fields"][2]["value"], expected.as_str());

        let text = format_record_text(&record(&subject));
        assert!(text.contains(&expected));
        assert!(text.starts_with("📧 *New Billing Email*\nCustomer questions a premium fee\n"));
    }
}
