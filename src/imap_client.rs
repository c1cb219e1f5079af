use std::sync::LazyLock;

use anyhow::{Context, Result};
use async_imap::Session;
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use mail_parser::MessageParser;
use regex::Regex;
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use crate::config::ImapConfig;
use crate::email::MailSource;
use crate::triage::Email;

static HTML_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

pub struct ImapClient {
    session: Session<Compat<TlsStream<TcpStream>>>,
}

impl ImapClient {
    pub async fn new(config: &ImapConfig) -> Result<Self> {
        info!("Connexion au serveur IMAP {}:{}", config.server, config.port);

        // Créer une connexion TCP
        let tcp_stream = TcpStream::connect((config.server.as_str(), config.port))
            .await
            .context("Impossible de se connecter au serveur IMAP")?;

        // Créer une connexion TLS
        let connector = tokio_native_tls::native_tls::TlsConnector::new()
            .context("Impossible de créer le connecteur TLS")?;
        let tls = tokio_native_tls::TlsConnector::from(connector);
        let tls_stream = tls
            .connect(&config.server, tcp_stream)
            .await
            .context("Impossible d'établir la connexion TLS")?;

        // Wrapper pour compatibilité futures (async-imap)
        let client = async_imap::Client::new(tls_stream.compat());

        // Authentification
        let session = client
            .login(&config.username, &config.password)
            .await
            .map_err(|e| anyhow::anyhow!("Erreur d'authentification IMAP: {:?}", e.0))?;

        info!("Connexion IMAP établie avec succès");

        Ok(ImapClient { session })
    }

    /// Sélectionne `mailbox` et retourne les numéros de séquence qui
    /// correspondent à `criteria`, du plus ancien au plus récent.
    pub async fn search(&mut self, mailbox: &str, criteria: &str) -> Result<Vec<u32>> {
        self.session
            .select(mailbox)
            .await
            .with_context(|| format!("Impossible de sélectionner {}", mailbox))?;

        debug!("Critère de recherche: {}", criteria);

        let message_ids = self
            .session
            .search(criteria)
            .await
            .context("Erreur lors de la recherche d'emails")?;

        let mut ids: Vec<u32> = message_ids.into_iter().collect();
        ids.sort_unstable();
        info!("{} email(s) trouvé(s) pour '{}' dans {}", ids.len(), criteria, mailbox);

        Ok(ids)
    }

    /// Récupère le message RFC822 complet. Le serveur le marque comme lu.
    pub async fn fetch_raw(&mut self, message_id: u32) -> Result<Vec<u8>> {
        debug!("Récupération de l'email ID: {}", message_id);

        let messages_stream = self
            .session
            .fetch(message_id.to_string(), "RFC822")
            .await
            .context("Impossible de récupérer l'email")?;

        let messages: Vec<_> = messages_stream
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .filter_map(|r| r.ok())
            .collect();

        if let Some(body) = messages.first().and_then(|m| m.body()) {
            debug!("Email récupéré, taille: {} octets", body.len());
            return Ok(body.to_vec());
        }

        anyhow::bail!("Email non trouvé ou vide pour l'ID: {}", message_id);
    }

    pub async fn logout(mut self) -> Result<()> {
        info!("Déconnexion du serveur IMAP");
        self.session
            .logout()
            .await
            .context("Erreur lors de la déconnexion IMAP")?;
        Ok(())
    }
}

/// Décode un message RFC822 brut en [`Email`].
///
/// Expéditeur au format "Nom <adresse>", corps text/plain en priorité, sinon
/// le HTML sans balises.
pub fn parse_raw_email(id: &str, raw: &[u8]) -> Result<Email> {
    let parsed = MessageParser::default()
        .parse(raw)
        .context("Impossible de parser l'email")?;

    let received_at = match parsed.date() {
        Some(date) => DateTime::from_timestamp(date.to_timestamp(), 0).unwrap_or_else(Utc::now),
        None => {
            warn!("Pas de date dans l'email {}, utilisation de la date courante", id);
            Utc::now()
        }
    };

    let sender = parsed
        .from()
        .and_then(|addrs| addrs.first())
        .map(|addr| match (&addr.name, &addr.address) {
            (Some(name), Some(email)) => format!("{} <{}>", name, email),
            (None, Some(email)) => email.to_string(),
            _ => "Unknown sender".to_string(),
        })
        .unwrap_or_else(|| "Unknown sender".to_string());

    let subject = parsed.subject().unwrap_or("No subject").to_string();

    // Essayer d'abord le corps text/plain, puis le HTML
    let body = match parsed.body_text(0) {
        Some(text) => text.to_string(),
        None => parsed.body_html(0).map(|html| strip_html(&html)).unwrap_or_default(),
    };

    Ok(Email {
        id: id.to_string(),
        sender,
        subject,
        body: body.trim().to_string(),
        received_at,
    })
}

fn strip_html(html: &str) -> String {
    let text = html
        .replace("<br>", "\n")
        .replace("<BR>", "\n")
        .replace("</p>", "\n")
        .replace("</P>", "\n");
    match &*HTML_TAG {
        Some(tag_regex) => tag_regex.replace_all(&text, "").to_string(),
        None => text,
    }
}

/// Nombre total de messages et nombre de messages correspondant au critère
/// configuré, pour le test de connexion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxStatus {
    pub total: usize,
    pub matching: usize,
}

/// Messages non lus d'une boîte IMAP.
pub struct ImapMailSource {
    config: ImapConfig,
}

impl ImapMailSource {
    pub fn new(config: ImapConfig) -> Self {
        ImapMailSource { config }
    }

    /// Garde les `limit` correspondances les plus récentes (par défaut:
    /// `fetch_limit`). Un email illisible est ignoré avec un avertissement.
    pub async fn fetch_unread(&self, limit: Option<usize>) -> Result<Vec<Email>> {
        // 1. Se connecter au serveur IMAP
        let mut client = ImapClient::new(&self.config).await?;

        // 2. Rechercher les emails non lus
        let ids = client.search(&self.config.mailbox, &self.config.search).await?;
        let limit = limit.unwrap_or(self.config.fetch_limit);
        let skip = ids.len().saturating_sub(limit);

        // 3. Récupérer et décoder chaque email
        let mut emails = Vec::new();
        for message_id in ids.into_iter().skip(skip) {
            let raw = match client.fetch_raw(message_id).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Email {} ignoré: {:#}", message_id, e);
                    continue;
                }
            };

            match parse_raw_email(&message_id.to_string(), &raw) {
                Ok(email) => emails.push(email),
                Err(e) => warn!("Email {} ignoré: {:#}", message_id, e),
            }
        }

        client.logout().await?;

        info!("✓ {} email(s) non lu(s) récupéré(s)", emails.len());
        Ok(emails)
    }

    /// Connexion, authentification et comptage sans rien récupérer.
    pub async fn check_mailbox(&self) -> Result<MailboxStatus> {
        let mut client = ImapClient::new(&self.config).await?;

        let total = client.search(&self.config.mailbox, "ALL").await?.len();
        let matching = client.search(&self.config.mailbox, &self.config.search).await?.len();

        client.logout().await?;

        Ok(MailboxStatus { total, matching })
    }
}

impl MailSource for ImapMailSource {
    fn fetch_emails<'a>(
        &'a self,
        limit: Option<usize>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Email>>> + Send + 'a>> {
        Box::pin(self.fetch_unread(limit))
    }

    fn source_name(&self) -> &str {
        "IMAP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = "From: Jane Doe <jane@example.com>\r\n\
To: support@example.com\r\n\
Subject: Login issues with mobile app\r\n\
Date: Mon, 16 Sep 2024 10:30:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hi, I am having trouble logging into my account.\r\n\
\r\n";

    const HTML_ONLY: &str = "From: billing@example.com\r\n\
Subject: Invoice\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Your <b>invoice</b> is attached.</p>\r\n";

    #[test]
    fn test_parse_plain_email() {
        let email = parse_raw_email("7", PLAIN.as_bytes()).unwrap();
        assert_eq!(email.id, "7");
        assert_eq!(email.sender, "Jane Doe <jane@example.com>");
        assert_eq!(email.subject, "Login issues with mobile app");
        assert_eq!(email.body, "Hi, I am having trouble logging into my account.");
        assert_eq!(email.received_at.to_rfc3339(), "2024-09-16T10:30:00+00:00");
    }

    #[test]
    fn test_parse_html_email() {
        let email = parse_raw_email("8", HTML_ONLY.as_bytes()).unwrap();
        assert_eq!(email.sender, "billing@example.com");
        assert_eq!(email.subject, "Invoice");
        assert!(email.body.contains("invoice"));
        assert!(!email.body.contains("<b>"));
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <i>there</i></p>"), "Hello there\n");
    }
}
