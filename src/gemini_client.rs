use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;
use crate::email::PrimaryClassifier;
use crate::triage::text::{truncate_chars, truncate_with_ellipsis};
use crate::triage::{Email, PrimaryVerdict};

/// Nombre de caractères du corps envoyés au modèle
const BODY_PROMPT_CHARS: usize = 500;

const CONNECTION_TEST_PROMPT: &str =
    "This is a connection test. Please respond with exactly: 'Gemini AI connection successful!'";

// Patterns: "Category: Billing", "**Category:** Billing", "- category: [Billing]"
static CATEGORY_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| field_regex("category"));
static SUMMARY_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| field_regex("summary"));

fn field_regex(field: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?im)^[ \t*_#>-]*{}[ \t*_]*:[ \t*_]*(.*?)[ \t*_]*$", field)).ok()
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

/// Client pour l'endpoint Gemini `generateContent`.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    url: String,
    categories: Vec<String>,
}

impl GeminiClient {
    /// `categories` est la liste ordonnée proposée au modèle dans le prompt.
    pub fn new(config: &GeminiConfig, categories: Vec<String>) -> Result<Self> {
        info!("Initialisation du client Gemini (modèle: {})", config.model);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Impossible de créer le client HTTP pour Gemini")?;

        Ok(GeminiClient {
            http,
            api_key: config.api_key.clone(),
            url: format!("{}/models/{}:generateContent", config.endpoint, config.model),
            categories,
        })
    }

    /// Prompt de classification : catégories, sujet et début du corps.
    pub fn build_prompt(&self, email: &Email) -> String {
        format!(
            "Analyze the following customer email and:\n\
             1. Classify it into ONE of these categories: {}\n\
             2. Generate a concise one-sentence summary (max 15 words)\n\
             \n\
             Email Subject: {}\n\
             Email Body: {}\n\
             \n\
             Respond in this exact format:\n\
             Category: [{}]\n\
             Summary: [one sentence summary]",
            self.categories.join(", "),
            email.subject,
            truncate_chars(&email.body, BODY_PROMPT_CHARS),
            self.categories.join("|"),
        )
    }

    /// Envoie un prompt et retourne le texte du premier candidat.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Impossible de joindre l'API Gemini")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "L'API Gemini a répondu {}: {}",
                status,
                truncate_with_ellipsis(&body, 200)
            );
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .context("Réponse de l'API Gemini invalide")?;

        let text: String = payload
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            anyhow::bail!("L'API Gemini n'a retourné aucun texte");
        }

        Ok(text)
    }

    /// Classe un email ; une réponse sans ligne `Category:` est une erreur.
    pub async fn classify_email(&self, email: &Email) -> Result<PrimaryVerdict> {
        debug!("Classification de l'email {} avec Gemini", email.id);

        let prompt = self.build_prompt(email);
        let answer = self.generate(&prompt).await?;

        parse_verdict(&answer).with_context(|| {
            format!(
                "Pas de ligne Category dans la réponse Gemini: {}",
                truncate_with_ellipsis(answer.trim(), 200)
            )
        })
    }

    /// Envoie un prompt de test fixe et retourne la réponse du modèle.
    pub async fn test_connection(&self) -> Result<String> {
        info!("📤 Envoi d'un message de test à Gemini");
        let answer = self.generate(CONNECTION_TEST_PROMPT).await?;
        Ok(answer.trim().to_string())
    }
}

impl PrimaryClassifier for GeminiClient {
    fn classify<'a>(
        &'a self,
        email: &'a Email,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<PrimaryVerdict>> + Send + 'a>> {
        Box::pin(self.classify_email(email))
    }

    fn classifier_name(&self) -> &str {
        "Gemini"
    }
}

/// Lit les lignes `Category:` et `Summary:` d'une réponse du modèle.
/// Retourne `None` s'il n'y a pas de ligne de catégorie.
pub fn parse_verdict(answer: &str) -> Option<PrimaryVerdict> {
    let category = extract_field(answer, &CATEGORY_LINE)?;
    let summary = extract_field(answer, &SUMMARY_LINE).unwrap_or_default();
    Some(PrimaryVerdict { category, summary })
}

fn extract_field(answer: &str, pattern: &Option<Regex>) -> Option<String> {
    let caps = pattern.as_ref()?.captures(answer)?;
    let value = caps
        .get(1)?
        .as_str()
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_field_patterns_compile() {
        assert!(CATEGORY_LINE.is_some());
        assert!(SUMMARY_LINE.is_some());
    }

    #[test]
    fn test_parse_verdict_plain_format() {
        let verdict =
            parse_verdict("Category: Billing\nSummary: Customer disputes a premium fee.").unwrap();
        assert_eq!(verdict.category, "Billing");
        assert_eq!(verdict.summary, "Customer disputes a premium fee.");
    }

    #[test]
    fn test_parse_verdict_markdown_and_brackets() {
        let answer = "Here is the analysis:\n\n\
                      **Category:** [Product Support]\n\
                      **Summary:** User cannot log into the mobile app.\n";
        let verdict = parse_verdict(answer).unwrap();
        assert_eq!(verdict.category, "Product Support");
        assert_eq!(verdict.summary, "User cannot log into the mobile app.");
    }

    #[test]
    fn test_parse_verdict_missing_parts() {
        assert!(parse_verdict("I cannot help with that.").is_none());
        assert!(parse_verdict("Category:\nSummary: something").is_none());

        let verdict = parse_verdict("category: general inquiry").unwrap();
        assert_eq!(verdict.category, "general inquiry");
        assert_eq!(verdict.summary, "");
    }

    #[test]
    fn test_prompt_lists_configured_categories_and_truncates_body() {
        let config = GeminiConfig {
            api_key: "key".to_string(),
            model: "gemini-1.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        };
        let client = GeminiClient::new(
            &config,
            vec!["Product Support".to_string(), "Billing".to_string()],
        )
        .unwrap();
        assert_eq!(
            client.url,
            "https://generativelanguage.googleapis.com/v1beta/models/\
             gemini-1.5-flash:generateContent"
        );

        let email = Email {
            id: "1".to_string(),
            sender: "a@example.com".to_string(),
            subject: "Help".to_string(),
            body: "x".repeat(800),
            received_at: Utc::now(),
        };
        let prompt = client.build_prompt(&email);

        assert!(prompt.contains("categories: Product Support, Billing\n"));
        assert!(prompt.contains("Category: [Product Support|Billing]"));
        assert!(prompt.contains(&format!("Email Body: {}\n", "x".repeat(500))));
        assert!(!prompt.contains(&"x".repeat(501)));
    }
}
