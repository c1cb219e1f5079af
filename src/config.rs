use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::triage::{Aggregator, CategoryRule, KeywordFilter, Lexicon};

const FALLBACK_COLOR: &str = "#808080";

#[derive(Debug, Clone)]
pub struct Config {
    pub imap: ImapConfig,
    pub gemini: Option<GeminiConfig>,
    pub slack: Option<SlackConfig>,
    pub triage: TriageConfig,
    pub analytics: AnalyticsConfig,
    pub output_dir: String,
    pub request_delay_ms: u64,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub schedule_times: Vec<String>, // Format: "HH:MM" (e.g., ["08:00", "14:00"])
}

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Boîte aux lettres sélectionnée avant la recherche (par défaut: INBOX)
    pub mailbox: String,
    /// Critère IMAP SEARCH (par défaut: UNSEEN)
    pub search: String,
    /// Nombre maximum d'emails récupérés par passage, les plus récents
    pub fetch_limit: usize,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

/// Au moins un des deux transports est renseigné ; le token bot est
/// prioritaire.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub webhook_url: Option<String>,
    pub bot_token: Option<String>,
    pub username: String,
    pub icon_emoji: String,
}

/// Une catégorie telle qu'écrite dans `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub channel: Option<String>,
    pub color: Option<String>,
}

/// Catégories, mots déclencheurs et routage Slack, par ordre de priorité.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub categories: Vec<CategoryConfig>,
    pub default_category: String,
    pub default_channel: String,
    pub channel_overrides: HashMap<String, String>,
}

impl TriageConfig {
    pub fn lexicon(&self) -> Result<Lexicon> {
        let rules = self
            .categories
            .iter()
            .map(|c| CategoryRule {
                name: c.name.clone(),
                keywords: c.keywords.clone(),
            })
            .collect();
        Lexicon::new(rules, &self.default_category).context("Configuration des catégories invalide")
    }

    /// Channel of the category entry, then `slack_channels`, then the
    /// default channel.
    pub fn channel_for(&self, category: &str) -> &str {
        if let Some(channel) = self.find(category).and_then(|c| c.channel.as_deref()) {
            return channel;
        }
        self.channel_overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(category))
            .map(|(_, channel)| channel.as_str())
            .unwrap_or(&self.default_channel)
    }

    pub fn color_for(&self, category: &str) -> &str {
        self.find(category)
            .and_then(|c| c.color.as_deref())
            .unwrap_or(FALLBACK_COLOR)
    }

    fn find(&self, category: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name.trim() == category)
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub stop_words: Vec<String>,
    pub min_word_length: usize,
    pub top_keywords: usize,
}

impl AnalyticsConfig {
    pub fn aggregator(&self, lexicon: &Lexicon) -> Aggregator {
        Aggregator::new(lexicon)
            .with_filter(KeywordFilter::new(&self.stop_words, self.min_word_length))
            .with_top_keywords(self.top_keywords)
    }
}

/// Flat key layout shared by `config.json` and the environment
/// (`EMAIL_SERVER` -> `email_server`).
#[derive(Debug, Deserialize)]
struct RawSettings {
    gemini_api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    gemini_model: String,
    #[serde(default = "default_gemini_endpoint")]
    gemini_endpoint: String,

    #[serde(default = "default_email_server")]
    email_server: String,
    #[serde(default = "default_email_port")]
    email_port: u16,
    #[serde(default)]
    email_username: String,
    #[serde(default)]
    email_password: String,
    #[serde(default = "default_mailbox")]
    email_mailbox: String,
    #[serde(default = "default_search")]
    email_search: String,
    #[serde(default = "default_fetch_limit")]
    fetch_limit: usize,

    slack_webhook_url: Option<String>,
    slack_bot_token: Option<String>,
    #[serde(default = "default_slack_username")]
    slack_username: String,
    #[serde(default = "default_slack_icon")]
    slack_icon_emoji: String,
    #[serde(default)]
    slack_channels: HashMap<String, String>,
    #[serde(default = "default_channel")]
    default_channel: String,

    #[serde(default)]
    categories: Vec<CategoryConfig>,
    // Forme alternative : mots-clés par catégorie + ordre de priorité
    #[serde(default)]
    category_keywords: HashMap<String, Vec<String>>,
    category_order: Option<Vec<String>>,
    default_category: Option<String>,

    #[serde(default)]
    stop_words: Vec<String>,
    #[serde(default)]
    min_word_length: usize,
    #[serde(default = "default_top_keywords")]
    top_keywords: usize,

    #[serde(default = "default_output_dir")]
    output_dir: String,
    #[serde(default = "default_request_delay")]
    request_delay_ms: u64,

    #[serde(default)]
    scheduler_enabled: bool,
    #[serde(default = "default_scheduler_times")]
    scheduler_times: String,
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_email_server() -> String {
    "imap.gmail.com".to_string()
}

fn default_email_port() -> u16 {
    993
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

fn default_search() -> String {
    "UNSEEN".to_string()
}

fn default_fetch_limit() -> usize {
    10
}

fn default_slack_username() -> String {
    "Email Triage Bot".to_string()
}

fn default_slack_icon() -> String {
    ":email:".to_string()
}

fn default_channel() -> String {
    "#general".to_string()
}

fn default_top_keywords() -> usize {
    crate::triage::analytics::DEFAULT_TOP_KEYWORDS
}

fn default_output_dir() -> String {
    "./output".to_string()
}

fn default_request_delay() -> u64 {
    1000
}

fn default_scheduler_times() -> String {
    "08:00".to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Construit la liste ordonnée des catégories à partir de la forme
/// `category_keywords` + `category_order`.
///
/// Les clés du dictionnaire peuvent avoir perdu leur casse en passant par le
/// crate `config` : elles reprennent l'orthographe de `category_order`.
fn categories_from_map(
    keywords: HashMap<String, Vec<String>>,
    order: Option<&[String]>,
    default_category: &str,
) -> Result<Vec<CategoryConfig>> {
    let keywords: HashMap<String, Vec<String>> = keywords
        .into_iter()
        .map(|(name, words)| {
            let name = order
                .and_then(|order| order.iter().find(|o| o.trim().eq_ignore_ascii_case(name.trim())))
                .map(|o| o.trim().to_string())
                .unwrap_or(name);
            (name, words)
        })
        .collect();

    let lexicon = Lexicon::from_unordered(keywords.clone(), order, default_category)
        .context("Configuration des catégories invalide (category_keywords / category_order)")?;

    Ok(lexicon
        .categories()
        .map(|name| CategoryConfig {
            name: name.to_string(),
            keywords: keywords.get(name).cloned().unwrap_or_default(),
            channel: None,
            color: None,
        })
        .collect())
}

impl Config {
    /// Charge `path` (JSON, TOML, ...) puis les variables d'environnement par
    /// dessus. Le fichier peut être absent, sauf si `required` est vrai.
    pub fn load(path: &str, required: bool) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(required))
            .add_source(config::Environment::default())
            .build()
            .with_context(|| format!("Impossible de lire la configuration '{}'", path))?;

        let raw: RawSettings = settings
            .try_deserialize()
            .context("Valeurs de configuration invalides")?;

        Self::from_raw(raw)
    }

    /// Construit la configuration depuis un document JSON seul, sans
    /// l'environnement.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(json, config::FileFormat::Json))
            .build()
            .context("Impossible de parser la configuration JSON")?;

        let raw: RawSettings = settings
            .try_deserialize()
            .context("Valeurs de configuration invalides")?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self> {
        if raw.categories.is_empty() && raw.category_keywords.is_empty() {
            anyhow::bail!(
                "Aucune catégorie configurée\n\
                 \n\
                 💡 Solutions :\n\
                 1. Copier la configuration d'exemple puis l'éditer :\n\
                    cp config.example.json config.json\n\
                 \n\
                 2. Ou indiquer un autre fichier :\n\
                    mailtriage --config /path/to/config.json"
            );
        }

        let default_category = match non_empty(raw.default_category) {
            Some(category) => category,
            None => anyhow::bail!("default_category doit désigner une des catégories configurées"),
        };

        let categories = if !raw.categories.is_empty() {
            if !raw.category_keywords.is_empty() {
                log::warn!(
                    "categories et category_keywords sont définis - category_keywords ignoré"
                );
            }
            raw.categories
        } else {
            categories_from_map(
                raw.category_keywords,
                raw.category_order.as_deref(),
                &default_category,
            )?
        };

        let gemini = match non_empty(raw.gemini_api_key) {
            Some(api_key) => Some(GeminiConfig {
                api_key,
                model: raw.gemini_model,
                endpoint: raw.gemini_endpoint.trim_end_matches('/').to_string(),
            }),
            None => {
                log::warn!("GEMINI_API_KEY non défini - classification par mots-clés uniquement");
                None
            }
        };

        let slack = match (non_empty(raw.slack_webhook_url), non_empty(raw.slack_bot_token)) {
            (None, None) => {
                log::warn!(
                    "SLACK_WEBHOOK_URL ou SLACK_BOT_TOKEN non défini - \
                     notifications Slack désactivées"
                );
                None
            }
            (webhook_url, bot_token) => Some(SlackConfig {
                webhook_url,
                bot_token,
                username: raw.slack_username,
                icon_emoji: raw.slack_icon_emoji,
            }),
        };

        let config = Config {
            imap: ImapConfig {
                server: raw.email_server,
                port: raw.email_port,
                username: raw.email_username,
                password: raw.email_password,
                mailbox: raw.email_mailbox,
                search: raw.email_search,
                fetch_limit: raw.fetch_limit,
            },
            gemini,
            slack,
            triage: TriageConfig {
                categories,
                default_category,
                default_channel: raw.default_channel,
                channel_overrides: raw.slack_channels,
            },
            analytics: AnalyticsConfig {
                stop_words: raw.stop_words,
                min_word_length: raw.min_word_length,
                top_keywords: raw.top_keywords,
            },
            output_dir: raw.output_dir,
            request_delay_ms: raw.request_delay_ms,
            scheduler: SchedulerConfig {
                enabled: raw.scheduler_enabled,
                schedule_times: raw
                    .scheduler_times
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        };

        // Valider le lexique dès le chargement plutôt qu'au premier email
        config.triage.lexicon()?;

        Ok(config)
    }

    /// Les identifiants IMAP ne sont requis que pour lire une vraie boîte.
    pub fn check_mailbox_credentials(&self) -> Result<()> {
        let mut missing_vars = Vec::new();
        if self.imap.username.trim().is_empty() {
            missing_vars.push("EMAIL_USERNAME");
        }
        if self.imap.password.is_empty() {
            missing_vars.push("EMAIL_PASSWORD");
        }

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Configuration de la boîte mail manquante: {}\n\
                 \n\
                 💡 Solutions :\n\
                 1. Créer un fichier .env avec vos credentials :\n\
                    EMAIL_USERNAME=support@example.com\n\
                    EMAIL_PASSWORD=app-password\n\
                 \n\
                 2. Ou renseigner email_username / email_password dans config.json\n\
                 \n\
                 3. Ou travailler hors ligne sur une boîte JSON :\n\
                    mailtriage --from-file demos/sample_emails.json",
                missing_vars.join(", ")
            );
        }

        Ok(())
    }
}
