use anyhow::Result;
use clap::Parser;
use log::{error, info};

use mailtriage::config::Config;
use mailtriage::connection_check;
use mailtriage::email::{JsonFileSource, MailSource, RunSummary, TriageProcessor};
use mailtriage::imap_client::ImapMailSource;

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Parser, Clone)]
#[command(name = "mailtriage")]
#[command(about = "Tri des emails de support : classification, alertes Slack et mots-clés")]
#[command(version = "0.1.0")]
struct Args {
    /// Fichier de configuration (JSON ou TOML), surchargé par les variables d'environnement
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Mode dry-run : classe et affiche les emails, sans notification Slack ni fichiers
    #[arg(short, long)]
    dry_run: bool,

    /// Mode daemon : lance le triage aux horaires configurés
    #[arg(long)]
    daemon: bool,

    /// Lire les emails depuis un fichier JSON au lieu de la boîte IMAP
    #[arg(short = 'f', long)]
    from_file: Option<String>,

    /// Répertoire de sortie du journal CSV et du rapport d'analyse
    #[arg(short = 'o', long)]
    output_dir: Option<String>,

    /// Limite du nombre d'emails à traiter (par défaut: fetch_limit)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Vérifier la configuration sans se connecter
    #[arg(long)]
    check_config: bool,

    /// Tester les connexions Gemini, IMAP et Slack puis quitter
    #[arg(long)]
    test_connections: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger le fichier .env s'il existe
    dotenv::dotenv().ok();

    // Parser les arguments CLI
    let args = Args::parse();

    // Initialiser le logging
    env_logger::init();

    if args.dry_run {
        info!("🧪 Démarrage du triage des emails en mode DRY-RUN");
    } else {
        info!("🚀 Démarrage du triage des emails");
    }

    // Charger la configuration
    let mut config = Config::load(&args.config, args.config != DEFAULT_CONFIG_PATH)?;

    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }

    // Si demandé, vérifier seulement la configuration
    if args.check_config {
        print_config(&config, &args);
        return Ok(());
    }

    if args.test_connections {
        let report = connection_check::test_connections(&config).await;
        println!("\n🔌 Test des connexions");
        for line in report.lines() {
            println!("{}", line);
        }
        if !report.all_passed() {
            anyhow::bail!("{} service(s) injoignable(s)", report.failed_count());
        }
        println!("\n🎉 Tous les services configurés sont joignables");
        return Ok(());
    }

    if args.daemon {
        info!("🔄 Démarrage en mode daemon");
        run_daemon_mode(config, args).await?;
        return Ok(());
    }

    match run_once(&config, args.from_file.as_deref(), args.dry_run, args.limit).await {
        Ok(summary) => {
            print_summary(&summary, &config);
            info!("✅ {} emails traités avec succès", summary.emails_processed());
        }
        Err(e) => {
            error!("❌ Erreur lors du triage: {:#}", e);
            return Err(e);
        }
    }

    Ok(())
}

/// Un passage complet : lecture, classification, notifications, journal et rapport.
async fn run_once(
    config: &Config,
    from_file: Option<&str>,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<RunSummary> {
    let mail_source: Box<dyn MailSource> = match from_file {
        Some(path) => Box::new(JsonFileSource::new(path)),
        None => {
            config.check_mailbox_credentials()?;
            Box::new(ImapMailSource::new(config.imap.clone()))
        }
    };

    let processor = TriageProcessor::from_config(config, mail_source, dry_run)?;
    processor.run(limit).await
}

fn print_config(config: &Config, args: &Args) {
    println!("✅ Configuration valide !");
    match &args.from_file {
        Some(path) => println!("📧 Source des emails: {}", path),
        None => println!(
            "📧 IMAP: {}@{}:{} ({}, {}, max {})",
            config.imap.username,
            config.imap.server,
            config.imap.port,
            config.imap.mailbox,
            config.imap.search,
            config.imap.fetch_limit
        ),
    }
    match &config.gemini {
        Some(gemini) => println!(
            "🤖 Modèle Gemini: {} (clé: {})",
            gemini.model,
            mask(&gemini.api_key)
        ),
        None => println!("🤖 Gemini: non configuré (classification par mots-clés uniquement)"),
    }
    match &config.slack {
        Some(slack) if slack.bot_token.is_some() => println!("💬 Slack: token bot"),
        Some(_) => println!("💬 Slack: webhook entrant"),
        None => println!("💬 Slack: désactivé"),
    }
    println!("📂 Catégories (par défaut: {}):", config.triage.default_category);
    for category in &config.triage.categories {
        println!(
            "   - {} → {} ({} mot(s)-clé(s))",
            category.name,
            config.triage.channel_for(category.name.trim()),
            category.keywords.len()
        );
    }
    println!("📁 Répertoire de sortie: {}", config.output_dir);
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}…", visible)
}

fn print_summary(summary: &RunSummary, config: &Config) {
    let order: Vec<String> = config
        .triage
        .categories
        .iter()
        .map(|c| c.name.trim().to_string())
        .collect();

    println!("\n{}", "=".repeat(50));
    println!("📈 RÉSUMÉ DE L'ANALYSE");
    println!("{}", "=".repeat(50));
    for line in summary.analytics_lines(&order) {
        println!("{}", line);
    }

    if let Some(path) = &summary.log_path {
        println!("\n📄 Journal: {}", path.display());
    }
    if let Some(path) = &summary.report_path {
        println!("📊 Rapport: {}", path.display());
    }
}

async fn run_daemon_mode(config: Config, args: Args) -> Result<()> {
    use chrono::{Local, Timelike};
    use tokio_cron_scheduler::{Job, JobScheduler};

    if !config.scheduler.enabled {
        error!("❌ Le mode daemon nécessite scheduler_enabled=true dans la configuration");
        anyhow::bail!("Scheduler non activé dans la configuration");
    }

    if config.scheduler.schedule_times.is_empty() {
        error!("❌ Aucun horaire défini (SCHEDULER_TIMES)");
        anyhow::bail!("Aucun horaire défini");
    }

    info!("📅 Horaires de triage configurés: {:?}", config.scheduler.schedule_times);

    let scheduler = JobScheduler::new().await?;

    for schedule_time in &config.scheduler.schedule_times {
        let parts: Vec<&str> = schedule_time.split(':').collect();
        if parts.len() != 2 {
            error!("❌ Format d'horaire invalide: {}. Utilisez HH:MM", schedule_time);
            continue;
        }

        let hour = parts[0];
        let minute = parts[1];

        // Format cron: "0 minute heure * * *" (tous les jours)
        let cron_expr = format!("0 {} {} * * *", minute, hour);
        info!("📆 Ajout du job planifié: {} (cron: {})", schedule_time, cron_expr);

        let config_clone = config.clone();
        let from_file = args.from_file.clone();
        let dry_run = args.dry_run;
        let limit = args.limit;
        let schedule_time_clone = schedule_time.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let config = config_clone.clone();
            let from_file = from_file.clone();
            let schedule_time = schedule_time_clone.clone();

            Box::pin(async move {
                info!("⏰ Exécution planifiée à {} - récupération des emails...", schedule_time);

                match run_once(&config, from_file.as_deref(), dry_run, limit).await {
                    Ok(summary) => {
                        info!(
                            "✅ Triage planifié terminé: {} emails traités à {}",
                            summary.emails_processed(),
                            schedule_time
                        );
                    }
                    Err(e) => {
                        error!("❌ Échec du triage planifié à {}: {:#}", schedule_time, e);
                    }
                }
            })
        })?;

        scheduler.add(job).await?;
    }

    scheduler.start().await?;

    info!("✅ Daemon démarré. En attente des horaires programmés...");
    info!("⏸️  Appuyez sur Ctrl+C pour arrêter le daemon");

    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;

        let now = Local::now();
        if now.minute() == 0 {
            info!("💓 Daemon actif - {}", now.format("%Y-%m-%d %H:%M"));
        }
    }
}
