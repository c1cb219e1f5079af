use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::triage::{AnalyticsReport, Record};

/// Persistance en fichiers plats : journal CSV du triage et rapport
/// d'analyse JSON, tous deux horodatés par exécution.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        ReportWriter {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Répertoire cible, créé au premier fichier écrit.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| {
                format!("Impossible de créer le répertoire {}", self.output_dir.display())
            })
    }

    /// Écrit `email_triage_log_<run_at>.csv` et retourne son chemin.
    pub fn write_records(&self, records: &[Record], run_at: DateTime<Utc>) -> Result<PathBuf> {
        self.ensure_output_dir()?;

        let path = self
            .output_dir
            .join(format!("email_triage_log_{}.csv", run_at.format("%Y%m%d_%H%M%S")));

        let file = fs::File::create(&path)
            .with_context(|| format!("Impossible de créer {}", path.display()))?;
        Self::write_csv(file, records)?;

        info!("✓ Journal sauvegardé dans {}", path.display());
        Ok(path)
    }

    /// En-tête `timestamp,category,summary,sender,subject`, une ligne par
    /// enregistrement.
    pub fn write_csv<W: Write>(writer: W, records: &[Record]) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        // En-tête explicite : un journal vide en a aussi un
        csv_writer
            .write_record(["timestamp", "category", "summary", "sender", "subject"])
            .context("Erreur lors de l'écriture de l'en-tête CSV")?;

        for record in records {
            let timestamp = record.timestamp.to_rfc3339();
            csv_writer
                .write_record([
                    timestamp.as_str(),
                    record.category.as_str(),
                    record.summary.as_str(),
                    record.sender.as_str(),
                    record.subject.as_str(),
                ])
                .context("Erreur lors de l'écriture d'une ligne CSV")?;
        }

        csv_writer.flush().context("Erreur lors de l'écriture du CSV")?;
        debug!("{} enregistrement(s) écrit(s)", records.len());
        Ok(())
    }

    /// Écrit `analytics_report_<generated_at>.json`, indenté.
    pub fn write_report(&self, report: &AnalyticsReport) -> Result<PathBuf> {
        self.ensure_output_dir()?;

        let path = self.output_dir.join(format!(
            "analytics_report_{}.json",
            report.generated_at.format("%Y%m%d_%H%M%S")
        ));

        let json = report
            .to_json_pretty()
            .context("Impossible de sérialiser le rapport d'analyse")?;
        fs::write(&path, json)
            .with_context(|| format!("Impossible d'écrire {}", path.display()))?;

        info!("✓ Rapport d'analyse sauvegardé dans {}", path.display());
        Ok(path)
    }
}
