//! Rapport de chargement bc2pg
//!
//! Collecte les compteurs d'un chargement (features récupérées, lignes
//! stagées, insérées, mises à jour...) et les erreurs non fatales.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::export::postgres::MergeCounts;
use crate::mirror::MirrorMode;

/// Statut global du chargement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MirrorStatus {
    /// Chargement réussi sans erreur
    Success,
    /// Chargement réussi avec des erreurs non fatales
    PartialSuccess,
    /// Fusion annulée (rollback)
    RolledBack,
    /// Chargement échoué
    Failed,
}

/// Niveau de sévérité des erreurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorLevel {
    /// Erreur fatale: chargement abandonné
    Fatal,
    /// Erreur: lignes perdues ou incohérence
    Error,
    /// Warning: features ignorées
    Warning,
}

/// Problème rencontré pendant le chargement
#[derive(Debug, Clone, Serialize)]
pub struct ReportIssue {
    pub level: ErrorLevel,
    pub message: String,
}

/// Rapport complet d'un chargement
#[derive(Debug, Clone, Serialize)]
pub struct MirrorReport {
    /// Objet WFS source
    pub dataset: String,
    /// Table cible `schema.table`
    pub target: String,
    pub mode: MirrorMode,
    pub status: MirrorStatus,
    pub duration_secs: f64,

    /// Features annoncées par le service (après `--max-features`)
    pub features_expected: u64,
    /// Features reçues
    pub features_fetched: u64,
    /// Features ignorées (géométrie refusée par PostGIS)
    pub invalid_geometries: u64,
    /// Features ignorées (attribut ou géométrie impossible à encoder)
    pub encoding_errors: u64,
    /// Lignes chargées dans la staging
    pub rows_staged: u64,

    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    /// Lignes ignorées (clé primaire en double ou NULL)
    pub duplicates: u64,

    /// Lignes dans la table cible après chargement
    pub final_row_count: Option<u64>,

    pub errors: Vec<ReportIssue>,
}

impl MirrorReport {
    pub fn new(dataset: &str, target: &str, mode: MirrorMode) -> Self {
        Self {
            dataset: dataset.to_string(),
            target: target.to_string(),
            mode,
            status: MirrorStatus::Success,
            duration_secs: 0.0,
            features_expected: 0,
            features_fetched: 0,
            invalid_geometries: 0,
            encoding_errors: 0,
            rows_staged: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            duplicates: 0,
            final_row_count: None,
            errors: Vec::new(),
        }
    }

    pub fn record_merge(&mut self, counts: MergeCounts) {
        self.inserted += counts.inserted;
        self.updated += counts.updated;
        self.unchanged += counts.unchanged;
        self.duplicates += counts.duplicates;
    }

    pub fn record_issue(&mut self, level: ErrorLevel, message: impl Into<String>) {
        self.errors.push(ReportIssue {
            level,
            message: message.into(),
        });
    }

    /// Compare le total récupéré au total annoncé, puis (mode replace) le
    /// nombre de lignes final au nombre de lignes stagées
    pub fn verify_counts(&mut self) {
        if self.features_fetched != self.features_expected {
            self.record_issue(
                ErrorLevel::Error,
                format!(
                    "Fetched {} features, service reported {}",
                    self.features_fetched, self.features_expected
                ),
            );
        }

        if self.invalid_geometries > 0 {
            self.record_issue(
                ErrorLevel::Warning,
                format!("Skipped {} features with invalid geometry", self.invalid_geometries),
            );
        }

        if self.encoding_errors > 0 {
            self.record_issue(
                ErrorLevel::Error,
                format!("Skipped {} features that could not be encoded", self.encoding_errors),
            );
        }

        if self.mode == MirrorMode::Replace {
            if let Some(count) = self.final_row_count {
                if count != self.rows_staged {
                    self.record_issue(
                        ErrorLevel::Error,
                        format!(
                            "{} holds {} rows, {} rows were staged",
                            self.target, count, self.rows_staged
                        ),
                    );
                }
            }
        }
    }

    /// Marque la fusion comme annulée
    pub fn rolled_back(&mut self, reason: &str) {
        self.inserted = 0;
        self.updated = 0;
        self.unchanged = 0;
        self.duplicates = 0;
        self.record_issue(ErrorLevel::Fatal, reason);
        self.status = MirrorStatus::RolledBack;
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final basé sur les erreurs
    pub fn finalize(&mut self) {
        if self.status == MirrorStatus::RolledBack {
            return;
        }

        let has_fatal = self.errors.iter().any(|e| e.level == ErrorLevel::Fatal);
        let has_errors = self.errors.iter().any(|e| e.level != ErrorLevel::Warning);
        let has_success = self.inserted > 0 || self.updated > 0 || self.unchanged > 0;

        self.status = if has_fatal {
            MirrorStatus::Failed
        } else if has_errors && has_success {
            MirrorStatus::PartialSuccess
        } else if has_errors {
            MirrorStatus::Failed
        } else {
            MirrorStatus::Success
        };
    }

    /// Affiche le rapport sur stderr
    pub fn display(&self) {
        eprintln!("\n{}", "=".repeat(60));
        eprintln!("LOAD REPORT - {} -> {}", self.dataset, self.target);
        eprintln!("{}", "=".repeat(60));

        eprintln!("\nStatus: {:?}", self.status);
        eprintln!("Mode: {}", self.mode);
        eprintln!("Duration: {:.2}s", self.duration_secs);

        eprintln!("\n--- SUMMARY ---");
        eprintln!(
            "Features: {} expected, {} fetched, {} invalid geometries, {} encoding errors",
            self.features_expected, self.features_fetched, self.invalid_geometries, self.encoding_errors
        );
        eprintln!("Rows staged: {}", self.rows_staged);
        eprintln!(
            "Rows: {} inserted, {} updated, {} unchanged, {} duplicates",
            self.inserted, self.updated, self.unchanged, self.duplicates
        );
        if let Some(count) = self.final_row_count {
            eprintln!("Table rows: {}", count);
        }

        if !self.errors.is_empty() {
            eprintln!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(20) {
                eprintln!("  {:?} {}", e.level, e.message);
            }
            if self.errors.len() > 20 {
                eprintln!("  ... and {} more", self.errors.len() - 20);
            }
        }

        eprintln!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} inserted, {} updated, {} unchanged, {} errors",
            self.target,
            self.inserted,
            self.updated,
            self.unchanged,
            self.errors.len()
        )
    }
}
