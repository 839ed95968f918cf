//! Transaction atomique pour la fusion d'une couche
//!
//! Garantit le rollback automatique en cas d'erreur fatale: la table cible
//! reste dans son état précédent.

use anyhow::{Context, Result};
use deadpool_postgres::{Object, Transaction};
use tracing::{error, info};

use crate::mirror::TargetTable;

/// Gestionnaire de transaction pour la fusion staging → cible
pub struct MirrorTransaction<'a> {
    transaction: Transaction<'a>,
    target: TargetTable,
    rows_written: u64,
}

impl<'a> MirrorTransaction<'a> {
    /// Démarre une nouvelle transaction
    ///
    /// # Errors
    /// Retourne une erreur si la transaction ne peut pas être démarrée
    pub async fn begin(client: &'a mut Object, target: &TargetTable) -> Result<Self> {
        let transaction = client
            .transaction()
            .await
            .context("Failed to begin transaction")?;

        info!(table = %target, "Starting merge transaction");

        Ok(Self {
            transaction,
            target: target.clone(),
            rows_written: 0,
        })
    }

    /// Accède à la transaction sous-jacente pour exécuter des requêtes
    pub fn transaction(&self) -> &Transaction<'a> {
        &self.transaction
    }

    /// Enregistre des lignes écrites (insérées ou mises à jour)
    pub fn record_rows(&mut self, count: u64) {
        self.rows_written += count;
    }

    /// Valide la transaction, retourne le nombre de lignes écrites
    pub async fn commit(self) -> Result<u64> {
        self.transaction
            .commit()
            .await
            .context("Failed to commit transaction")?;

        info!(
            table = %self.target,
            rows = self.rows_written,
            "Merge committed"
        );
        Ok(self.rows_written)
    }

    /// Annule la transaction
    ///
    /// La transaction est également annulée si elle est droppée.
    pub async fn rollback(self, reason: &str) {
        error!(
            table = %self.target,
            reason = %reason,
            rows_attempted = self.rows_written,
            "Rolling back merge"
        );

        if let Err(e) = self.transaction.rollback().await {
            error!(error = %e, "Explicit rollback failed (will rollback on drop anyway)");
        }
    }
}
