//! Configuration de l'outil
//!
//! Priorité croissante: valeurs par défaut, fichier JSON (`--config`),
//! variables d'environnement, options de ligne de commande.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bcdc::{ClientConfig, TableCache, DEFAULT_PAGE_SIZE};

/// Nombre de requêtes de pages en vol par défaut
pub const DEFAULT_JOBS: usize = 4;

/// Configuration principale
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Point d'accès WFS
    pub wfs_url: Option<String>,

    /// API CKAN du catalogue
    pub catalogue_url: Option<String>,

    /// Timeout d'une requête HTTP, en secondes
    pub timeout_secs: Option<u64>,

    /// Nombre maximal de tentatives par requête
    pub max_attempts: Option<u32>,

    /// Taille de page des requêtes GetFeature
    pub page_size: Option<u64>,

    /// Requêtes de pages simultanées
    pub jobs: Option<usize>,

    /// Fichier cache de la liste des couches
    pub cache_file: Option<PathBuf>,

    /// Taille du pool de connexions PostgreSQL
    pub pool_size: Option<usize>,
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Fichier optionnel puis surcharges d'environnement
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Applique les variables `BCDATA_*` définies
    pub fn apply_env(&mut self) {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.parse().ok())
        }

        if let Some(v) = var("BCDATA_WFS_URL") {
            self.wfs_url = Some(v);
        }
        if let Some(v) = var("BCDATA_CATALOGUE_URL") {
            self.catalogue_url = Some(v);
        }
        if let Some(v) = var("BCDATA_TIMEOUT") {
            self.timeout_secs = Some(v);
        }
        if let Some(v) = var("BCDATA_MAX_ATTEMPTS") {
            self.max_attempts = Some(v);
        }
        if let Some(v) = var("BCDATA_PAGESIZE") {
            self.page_size = Some(v);
        }
        if let Some(v) = var("BCDATA_JOBS") {
            self.jobs = Some(v);
        }
        if let Some(v) = var::<PathBuf>("BCDATA_CACHE") {
            self.cache_file = Some(v);
        }
        if let Some(v) = var("POOL_SIZE") {
            self.pool_size = Some(v);
        }
    }

    /// Configuration du client HTTP
    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            wfs_url: self.wfs_url.clone().unwrap_or(defaults.wfs_url),
            catalogue_url: self.catalogue_url.clone().unwrap_or(defaults.catalogue_url),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            backoff: defaults.backoff,
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or(DEFAULT_JOBS).max(1)
    }

    pub fn table_cache(&self) -> TableCache {
        TableCache::new(
            self.cache_file
                .clone()
                .unwrap_or_else(bcdc::cache::default_cache_path),
        )
    }
}
