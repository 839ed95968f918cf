//! Cache local de la liste des couches publiées
//!
//! Une ligne par nom de couche, dans un fichier texte (`~/.bcdata` par défaut).

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Emplacement par défaut du cache (`$BCDATA_CACHE`, sinon `$HOME/.bcdata`)
pub fn default_cache_path() -> PathBuf {
    if let Ok(path) = std::env::var("BCDATA_CACHE") {
        return PathBuf::from(path);
    }
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
        .join(".bcdata")
}

/// Cache fichier des noms de couches
#[derive(Debug, Clone)]
pub struct TableCache {
    path: PathBuf,
}

impl TableCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lit le cache; `None` s'il est absent ou vide
    pub fn load(&self) -> Result<Option<Vec<String>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let tables: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();

        debug!(path = %self.path.display(), tables = tables.len(), "Loaded table cache");
        Ok((!tables.is_empty()).then_some(tables))
    }

    /// Écrit le cache
    pub fn store(&self, tables: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut content = tables.join("\n");
        content.push('\n');
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
