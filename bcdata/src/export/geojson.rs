//! Écriture GeoJSON en streaming
//!
//! Les features sont écrites page par page, sans jamais matérialiser la
//! FeatureCollection complète en mémoire.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use bcdc::Crs;

/// Ouvre la sortie: fichier si fourni, sinon stdout
pub fn create_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .context(format!("Failed to create file: {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(std::io::stdout()))),
    }
}

/// FeatureCollection écrite au fil de l'eau
pub struct FeatureCollectionWriter<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> FeatureCollectionWriter<W> {
    /// Écrit l'en-tête avec le membre `crs`
    pub fn new(mut writer: W, crs: &Crs) -> Result<Self> {
        write!(
            writer,
            r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"{}"}}}},"features":["#,
            crs.urn()
        )?;
        Ok(Self { writer, written: 0 })
    }

    pub fn write_feature(&mut self, feature: &geojson::Feature) -> Result<()> {
        if self.written > 0 {
            self.writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.writer, feature).context("Failed to serialize feature")?;
        self.written += 1;
        Ok(())
    }

    /// Écrit une page complète, retourne le nombre de features écrites
    pub fn write_page(&mut self, features: &[geojson::Feature]) -> Result<u64> {
        for feature in features {
            self.write_feature(feature)?;
        }
        Ok(features.len() as u64)
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Ferme la collection et vide le buffer
    pub fn finish(mut self) -> Result<u64> {
        self.writer.write_all(b"]}\n")?;
        self.writer.flush()?;
        Ok(self.written)
    }
}
