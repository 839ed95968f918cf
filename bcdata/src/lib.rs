//! # bcdata
//!
//! Téléchargement des couches du BC Data Catalogue et miroir PostGIS.
//!
//! ## Features
//!
//! - Liste et métadonnées des couches WFS
//! - Export GeoJSON paginé, dans un CRS quelconque
//! - Miroir PostgreSQL/PostGIS (replace, append, upsert) via COPY et staging
//! - Rapport de chargement avec vérification des comptages
//!
//! ## Usage CLI
//!
//! ```bash
//! bcdata list
//! bcdata info bc-airports --indent 2
//! bcdata dump bc-airports --bounds "1188000 377051 1207437 390361" -o airports.geojson
//! bcdata bc2pg bc-airports --db-url postgresql://postgres@localhost:5432/postgis
//! bcdata bc2pg WHSE_BASEMAPPING.GBA_LOCAL_REG_GREENSPACES_SP --fid LOCAL_REG_GREENSPACE_ID --upsert
//! ```

pub mod cli;
pub mod config;
pub mod export;
pub mod mirror;
pub mod report;

pub use config::Config;
pub use export::pool::{create_pool, DatabaseConfig};
pub use mirror::{MirrorLayout, MirrorMode, MirrorOptions, TargetTable};
pub use report::{MirrorReport, MirrorStatus};
