//! Modules d'export (GeoJSON, PostgreSQL)

pub mod copy;
pub mod geojson;
pub mod pool;
pub mod postgres;
pub mod transaction;

pub use transaction::MirrorTransaction;
