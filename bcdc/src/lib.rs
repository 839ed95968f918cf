//! # bcdc
//!
//! Client pour le BC Data Catalogue et son service WFS.
//!
//! ## Features
//!
//! - Résolution des jeux de données par nom de couche ou identifiant catalogue
//! - Comptage, schéma et téléchargement paginé (WFS 2.0, sortie GeoJSON)
//! - Filtres CQL et emprises dans un CRS quelconque
//! - Nouvelles tentatives avec backoff exponentiel sur les erreurs transitoires
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bcdc::{Catalogue, ClientConfig, PagePlan, QuerySpec, TableCache, WfsClient};
//! use futures::StreamExt;
//!
//! let wfs = WfsClient::new(ClientConfig::default())?;
//! let catalogue = Catalogue::new(wfs.clone(), TableCache::new(bcdc::cache::default_cache_path()));
//!
//! let dataset = catalogue.describe("bc-airports").await?;
//! let mut query = QuerySpec::new(&dataset.name);
//! query.sort_by = dataset.default_sort_key(None);
//!
//! let plan = PagePlan::new(wfs.get_count(&query).await?, query.page_size, None);
//! let mut pages = std::pin::pin!(bcdc::fetch_pages(&wfs, &query, &plan, 4));
//! while let Some(page) = pages.next().await {
//!     println!("{} features", page?.len());
//! }
//! ```

pub mod cache;
pub mod catalogue;
pub mod error;
pub mod types;
pub mod wfs;

pub use cache::TableCache;
pub use catalogue::{Catalogue, Package};
pub use error::BcdcError;
pub use types::{
    Bounds, Crs, DatasetDescriptor, Field, FieldType, GeometryField, QuerySpec, RecordPage,
    BC_ALBERS, DEFAULT_PAGE_SIZE,
};
pub use wfs::{fetch_pages, ClientConfig, PagePlan, PageRequest, WfsClient};
