//! Résolution des jeux de données via le catalogue (API CKAN) et le WFS
//!
//! Un jeu de données peut être désigné par le nom de sa couche WFS
//! (`WHSE_IMAGERY_AND_BASE_MAPS.GSR_AIRPORTS_SVW`) ou par l'identifiant de son
//! package catalogue (`bc-airports`).

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::TableCache;
use crate::error::{BcdcError, Result};
use crate::types::DatasetDescriptor;
use crate::wfs::{request, WfsClient};

/// Package du catalogue
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    /// Identifiant (`bc-airports`)
    pub name: String,
    pub title: Option<String>,
    /// Nom de la couche WFS associée
    pub object_name: String,
}

#[derive(Debug, Deserialize)]
struct PackageShowResponse {
    #[serde(default)]
    success: bool,
    result: Option<Value>,
}

/// Décode une réponse `package_show`
pub fn decode_package(id: &str, body: &[u8]) -> Result<Package> {
    let response: PackageShowResponse =
        serde_json::from_slice(body).map_err(|e| BcdcError::decode("package_show", e))?;

    let result = match (response.success, response.result) {
        (true, Some(result)) => result,
        _ => return Err(BcdcError::DatasetNotFound(id.to_string())),
    };

    let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);

    // L'objet est porté par le package, ou à défaut par une de ses ressources
    let object_name = text(&result, "object_name")
        .or_else(|| {
            result
                .get("resources")
                .and_then(Value::as_array)
                .and_then(|resources| resources.iter().find_map(|r| text(r, "object_name")))
        })
        .filter(|name| !name.is_empty())
        .ok_or_else(|| BcdcError::DatasetNotFound(id.to_string()))?;

    Ok(Package {
        name: text(&result, "name").unwrap_or_else(|| id.to_string()),
        title: text(&result, "title"),
        object_name: object_name.to_uppercase(),
    })
}

/// Point d'entrée du catalogue
#[derive(Debug, Clone)]
pub struct Catalogue {
    wfs: WfsClient,
    cache: TableCache,
}

impl Catalogue {
    pub fn new(wfs: WfsClient, cache: TableCache) -> Self {
        Self { wfs, cache }
    }

    pub fn wfs(&self) -> &WfsClient {
        &self.wfs
    }

    /// Interroge `package_show`
    pub async fn package_show(&self, id: &str) -> Result<Package> {
        let url = format!(
            "{}/action/package_show",
            self.wfs.config().catalogue_url.trim_end_matches('/')
        );
        match self.wfs.get_bytes(&url, &request::package_show(id)).await {
            Ok(body) => decode_package(id, &body),
            Err(BcdcError::Status { status: 404, .. }) => {
                Err(BcdcError::DatasetNotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Liste des couches publiées (cache local sauf `refresh`)
    pub async fn list_tables(&self, refresh: bool) -> Result<Vec<String>> {
        if !refresh {
            if let Some(tables) = self.cache.load()? {
                return Ok(tables);
            }
        }

        info!("Refreshing the list of published layers");
        let tables = self.wfs.list_feature_types().await?;
        self.cache.store(&tables)?;
        debug!(path = %self.cache.path().display(), tables = tables.len(), "Table cache written");
        Ok(tables)
    }

    /// Valide un nom de couche ou de package et renvoie le nom de la couche
    pub async fn validate_name(&self, dataset: &str) -> Result<String> {
        Ok(self.resolve(dataset).await?.0)
    }

    async fn resolve(&self, dataset: &str) -> Result<(String, Option<Package>)> {
        let upper = dataset.trim().to_uppercase();
        let tables = self.list_tables(false).await?;
        if tables.contains(&upper) {
            return Ok((upper, None));
        }

        debug!(dataset = dataset, "Not a published layer name, querying the catalogue");
        let package = self.package_show(dataset.trim()).await?;
        Ok((package.object_name.clone(), Some(package)))
    }

    /// Résout un jeu de données et lit son schéma
    pub async fn describe(&self, dataset: &str) -> Result<DatasetDescriptor> {
        let (name, package) = self.resolve(dataset).await?;
        let mut descriptor = self.wfs.describe_feature_type(&name).await?;
        if let Some(package) = package {
            descriptor.package = Some(package.name);
            descriptor.title = package.title;
        }
        Ok(descriptor)
    }
}
