//! Client HTTP du WFS avec timeout et nouvelles tentatives

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{BcdcError, Result};
use crate::types::{DatasetDescriptor, QuerySpec, RecordPage};
use crate::wfs::pager::PageRequest;
use crate::wfs::{decode, request, xml};

/// Point d'accès WFS public du catalogue
pub const DEFAULT_WFS_URL: &str = "https://openmaps.gov.bc.ca/geo/pub/wfs";

/// API CKAN du catalogue
pub const DEFAULT_CATALOGUE_URL: &str = "https://catalogue.data.gov.bc.ca/api/3";

/// Configuration du client HTTP
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub wfs_url: String,
    pub catalogue_url: String,
    /// Timeout d'une requête (les grosses pages peuvent être très lentes)
    pub timeout: Duration,
    /// Nombre maximal de tentatives par requête
    pub max_attempts: u32,
    /// Délai avant la première nouvelle tentative, doublé à chaque échec
    pub backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            wfs_url: DEFAULT_WFS_URL.into(),
            catalogue_url: DEFAULT_CATALOGUE_URL.into(),
            timeout: Duration::from_secs(2 * 60 * 60),
            max_attempts: 5,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Client du service WFS
#[derive(Debug, Clone)]
pub struct WfsClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl WfsClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("bcdata/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Requête GET avec nouvelles tentatives (erreurs réseau, 429, 5xx)
    pub(crate) async fn get_bytes(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<Vec<u8>> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.backoff;
        let mut attempt = 1;

        loop {
            match self.try_get(url, params).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        url = url,
                        attempt = attempt,
                        error = %e,
                        "Request failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get(&self, url: &str, params: &[(&'static str, String)]) -> Result<Vec<u8>> {
        debug!(url = url, params = ?params, "GET");
        let response = self.http.get(url).query(params).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let text = String::from_utf8_lossy(&body);
        let message = xml::parse_exception_report(&text)
            .unwrap_or_else(|| text.chars().take(500).collect::<String>());
        Err(BcdcError::Status {
            status: status.as_u16(),
            url: final_url,
            message,
        })
    }

    async fn get_wfs(&self, params: &[(&'static str, String)]) -> Result<Vec<u8>> {
        let url = self.config.wfs_url.clone();
        self.get_bytes(&url, params).await
    }

    /// Noms de toutes les couches publiées
    pub async fn list_feature_types(&self) -> Result<Vec<String>> {
        let body = self.get_wfs(&request::get_capabilities()).await?;
        xml::parse_feature_type_names(&String::from_utf8_lossy(&body))
    }

    /// Schéma d'une couche
    pub async fn describe_feature_type(&self, table: &str) -> Result<DatasetDescriptor> {
        let body = self.get_wfs(&request::describe_feature_type(table)).await?;
        let (geometry, fields) = decode::decode_schema(&body)?;
        Ok(DatasetDescriptor {
            name: table.to_string(),
            package: None,
            title: None,
            crs: Default::default(),
            geometry,
            fields,
        })
    }

    /// Nombre de features correspondant à la requête
    pub async fn get_count(&self, query: &QuerySpec) -> Result<u64> {
        let body = self.get_wfs(&request::get_hits(query)).await?;
        xml::parse_number_matched(&String::from_utf8_lossy(&body))
    }

    /// Récupère une page du plan
    pub async fn get_page(&self, query: &QuerySpec, page: &PageRequest) -> Result<RecordPage> {
        let body = self.get_wfs(&request::get_feature(query, page)).await?;
        let features = decode::decode_features(&body)?;
        Ok(RecordPage {
            index: page.index,
            start_index: page.start_index,
            features,
        })
    }
}
