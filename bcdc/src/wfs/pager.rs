//! Plan de pagination et récupération paresseuse des pages
//!
//! Une couche plus petite que la taille de page est récupérée en une seule
//! requête. Au-delà, le plan découpe `[0, n)` en pages contiguës triées par
//! une clé stable (`sortBy` + `startIndex` + `count`).

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{QuerySpec, RecordPage};
use crate::wfs::client::WfsClient;

/// Requête d'une page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Position dans le plan
    pub index: usize,
    pub start_index: u64,
    /// Nombre maximal de features (`count`)
    pub count: Option<u64>,
    /// Requête paginée (`sortBy` + `startIndex` émis)
    pub paged: bool,
}

/// Plan de pagination d'une requête
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    /// Nombre de features correspondant à la requête côté serveur
    pub matched: u64,
    /// Nombre de features à récupérer
    pub total: u64,
    pub page_size: u64,
    pub requests: Vec<PageRequest>,
}

impl PagePlan {
    pub fn new(matched: u64, page_size: u64, max_features: Option<u64>) -> Self {
        let page_size = page_size.max(1);
        let total = max_features.map_or(matched, |max| max.min(matched));

        let requests = if total == 0 {
            Vec::new()
        } else if total <= page_size {
            // Tout en une fois; `count` seulement si on tronque le résultat
            let count = (total < matched).then_some(total);
            vec![PageRequest {
                index: 0,
                start_index: 0,
                count,
                paged: false,
            }]
        } else {
            let pages = total.div_ceil(page_size);
            (0..pages)
                .map(|i| {
                    let start = i * page_size;
                    PageRequest {
                        index: i as usize,
                        start_index: start,
                        count: Some(page_size.min(total - start)),
                        paged: true,
                    }
                })
                .collect()
        };

        Self {
            matched,
            total,
            page_size,
            requests,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Le plan nécessite une clé de tri
    pub fn is_paged(&self) -> bool {
        self.requests.iter().any(|r| r.paged)
    }
}

/// Récupère les pages d'un plan sous forme de flux ordonné
///
/// Au plus `jobs` requêtes sont en vol; les pages sont restituées dans l'ordre
/// du plan.
pub fn fetch_pages<'a>(
    client: &'a WfsClient,
    query: &'a QuerySpec,
    plan: &'a PagePlan,
    jobs: usize,
) -> impl Stream<Item = Result<RecordPage>> + 'a {
    let pages = plan.len();
    stream::iter(plan.requests.iter())
        .map(move |request| async move {
            debug!(page = request.index + 1, pages, start = request.start_index, "Requesting page");
            let page = client.get_page(query, request).await?;
            info!(
                page = request.index + 1,
                pages,
                features = page.len(),
                "Fetched page"
            );
            Ok(page)
        })
        .buffered(jobs.max(1))
}
