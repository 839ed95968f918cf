//! Construction des paramètres de requêtes WFS 2.0 (clé/valeur)

use crate::types::QuerySpec;
use crate::wfs::pager::PageRequest;

/// Paramètres de requête, dans l'ordre d'émission
pub type Params = Vec<(&'static str, String)>;

fn base(request: &str) -> Params {
    vec![
        ("service", "WFS".to_string()),
        ("version", "2.0.0".to_string()),
        ("request", request.to_string()),
    ]
}

/// `GetCapabilities`
pub fn get_capabilities() -> Params {
    base("GetCapabilities")
}

/// `DescribeFeatureType` en JSON (sortie GeoServer)
pub fn describe_feature_type(table: &str) -> Params {
    let mut params = base("DescribeFeatureType");
    params.push(("typeNames", table.to_string()));
    params.push(("outputFormat", "application/json".to_string()));
    params
}

/// `GetFeature` en mode `resultType=hits` (comptage seul)
pub fn get_hits(query: &QuerySpec) -> Params {
    let mut params = base("GetFeature");
    params.push(("typeNames", query.table.clone()));
    params.push(("resultType", "hits".to_string()));
    if let Some(filter) = query.cql_filter() {
        params.push(("CQL_FILTER", filter));
    }
    params
}

/// `GetFeature` pour une page du plan
///
/// `sortBy` et `startIndex` ne sont émis que pour les plans paginés:
/// une pagination sans clé de tri n'a pas d'ordre garanti côté serveur.
pub fn get_feature(query: &QuerySpec, page: &PageRequest) -> Params {
    let mut params = base("GetFeature");
    params.push(("typeNames", query.table.clone()));
    params.push(("outputFormat", "json".to_string()));
    params.push(("SRSNAME", query.crs.to_string()));
    if let Some(filter) = query.cql_filter() {
        params.push(("CQL_FILTER", filter));
    }
    if page.paged {
        if let Some(sort_by) = &query.sort_by {
            params.push(("sortBy", sort_by.clone()));
        }
        params.push(("startIndex", page.start_index.to_string()));
    }
    if let Some(count) = page.count {
        params.push(("count", count.to_string()));
    }
    params
}

/// Paramètres de `package_show` du catalogue CKAN
pub fn package_show(id: &str) -> Params {
    vec![("id", id.to_string())]
}
