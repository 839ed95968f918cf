//! Décodage des réponses JSON du WFS (schéma et pages de features)

use geojson::FeatureCollection;
use serde::Deserialize;

use crate::error::{BcdcError, Result};
use crate::types::{Field, FieldType, GeometryField};
use crate::wfs::xml::parse_exception_report;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeResponse {
    #[serde(default)]
    feature_types: Vec<FeatureTypeSchema>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureTypeSchema {
    #[serde(default)]
    properties: Vec<PropertySchema>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertySchema {
    name: String,
    #[serde(rename = "type", default)]
    xsd_type: String,
    #[serde(default)]
    local_type: Option<String>,
    #[serde(default = "default_nillable")]
    nillable: bool,
}

fn default_nillable() -> bool {
    true
}

/// Schéma d'une couche: colonne géométrique et attributs (dans l'ordre du serveur)
pub fn decode_schema(body: &[u8]) -> Result<(Option<GeometryField>, Vec<Field>)> {
    let response: DescribeResponse = serde_json::from_slice(body).map_err(|e| {
        match parse_exception_report(&String::from_utf8_lossy(body)) {
            Some(message) => BcdcError::Service(message),
            None => BcdcError::decode("DescribeFeatureType", e),
        }
    })?;

    let feature_type = response
        .feature_types
        .into_iter()
        .next()
        .ok_or_else(|| BcdcError::decode("DescribeFeatureType", "no feature type in response"))?;

    let mut geometry = None;
    let mut fields = Vec::with_capacity(feature_type.properties.len());

    for prop in feature_type.properties {
        if prop.xsd_type.starts_with("gml:") {
            // Une seule colonne géométrique par couche: la première
            if geometry.is_none() {
                let kind = prop.local_type.as_deref().unwrap_or(&prop.xsd_type);
                geometry = Some(GeometryField {
                    name: prop.name,
                    kind: GeometryField::kind_from_gml(kind),
                });
            }
            continue;
        }

        let xsd = prop.local_type.as_deref().unwrap_or(&prop.xsd_type);
        fields.push(Field {
            name: prop.name,
            field_type: FieldType::from_xsd(xsd),
            nullable: prop.nillable,
        });
    }

    Ok((geometry, fields))
}

/// Features d'une réponse GetFeature (`outputFormat=json`)
pub fn decode_features(body: &[u8]) -> Result<Vec<geojson::Feature>> {
    match serde_json::from_slice::<FeatureCollection>(body) {
        Ok(collection) => Ok(collection.features),
        Err(e) => match parse_exception_report(&String::from_utf8_lossy(body)) {
            Some(message) => Err(BcdcError::Service(message)),
            None => Err(BcdcError::decode("GetFeature response", e)),
        },
    }
}
