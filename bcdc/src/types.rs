//! Types de données pour le crate bcdc

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use geo::{coord, Rect};
use regex::Regex;
use serde::Serialize;

use crate::BcdcError;

/// Système de coordonnées natif des couches du catalogue (BC Albers)
pub const BC_ALBERS: u32 = 3005;

/// Taille de page par défaut des requêtes GetFeature
pub const DEFAULT_PAGE_SIZE: u64 = 10_000;

/// Système de coordonnées de référence, normalisé en `EPSG:<code>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Crs(String);

impl Crs {
    /// Crée un CRS depuis un code EPSG
    pub fn epsg(code: u32) -> Self {
        Self(format!("EPSG:{}", code))
    }

    /// Code EPSG numérique
    pub fn code(&self) -> u32 {
        // Invariant: construit uniquement par `epsg()` ou `from_str()`
        self.0[5..].parse().unwrap_or(BC_ALBERS)
    }

    /// Forme URN utilisée dans le membre `crs` des FeatureCollection
    pub fn urn(&self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.code())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::epsg(BC_ALBERS)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Crs {
    type Err = BcdcError;

    /// Accepte `EPSG:3005`, `epsg:3005`, `3005` et `urn:ogc:def:crs:EPSG::3005`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let upper = raw.to_ascii_uppercase();
        let code = upper
            .strip_prefix("URN:OGC:DEF:CRS:EPSG::")
            .or_else(|| upper.strip_prefix("EPSG:"))
            .unwrap_or(&upper);

        match code.parse::<u32>() {
            Ok(c) if c > 0 => Ok(Self::epsg(c)),
            _ => Err(BcdcError::InvalidCrs(raw.to_string())),
        }
    }
}

/// Emprise d'une requête, exprimée dans un CRS donné
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub rect: Rect<f64>,
    pub crs: Crs,
}

fn bounds_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,\s]+").expect("valid separator regex"))
}

impl Bounds {
    /// Parse une emprise `"left bottom right top"` ou `"[left, bottom, right, top]"`
    pub fn parse(value: &str, crs: Crs) -> Result<Self, BcdcError> {
        let invalid = || BcdcError::InvalidBounds(value.to_string());

        let trimmed = value.trim_matches(|c: char| c == ',' || c == ' ' || c == '[' || c == ']');
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let values = bounds_separator()
            .split(trimmed)
            .map(|v| v.parse::<f64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        let [left, bottom, right, top] = values[..] else {
            return Err(invalid());
        };

        if ![left, bottom, right, top].iter().all(|v| v.is_finite())
            || left >= right
            || bottom >= top
        {
            return Err(invalid());
        }

        Ok(Self {
            rect: Rect::new(coord! { x: left, y: bottom }, coord! { x: right, y: top }),
            crs,
        })
    }

    /// `[left, bottom, right, top]`
    pub fn to_array(&self) -> [f64; 4] {
        [
            self.rect.min().x,
            self.rect.min().y,
            self.rect.max().x,
            self.rect.max().y,
        ]
    }

    /// Clause CQL `BBOX(...)` sur la colonne géométrique
    pub fn to_cql(&self, geometry_column: &str) -> String {
        let [l, b, r, t] = self.to_array();
        format!(
            "BBOX({},{},{},{},{},'{}')",
            geometry_column, l, b, r, t, self.crs
        )
    }
}

/// Type d'un attribut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Integer,
    BigInt,
    Double,
    Decimal,
    Boolean,
    Date,
    Timestamp,
}

impl FieldType {
    /// Convertit un type XSD (`xsd:string`, `int`, `date-time`...)
    pub fn from_xsd(xsd: &str) -> Self {
        let local = xsd.rsplit(':').next().unwrap_or(xsd);
        match local.to_ascii_lowercase().as_str() {
            "int" | "short" | "byte" => FieldType::Integer,
            "integer" | "long" => FieldType::BigInt,
            "double" | "float" | "number" => FieldType::Double,
            "decimal" => FieldType::Decimal,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "datetime" | "date-time" | "timestamp" => FieldType::Timestamp,
            _ => FieldType::Text,
        }
    }

    /// Nom XSD affiché par `info`
    pub fn xsd_name(&self) -> &'static str {
        match self {
            FieldType::Text => "string",
            FieldType::Integer => "int",
            FieldType::BigInt => "long",
            FieldType::Double => "double",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Timestamp => "date-time",
        }
    }
}

/// Attribut d'une couche
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

/// Colonne géométrique d'une couche
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryField {
    /// Nom de la colonne (ex: `SHAPE`)
    pub name: String,
    /// Type simple-features (ex: `MultiPolygon`, `Geometry`)
    pub kind: String,
}

impl GeometryField {
    /// Convertit un type GML (`gml:MultiSurfacePropertyType`, `MultiPolygon`...)
    pub fn kind_from_gml(gml: &str) -> String {
        let local = gml.rsplit(':').next().unwrap_or(gml);
        let local = local.strip_suffix("PropertyType").unwrap_or(local);
        match local {
            "Point" | "MultiPoint" | "LineString" | "MultiLineString" | "Polygon"
            | "MultiPolygon" => local.to_string(),
            "Curve" => "LineString".to_string(),
            "MultiCurve" => "MultiLineString".to_string(),
            "Surface" => "Polygon".to_string(),
            "MultiSurface" => "MultiPolygon".to_string(),
            _ => "Geometry".to_string(),
        }
    }
}

/// Description d'une couche résolue depuis le catalogue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetDescriptor {
    /// Nom de l'objet WFS (`SCHEMA.TABLE`, en majuscules)
    pub name: String,
    /// Identifiant du package catalogue si résolu par ce biais
    pub package: Option<String>,
    /// Titre du package catalogue
    pub title: Option<String>,
    /// CRS natif
    pub crs: Crs,
    pub geometry: Option<GeometryField>,
    pub fields: Vec<Field>,
}

impl DatasetDescriptor {
    /// Schéma et table (`WHSE_X.TABLE` → `("WHSE_X", "TABLE")`)
    pub fn schema_and_table(&self) -> (&str, &str) {
        match self.name.split_once('.') {
            Some((schema, table)) => (schema, table),
            None => ("", self.name.as_str()),
        }
    }

    /// Nom de la colonne géométrique (défaut `SHAPE`)
    pub fn geometry_column(&self) -> &str {
        self.geometry
            .as_ref()
            .map(|g| g.name.as_str())
            .unwrap_or("SHAPE")
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Clé de tri par défaut pour la pagination
    ///
    /// Clé primaire si fournie, sinon `OBJECTID`, sinon le premier attribut
    /// dans l'ordre alphabétique.
    pub fn default_sort_key(&self, primary_key: Option<&str>) -> Option<String> {
        if let Some(pk) = primary_key.and_then(|pk| self.field(pk)) {
            return Some(pk.name.clone());
        }
        if let Some(oid) = self.field("OBJECTID") {
            return Some(oid.name.clone());
        }
        self.fields.iter().map(|f| f.name.clone()).min()
    }
}

/// Paramètres d'une requête de téléchargement
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Nom de l'objet WFS
    pub table: String,
    /// Filtre CQL/ECQL fourni par l'utilisateur
    pub filter: Option<String>,
    pub bounds: Option<Bounds>,
    /// Colonne géométrique utilisée pour le filtre d'emprise
    pub geometry_column: String,
    /// CRS de sortie
    pub crs: Crs,
    pub sort_by: Option<String>,
    pub page_size: u64,
    /// Nombre maximal de features
    pub max_features: Option<u64>,
}

impl QuerySpec {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            bounds: None,
            geometry_column: "SHAPE".to_string(),
            crs: Crs::default(),
            sort_by: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_features: None,
        }
    }

    /// Filtre CQL effectif (filtre utilisateur combiné à l'emprise)
    pub fn cql_filter(&self) -> Option<String> {
        let bbox = self
            .bounds
            .as_ref()
            .map(|b| b.to_cql(&self.geometry_column));

        match (self.filter.as_deref().map(str::trim), bbox) {
            (Some(q), Some(b)) if !q.is_empty() => Some(format!("({}) AND {}", q, b)),
            (Some(q), None) if !q.is_empty() => Some(q.to_string()),
            (_, Some(b)) => Some(b),
            _ => None,
        }
    }
}

/// Page de features renvoyée par une requête GetFeature
#[derive(Debug, Clone)]
pub struct RecordPage {
    /// Index de la page dans le plan
    pub index: usize,
    /// Valeur `startIndex` de la requête
    pub start_index: u64,
    pub features: Vec<geojson::Feature>,
}

impl RecordPage {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
