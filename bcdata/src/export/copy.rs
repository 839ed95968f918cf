//! Encodage des features en lignes CSV pour `COPY`
//!
//! Format: délimiteur `|`, quote `"`, NULL = champ vide non quoté. La
//! géométrie est écrite en EWKT (`SRID=3005;POLYGON(...)`).

use bytes::BytesMut;
use geozero::geojson::GeoJson;
use geozero::wkt::WktWriter;
use geozero::{CoordDimensions, GeozeroGeometry};
use serde_json::Value as JsonValue;
use thiserror::Error;

use bcdc::FieldType;

use crate::mirror::hash::RowHasher;
use crate::mirror::MirrorLayout;

/// Raison du rejet d'une feature
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("Geometry not valid for PostGIS ingestion")]
    InvalidGeometry,

    #[error("Failed to encode geometry: {0}")]
    Encoding(String),
}

/// Encodeur réutilisable (buffers amortis sur toute la couche)
pub struct RowEncoder<'a> {
    layout: &'a MirrorLayout,
    ewkt_prefix: Vec<u8>,
    wkt_buf: Vec<u8>,
    field_buf: BytesMut,
}

impl<'a> RowEncoder<'a> {
    pub fn new(layout: &'a MirrorLayout) -> Self {
        Self {
            layout,
            ewkt_prefix: format!("SRID={};", layout.srid).into_bytes(),
            wkt_buf: Vec::with_capacity(1024),
            field_buf: BytesMut::with_capacity(256),
        }
    }

    /// Ajoute une ligne au buffer; en cas d'erreur le buffer est inchangé
    pub fn write_row(&mut self, buf: &mut BytesMut, feature: &geojson::Feature) -> Result<(), RowError> {
        let start_len = buf.len();
        let res = self.write_row_inner(buf, feature);
        if res.is_err() {
            buf.truncate(start_len);
        }
        res
    }

    fn write_row_inner(&mut self, buf: &mut BytesMut, feature: &geojson::Feature) -> Result<(), RowError> {
        let geometry = feature.geometry.as_ref();
        if let Some(g) = geometry {
            if !geometry_ok_for_postgis(&g.value) {
                return Err(RowError::InvalidGeometry);
            }
        }

        let layout = self.layout;
        let mut hasher = RowHasher::new();

        for col in &layout.columns {
            let value = feature.property(&col.source);
            self.field_buf.clear();
            let present = encode_value(&mut self.field_buf, value, col.field_type);
            hasher.update_field(&col.name, present.then_some(&self.field_buf[..]));
            buf.extend_from_slice(&self.field_buf);
            buf.extend_from_slice(b"|");
        }

        // geometry (EWKT: SRID=...;WKT)
        if let Some(g) = geometry {
            self.encode_wkt(g)?;
            buf.extend_from_slice(b"\"");
            buf.extend_from_slice(&self.ewkt_prefix);
            buf.extend_from_slice(&self.wkt_buf);
            buf.extend_from_slice(b"\"");
        }
        buf.extend_from_slice(b"|");
        hasher.update_geometry(geometry.map(|g| &g.value));

        buf.extend_from_slice(b"\\x");
        buf.extend_from_slice(hex::encode(hasher.finalize()).as_bytes());
        buf.extend_from_slice(b"\n");
        Ok(())
    }

    fn encode_wkt(&mut self, geometry: &geojson::Geometry) -> Result<(), RowError> {
        let json = serde_json::to_string(geometry).map_err(|e| RowError::Encoding(e.to_string()))?;
        let dims = if has_z(&geometry.value) {
            CoordDimensions::xyz()
        } else {
            CoordDimensions::xy()
        };

        self.wkt_buf.clear();
        let mut writer = WktWriter::with_dims(&mut self.wkt_buf, dims);
        GeoJson(&json)
            .process_geom(&mut writer)
            .map_err(|e| RowError::Encoding(e.to_string()))
    }
}

/// Écrit la valeur d'un champ; retourne `false` pour NULL
fn encode_value(buf: &mut BytesMut, value: Option<&JsonValue>, field_type: FieldType) -> bool {
    let value = match value {
        None | Some(JsonValue::Null) => return false,
        Some(v) => v,
    };

    match field_type {
        FieldType::Integer | FieldType::BigInt => match value {
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => push_raw(buf, &i.to_string()),
                None => match n.as_f64() {
                    Some(f) if f.is_finite() => push_raw(buf, &(f.trunc() as i64).to_string()),
                    _ => false,
                },
            },
            JsonValue::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => push_raw(buf, &(f.trunc() as i64).to_string()),
                _ => false,
            },
            JsonValue::Bool(b) => push_raw(buf, if *b { "1" } else { "0" }),
            _ => false,
        },
        FieldType::Double | FieldType::Decimal => match value {
            JsonValue::Number(n) => push_raw(buf, &n.to_string()),
            JsonValue::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => push_raw(buf, s.trim()),
                _ => false,
            },
            _ => false,
        },
        FieldType::Boolean => match value {
            JsonValue::Bool(b) => push_raw(buf, if *b { "true" } else { "false" }),
            JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "y" | "yes" | "1" => push_raw(buf, "true"),
                "false" | "f" | "n" | "no" | "0" => push_raw(buf, "false"),
                _ => false,
            },
            JsonValue::Number(n) => push_raw(buf, if n.as_f64() == Some(0.0) { "false" } else { "true" }),
            _ => false,
        },
        FieldType::Date => match value {
            // GeoServer renvoie les dates avec un suffixe `Z` (ex: 2019-01-01Z)
            JsonValue::String(s) if !s.trim().is_empty() => {
                push_csv_text_field(buf, s.trim().trim_end_matches('Z'));
                true
            }
            _ => false,
        },
        FieldType::Timestamp => match value {
            JsonValue::String(s) if !s.trim().is_empty() => {
                push_csv_text_field(buf, s.trim());
                true
            }
            _ => false,
        },
        FieldType::Text => {
            match value {
                JsonValue::String(s) => push_csv_text_field(buf, s),
                other => push_csv_text_field(buf, &other.to_string()),
            }
            true
        }
    }
}

fn push_raw(buf: &mut BytesMut, value: &str) -> bool {
    buf.extend_from_slice(value.as_bytes());
    true
}

/// Champ texte quoté (une chaîne vide quotée n'est pas NULL)
pub fn push_csv_text_field(buf: &mut BytesMut, value: &str) {
    buf.extend_from_slice(b"\"");
    for b in value.as_bytes() {
        match *b {
            b'"' => buf.extend_from_slice(b"\"\""),
            _ => buf.extend_from_slice(&[*b]),
        }
    }
    buf.extend_from_slice(b"\"");
}

fn has_z(value: &geojson::Value) -> bool {
    use geojson::{Position, Value};
    let pos_z = |p: &Position| p.len() >= 3;
    match value {
        Value::Point(p) => pos_z(p),
        Value::MultiPoint(ps) | Value::LineString(ps) => ps.iter().any(pos_z),
        Value::MultiLineString(ls) | Value::Polygon(ls) => ls.iter().flatten().any(pos_z),
        Value::MultiPolygon(polys) => polys.iter().flatten().flatten().any(pos_z),
        Value::GeometryCollection(gs) => gs.iter().any(|g| has_z(&g.value)),
    }
}

/// Vérifie qu'une géométrie sera acceptée par PostGIS
///
/// Une LineString a au moins 2 positions, un anneau au moins 4 et se referme.
/// Chaque position a au moins 2 ordonnées finies.
pub fn geometry_ok_for_postgis(value: &geojson::Value) -> bool {
    use geojson::{LineStringType, PolygonType, Position, Value};

    fn position_ok(p: &Position) -> bool {
        p.len() >= 2 && p.iter().all(|v| v.is_finite())
    }

    fn line_ok(l: &LineStringType) -> bool {
        l.len() >= 2 && l.iter().all(position_ok)
    }

    fn ring_ok(r: &LineStringType) -> bool {
        if r.len() < 4 || !r.iter().all(position_ok) {
            return false;
        }
        match (r.first(), r.last()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn polygon_ok(p: &PolygonType) -> bool {
        !p.is_empty() && p.iter().all(ring_ok)
    }

    match value {
        Value::Point(p) => position_ok(p),
        Value::MultiPoint(ps) => ps.iter().all(position_ok),
        Value::LineString(l) => line_ok(l),
        Value::MultiLineString(ls) => ls.iter().all(line_ok),
        Value::Polygon(p) => polygon_ok(p),
        Value::MultiPolygon(mp) => mp.iter().all(polygon_ok),
        Value::GeometryCollection(gs) => gs.iter().all(|g| geometry_ok_for_postgis(&g.value)),
    }
}
