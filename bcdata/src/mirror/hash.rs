//! Hash de ligne pour la détection des modifications
//!
//! Le hash couvre la géométrie (Z compris) et les valeurs d'attributs telles
//! qu'elles sont écrites dans la table. Les anneaux de polygones sont
//! normalisés pour être indépendants du vertex de départ.

use blake3::Hasher;
use geojson::{PolygonType, Position, Value};

/// Accumulateur du hash d'une ligne
pub struct RowHasher {
    hasher: Hasher,
}

impl Default for RowHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl RowHasher {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    /// Ajoute une valeur de colonne (`None` pour NULL)
    pub fn update_field(&mut self, name: &str, encoded: Option<&[u8]>) {
        self.hasher.update(name.as_bytes());
        match encoded {
            Some(bytes) => {
                self.hasher.update(&[1]);
                self.hasher.update(&(bytes.len() as u64).to_le_bytes());
                self.hasher.update(bytes);
            }
            None => {
                self.hasher.update(&[0]);
            }
        }
    }

    pub fn update_geometry(&mut self, geometry: Option<&Value>) {
        match geometry {
            Some(value) => hash_value(&mut self.hasher, value),
            None => {
                self.hasher.update(b"EMPTY");
            }
        }
    }

    pub fn finalize(self) -> [u8; 32] {
        *self.hasher.finalize().as_bytes()
    }
}

fn hash_value(hasher: &mut Hasher, value: &Value) {
    match value {
        Value::Point(p) => {
            hasher.update(b"POINT");
            hash_position(hasher, p);
        }
        Value::MultiPoint(points) => {
            hasher.update(b"MULTIPOINT");
            for p in points {
                hash_position(hasher, p);
            }
        }
        Value::LineString(line) => {
            hasher.update(b"LINESTRING");
            for p in line {
                hash_position(hasher, p);
            }
        }
        Value::MultiLineString(lines) => {
            hasher.update(b"MULTILINESTRING");
            for line in lines {
                hasher.update(b"LS");
                for p in line {
                    hash_position(hasher, p);
                }
            }
        }
        Value::Polygon(rings) => {
            hasher.update(b"POLYGON");
            hash_polygon(hasher, rings);
        }
        Value::MultiPolygon(polygons) => {
            hasher.update(b"MULTIPOLYGON");
            for rings in polygons {
                hasher.update(b"POLY");
                hash_polygon(hasher, rings);
            }
        }
        Value::GeometryCollection(geometries) => {
            hasher.update(b"COLLECTION");
            for g in geometries {
                hash_value(hasher, &g.value);
            }
        }
    }
}

fn hash_polygon(hasher: &mut Hasher, rings: &PolygonType) {
    for (i, ring) in rings.iter().enumerate() {
        hasher.update(if i == 0 { b"EXT" } else { b"INT" });
        hash_ring_normalized(hasher, ring);
    }
}

/// Hash un anneau en commençant au vertex lexicographiquement le plus petit
fn hash_ring_normalized(hasher: &mut Hasher, ring: &[Position]) {
    // le dernier point d'un anneau fermé répète le premier
    let len = if ring.len() > 1 && ring.first() == ring.last() {
        ring.len() - 1
    } else {
        ring.len()
    };

    if len == 0 {
        return;
    }

    let min_idx = (0..len)
        .min_by(|&a, &b| {
            ring[a]
                .iter()
                .zip(ring[b].iter())
                .map(|(x, y)| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);

    for i in 0..len {
        hash_position(hasher, &ring[(min_idx + i) % len]);
    }
}

/// Hash une position (x, y et éventuellement z) arrondie au micron
fn hash_position(hasher: &mut Hasher, position: &[f64]) {
    hasher.update(&[position.len() as u8]);
    for ordinate in position {
        let v = (ordinate * 1_000_000.0).round() as i64;
        hasher.update(&v.to_le_bytes());
    }
}
