//! Math and world primitives shared between the simulation systems.
//!
//! `Vec3` mirrors the free-function style of `original_source/server/game/world.py`
//! (`v3_add`, `v3_sub`, ...) as inherent methods, plus an `Aabb` and the map
//! document loader.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 3D vector. Components are `x`, `y` (up), `z`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }

    pub fn from_array(a: [f32; 3]) -> Self {
        Vec3::new(a[0], a[1], a[2])
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    pub fn sub(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }

    pub fn mul(self, s: f32) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, o: Vec3) -> f32 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub fn cross(self, o: Vec3) -> Vec3 {
        Vec3::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    pub fn len(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Returns the zero vector when `len() <= 1e-9`, matching `v3_norm`.
    pub fn norm(self) -> Vec3 {
        let l = self.len();
        if l <= 1e-9 {
            Vec3::ZERO
        } else {
            self.mul(1.0 / l)
        }
    }

    /// XZ-only length, used by ground-plane distance checks.
    pub fn len_xz(self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    pub fn with_y(self, y: f32) -> Vec3 {
        Vec3::new(self.x, y, self.z)
    }
}

pub fn v3_add(a: Vec3, b: Vec3) -> Vec3 {
    a.add(b)
}
pub fn v3_sub(a: Vec3, b: Vec3) -> Vec3 {
    a.sub(b)
}
pub fn v3_mul(a: Vec3, s: f32) -> Vec3 {
    a.mul(s)
}
pub fn v3_dot(a: Vec3, b: Vec3) -> f32 {
    a.dot(b)
}
pub fn v3_len(a: Vec3) -> f32 {
    a.len()
}
pub fn v3_norm(a: Vec3) -> Vec3 {
    a.norm()
}

pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.mul(0.5);
        Aabb {
            min: center.sub(half),
            max: center.add(half),
        }
    }
}

/// Pickup kind, parsed from map JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickupKind {
    Health,
    Armor,
    Ammo,
}

impl fmt::Display for PickupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PickupKind::Health => "health",
            PickupKind::Armor => "armor",
            PickupKind::Ammo => "ammo",
        };
        f.write_str(s)
    }
}

/// One pickup definition as it appears in the map document.
#[derive(Debug, Clone, Deserialize)]
pub struct PickupDef {
    #[serde(rename = "pickupId")]
    pub pickup_id: Option<String>,
    pub kind: PickupKind,
    pub pos: [f32; 3],
}

#[derive(Debug, Deserialize)]
struct BoundsDoc {
    center: [f32; 3],
    size: [f32; 3],
}

#[derive(Debug, Deserialize)]
struct ColliderDoc {
    center: [f32; 3],
    size: [f32; 3],
}

#[derive(Debug, Deserialize)]
struct MapDoc {
    #[serde(rename = "mapId")]
    map_id: Option<String>,
    bounds: BoundsDoc,
    #[serde(default)]
    colliders: Vec<ColliderDoc>,
    #[serde(default)]
    spawns: Vec<[f32; 3]>,
    #[serde(default)]
    pickups: Vec<PickupDef>,
}

/// Errors from loading a map document.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid map json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("map document missing required field: {0}")]
    MissingField(&'static str),
}

/// An immutable, loaded map. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct MapData {
    pub map_id: String,
    pub bounds: Aabb,
    pub colliders: Vec<Aabb>,
    pub spawns: Vec<Vec3>,
    pub pickups: Vec<PickupDef>,
}

impl MapData {
    /// Parses a map JSON document as described in §6 ("Map JSON schema").
    /// Errors if `bounds` is absent, matching §4.1.
    pub fn from_str(map_id_fallback: &str, text: &str) -> Result<Self, MapError> {
        let doc: MapDoc = serde_json::from_str(text)?;
        let bounds = Aabb::from_center_size(
            Vec3::from_array(doc.bounds.center),
            Vec3::from_array(doc.bounds.size),
        );
        let colliders = doc
            .colliders
            .iter()
            .map(|c| Aabb::from_center_size(Vec3::from_array(c.center), Vec3::from_array(c.size)))
            .collect();
        let spawns = doc.spawns.iter().map(|p| Vec3::from_array(*p)).collect();
        Ok(MapData {
            map_id: doc.map_id.unwrap_or_else(|| map_id_fallback.to_string()),
            bounds,
            colliders,
            spawns,
            pickups: doc.pickups,
        })
    }
}
