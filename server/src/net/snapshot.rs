//! Per-player snapshot cache + field-diff delta compression (§2.13).
//!
//! Grounded in `original_source/server/net/snapshots.py`. Only the `you`
//! object is diffed; `others`/`projectiles`/`pickups`/`events` are always
//! sent in full, matching the source's simplifying note.

use std::collections::HashMap;

use serde_json::Value;

const YOU_DIFF_FIELDS: &[&str] = &[
    "pos",
    "vel",
    "yaw",
    "pitch",
    "hp",
    "armor",
    "ammo",
    "weaponId",
    "alive",
    "kills",
    "deaths",
    "score",
    "lastSeq",
];

fn diff_fields(prev: &Value, cur: &Value, fields: &[&str]) -> Value {
    let mut out = serde_json::Map::new();
    for &f in fields {
        let pv = prev.get(f);
        let cv = cur.get(f);
        if pv != cv {
            out.insert(f.to_string(), cv.cloned().unwrap_or(Value::Null));
        }
    }
    Value::Object(out)
}

#[derive(Default)]
pub struct SnapshotCache {
    last_by_player: HashMap<String, Value>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self, player_id: &str) {
        self.last_by_player.remove(player_id);
    }

    /// Merges `serverTick` into `snapshot` and returns either the full
    /// payload or a `you`-diffed delta against the last payload sent to
    /// this player, per `want_delta`.
    pub fn make(&mut self, player_id: &str, server_tick: u64, mut snapshot: Value, want_delta: bool) -> Value {
        if let Value::Object(ref mut map) = snapshot {
            map.insert("serverTick".to_string(), serde_json::json!(server_tick));
        }

        if !want_delta {
            self.last_by_player.insert(player_id.to_string(), snapshot.clone());
            let mut out = snapshot;
            if let Value::Object(ref mut map) = out {
                map.insert("mode".to_string(), serde_json::json!("full"));
            }
            return out;
        }

        let Some(prev) = self.last_by_player.get(player_id).cloned() else {
            self.last_by_player.insert(player_id.to_string(), snapshot.clone());
            let mut out = snapshot;
            if let Value::Object(ref mut map) = out {
                map.insert("mode".to_string(), serde_json::json!("full"));
            }
            return out;
        };

        let empty = serde_json::json!({});
        let you_delta = diff_fields(prev.get("you").unwrap_or(&empty), snapshot.get("you").unwrap_or(&empty), YOU_DIFF_FIELDS);

        let delta = serde_json::json!({
            "mode": "delta",
            "serverTick": server_tick,
            "baseTick": prev.get("serverTick"),
            "you": you_delta,
            "others": snapshot.get("others").cloned().unwrap_or_else(|| serde_json::json!([])),
            "projectiles": snapshot.get("projectiles").cloned().unwrap_or_else(|| serde_json::json!([])),
            "pickups": snapshot.get("pickups").cloned().unwrap_or_else(|| serde_json::json!([])),
            "events": snapshot.get("events").cloned().unwrap_or_else(|| serde_json::json!([])),
        });

        self.last_by_player.insert(player_id.to_string(), snapshot);
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_snapshot_is_always_full() {
        let mut cache = SnapshotCache::new();
        let snap = serde_json::json!({"you": {"hp": 100}, "others": []});
        let out = cache.make("p1", 1, snap, true);
        assert_eq!(out["mode"], "full");
    }

    #[test]
    fn want_delta_false_always_returns_full() {
        let mut cache = SnapshotCache::new();
        cache.make("p1", 1, serde_json::json!({"you": {"hp": 100}}), true);
        let out = cache.make("p1", 2, serde_json::json!({"you": {"hp": 90}}), false);
        assert_eq!(out["mode"], "full");
    }

    #[test]
    fn delta_only_contains_changed_you_fields() {
        let mut cache = SnapshotCache::new();
        cache.make("p1", 1, serde_json::json!({"you": {"hp": 100, "armor": 50}}), true);
        let out = cache.make("p1", 2, serde_json::json!({"you": {"hp": 80, "armor": 50}}), true);
        assert_eq!(out["mode"], "delta");
        assert_eq!(out["you"]["hp"], 80);
        assert!(out["you"].get("armor").is_none());
        assert_eq!(out["baseTick"], 1);
    }

    #[test]
    fn clear_forces_a_fresh_full_snapshot() {
        let mut cache = SnapshotCache::new();
        cache.make("p1", 1, serde_json::json!({"you": {"hp": 100}}), true);
        cache.clear("p1");
        let out = cache.make("p1", 2, serde_json::json!({"you": {"hp": 100}}), true);
        assert_eq!(out["mode"], "full");
    }
}
