//! In-memory runtime stats store (§2.15).
//!
//! Grounded in `original_source/server/storage/memory.py`. Leaderboard
//! ordering is `(score, kills)` descending, matching the source's sort key.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, serde::Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub kills: u32,
    pub deaths: u32,
    pub score: i64,
    pub updated_at: f64,
}

/// Durable-looking but process-local player stats. A room's win/loss
/// bookkeeping survives player reconnects within the process lifetime;
/// nothing is written to disk.
pub trait PersistenceStore: Send + Sync {
    fn upsert_player(&self, name: &str, kills: u32, deaths: u32, score: i64);
    fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry>;
}

pub struct MemoryStore {
    stats: Mutex<HashMap<String, LeaderboardEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { stats: Mutex::new(HashMap::new()) }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceStore for MemoryStore {
    fn upsert_player(&self, name: &str, kills: u32, deaths: u32, score: i64) {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0);
        let mut stats = self.stats.lock().unwrap();
        let entry = stats.entry(name.to_string()).or_insert_with(|| LeaderboardEntry {
            name: name.to_string(),
            kills: 0,
            deaths: 0,
            score: 0,
            updated_at: 0.0,
        });
        entry.kills = kills;
        entry.deaths = deaths;
        entry.score = score;
        entry.updated_at = now;
    }

    fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let stats = self.stats.lock().unwrap();
        let mut vals: Vec<LeaderboardEntry> = stats.values().cloned().collect();
        vals.sort_by(|a, b| (b.score, b.kills).cmp(&(a.score, a.kills)));
        vals.truncate(limit);
        vals
    }
}
