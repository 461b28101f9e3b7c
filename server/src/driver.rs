//! Tick accumulator loop and the `Hub` that owns every room behind a mutex
//! (§5/§2.14).
//!
//! Grounded in `original_source/server/app.py`'s `GameService._tick_loop`
//! and the teacher's `network::Server::run` (background tasks driven by
//! `tokio::time::interval`/channels rather than a blocking loop).
//! `apply_input`/`add_player`/`remove_player` are the only doors the net
//! edge may use on simulation-owned state; everything else routes through
//! `Hub` methods that take the room lock for exactly as long as they need
//! it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use shared::protocol::{self, PlayerCommand};
use shared::{MapData, ServerConfig};

use crate::net::snapshot::SnapshotCache;
use crate::persistence::PersistenceStore;
use crate::room::{Room, RoomError};

pub struct JoinInfo {
    pub room_id: String,
    pub seed: u32,
    pub map_id: String,
}

#[derive(Debug)]
pub enum JoinError {
    Full,
    NoSuchRoom,
}

struct ConnEntry {
    player_id: String,
    room_id: Option<String>,
    want_deltas: bool,
    sender: mpsc::UnboundedSender<Message>,
}

/// Owns every room in the process, guarded by a single async mutex —
/// matching the teacher's `Arc<RwLock<ClientManager>>` pattern, simplified
/// to a `Mutex` since rooms are mutated on every tick regardless of reads.
pub struct Hub {
    pub config: Arc<ServerConfig>,
    maps: Arc<HashMap<String, MapData>>,
    persistence: Arc<dyn PersistenceStore>,
    rooms: Mutex<HashMap<String, Room>>,
    conns: Mutex<HashMap<String, ConnEntry>>,
    snapshot_cache: Mutex<SnapshotCache>,
    tick: AtomicU64,
}

impl Hub {
    pub fn new(config: Arc<ServerConfig>, maps: Arc<HashMap<String, MapData>>, persistence: Arc<dyn PersistenceStore>) -> Arc<Self> {
        Arc::new(Hub {
            config,
            maps,
            persistence,
            rooms: Mutex::new(HashMap::new()),
            conns: Mutex::new(HashMap::new()),
            snapshot_cache: Mutex::new(SnapshotCache::new()),
            tick: AtomicU64::new(0),
        })
    }

    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    pub async fn register_conn(&self, conn_id: &str, player_id: &str, sender: mpsc::UnboundedSender<Message>) {
        let info = json!({
            "serverVersion": self.config.server_version,
            "protocolVersion": self.config.protocol_version,
            "simulationHz": self.config.simulation_hz,
            "snapshotHz": self.config.snapshot_hz,
        });
        let _ = sender.send(Message::Text(protocol::dumps("info", &json!({"server": info}))));
        self.conns.lock().await.insert(
            conn_id.to_string(),
            ConnEntry {
                player_id: player_id.to_string(),
                room_id: None,
                want_deltas: true,
                sender,
            },
        );
    }

    /// Idempotent disconnect: removes the player from its room (if any) and
    /// drops the snapshot cache entry, mirroring `WsHub._disconnect`.
    pub async fn unregister_conn(&self, conn_id: &str) {
        let entry = self.conns.lock().await.remove(conn_id);
        let Some(entry) = entry else { return };
        if let Some(room_id) = entry.room_id {
            if let Some(room) = self.rooms.lock().await.get_mut(&room_id) {
                room.remove_player(&entry.player_id);
            }
        }
        self.snapshot_cache.lock().await.clear(&entry.player_id);
    }

    fn default_map(&self) -> (String, MapData) {
        let id = self.config.default_map_id.clone();
        let map = self.maps.get(&id).cloned().unwrap_or_else(|| {
            self.maps.values().next().cloned().expect("at least one map must be configured")
        });
        (id, map)
    }

    async fn get_or_create_room(&self, room_id: &str) -> Result<(), JoinError> {
        let mut rooms = self.rooms.lock().await;
        if rooms.contains_key(room_id) {
            return Ok(());
        }
        if rooms.len() >= self.config.max_rooms {
            return Err(JoinError::Full);
        }
        let (map_id, map) = self.default_map();
        let room = Room::new(room_id.to_string(), map_id, map, self.config.clone(), self.persistence.clone());
        info!("created room {room_id}");
        rooms.insert(room_id.to_string(), room);
        Ok(())
    }

    async fn matchmake(&self) -> Result<String, JoinError> {
        {
            let rooms = self.rooms.lock().await;
            for room in rooms.values() {
                if room.player_count() < self.config.max_players_per_room {
                    return Ok(room.room_id.clone());
                }
            }
        }
        let room_id = format!("{:08x}", rand::random::<u32>());
        self.get_or_create_room(&room_id).await?;
        Ok(room_id)
    }

    pub async fn room_exists(&self, room_id: &str) -> bool {
        self.rooms.lock().await.contains_key(room_id)
    }

    pub async fn join(
        &self,
        conn_id: &str,
        player_id: &str,
        player_name: &str,
        room_id_hint: Option<String>,
        matchmake: bool,
    ) -> Result<JoinInfo, JoinError> {
        let room_id = if matchmake || room_id_hint.is_none() {
            self.matchmake().await?
        } else {
            let room_id = room_id_hint.unwrap();
            self.get_or_create_room(&room_id).await?;
            room_id
        };

        let mut rooms = self.rooms.lock().await;
        let room = rooms.get_mut(&room_id).ok_or(JoinError::NoSuchRoom)?;
        room.add_player(player_id.to_string(), player_name.to_string()).map_err(|e| match e {
            RoomError::Full => JoinError::Full,
        })?;
        let info = JoinInfo {
            room_id: room_id.clone(),
            seed: room.seed,
            map_id: room.map_id.clone(),
        };
        drop(rooms);

        self.snapshot_cache.lock().await.clear(player_id);
        if let Some(entry) = self.conns.lock().await.get_mut(conn_id) {
            entry.room_id = Some(room_id);
            entry.want_deltas = false;
        }
        Ok(info)
    }

    pub async fn push_chat(&self, room_id: &str, from: &str, text: &str) {
        if let Some(room) = self.rooms.lock().await.get_mut(room_id) {
            room.push_event("chat", json!({"from": from, "text": text}));
        }
    }

    /// The stale/out-of-order input window from `ws.py`: a `seq` at or
    /// behind `lastInputSeq - input_seq_window`, or not strictly newer than
    /// `lastInputSeq`, is silently dropped (§9, tested per §8 scenario 5).
    pub async fn submit_input(&self, room_id: &str, player_id: &str, seq: i64, cmd: PlayerCommand) {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(room_id) else { return };
        let Some(player) = room.players.get(player_id) else { return };
        let window = self.config.input_seq_window as i64;
        if seq <= player.last_input_seq - window {
            return;
        }
        if seq <= player.last_input_seq {
            return;
        }
        room.players.get_mut(player_id).unwrap().last_input_seq = seq;
        room.apply_input(player_id, cmd);
    }

    /// Runs the fixed-timestep accumulator loop until the process exits.
    /// Spiral-of-death capped at 0.25s of banked time (§5).
    pub async fn run_tick_loop(self: Arc<Self>) {
        let tick_dt = 1.0 / self.config.simulation_hz as f32;
        let snap_every = (self.config.simulation_hz as f64 / self.config.snapshot_hz as f64).round().max(1.0) as u64;

        let mut last = tokio::time::Instant::now();
        let mut acc: f32 = 0.0;

        loop {
            let now = tokio::time::Instant::now();
            acc += (now - last).as_secs_f32();
            last = now;

            if acc > 0.25 {
                acc = 0.25;
            }

            let mut stepped = false;
            while acc >= tick_dt {
                acc -= tick_dt;
                let tick = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
                stepped = true;

                {
                    let mut rooms = self.rooms.lock().await;
                    for room in rooms.values_mut() {
                        room.step(tick, tick_dt);
                    }
                }

                if tick % snap_every == 0 {
                    self.broadcast_snapshots().await;
                }
            }

            if !stepped {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }

    async fn broadcast_snapshots(&self) {
        let mut rooms = self.rooms.lock().await;
        let conns = self.conns.lock().await;
        let tick = self.current_tick();
        let mut cache = self.snapshot_cache.lock().await;

        for room in rooms.values_mut() {
            let global_events = room.take_global_events();
            for conn in conns.values().filter(|c| c.room_id.as_deref() == Some(room.room_id.as_str())) {
                let snapshot = room.snapshot_for(&conn.player_id, &global_events);
                if snapshot == serde_json::json!({}) {
                    continue;
                }
                let full = json!({"roomId": room.room_id, "mapId": room.map_id, "seed": room.seed}).as_object().unwrap().clone();
                let mut merged = snapshot;
                if let serde_json::Value::Object(ref mut map) = merged {
                    for (k, v) in full {
                        map.insert(k, v);
                    }
                }
                let payload = cache.make(&conn.player_id, tick, merged, conn.want_deltas);
                let _ = conn.sender.send(Message::Text(protocol::dumps("snapshot", &payload)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    fn test_maps() -> Arc<HashMap<String, MapData>> {
        let json = r#"{
            "mapId": "m",
            "bounds": {"center": [0,0,0], "size": [60,10,60]},
            "spawns": [[0,0,0]]
        }"#;
        let mut maps = HashMap::new();
        maps.insert("m".to_string(), MapData::from_str("m", json).unwrap());
        Arc::new(maps)
    }

    fn test_hub() -> Arc<Hub> {
        let config = Arc::new(ServerConfig {
            bots_enabled: false,
            default_map_id: "m".to_string(),
            ..ServerConfig::default()
        });
        Hub::new(config, test_maps(), Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn join_creates_room_and_spawns_player() {
        let hub = test_hub();
        let info = hub.join("c1", "p1", "Alice", Some("room1".to_string()), false).await.unwrap();
        assert_eq!(info.room_id, "room1");
        assert_eq!(info.map_id, "m");
        assert!(hub.room_exists("room1").await);
    }

    #[tokio::test]
    async fn matchmake_reuses_room_with_capacity() {
        let hub = test_hub();
        let a = hub.join("c1", "p1", "A", None, true).await.unwrap();
        let b = hub.join("c2", "p2", "B", None, true).await.unwrap();
        assert_eq!(a.room_id, b.room_id);
    }

    #[tokio::test]
    async fn stale_input_outside_window_is_dropped() {
        let hub = test_hub();
        hub.join("c1", "p1", "A", Some("r".to_string()), false).await.unwrap();
        hub.submit_input("r", "p1", 500, PlayerCommand::default()).await;
        hub.submit_input("r", "p1", 10, PlayerCommand { yaw: 1.0, ..PlayerCommand::default() }).await;

        let rooms = hub.rooms.lock().await;
        let yaw = rooms["r"].players["p1"].last_cmd.yaw;
        assert_ne!(yaw, 1.0, "seq far behind the window must be ignored");
    }

    #[tokio::test]
    async fn non_increasing_seq_is_dropped() {
        let hub = test_hub();
        hub.join("c1", "p1", "A", Some("r".to_string()), false).await.unwrap();
        hub.submit_input("r", "p1", 5, PlayerCommand { yaw: 1.0, ..PlayerCommand::default() }).await;
        hub.submit_input("r", "p1", 5, PlayerCommand { yaw: 2.0, ..PlayerCommand::default() }).await;

        let rooms = hub.rooms.lock().await;
        assert_eq!(rooms["r"].players["p1"].last_cmd.yaw, 1.0);
    }
}
