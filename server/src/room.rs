//! Room lifecycle: entity ownership, tick orchestration, event queues,
//! snapshot assembly (§4.11). Grounded in `original_source/server/game/room.py`.
//!
//! Systems operate on a `&mut Room` by entity id, never by back-pointer —
//! `Room` owns every entity directly in a map keyed by its stable id.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::Value;
use shared::world::{Aabb, PickupKind, Vec3};
use shared::{MapData, PlayerCommand, ServerConfig};

use crate::bots::{self, BotState};
use crate::nav::GridNav;
use crate::persistence::PersistenceStore;
use crate::{damage, movement, pickups, projectiles, scoring, weapons};

pub type PlayerId = String;
pub type ProjectileId = String;
pub type PickupId = String;

#[derive(Debug, Clone)]
pub struct Player {
    pub player_id: PlayerId,
    pub name: String,
    pub pos: Vec3,
    pub vel: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub hp: f32,
    pub armor: f32,
    pub weapon_id: String,
    pub ammo: HashMap<String, u32>,
    pub alive: bool,
    pub respawn_at: f32,
    pub last_input_seq: i64,
    pub last_cmd: PlayerCommand,
    pub last_fire_at: f32,
    pub reloading_until: f32,
    pub on_ground: bool,
    pub kills: u32,
    pub deaths: u32,
    pub score: i64,
}

impl Player {
    pub fn is_bot(&self) -> bool {
        self.player_id.starts_with("bot_")
    }
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub projectile_id: ProjectileId,
    pub owner_id: PlayerId,
    pub weapon_id: String,
    pub pos: Vec3,
    pub vel: Vec3,
    pub radius: f32,
    pub ttl: f32,
}

#[derive(Debug, Clone)]
pub struct Pickup {
    pub pickup_id: PickupId,
    pub kind: PickupKind,
    pub pos: Vec3,
    pub available: bool,
    pub respawn_at: f32,
}

/// One room event. `payload` stays a loosely-typed JSON value since the wire
/// shape varies per event type (§6 "Event types on the wire").
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

impl Event {
    pub fn new(kind: &str, payload: Value) -> Self {
        Event {
            kind: kind.to_string(),
            payload,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room is full")]
    Full,
}

pub struct Room {
    pub room_id: String,
    pub map_id: String,
    pub config: Arc<ServerConfig>,
    pub persistence: Arc<dyn PersistenceStore>,

    pub map: MapData,
    pub seed: u32,
    pub rng: StdRng,
    pub nav: GridNav,

    pub players: HashMap<PlayerId, Player>,
    pub projectiles: HashMap<ProjectileId, Projectile>,
    pub pickups: HashMap<PickupId, Pickup>,
    pub bots: Vec<PlayerId>,
    pub bot_state: HashMap<PlayerId, BotState>,

    pub events: Vec<Event>,
    pub events_for: HashMap<PlayerId, Vec<Event>>,

    pub t: f32,
    pub server_tick: u64,

    pub round_active: bool,
    pub round_started_at: f32,
    pub round_ends_at: f32,
    pub reset_at: f32,
}

impl Room {
    pub fn new(
        room_id: String,
        map_id: String,
        map: MapData,
        config: Arc<ServerConfig>,
        persistence: Arc<dyn PersistenceStore>,
    ) -> Self {
        let seed: u32 = rand::random::<u32>().max(1);
        let rng = StdRng::seed_from_u64(seed as u64);
        let nav = GridNav::build(&map.bounds, &map.colliders, 1.0, config.player_radius);

        let mut room = Room {
            room_id,
            map_id,
            config,
            persistence,
            map,
            seed,
            rng,
            nav,
            players: HashMap::new(),
            projectiles: HashMap::new(),
            pickups: HashMap::new(),
            bots: Vec::new(),
            bot_state: HashMap::new(),
            events: Vec::new(),
            events_for: HashMap::new(),
            t: 0.0,
            server_tick: 0,
            round_active: false,
            round_started_at: 0.0,
            round_ends_at: 0.0,
            reset_at: 0.0,
        };
        room.init_pickups();
        room.ensure_bots();
        room
    }

    pub fn player_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_bot()).count()
    }

    fn init_pickups(&mut self) {
        for (i, def) in self.map.pickups.iter().enumerate() {
            let id = def
                .pickup_id
                .clone()
                .unwrap_or_else(|| format!("pickup_{i}_{:06x}", rand::random::<u32>() & 0xFFFFFF));
            self.pickups.insert(
                id.clone(),
                Pickup {
                    pickup_id: id,
                    kind: def.kind,
                    pos: Vec3::from_array(def.pos),
                    available: true,
                    respawn_at: 0.0,
                },
            );
        }
    }

    fn ensure_bots(&mut self) {
        if !self.config.bots_enabled {
            return;
        }
        let max_bots = (self.config.bot_count).min(self.config.max_players_per_room.saturating_sub(1));
        while self.bots.len() < max_bots {
            let bot_id = format!("bot_{:08x}", rand::random::<u32>());
            let name = format!("Bot {}", self.bots.len() + 1);
            self.bots.push(bot_id.clone());
            self.spawn_player(bot_id, name);
        }
    }

    fn pick_spawn(&mut self) -> Vec3 {
        self.map
            .spawns
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Vec3::ZERO)
    }

    fn spawn_player(&mut self, player_id: PlayerId, name: String) -> &Player {
        let spawn = self.pick_spawn();
        let mut ammo = HashMap::new();
        for (wid, spec) in self.config.weapons.iter() {
            ammo.insert(wid.clone(), spec.max_ammo);
        }
        let player = Player {
            player_id: player_id.clone(),
            name,
            pos: spawn,
            vel: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            hp: 100.0,
            armor: 0.0,
            weapon_id: "pistol".to_string(),
            ammo,
            alive: true,
            respawn_at: 0.0,
            last_input_seq: -1,
            last_cmd: PlayerCommand::default(),
            last_fire_at: -999.0,
            reloading_until: 0.0,
            on_ground: false,
            kills: 0,
            deaths: 0,
            score: 0,
        };
        self.players.insert(player_id.clone(), player);
        self.players.get(&player_id).unwrap()
    }

    pub fn add_player(&mut self, player_id: PlayerId, name: String) -> Result<(), RoomError> {
        if self.players.contains_key(&player_id) {
            return Ok(());
        }
        if self.players.len() >= self.config.max_players_per_room {
            return Err(RoomError::Full);
        }
        self.spawn_player(player_id.clone(), name.clone());
        self.push_event("join", serde_json::json!({"playerId": player_id, "name": name}));
        if !self.round_active {
            self.start_round();
        }
        Ok(())
    }

    pub fn remove_player(&mut self, player_id: &str) {
        if let Some(p) = self.players.remove(player_id) {
            info!("player {} left room {}", player_id, self.room_id);
            self.push_event("leave", serde_json::json!({"playerId": p.player_id, "name": p.name}));
        }
    }

    fn start_round(&mut self) {
        self.round_active = true;
        self.round_started_at = 0.0;
        self.round_ends_at = self.config.round_time_sec;
        self.push_event(
            "round_start",
            serde_json::json!({"roomId": self.room_id, "mapId": self.map_id}),
        );
    }

    pub fn queue_event_for(&mut self, player_id: &str, kind: &str, payload: Value) {
        self.events_for
            .entry(player_id.to_string())
            .or_default()
            .push(Event::new(kind, payload));
    }

    pub fn push_event(&mut self, kind: &str, payload: Value) {
        self.events.push(Event::new(kind, payload));
    }

    /// Overwrites the player's last command; the tick reads it, never the
    /// net edge (§3 "mutated only by the simulation tick").
    pub fn apply_input(&mut self, player_id: &str, cmd: PlayerCommand) {
        if let Some(p) = self.players.get_mut(player_id) {
            p.last_cmd = cmd;
        }
    }

    pub fn step(&mut self, server_tick: u64, dt: f32) {
        self.server_tick = server_tick;
        self.t += dt;

        bots::step_bots(self, dt);
        movement::step_movement(self, dt);
        weapons::step_weapons(self, dt);
        projectiles::step_projectiles(self, dt);
        pickups::step_pickups(self, dt);
        scoring::step_scoring(self, dt);

        let bmin = self.map.bounds.min;
        let bmax = self.map.bounds.max;
        for p in self.players.values_mut() {
            p.pos.x = p.pos.x.clamp(bmin.x, bmax.x);
            p.pos.z = p.pos.z.clamp(bmin.z, bmax.z);
        }
    }

    pub fn respawn_player(&mut self, player_id: &str) {
        let spawn = self.pick_spawn();
        if let Some(p) = self.players.get_mut(player_id) {
            p.pos = spawn;
            p.vel = Vec3::ZERO;
            p.hp = 100.0;
            p.armor = 0.0;
            p.alive = true;
            p.respawn_at = 0.0;
            p.reloading_until = 0.0;
            p.on_ground = false;
        }
        self.push_event("respawn", serde_json::json!({"playerId": player_id}));
    }

    /// Builds the full per-player payload (§4.11/§6). Draining of the
    /// per-player directed queue happens here; the global queue is drained
    /// once by the caller before calling this for every recipient (§9
    /// "directed vs global events").
    pub fn snapshot_for(&mut self, player_id: &str, global_events: &[Event]) -> Value {
        let Some(you) = self.players.get(player_id) else {
            return serde_json::json!({});
        };

        let others: Vec<Value> = self
            .players
            .iter()
            .filter(|(pid, _)| pid.as_str() != player_id)
            .map(|(_, p)| {
                serde_json::json!({
                    "playerId": p.player_id,
                    "name": p.name,
                    "pos": p.pos.to_array(),
                    "vel": p.vel.to_array(),
                    "yaw": p.yaw,
                    "pitch": p.pitch,
                    "hp": p.hp,
                    "armor": p.armor,
                    "weaponId": p.weapon_id,
                    "alive": p.alive,
                    "kills": p.kills,
                    "deaths": p.deaths,
                    "score": p.score,
                })
            })
            .collect();

        let projectiles: Vec<Value> = self
            .projectiles
            .values()
            .map(|pr| {
                serde_json::json!({
                    "projectileId": pr.projectile_id,
                    "ownerId": pr.owner_id,
                    "weaponId": pr.weapon_id,
                    "pos": pr.pos.to_array(),
                    "vel": pr.vel.to_array(),
                    "radius": pr.radius,
                })
            })
            .collect();

        let pickups: Vec<Value> = self
            .pickups
            .values()
            .map(|pk| {
                serde_json::json!({
                    "pickupId": pk.pickup_id,
                    "kind": pk.kind.to_string(),
                    "pos": pk.pos.to_array(),
                    "available": pk.available,
                })
            })
            .collect();

        let mut events: Vec<Value> = global_events
            .iter()
            .map(|e| serde_json::json!({"type": e.kind, "payload": e.payload}))
            .collect();
        if let Some(directed) = self.events_for.remove(player_id) {
            events.extend(directed.iter().map(|e| serde_json::json!({"type": e.kind, "payload": e.payload})));
        }

        let ammo = *you.ammo.get(&you.weapon_id).unwrap_or(&0);
        serde_json::json!({
            "you": {
                "playerId": you.player_id,
                "pos": you.pos.to_array(),
                "vel": you.vel.to_array(),
                "yaw": you.yaw,
                "pitch": you.pitch,
                "hp": you.hp,
                "armor": you.armor,
                "weaponId": you.weapon_id,
                "ammo": ammo,
                "alive": you.alive,
                "kills": you.kills,
                "deaths": you.deaths,
                "score": you.score,
                "lastSeq": you.last_input_seq,
                "cmd": {
                    "moveX": you.last_cmd.move_x,
                    "moveY": you.last_cmd.move_y,
                    "sprint": you.last_cmd.sprint,
                    "jump": you.last_cmd.jump,
                },
            },
            "others": others,
            "projectiles": projectiles,
            "pickups": pickups,
            "events": events,
        })
    }

    /// Takes the global event queue, leaving it empty for the next wave.
    pub fn take_global_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn colliders(&self) -> &[Aabb] {
        &self.map.colliders
    }
}
