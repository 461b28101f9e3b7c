//! Tickrates, caps, weapon specs.
//!
//! Grounded in `original_source/server/game/config.py`. Loading from
//! environment/disk is an external concern (§1/§6) — this module only
//! carries the populated data types and their documented defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponFamily {
    Hitscan,
    Projectile,
}

/// Static stats for one weapon. Immutable once loaded into a `ServerConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponSpec {
    pub weapon_id: String,
    pub family: WeaponFamily,
    pub damage: f32,
    pub fire_rate: f32,
    pub spread_rad: f32,
    pub pellets: u32,
    pub range: f32,
    pub max_ammo: u32,
    pub reload_sec: f32,
    pub projectile_speed: f32,
    pub projectile_radius: f32,
    pub explosion_radius: f32,
}

impl WeaponSpec {
    fn hitscan(weapon_id: &str, damage: f32, fire_rate: f32, spread_rad: f32) -> Self {
        WeaponSpec {
            weapon_id: weapon_id.to_string(),
            family: WeaponFamily::Hitscan,
            damage,
            fire_rate,
            spread_rad,
            pellets: 1,
            range: 100.0,
            max_ammo: 30,
            reload_sec: 2.0,
            projectile_speed: 0.0,
            projectile_radius: 0.25,
            explosion_radius: 0.0,
        }
    }
}

/// Movement acceleration/speed caps, matching `MovementCaps` in config.py.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MovementCaps {
    pub accel: f32,
    pub max_speed_walk: f32,
    pub max_speed_sprint: f32,
    pub friction: f32,
    pub gravity: f32,
    pub jump_speed: f32,
    pub air_control: f32,
}

impl Default for MovementCaps {
    fn default() -> Self {
        MovementCaps {
            accel: 45.0,
            max_speed_walk: 6.0,
            max_speed_sprint: 9.0,
            friction: 14.0,
            gravity: 22.0,
            jump_speed: 8.5,
            air_control: 0.35,
        }
    }
}

/// Populated server configuration. External loaders (env/disk) construct
/// this and hand it to the core; the core never reads the environment
/// itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server_version: String,
    pub protocol_version: u32,

    pub host: String,
    pub port: u16,
    pub cors_allow_all: bool,
    pub cors_allowed_origins: Vec<String>,

    pub simulation_hz: u32,
    pub snapshot_hz: u32,

    pub max_rooms: usize,
    pub max_players_per_room: usize,
    pub default_map_id: String,
    pub kills_to_win: u32,
    pub round_time_sec: f32,
    pub respawn_sec: f32,

    pub input_seq_window: u32,
    pub max_dt: f32,

    pub player_radius: f32,
    pub player_height: f32,
    pub eye_height: f32,

    pub movement: MovementCaps,

    pub bots_enabled: bool,
    pub bot_count: usize,

    pub weapons: HashMap<String, WeaponSpec>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut weapons = HashMap::new();
        weapons.insert(
            "pistol".to_string(),
            WeaponSpec {
                max_ammo: 12,
                range: 80.0,
                reload_sec: 1.4,
                ..WeaponSpec::hitscan("pistol", 18.0, 3.0, 0.01)
            },
        );
        weapons.insert(
            "shotgun".to_string(),
            WeaponSpec {
                pellets: 8,
                max_ammo: 8,
                range: 35.0,
                reload_sec: 2.6,
                ..WeaponSpec::hitscan("shotgun", 8.0, 1.0, 0.10)
            },
        );
        weapons.insert(
            "rocket".to_string(),
            WeaponSpec {
                weapon_id: "rocket".to_string(),
                family: WeaponFamily::Projectile,
                damage: 95.0,
                fire_rate: 0.8,
                spread_rad: 0.0,
                pellets: 1,
                range: 120.0,
                max_ammo: 4,
                reload_sec: 3.2,
                projectile_speed: 22.0,
                projectile_radius: 0.18,
                explosion_radius: 3.0,
            },
        );

        ServerConfig {
            server_version: "0.1.0".to_string(),
            protocol_version: 1,

            host: "0.0.0.0".to_string(),
            port: 8765,
            cors_allow_all: true,
            cors_allowed_origins: Vec::new(),

            simulation_hz: 60,
            snapshot_hz: 30,

            max_rooms: 20,
            max_players_per_room: 16,
            default_map_id: "map01".to_string(),
            kills_to_win: 25,
            round_time_sec: 8.0 * 60.0,
            respawn_sec: 3.0,

            input_seq_window: 240,
            max_dt: 0.05,

            player_radius: 0.35,
            player_height: 1.75,
            eye_height: 1.55,

            movement: MovementCaps::default(),

            bots_enabled: true,
            bot_count: 4,

            weapons,
        }
    }
}

impl ServerConfig {
    /// Returns the spec for `weapon_id`, falling back to `pistol` for an
    /// unknown id (matches `ServerConfig.weapon` in config.py).
    pub fn weapon(&self, weapon_id: &str) -> &WeaponSpec {
        self.weapons
            .get(weapon_id)
            .unwrap_or_else(|| &self.weapons["pistol"])
    }
}
