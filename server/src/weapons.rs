//! Fire-rate gating, reload, hitscan, spread sampling (§4.5).
//!
//! Grounded in `original_source/server/game/systems/weapons.py`. The per-shot
//! RNG seed is deterministic (§9 "Determinism of spread") — a shared/global
//! RNG here would break reproducibility.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::config::WeaponFamily;
use shared::world::Vec3;

use crate::collision::{first_obstacle_hit, ray_sphere};
use crate::damage;
use crate::projectiles::spawn_rocket;
use crate::room::Room;

/// FNV-1a over the id's bytes, truncated to 32 bits. Deliberately not
/// `std::collections::hash_map::DefaultHasher` (SipHash), whose seed is
/// randomized per process and would break cross-run reproducibility.
fn fnv1a_u32(s: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in s.as_bytes() {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

fn shot_seed(map_seed: u32, player_id: &str, server_tick: u64) -> u32 {
    let tick_term = (server_tick as u32).wrapping_mul(2_654_435_761);
    map_seed ^ fnv1a_u32(player_id) ^ tick_term
}

fn dir_from_yaw_pitch(yaw: f32, pitch: f32) -> Vec3 {
    let sy = yaw.sin();
    let cy = yaw.cos();
    let cp = pitch.cos();
    let sp = pitch.sin();
    Vec3::new(-sy * cp, -sp, -cy * cp).norm()
}

fn apply_spread(base_dir: Vec3, spread_rad: f32, rng: &mut StdRng) -> Vec3 {
    if spread_rad <= 0.0 {
        return base_dir;
    }
    let up = if base_dir.y.abs() < 0.95 {
        Vec3::new(0.0, 1.0, 0.0)
    } else {
        Vec3::new(1.0, 0.0, 0.0)
    };
    let u = up.cross(base_dir).norm();
    let v = base_dir.cross(u).norm();

    let theta = 2.0 * std::f32::consts::PI * rng.gen::<f32>();
    let cos_max = spread_rad.cos();
    let cos_a = 1.0 - rng.gen::<f32>() * (1.0 - cos_max);
    let sin_a = (1.0 - cos_a * cos_a).max(0.0).sqrt();

    let tangent = Vec3::new(
        u.x * theta.cos() + v.x * theta.sin(),
        u.y * theta.cos() + v.y * theta.sin(),
        u.z * theta.cos() + v.z * theta.sin(),
    );
    let d = Vec3::new(
        base_dir.x * cos_a + tangent.x * sin_a,
        base_dir.y * cos_a + tangent.y * sin_a,
        base_dir.z * cos_a + tangent.z * sin_a,
    );
    d.norm()
}

fn hitscan(room: &mut Room, shooter_id: &str, origin: Vec3, direction: Vec3, weapon_id: &str) {
    let spec = room.config.weapon(weapon_id).clone();
    let player_radius = room.config.player_radius;

    let t_wall = first_obstacle_hit(origin, direction, room.colliders(), spec.range);
    let max_t = t_wall.unwrap_or(spec.range);

    let mut best: Option<(f32, String, bool)> = None;
    for (pid, p) in room.players.iter() {
        if pid == shooter_id || !p.alive {
            continue;
        }
        let body_center = p.pos.with_y(p.pos.y + 0.9);
        let head_center = p.pos.with_y(p.pos.y + 1.55);
        let body_t = ray_sphere(origin, direction, body_center, player_radius);
        let head_t = ray_sphere(origin, direction, head_center, player_radius * 0.55);

        let (t, head) = match (head_t, body_t) {
            (Some(ht), Some(bt)) if bt < ht => (bt, false),
            (Some(ht), _) => (ht, true),
            (None, Some(bt)) => (bt, false),
            (None, None) => continue,
        };

        if t > max_t {
            continue;
        }
        if best.as_ref().map_or(true, |(bt, _, _)| t < *bt) {
            best = Some((t, pid.clone(), head));
        }
    }

    if let Some((t, victim_id, headshot)) = best {
        let hit_pos = Vec3::new(origin.x + direction.x * t, origin.y + direction.y * t, origin.z + direction.z * t);
        damage::apply_damage(room, shooter_id, &victim_id, spec.damage, headshot, Some(hit_pos));
        room.push_event(
            "hit",
            serde_json::json!({"attackerId": shooter_id, "victimId": victim_id, "weaponId": weapon_id, "headshot": headshot}),
        );
    } else {
        room.push_event("miss", serde_json::json!({"attackerId": shooter_id, "weaponId": weapon_id}));
    }
}

pub fn step_weapons(room: &mut Room, _dt: f32) {
    let now = room.t;
    let map_seed = room.seed;
    let server_tick = room.server_tick;

    let player_ids: Vec<String> = room.players.keys().cloned().collect();
    for pid in player_ids {
        let Some(p) = room.players.get(&pid) else { continue };
        if !p.alive {
            continue;
        }

        let want_weapon = p.last_cmd.weapon_id.clone();
        if room.config.weapons.contains_key(&want_weapon) {
            room.players.get_mut(&pid).unwrap().weapon_id = want_weapon;
        }

        let p = room.players.get(&pid).unwrap();
        let spec = room.config.weapon(&p.weapon_id).clone();

        if p.reloading_until > 0.0 && now >= p.reloading_until {
            let max_ammo = spec.max_ammo;
            let weapon_id = p.weapon_id.clone();
            let pm = room.players.get_mut(&pid).unwrap();
            pm.ammo.insert(weapon_id.clone(), max_ammo);
            pm.reloading_until = 0.0;
            room.queue_event_for(&pid, "reload_done", serde_json::json!({"weaponId": weapon_id}));
        }

        let p = room.players.get(&pid).unwrap();
        let reload_requested = p.last_cmd.reload;
        let reloading = p.reloading_until > 0.0;
        let cur_ammo = *p.ammo.get(&p.weapon_id).unwrap_or(&0);

        if reload_requested && !reloading {
            if cur_ammo < spec.max_ammo {
                let weapon_id = p.weapon_id.clone();
                let until = now + spec.reload_sec;
                let pm = room.players.get_mut(&pid).unwrap();
                pm.reloading_until = until;
                room.queue_event_for(&pid, "reload", serde_json::json!({"weaponId": weapon_id}));
            }
            continue;
        }
        if reloading {
            continue;
        }

        let p = room.players.get(&pid).unwrap();
        if !p.last_cmd.fire {
            continue;
        }
        let ammo = *p.ammo.get(&p.weapon_id).unwrap_or(&0);
        if ammo == 0 {
            continue;
        }

        let delay = 1.0 / spec.fire_rate.max(0.1);
        if (now - p.last_fire_at) < delay {
            continue;
        }

        let weapon_id = p.weapon_id.clone();
        let yaw = p.yaw;
        let pitch = p.pitch;
        let eye_pos = p.pos.with_y(p.pos.y + room.config.eye_height);

        let pm = room.players.get_mut(&pid).unwrap();
        pm.last_fire_at = now;
        let new_ammo = ammo - 1;
        pm.ammo.insert(weapon_id.clone(), new_ammo);

        let seed = shot_seed(map_seed, &pid, server_tick);
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let base_dir = dir_from_yaw_pitch(yaw, pitch);

        match spec.family {
            WeaponFamily::Hitscan => {
                for _ in 0..spec.pellets {
                    let d = apply_spread(base_dir, spec.spread_rad, &mut rng);
                    hitscan(room, &pid, eye_pos, d, &weapon_id);
                }
            }
            WeaponFamily::Projectile => {
                spawn_rocket(room, &pid, eye_pos, base_dir, &weapon_id);
            }
        }

        room.queue_event_for(&pid, "fire", serde_json::json!({"weaponId": weapon_id}));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::room::Room;
    use shared::{MapData, ServerConfig};
    use std::sync::Arc;

    fn open_room() -> Room {
        let json = r#"{
            "mapId": "m",
            "bounds": {"center": [0,0,0], "size": [100,10,100]},
            "spawns": [[0,0,0]]
        }"#;
        let map = MapData::from_str("m", json).unwrap();
        let config = Arc::new(ServerConfig {
            bots_enabled: false,
            ..ServerConfig::default()
        });
        Room::new("r".into(), "m".into(), map, config, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn shot_seed_is_deterministic_for_same_inputs() {
        let a = shot_seed(7, "player-1", 42);
        let b = shot_seed(7, "player-1", 42);
        assert_eq!(a, b);
    }

    #[test]
    fn shot_seed_differs_across_ticks() {
        let a = shot_seed(7, "player-1", 42);
        let b = shot_seed(7, "player-1", 43);
        assert_ne!(a, b);
    }

    #[test]
    fn fire_rate_gates_successive_shots() {
        let mut room = open_room();
        room.add_player("p1".into(), "A".into()).unwrap();
        room.add_player("p2".into(), "B".into()).unwrap();
        room.players.get_mut("p2").unwrap().pos = Vec3::new(0.0, 0.0, -10.0);

        {
            let p = room.players.get_mut("p1").unwrap();
            p.last_cmd.fire = true;
            p.last_cmd.yaw = 0.0;
        }
        room.t = 0.0;
        step_weapons(&mut room, 0.0);
        let ammo_after_first = *room.players["p1"].ammo.get("pistol").unwrap();
        assert_eq!(ammo_after_first, 11);

        room.t = 0.2;
        step_weapons(&mut room, 0.0);
        let ammo_after_second = *room.players["p1"].ammo.get("pistol").unwrap();
        assert_eq!(ammo_after_second, 11, "0.2s < 1/3s fire-rate interval");

        room.t = 0.34;
        step_weapons(&mut room, 0.0);
        let ammo_after_third = *room.players["p1"].ammo.get("pistol").unwrap();
        assert_eq!(ammo_after_third, 10);
    }

    #[test]
    fn reload_refills_after_duration_elapses() {
        let mut room = open_room();
        room.add_player("p1".into(), "A".into()).unwrap();
        room.players.get_mut("p1").unwrap().ammo.insert("pistol".to_string(), 3);
        room.players.get_mut("p1").unwrap().last_cmd.reload = true;
        room.t = 0.0;
        step_weapons(&mut room, 0.0);
        assert!(room.players["p1"].reloading_until > 0.0);

        room.players.get_mut("p1").unwrap().last_cmd.reload = false;
        room.t = room.config.weapon("pistol").reload_sec + 0.01;
        step_weapons(&mut room, 0.0);
        assert_eq!(room.players["p1"].ammo["pistol"], room.config.weapon("pistol").max_ammo);
        assert_eq!(room.players["p1"].reloading_until, 0.0);
    }

    #[test]
    fn shotgun_pellets_cost_one_ammo_per_trigger_pull() {
        let mut room = open_room();
        room.add_player("p1".into(), "A".into()).unwrap();
        {
            let p = room.players.get_mut("p1").unwrap();
            p.weapon_id = "shotgun".to_string();
            p.last_cmd.weapon_id = "shotgun".to_string();
            p.last_cmd.fire = true;
        }
        let before = room.players["p1"].ammo["shotgun"];
        step_weapons(&mut room, 0.0);
        let after = room.players["p1"].ammo["shotgun"];
        assert_eq!(before - after, 1);
    }
}
