//! Target selection, pathing, stuck/wander, firing policy (§4.10).
//!
//! Grounded in `original_source/server/ai/behavior.py`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::world::Vec3;

use crate::collision::first_obstacle_hit;
use crate::room::Room;

const STUCK_DISPLACEMENT_EPS: f32 = 0.02;
const STUCK_THRESHOLD_SEC: f32 = 1.0;
const WANDER_DURATION_SEC: f32 = 1.6;
const WANDER_ATTEMPTS: u32 = 8;
const WANDER_MIN_RADIUS: f32 = 4.0;
const WANDER_MAX_RADIUS: f32 = 8.0;
const FIRE_RANGE_CAP: f32 = 28.0;

#[derive(Debug, Clone, Default)]
pub struct BotState {
    pub last_xz: (f32, f32),
    pub stuck: f32,
    pub wander: Option<(f32, f32)>,
    pub wander_until: f32,
}

fn fnv1a_u32(s: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in s.as_bytes() {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

pub fn step_bots(room: &mut Room, dt: f32) {
    let bot_ids = room.bots.clone();
    for bot_id in bot_ids {
        step_one_bot(room, &bot_id, dt);
    }
}

fn step_one_bot(room: &mut Room, bot_id: &str, dt: f32) {
    let Some(bot) = room.players.get(bot_id) else { return };
    if !bot.alive {
        if bot.respawn_at > 0.0 && room.t >= bot.respawn_at {
            room.respawn_player(bot_id);
        }
        return;
    }
    let bot_pos = bot.pos;

    let state = room.bot_state.entry(bot_id.to_string()).or_insert_with(|| BotState {
        last_xz: (bot_pos.x, bot_pos.z),
        ..Default::default()
    });
    let moved = ((bot_pos.x - state.last_xz.0).powi(2) + (bot_pos.z - state.last_xz.1).powi(2)).sqrt();
    state.last_xz = (bot_pos.x, bot_pos.z);
    if moved < STUCK_DISPLACEMENT_EPS {
        state.stuck += dt;
    } else {
        state.stuck = 0.0;
    }

    let mut target_pos: Option<Vec3> = None;
    let mut target_dist2: Option<f32> = None;
    for (pid, p) in room.players.iter() {
        if pid == bot_id || !p.alive || pid.starts_with("bot_") {
            continue;
        }
        let dx = p.pos.x - bot_pos.x;
        let dz = p.pos.z - bot_pos.z;
        let d2 = dx * dx + dz * dz;
        if target_dist2.is_none() || d2 < target_dist2.unwrap() {
            target_dist2 = Some(d2);
            target_pos = Some(p.pos);
        }
    }
    if target_pos.is_none() {
        for (pid, p) in room.players.iter() {
            if pid == bot_id || !p.alive {
                continue;
            }
            let dx = p.pos.x - bot_pos.x;
            let dz = p.pos.z - bot_pos.z;
            let d2 = dx * dx + dz * dz;
            if target_dist2.is_none() || d2 < target_dist2.unwrap() {
                target_dist2 = Some(d2);
                target_pos = Some(p.pos);
            }
        }
    }

    let Some(target_pos) = target_pos else {
        let bm = room.players.get_mut(bot_id).unwrap();
        bm.last_cmd.move_x = 0.0;
        bm.last_cmd.move_y = 0.0;
        bm.last_cmd.fire = false;
        return;
    };

    let state = room.bot_state.get_mut(bot_id).unwrap();
    if state.stuck > STUCK_THRESHOLD_SEC && room.t >= state.wander_until {
        let seed = room.seed ^ fnv1a_u32(bot_id) ^ ((room.t * 10.0) as i64 as u32);
        let mut rng = StdRng::seed_from_u64(seed as u64);
        for _ in 0..WANDER_ATTEMPTS {
            let ang = rng.gen::<f32>() * std::f32::consts::TAU;
            let rad = WANDER_MIN_RADIUS + rng.gen::<f32>() * (WANDER_MAX_RADIUS - WANDER_MIN_RADIUS);
            let tx = bot_pos.x + ang.cos() * rad;
            let tz = bot_pos.z + ang.sin() * rad;
            let (dx0, dz0) = room.nav.next_direction(bot_pos, Vec3::new(tx, bot_pos.y, tz));
            if dx0 * dx0 + dz0 * dz0 > 0.01 {
                let state = room.bot_state.get_mut(bot_id).unwrap();
                state.wander = Some((tx, tz));
                state.wander_until = room.t + WANDER_DURATION_SEC;
                state.stuck = 0.0;
                break;
            }
        }
    }

    let state = room.bot_state.get(bot_id).unwrap();
    let wandering = state.wander.is_some() && room.t < state.wander_until;
    let goal_pos = if wandering {
        let (wx, wz) = state.wander.unwrap();
        Vec3::new(wx, bot_pos.y, wz)
    } else {
        if state.wander.is_some() {
            room.bot_state.get_mut(bot_id).unwrap().wander = None;
        }
        target_pos
    };

    let (dx, dz) = room.nav.next_direction(bot_pos, goal_pos);
    let yaw = (-dx).atan2(-dz);

    let weapon_range = room.config.weapon("pistol").range;
    let dist = target_dist2.map(|d| d.sqrt()).unwrap_or(0.0);
    let wandering_now = room.bot_state[bot_id].wander.is_some();

    let mut fire = false;
    if !wandering_now && dist <= FIRE_RANGE_CAP.min(weapon_range) {
        let origin = bot_pos.with_y(bot_pos.y + room.config.eye_height);
        let direction = Vec3::new(dx, 0.0, dz);
        let t_wall = first_obstacle_hit(origin, direction, room.colliders(), weapon_range);
        if t_wall.map_or(true, |t| t >= dist) {
            fire = true;
        }
    }

    let bm = room.players.get_mut(bot_id).unwrap();
    bm.last_cmd.yaw = yaw;
    bm.last_cmd.pitch = 0.0;
    bm.last_cmd.sprint = true;
    bm.last_cmd.jump = false;
    bm.last_cmd.move_x = 0.0;
    bm.last_cmd.move_y = 1.0;
    bm.last_cmd.fire = fire;
    bm.last_cmd.weapon_id = "pistol".to_string();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use shared::{MapData, ServerConfig};
    use std::sync::Arc;

    fn room_with_bot_and_target() -> Room {
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
        let mut room = Room::new("r".into(), "m".into(), map, config, Arc::new(MemoryStore::new()));
        room.add_player("bot_1".into(), "Bot".into()).unwrap();
        room.bots.push("bot_1".into());
        room.add_player("human".into(), "Human".into()).unwrap();
        room.players.get_mut("human").unwrap().pos = Vec3::new(5.0, 0.0, 0.0);
        room
    }

    #[test]
    fn bot_without_any_target_holds_still() {
        let mut room = room_with_bot_and_target();
        room.players.remove("human");
        step_bots(&mut room, 1.0 / 60.0);
        let bot = &room.players["bot_1"];
        assert_eq!(bot.last_cmd.move_x, 0.0);
        assert!(!bot.last_cmd.fire);
    }

    #[test]
    fn bot_faces_toward_its_target() {
        let mut room = room_with_bot_and_target();
        step_bots(&mut room, 1.0 / 60.0);
        let bot = &room.players["bot_1"];
        assert_eq!(bot.last_cmd.move_y, 1.0);
        assert!(bot.last_cmd.sprint);
    }

    #[test]
    fn dead_bot_respawns_after_timer() {
        let mut room = room_with_bot_and_target();
        room.players.get_mut("bot_1").unwrap().alive = false;
        room.players.get_mut("bot_1").unwrap().respawn_at = room.t + 0.001;
        room.t += 0.002;
        step_bots(&mut room, 1.0 / 60.0);
        assert!(room.players["bot_1"].alive);
    }
}
