//! Acceleration, friction, gravity, jumping, obstacle resolution (§4.4).
//!
//! Grounded in `original_source/server/game/systems/movement.py`.

use std::f32::consts::PI;

use crate::collision::resolve_sphere_vs_aabb_xz;
use crate::room::Room;

fn wrap_angle_rad(mut a: f32) -> f32 {
    let tau = 2.0 * PI;
    while a > PI {
        a -= tau;
    }
    while a < -PI {
        a += tau;
    }
    a
}

pub fn step_movement(room: &mut Room, dt: f32) {
    let now = room.t;
    let to_respawn: Vec<String> = room
        .players
        .iter()
        .filter(|(_, p)| !p.alive && p.respawn_at > 0.0 && now >= p.respawn_at)
        .map(|(id, _)| id.clone())
        .collect();
    for id in to_respawn {
        room.respawn_player(&id);
    }

    let caps = room.config.movement;
    let radius = room.config.player_radius;
    let colliders = room.map.colliders.clone();

    for p in room.players.values_mut() {
        if !p.alive {
            continue;
        }

        p.yaw = wrap_angle_rad(p.last_cmd.yaw);
        p.pitch = p.last_cmd.pitch.clamp(-1.4, 1.4);
        p.last_cmd.yaw = p.yaw;
        p.last_cmd.pitch = p.pitch;

        let move_x = p.last_cmd.move_x;
        let move_y = p.last_cmd.move_y;
        let sprint = p.last_cmd.sprint;
        let jump = p.last_cmd.jump;

        // Convention: yaw=0 faces -Z; positive yaw rotates left.
        let sy = p.yaw.sin();
        let cy = p.yaw.cos();
        let fwd = (-sy, -cy);
        let right = (cy, -sy);
        let mut wish_x = right.0 * move_x + fwd.0 * move_y;
        let mut wish_z = right.1 * move_x + fwd.1 * move_y;
        let wish_len = (wish_x * wish_x + wish_z * wish_z).sqrt();
        if wish_len > 1e-6 {
            wish_x /= wish_len;
            wish_z /= wish_len;
        } else {
            wish_x = 0.0;
            wish_z = 0.0;
        }

        let max_speed = if sprint { caps.max_speed_sprint } else { caps.max_speed_walk };

        let mut on_ground = p.pos.y <= radius + 1e-3;
        if on_ground {
            p.pos.y = radius;
            if p.vel.y < 0.0 {
                p.vel.y = 0.0;
            }
        }

        if on_ground {
            let sp = (p.vel.x * p.vel.x + p.vel.z * p.vel.z).sqrt();
            if sp > 1e-6 {
                let drop = sp * caps.friction * dt;
                let ns = (sp - drop).max(0.0);
                let scale = ns / sp;
                p.vel.x *= scale;
                p.vel.z *= scale;
            }
        }

        let accel = caps.accel * if on_ground { 1.0 } else { caps.air_control };
        p.vel.x += wish_x * accel * dt;
        p.vel.z += wish_z * accel * dt;

        let sp = (p.vel.x * p.vel.x + p.vel.z * p.vel.z).sqrt();
        if sp > max_speed {
            let s = max_speed / sp;
            p.vel.x *= s;
            p.vel.z *= s;
        }

        if jump && on_ground {
            p.vel.y = caps.jump_speed;
            on_ground = false;
        }

        p.vel.y -= caps.gravity * dt;

        p.pos.x += p.vel.x * dt;
        p.pos.y += p.vel.y * dt;
        p.pos.z += p.vel.z * dt;

        if p.pos.y < radius {
            p.pos.y = radius;
            if p.vel.y < 0.0 {
                p.vel.y = 0.0;
            }
            on_ground = true;
        }

        let mut collided = false;
        for a in &colliders {
            let (new_pos, hit) = resolve_sphere_vs_aabb_xz(p.pos, radius, a);
            p.pos = new_pos;
            collided = collided || hit;
        }
        if collided {
            p.vel.x *= 0.75;
            p.vel.z *= 0.75;
        }

        p.on_ground = on_ground;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::room::Room;
    use assert_approx_eq::assert_approx_eq;
    use shared::world::Vec3;
    use shared::{MapData, ServerConfig};
    use std::sync::Arc;

    fn room_with_one_player() -> Room {
        let json = r#"{
            "mapId": "m",
            "bounds": {"center": [0,0,0], "size": [100,10,100]},
            "colliders": [{"center": [5,1,0], "size": [2,2,2]}],
            "spawns": [[0,0,0]]
        }"#;
        let map = MapData::from_str("m", json).unwrap();
        let config = Arc::new(ServerConfig {
            bots_enabled: false,
            ..ServerConfig::default()
        });
        let mut room = Room::new("r".into(), "m".into(), map, config, Arc::new(MemoryStore::new()));
        room.add_player("p1".into(), "A".into()).unwrap();
        room
    }

    #[test]
    fn gravity_pulls_airborne_player_down() {
        let mut room = room_with_one_player();
        room.players.get_mut("p1").unwrap().pos.y = 5.0;
        let before = room.players["p1"].pos.y;
        step_movement(&mut room, 1.0 / 60.0);
        assert!(room.players["p1"].pos.y < before);
    }

    #[test]
    fn grounded_player_never_goes_below_radius() {
        let mut room = room_with_one_player();
        step_movement(&mut room, 1.0 / 60.0);
        let radius = room.config.player_radius;
        assert!(room.players["p1"].pos.y >= radius - 1e-4);
    }

    #[test]
    fn jump_sets_upward_velocity_when_grounded() {
        let mut room = room_with_one_player();
        room.players.get_mut("p1").unwrap().last_cmd.jump = true;
        step_movement(&mut room, 1.0 / 60.0);
        assert!(room.players["p1"].vel.y > 0.0);
    }

    #[test]
    fn forward_move_builds_xz_speed_up_to_cap() {
        let mut room = room_with_one_player();
        room.players.get_mut("p1").unwrap().last_cmd.move_y = 1.0;
        for _ in 0..120 {
            step_movement(&mut room, 1.0 / 60.0);
        }
        let p = &room.players["p1"];
        let sp = (p.vel.x * p.vel.x + p.vel.z * p.vel.z).sqrt();
        assert!(sp <= room.config.movement.max_speed_walk + 1e-3);
    }

    #[test]
    fn collision_damps_xz_velocity() {
        let mut room = room_with_one_player();
        let p = room.players.get_mut("p1").unwrap();
        p.pos = Vec3::new(4.2, room.config.player_radius, 0.0);
        p.vel = Vec3::new(5.0, 0.0, 0.0);
        step_movement(&mut room, 1.0 / 60.0);
        assert!(room.players["p1"].vel.x.abs() < 5.0);
    }

    #[test]
    fn yaw_wraps_into_range() {
        let mut room = room_with_one_player();
        room.players.get_mut("p1").unwrap().last_cmd.yaw = 4.0 * PI;
        step_movement(&mut room, 1.0 / 60.0);
        let yaw = room.players["p1"].yaw;
        assert_approx_eq!(yaw, 0.0, 1e-3);
    }
}
