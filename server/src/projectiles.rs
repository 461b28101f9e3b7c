//! Rocket integration, explosion, area damage (§4.6).
//!
//! Grounded in `original_source/server/game/systems/projectiles.py`.

use shared::world::{v3_dot, v3_sub, Vec3};

use crate::collision::sphere_intersects_aabb;
use crate::damage;
use crate::room::{Projectile, Room};

const ROCKET_TTL: f32 = 4.0;
const PROJECTILE_GRAVITY: f32 = 3.0;

pub fn spawn_rocket(room: &mut Room, owner_id: &str, origin: Vec3, direction: Vec3, weapon_id: &str) {
    let spec = room.config.weapon(weapon_id).clone();
    let projectile_id = format!("proj_{:010x}", rand::random::<u64>() & 0xFF_FFFF_FFFF);

    room.projectiles.insert(
        projectile_id.clone(),
        Projectile {
            projectile_id: projectile_id.clone(),
            owner_id: owner_id.to_string(),
            weapon_id: weapon_id.to_string(),
            pos: origin,
            vel: direction.mul(spec.projectile_speed),
            radius: spec.projectile_radius,
            ttl: ROCKET_TTL,
        },
    );
    room.push_event(
        "projectile_spawn",
        serde_json::json!({"projectileId": projectile_id, "ownerId": owner_id, "weaponId": weapon_id}),
    );
}

/// Explosion damage intentionally does not exempt the owner (§9 open
/// question, preserved from the source).
fn explode(room: &mut Room, owner_id: &str, pos: Vec3, weapon_id: &str) {
    let spec = room.config.weapon(weapon_id).clone();
    let r = spec.explosion_radius;
    if r <= 0.0 {
        return;
    }
    room.push_event(
        "explosion",
        serde_json::json!({"pos": pos.to_array(), "radius": r, "weaponId": weapon_id}),
    );

    let victims: Vec<String> = room
        .players
        .iter()
        .filter(|(_, p)| p.alive)
        .map(|(id, _)| id.clone())
        .collect();

    for pid in victims {
        let p = &room.players[&pid];
        let d = v3_sub(p.pos, pos).with_y(0.0);
        let dist = d.len();
        if dist > r {
            continue;
        }
        let falloff = (1.0 - (dist / r)).max(0.0);
        let dmg = spec.damage * falloff;
        if dmg <= 0.5 {
            continue;
        }
        damage::apply_damage(room, owner_id, &pid, dmg, false, Some(pos));
    }
}

pub fn step_projectiles(room: &mut Room, dt: f32) {
    let ids: Vec<String> = room.projectiles.keys().cloned().collect();
    let mut to_delete = Vec::new();

    for id in ids {
        let Some(pr) = room.projectiles.get_mut(&id) else { continue };
        pr.ttl -= dt;
        if pr.ttl <= 0.0 {
            to_delete.push(id);
            continue;
        }

        pr.vel.y -= PROJECTILE_GRAVITY * dt;
        pr.pos.x += pr.vel.x * dt;
        pr.pos.y += pr.vel.y * dt;
        pr.pos.z += pr.vel.z * dt;

        let pos = pr.pos;
        let radius = pr.radius;
        let owner_id = pr.owner_id.clone();
        let weapon_id = pr.weapon_id.clone();

        let mut hit = false;
        for a in room.colliders() {
            if sphere_intersects_aabb(pos, radius, a) {
                hit = true;
                break;
            }
        }

        if !hit {
            let player_radius = room.config.player_radius;
            for (pid2, p) in room.players.iter() {
                if !p.alive || *pid2 == owner_id {
                    continue;
                }
                let d = v3_sub(p.pos, pos).with_y(0.0);
                if v3_dot(d, d) <= (player_radius + radius) * (player_radius + radius) {
                    hit = true;
                    break;
                }
            }
        }

        if hit {
            explode(room, &owner_id, pos, &weapon_id);
            room.push_event(
                "projectile_hit",
                serde_json::json!({"projectileId": id, "pos": pos.to_array(), "weaponId": weapon_id}),
            );
            to_delete.push(id);
        }
    }

    for id in to_delete {
        room.projectiles.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
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
    fn ttl_expiry_removes_projectile_without_explosion() {
        let mut room = open_room();
        room.add_player("vic".into(), "V".into()).unwrap();
        spawn_rocket(&mut room, "atk", Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 0.0, -1.0), "rocket");
        let id = room.projectiles.keys().next().unwrap().clone();
        room.projectiles.get_mut(&id).unwrap().ttl = 0.01;
        step_projectiles(&mut room, 0.02);
        assert!(room.projectiles.is_empty());
        assert!(!room.events.iter().any(|e| e.kind == "explosion"));
    }

    #[test]
    fn rocket_splash_applies_distance_falloff() {
        let mut room = open_room();
        room.add_player("atk".into(), "Atk".into()).unwrap();
        room.add_player("vic".into(), "Vic".into()).unwrap();
        room.players.get_mut("vic").unwrap().pos = Vec3::new(1.5, 0.0, 0.0);

        spawn_rocket(&mut room, "atk", Vec3::new(1.5, 0.1, 0.0), Vec3::new(0.0, -1.0, 0.0), "rocket");
        let id = room.projectiles.keys().next().unwrap().clone();
        room.projectiles.get_mut(&id).unwrap().pos = Vec3::new(1.5, 0.05, 0.0);
        room.projectiles.get_mut(&id).unwrap().vel = Vec3::new(0.0, -0.01, 0.0);

        step_projectiles(&mut room, 1.0 / 60.0);
        let hp = room.players["vic"].hp;
        assert!((hp - (100.0 - 47.5)).abs() < 1.0);
    }

    #[test]
    fn explosion_damages_the_owner_too() {
        let mut room = open_room();
        room.add_player("atk".into(), "Atk".into()).unwrap();
        room.players.get_mut("atk").unwrap().pos = Vec3::new(0.0, 0.0, 0.0);
        spawn_rocket(&mut room, "atk", Vec3::new(0.0, 0.1, 0.0), Vec3::new(0.0, -1.0, 0.0), "rocket");
        let id = room.projectiles.keys().next().unwrap().clone();
        room.projectiles.get_mut(&id).unwrap().pos = Vec3::new(0.0, 0.01, 0.0);
        room.projectiles.get_mut(&id).unwrap().vel = Vec3::new(0.0, -0.01, 0.0);
        step_projectiles(&mut room, 1.0 / 60.0);
        assert!(room.players["atk"].hp < 100.0);
    }
}
