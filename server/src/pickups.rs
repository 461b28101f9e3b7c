//! Spawn, respawn, touch effects (§4.8).
//!
//! Grounded in `original_source/server/game/systems/powerups.py`.

use shared::world::{v3_dot, v3_sub, PickupKind};

const PICKUP_TOUCH_RADIUS_PAD: f32 = 0.45;
const PICKUP_RESPAWN_SEC: f32 = 18.0;
const HEALTH_CAP: f32 = 100.0;
const HEALTH_GAIN: f32 = 35.0;
const ARMOR_CAP: f32 = 75.0;
const ARMOR_GAIN: f32 = 25.0;

use crate::room::Room;

pub fn step_pickups(room: &mut Room, _dt: f32) {
    let now = room.t;
    let to_respawn: Vec<String> = room
        .pickups
        .iter()
        .filter(|(_, pk)| !pk.available && pk.respawn_at > 0.0 && now >= pk.respawn_at)
        .map(|(id, _)| id.clone())
        .collect();
    for id in to_respawn {
        let pk = room.pickups.get_mut(&id).unwrap();
        pk.available = true;
        pk.respawn_at = 0.0;
        let kind = pk.kind;
        room.push_event("pickup_spawn", serde_json::json!({"pickupId": id, "kind": kind.to_string()}));
    }

    let player_radius = room.config.player_radius;
    let touch_threshold2 = (player_radius + PICKUP_TOUCH_RADIUS_PAD).powi(2);

    let player_ids: Vec<String> = room.players.iter().filter(|(_, p)| p.alive).map(|(id, _)| id.clone()).collect();
    for pid in player_ids {
        let pickup_ids: Vec<String> = room.pickups.iter().filter(|(_, pk)| pk.available).map(|(id, _)| id.clone()).collect();
        for pkid in pickup_ids {
            let (player_pos, pickup_pos, kind) = {
                let p = &room.players[&pid];
                let pk = &room.pickups[&pkid];
                (p.pos, pk.pos, pk.kind)
            };
            let d = v3_sub(player_pos, pickup_pos).with_y(0.0);
            if v3_dot(d, d) > touch_threshold2 {
                continue;
            }

            match kind {
                PickupKind::Health => {
                    let p = room.players.get_mut(&pid).unwrap();
                    let before = p.hp;
                    p.hp = (p.hp + HEALTH_GAIN).min(HEALTH_CAP);
                    let amount = p.hp - before;
                    if amount != 0.0 {
                        room.queue_event_for(&pid, "pickup", serde_json::json!({"kind": "health", "amount": amount}));
                    }
                }
                PickupKind::Armor => {
                    let p = room.players.get_mut(&pid).unwrap();
                    let before = p.armor;
                    p.armor = (p.armor + ARMOR_GAIN).min(ARMOR_CAP);
                    let amount = p.armor - before;
                    if amount != 0.0 {
                        room.queue_event_for(&pid, "pickup", serde_json::json!({"kind": "armor", "amount": amount}));
                    }
                }
                PickupKind::Ammo => {
                    let weapon_id = room.players[&pid].weapon_id.clone();
                    let max_ammo = room.config.weapon(&weapon_id).max_ammo;
                    let p = room.players.get_mut(&pid).unwrap();
                    let cur = *p.ammo.get(&weapon_id).unwrap_or(&0);
                    let gain = (max_ammo / 2).max(1);
                    p.ammo.insert(weapon_id.clone(), (cur + gain).min(max_ammo));
                    room.queue_event_for(&pid, "pickup", serde_json::json!({"kind": "ammo", "weaponId": weapon_id}));
                }
            }

            let pk = room.pickups.get_mut(&pkid).unwrap();
            pk.available = false;
            pk.respawn_at = room.t + PICKUP_RESPAWN_SEC;
            room.push_event("pickup", serde_json::json!({"playerId": pid, "pickupId": pkid, "kind": kind.to_string()}));
        }
    }
}
