//! Armor/headshot multipliers, knockback, kill credit (§4.7).
//!
//! Grounded in `original_source/server/game/systems/damage.py`.

use shared::world::Vec3;

use crate::room::Room;

pub fn apply_damage(
    room: &mut Room,
    attacker_id: &str,
    victim_id: &str,
    base_damage: f32,
    headshot: bool,
    hit_pos: Option<Vec3>,
) {
    let (attacker_alive, victim_alive) = {
        let a = room.players.get(attacker_id);
        let v = room.players.get(victim_id);
        match (a, v) {
            (Some(a), Some(v)) => (a.alive, v.alive),
            _ => return,
        }
    };
    if !attacker_alive || !victim_alive {
        return;
    }

    let mut dmg = base_damage * if headshot { 2.0 } else { 1.0 };

    let victim = room.players.get_mut(victim_id).unwrap();
    if victim.armor > 0.0 {
        let absorbed = victim.armor.min(dmg * 0.5);
        victim.armor -= absorbed;
        dmg -= absorbed;
    }
    victim.hp -= dmg;

    if let Some(hp) = hit_pos {
        let d = victim.pos.sub(hp).with_y(0.0);
        let n = d.norm();
        victim.vel.x += n.x * 1.5;
        victim.vel.z += n.z * 1.5;
    }

    room.queue_event_for(
        attacker_id,
        "hit",
        serde_json::json!({"attackerId": attacker_id, "victimId": victim_id, "headshot": headshot, "damage": dmg}),
    );
    room.push_event(
        "damage",
        serde_json::json!({"attackerId": attacker_id, "victimId": victim_id, "damage": dmg, "headshot": headshot}),
    );

    if room.players[victim_id].hp > 0.0 {
        return;
    }

    let respawn_sec = room.config.respawn_sec;
    let now = room.t;
    let victim = room.players.get_mut(victim_id).unwrap();
    victim.hp = 0.0;
    victim.alive = false;
    victim.deaths += 1;
    victim.respawn_at = now + respawn_sec;
    let victim_name = victim.name.clone();

    let attacker = room.players.get_mut(attacker_id).unwrap();
    attacker.kills += 1;
    attacker.score += 100;
    let attacker_name = attacker.name.clone();

    room.push_event(
        "kill",
        serde_json::json!({"killerId": attacker_id, "victimId": victim_id, "killer": attacker_name, "victim": victim_name}),
    );

    let (a_kills, a_deaths, a_score, a_name) = {
        let a = &room.players[attacker_id];
        (a.kills, a.deaths, a.score, a.name.clone())
    };
    let (v_kills, v_deaths, v_score, v_name) = {
        let v = &room.players[victim_id];
        (v.kills, v.deaths, v.score, v.name.clone())
    };
    room.persistence.upsert_player(&a_name, a_kills, a_deaths, a_score);
    room.persistence.upsert_player(&v_name, v_kills, v_deaths, v_score);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::room::Room;
    use shared::{MapData, ServerConfig};
    use std::sync::Arc;

    fn room_with_two_players() -> Room {
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
        room.add_player("atk".into(), "Attacker".into()).unwrap();
        room.add_player("vic".into(), "Victim".into()).unwrap();
        room
    }

    #[test]
    fn armor_absorbs_half_of_damage_until_depleted() {
        let mut room = room_with_two_players();
        room.players.get_mut("vic").unwrap().armor = 50.0;
        apply_damage(&mut room, "atk", "vic", 40.0, false, None);
        let v = &room.players["vic"];
        assert_eq!(v.armor, 30.0);
        assert_eq!(v.hp, 80.0);
    }

    #[test]
    fn headshot_doubles_base_damage() {
        let mut room = room_with_two_players();
        apply_damage(&mut room, "atk", "vic", 18.0, true, None);
        assert_eq!(room.players["vic"].hp, 100.0 - 36.0);
    }

    #[test]
    fn lethal_damage_credits_kill_and_schedules_respawn() {
        let mut room = room_with_two_players();
        apply_damage(&mut room, "atk", "vic", 500.0, false, None);
        let v = &room.players["vic"];
        assert!(!v.alive);
        assert_eq!(v.hp, 0.0);
        assert_eq!(v.deaths, 1);
        assert!(v.respawn_at > room.t);
        assert_eq!(room.players["atk"].kills, 1);
        assert_eq!(room.players["atk"].score, 100);
        assert!(room.events.iter().any(|e| e.kind == "kill"));
    }

    #[test]
    fn damage_to_dead_victim_is_a_noop() {
        let mut room = room_with_two_players();
        room.players.get_mut("vic").unwrap().alive = false;
        apply_damage(&mut room, "atk", "vic", 20.0, false, None);
        assert_eq!(room.players["vic"].hp, 100.0);
    }
}
