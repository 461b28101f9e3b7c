//! Kills, round timer, win conditions (§4.9).
//!
//! Grounded in `original_source/server/game/systems/scoring.py`. The reset
//! is scheduled once (the `reset_at` latch), not re-scheduled every tick.

const ROUND_RESET_DELAY_SEC: f32 = 4.0;

use crate::room::Room;

pub fn step_scoring(room: &mut Room, _dt: f32) {
    if room.round_active && room.t >= room.round_ends_at {
        room.round_active = false;
        room.push_event("round_end", serde_json::json!({"reason": "time"}));
    }

    if room.round_active {
        let winner = room
            .players
            .values()
            .find(|p| p.kills >= room.config.kills_to_win)
            .map(|p| (p.player_id.clone(), p.name.clone()));
        if let Some((winner_id, winner_name)) = winner {
            room.round_active = false;
            room.push_event(
                "round_end",
                serde_json::json!({"reason": "kills", "winnerId": winner_id, "winner": winner_name}),
            );
        }
    }

    if !room.round_active && !room.players.is_empty() {
        if room.reset_at == 0.0 {
            room.reset_at = room.t + ROUND_RESET_DELAY_SEC;
        }
        if room.t >= room.reset_at {
            room.reset_at = 0.0;
            room.round_active = true;
            room.round_started_at = room.t;
            room.round_ends_at = room.t + room.config.round_time_sec;

            let to_respawn: Vec<String> = room
                .players
                .iter()
                .filter(|(_, p)| !p.alive)
                .map(|(id, _)| id.clone())
                .collect();
            for p in room.players.values_mut() {
                p.kills = 0;
                p.deaths = 0;
                p.score = 0;
            }
            for id in to_respawn {
                room.respawn_player(&id);
            }
            room.projectiles.clear();
            room.push_event("round_start", serde_json::json!({"roomId": room.room_id, "mapId": room.map_id}));
        }
    }
}
