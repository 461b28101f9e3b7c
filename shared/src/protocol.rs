//! Wire message schemas + validation.
//!
//! Wire format (§6): `{"type": "<name>", "data": {...}}`. Grounded in
//! `original_source/server/game/protocol.py`: parsing is permissive (bad
//! fields fall back to defaults) except for the handful of fields the source
//! treats as hard-required (`input.seq`, `chat.text`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("message must be an object")]
    NotAnObject,
    #[error("missing type")]
    MissingType,
    #[error("data must be an object")]
    DataNotAnObject,
    #[error("{0}")]
    Field(&'static str),
}

/// Client-to-server message types accepted by the net edge (§6).
pub const VALID_C2S: &[&str] = &["hello", "join", "input", "chat", "leave", "ping"];

/// Serializes `{"type": msg_type, "data": data}` with compact separators,
/// matching `protocol.dumps`.
pub fn dumps<T: Serialize>(msg_type: &str, data: &T) -> String {
    serde_json::to_string(&serde_json::json!({ "type": msg_type, "data": data }))
        .expect("envelope serialization cannot fail for valid Serialize impls")
}

/// Parses the envelope, returning the message type and its (possibly empty)
/// data object. Mirrors `protocol.loads`.
pub fn loads(text: &str) -> Result<(String, Value), ProtocolError> {
    let obj: Value = serde_json::from_str(text)?;
    let obj = obj.as_object().ok_or(ProtocolError::NotAnObject)?;
    let t = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();
    let data = match obj.get("data") {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(v) => {
            if !v.is_object() {
                return Err(ProtocolError::DataNotAnObject);
            }
            v.clone()
        }
    };
    Ok((t, data))
}

fn num(data: &Value, key: &str, default: f32) -> f32 {
    data.get(key).and_then(Value::as_f64).map(|v| v as f32).unwrap_or(default)
}

fn boolean(data: &Value, key: &str) -> bool {
    data.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn str_opt(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(|s| s.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hello {
    pub client_version: String,
    pub preferred_region: Option<String>,
}

impl Hello {
    pub fn parse(data: &Value) -> Result<Self, ProtocolError> {
        let client_version = str_opt(data, "clientVersion")
            .filter(|s| !s.is_empty())
            .ok_or(ProtocolError::Field("hello.clientVersion required"))?;
        Ok(Hello {
            client_version,
            preferred_region: str_opt(data, "preferredRegion"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub room_id: Option<String>,
    pub matchmake: bool,
    pub player_name: String,
    pub want_deltas: bool,
}

impl Join {
    pub fn parse(data: &Value) -> Result<Self, ProtocolError> {
        let name = str_opt(data, "playerName")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Player".to_string());
        let want_deltas = data.get("wantDeltas").and_then(Value::as_bool).unwrap_or(true);
        Ok(Join {
            room_id: str_opt(data, "roomId"),
            matchmake: boolean(data, "matchmake"),
            player_name: name.chars().take(24).collect(),
            want_deltas,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub seq: i64,
    pub dt: f32,
    pub move_x: f32,
    pub move_y: f32,
    pub jump: bool,
    pub sprint: bool,
    pub yaw: f32,
    pub pitch: f32,
    pub fire: bool,
    pub weapon_id: String,
    pub reload: bool,
}

impl Input {
    pub fn parse(data: &Value) -> Result<Self, ProtocolError> {
        let seq = data
            .get("seq")
            .and_then(Value::as_i64)
            .filter(|&s| s >= 0)
            .ok_or(ProtocolError::Field("input.seq required"))?;
        let weapon_id = str_opt(data, "weaponId")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "pistol".to_string());
        Ok(Input {
            seq,
            dt: num(data, "dt", 0.016),
            move_x: num(data, "moveX", 0.0).clamp(-1.0, 1.0),
            move_y: num(data, "moveY", 0.0).clamp(-1.0, 1.0),
            jump: boolean(data, "jump"),
            sprint: boolean(data, "sprint"),
            yaw: num(data, "yaw", 0.0),
            pitch: num(data, "pitch", 0.0),
            fire: boolean(data, "fire"),
            weapon_id,
            reload: boolean(data, "reload"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    pub text: String,
}

impl Chat {
    pub fn parse(data: &Value) -> Result<Self, ProtocolError> {
        let t = str_opt(data, "text").ok_or(ProtocolError::Field("chat.text required"))?;
        let t = t.trim();
        if t.is_empty() {
            return Err(ProtocolError::Field("chat.text empty"));
        }
        Ok(Chat {
            text: t.chars().take(160).collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ping {
    pub t: f64,
}

impl Ping {
    pub fn parse(data: &Value) -> Result<Self, ProtocolError> {
        Ok(Ping {
            t: data.get("t").and_then(Value::as_f64).unwrap_or(0.0),
        })
    }
}

/// The validated command a player's `lastCmd` is replaced with each accepted
/// input frame (§4.12). Movement/weapons systems read this each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCommand {
    pub move_x: f32,
    pub move_y: f32,
    pub jump: bool,
    pub sprint: bool,
    pub yaw: f32,
    pub pitch: f32,
    pub fire: bool,
    pub weapon_id: String,
    pub reload: bool,
}

impl Default for PlayerCommand {
    fn default() -> Self {
        PlayerCommand {
            move_x: 0.0,
            move_y: 0.0,
            jump: false,
            sprint: false,
            yaw: 0.0,
            pitch: 0.0,
            fire: false,
            weapon_id: "pistol".to_string(),
            reload: false,
        }
    }
}

impl From<&Input> for PlayerCommand {
    fn from(i: &Input) -> Self {
        PlayerCommand {
            move_x: i.move_x,
            move_y: i.move_y,
            jump: i.jump,
            sprint: i.sprint,
            yaw: i.yaw,
            pitch: i.pitch,
            fire: i.fire,
            weapon_id: i.weapon_id.clone(),
            reload: i.reload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_parses_envelope() {
        let (t, data) = loads(r#"{"type":"ping","data":{"t":1.5}}"#).unwrap();
        assert_eq!(t, "ping");
        assert_eq!(Ping::parse(&data).unwrap().t, 1.5);
    }

    #[test]
    fn loads_defaults_missing_data_to_empty_object() {
        let (t, data) = loads(r#"{"type":"leave"}"#).unwrap();
        assert_eq!(t, "leave");
        assert!(data.as_object().unwrap().is_empty());
    }

    #[test]
    fn loads_rejects_non_object() {
        assert!(loads("[1,2,3]").is_err());
    }

    #[test]
    fn loads_rejects_missing_type() {
        assert!(loads(r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn input_requires_seq() {
        let data = serde_json::json!({});
        assert!(Input::parse(&data).is_err());
    }

    #[test]
    fn input_clamps_move_axes() {
        let data = serde_json::json!({"seq": 1, "moveX": 5.0, "moveY": -5.0});
        let inp = Input::parse(&data).unwrap();
        assert_eq!(inp.move_x, 1.0);
        assert_eq!(inp.move_y, -1.0);
    }

    #[test]
    fn chat_trims_and_truncates() {
        let long = "x".repeat(200);
        let data = serde_json::json!({"text": format!("  {long}  ")});
        let c = Chat::parse(&data).unwrap();
        assert_eq!(c.text.len(), 160);
    }

    #[test]
    fn chat_rejects_empty() {
        let data = serde_json::json!({"text": "   "});
        assert!(Chat::parse(&data).is_err());
    }

    #[test]
    fn join_defaults_name_and_truncates() {
        let data = serde_json::json!({});
        let j = Join::parse(&data).unwrap();
        assert_eq!(j.player_name, "Player");
        assert!(j.want_deltas);

        let long_name = "x".repeat(40);
        let data2 = serde_json::json!({"playerName": long_name});
        let j2 = Join::parse(&data2).unwrap();
        assert_eq!(j2.player_name.len(), 24);
    }

    #[test]
    fn dumps_roundtrips_through_loads() {
        let s = dumps("pong", &serde_json::json!({"t": 1.0, "serverTime": 2.0}));
        let (t, data) = loads(&s).unwrap();
        assert_eq!(t, "pong");
        assert_eq!(data["t"], 1.0);
    }
}
