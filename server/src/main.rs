//! WebSocket listener binary.
//!
//! This server intentionally does not serve the web client or any HTTP
//! control surface (rooms/matchmake/leaderboard endpoints) — those are
//! external concerns. It only speaks the `ws.py`-compatible JSON protocol
//! over plain WebSocket connections and drives the authoritative tick loop.
//!
//! Grounded in `original_source/server/app.py`'s entrypoint and the
//! teacher's own `network::Server` task-spawning style.

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use server::driver::Hub;
use server::net::connection::{handle_text, Connection, Outcome};
use server::persistence::MemoryStore;
use shared::{MapData, ServerConfig};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Authoritative room-simulation FPS server")]
struct Args {
    /// Address to bind the WebSocket listener to.
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[clap(short, long, default_value_t = 8765)]
    port: u16,

    /// Directory of `<mapId>.json` map documents (§4.1 wire format).
    #[clap(short, long, default_value = "maps")]
    maps_dir: String,
}

fn load_maps(dir: &str) -> HashMap<String, MapData> {
    let mut maps = HashMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("could not read maps dir {dir}: {e}; falling back to a built-in empty arena");
            maps.insert("map01".to_string(), builtin_fallback_map());
            return maps;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(map_id) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        match std::fs::read_to_string(&path) {
            Ok(text) => match MapData::from_str(map_id, &text) {
                Ok(map) => {
                    maps.insert(map_id.to_string(), map);
                }
                Err(e) => error!("failed to parse map {map_id}: {e}"),
            },
            Err(e) => error!("failed to read map file {}: {e}", path.display()),
        }
    }
    if maps.is_empty() {
        maps.insert("map01".to_string(), builtin_fallback_map());
    }
    maps
}

fn builtin_fallback_map() -> MapData {
    let json = r#"{
        "mapId": "map01",
        "bounds": {"center": [0, 5, 0], "size": [80, 10, 80]},
        "spawns": [[0,0,0], [10,0,10], [-10,0,-10], [10,0,-10], [-10,0,10]]
    }"#;
    MapData::from_str("map01", json).expect("builtin fallback map is valid")
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Warning: RUST_LOG not set. Try RUST_LOG=info cargo run --bin server");
    }

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let config = Arc::new(ServerConfig::default());
    let maps = Arc::new(load_maps(&args.maps_dir));
    let persistence = Arc::new(MemoryStore::new());
    let hub = Hub::new(config.clone(), maps, persistence);

    tokio::spawn(hub.clone().run_tick_loop());

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            return;
        }
    };
    info!("listening on ws://{addr}");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!("accept error: {e}");
                continue;
            }
        };
        let hub = hub.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, hub).await {
                warn!("connection from {peer} ended: {e}");
            }
        });
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    hub: Arc<Hub>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut outgoing, mut incoming) = ws.split();

    let conn_id = format!("{:016x}", rand::random::<u64>());
    let player_id = format!("{:016x}", rand::random::<u64>());
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    hub.register_conn(&conn_id, &player_id, tx.clone()).await;
    let mut conn = Connection::new(conn_id.clone(), player_id.clone(), tx);

    let pump = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if outgoing.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = incoming.next().await {
        let frame = match frame {
            Ok(f) => f,
            Err(_) => break,
        };
        match frame {
            Message::Text(text) => {
                if matches!(handle_text(&mut conn, &hub, &text).await, Outcome::Disconnect) {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    hub.unregister_conn(&conn_id).await;
    pump.abort();
    Ok(())
}
