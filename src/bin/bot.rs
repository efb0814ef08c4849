//! Headless bot - drives the prediction engine against a live server
//!
//! Walks a scripted loop, jumps and swings periodically, reconciles on every
//! GAME_STATE and logs correction and snapshot stats.
//!
//! Usage: `bot [ws://host:port/ws]` (or set `BOT_URL`).

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_sync::game::snapshot::SnapshotStats;
use arena_sync::prediction::{
    ChannelTransport, InputIntent, KinematicBody, PredictionEngine, SystemClock, TransportError,
};
use arena_sync::ws::protocol::{ClientMsg, ServerMsg, Vec3};

const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws";
const FRAME: Duration = Duration::from_micros(16_667);
const REPORT_EVERY: Duration = Duration::from_secs(5);
const OUTBOUND_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("BOT_URL").ok())
        .unwrap_or_else(|| DEFAULT_URL.to_string());

    info!(%url, "Connecting");
    let (ws, _) = connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();

    let (tx, mut rx) = mpsc::channel::<ClientMsg>(OUTBOUND_QUEUE);
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, kind = msg.kind(), "Failed to encode message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut engine = PredictionEngine::new(
        SystemClock,
        KinematicBody::new(Vec3::ZERO),
        ChannelTransport::new(tx),
    );
    let mut snapshots = SnapshotStats::default();

    let mut frame = tokio::time::interval(FRAME);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut report = tokio::time::interval(REPORT_EVERY);
    let mut frame_no: u64 = 0;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = frame.tick() => {
                // Nothing to predict until the server has placed us
                if engine.player_id().is_none() {
                    continue;
                }
                frame_no += 1;
                engine.set_yaw(frame_no as f32 * 0.002);

                match engine.process_input(scripted_intent(frame_no)) {
                    Ok(_) => {}
                    Err(TransportError::Full) => warn!("Outbound queue full, input not sent"),
                    Err(TransportError::Closed) => {
                        warn!("Writer stopped");
                        break;
                    }
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMsg>(&text) {
                        Ok(msg) => {
                            if let ServerMsg::GameState(state) = &msg {
                                snapshots.record(state, text.len());
                            }
                            engine.on_server_message(&msg);
                        }
                        Err(e) => warn!(error = %e, "Undecodable server message"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }
            _ = report.tick() => {
                let stats = engine.stats();
                info!(
                    snapshots = snapshots.total_snapshots,
                    snapshot_bytes = snapshots.total_bytes,
                    avg_players = snapshots.avg_players_per_snapshot,
                    server_tick = snapshots.last_tick,
                    corrections = stats.corrections,
                    avg_correction = stats.average_correction.length_sq().sqrt(),
                    pending_inputs = engine.buffer().len(),
                    "Bot stats"
                );
            }
            _ = &mut shutdown => {
                info!("Received Ctrl+C, disconnecting");
                break;
            }
        }
    }

    // Dropping the engine drops the last sender; the writer closes the socket
    drop(engine);
    let _ = writer.await;
    Ok(())
}

/// Four-second walk loop with a jump every 1.5s and a swing every 5s
fn scripted_intent(frame: u64) -> InputIntent {
    let phase = frame % 240;
    InputIntent {
        forward: phase < 120,
        right: (120..180).contains(&phase),
        backward: phase >= 180,
        left: false,
        jump: frame % 90 == 0,
        attack: frame % 300 == 0,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
