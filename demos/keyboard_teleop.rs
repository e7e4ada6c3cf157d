// Keyboard teleop: WASD strafe/forward, Z/X turn, R/F speed, Q quit
//
// Publishes control requests for `omni-drive teleop` (or `run --then-teleop`).
// Usage: cargo run --example keyboard_teleop
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use omni_drive_runtime::config::TOPIC_CMD_BASE;
use omni_drive_runtime::messages::ControlRequest;

const SPEEDS: [f32; 3] = [0.2, 0.5, 1.0]; // normalized
const INPUT_TIMEOUT_MS: u64 = 100; // Reset to neutral after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_BASE).await?;

    info!("Controls: WASD=move, Z/X=turn, R/F=speed, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    // Leave the base at rest
    let stop = ControlRequest {
        x: 0.0,
        y: 0.0,
        angular: 0.0,
    };
    publisher.put(serde_json::to_string(&stop)?).await?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    let mut req = ControlRequest {
        x: 0.0,
        y: 0.0,
        angular: 0.0,
    };
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let speed = SPEEDS[speed_idx];

                match code {
                    KeyCode::Char('w') if pressed => req.y = speed,
                    KeyCode::Char('s') if pressed => req.y = -speed,
                    KeyCode::Char('a') if pressed => req.x = -speed,
                    KeyCode::Char('d') if pressed => req.x = speed,
                    KeyCode::Char('z') if pressed => req.angular = -speed,
                    KeyCode::Char('x') if pressed => req.angular = speed,

                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }

                if pressed && matches!(code, KeyCode::Char('w' | 's' | 'a' | 'd' | 'z' | 'x')) {
                    last_movement_input = Instant::now();
                }
            }
        }

        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            req = ControlRequest {
                x: 0.0,
                y: 0.0,
                angular: 0.0,
            };
        }

        // Always publish at ~50Hz
        publisher.put(serde_json::to_string(&req)?).await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
