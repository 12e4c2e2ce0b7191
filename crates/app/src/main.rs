//! Lipi - headless demo of the drawing canvas
//!
//! Replays a short built-in stroke sequence onto the canvas as JSON UI
//! messages, then requests a prediction and prints the resulting canvas
//! message. Configuration comes from `LIPI_CONFIG` (a JSON file) if set,
//! with `LIPI_*` environment overrides applied on top.

use std::error::Error;

use lipi::{DrawingCanvas, ElementRect, LipiConfig, PointerEvent, UiToCanvas};
use lipi_ipc::{from_json, to_json};
use tracing::{info, warn};

/// Strokes in surface-local pixels of a 256x256 canvas, roughly a "क"
const DEMO_STROKES: &[&[(f32, f32)]] = &[
    &[(40.0, 70.0), (128.0, 70.0), (216.0, 70.0)],
    &[(128.0, 70.0), (128.0, 140.0), (128.0, 220.0)],
    &[(128.0, 130.0), (90.0, 110.0), (70.0, 140.0), (95.0, 165.0), (128.0, 150.0)],
    &[(128.0, 150.0), (165.0, 120.0), (190.0, 150.0), (165.0, 180.0)],
];

fn load_config() -> Result<LipiConfig, lipi_config::ConfigError> {
    match std::env::var("LIPI_CONFIG") {
        Ok(path) => {
            let mut config = LipiConfig::from_path(path)?;
            config.apply_env();
            Ok(config)
        }
        Err(_) => Ok(LipiConfig::from_env()),
    }
}

/// Pointer messages for the demo strokes, scaled to the element size
fn demo_messages(rect: ElementRect) -> Vec<UiToCanvas> {
    let (sx, sy) = (rect.width / 256.0, rect.height / 256.0);
    let mut messages = Vec::new();
    for stroke in DEMO_STROKES {
        let points: Vec<(f32, f32)> = stroke.iter().map(|&(x, y)| (x * sx, y * sy)).collect();
        let Some(&(x, y)) = points.first() else {
            continue;
        };
        let mut events = vec![PointerEvent::Down {
            client_x: x,
            client_y: y,
        }];
        events.extend(points.iter().map(|&(x, y)| PointerEvent::Move {
            client_x: x,
            client_y: y,
        }));
        events.push(PointerEvent::Leave);
        messages.extend(
            events
                .into_iter()
                .map(|event| UiToCanvas::Pointer { event, rect }),
        );
    }
    messages.push(UiToCanvas::Predict);
    messages
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    lipi::init_tracing();

    let config = load_config()?;
    info!(
        "Starting Lipi ({}x{} canvas, model {})",
        config.canvas.width,
        config.canvas.height,
        config.model.manifest_path.display()
    );

    let rect = ElementRect::at_origin(config.canvas.width as f32, config.canvas.height as f32);
    let mut canvas = DrawingCanvas::new(config)?;
    canvas.mount()?;

    for message in demo_messages(rect) {
        // Round-trip through the wire form, as a UI host would send it
        let message: UiToCanvas = from_json(&to_json(&message)?)?;
        if let Some(task) = canvas.handle_message(message) {
            let state = task.await;
            match state.label() {
                Some(label) => info!("Recognized {}", label),
                None => warn!("No label: {:?}", state),
            }
        }
    }

    println!("{}", to_json(&canvas.ui_update())?);
    canvas.unmount();
    Ok(())
}
