//! IPC message protocol for Lipi
//!
//! Defines the message types exchanged between the drawing canvas and the UI
//! collaborator that hosts it: pointer input going in, prediction state
//! coming out.

mod error;
mod input;
mod messages;

pub use error::IpcError;
pub use input::{ElementRect, PointerEvent};
pub use messages::{CanvasToUi, PredictionState, UiToCanvas};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize a message to its JSON wire form
pub fn to_json<T: Serialize>(message: &T) -> Result<String, IpcError> {
    Ok(serde_json::to_string(message)?)
}

/// Parse a message from its JSON wire form
pub fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, IpcError> {
    if text.trim().is_empty() {
        return Err(IpcError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_message_wire_format() {
        let message = UiToCanvas::Pointer {
            event: PointerEvent::Down {
                client_x: 10.0,
                client_y: 20.0,
            },
            rect: ElementRect::new(0.0, 0.0, 256.0, 256.0),
        };
        let json = to_json(&message).unwrap();
        assert!(json.contains(r#""type":"Pointer""#));
        assert!(json.contains(r#""kind":"down""#));

        let parsed: UiToCanvas = from_json(&json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_parse_clear_from_ui() {
        let parsed: UiToCanvas = from_json(r#"{"type":"Clear"}"#).unwrap();
        assert_eq!(parsed, UiToCanvas::Clear);
    }

    #[test]
    fn test_empty_message_rejected() {
        let result: Result<UiToCanvas, _> = from_json("   ");
        assert!(matches!(result, Err(IpcError::Empty)));
    }

    #[test]
    fn test_malformed_message_rejected() {
        let result: Result<UiToCanvas, _> = from_json(r#"{"type":"Repaint"}"#);
        assert!(matches!(result, Err(IpcError::Malformed(_))));
    }
}
