//! Main IPC message enums for communication between the canvas and UI.

use serde::{Deserialize, Serialize};

use crate::input::{ElementRect, PointerEvent};

/// Messages from the UI to the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UiToCanvas {
    /// Pointer activity on the drawing element
    Pointer {
        event: PointerEvent,
        rect: ElementRect,
    },

    /// Reset the drawing to the background color
    Clear,

    /// Classify the current drawing
    Predict,
}

/// Messages from the canvas to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CanvasToUi {
    /// Prediction state changed
    PredictionChanged(PredictionState),
}

/// Output state of the classifier, as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionState {
    /// Nothing has been predicted yet
    #[default]
    NoPrediction,
    /// A prediction is running
    Pending,
    /// The last prediction completed
    Predicted { index: usize, label: String },
    /// The classifier could not produce a result (model missing or broken)
    Unavailable { reason: String },
}

impl PredictionState {
    /// The decoded label, once available
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Predicted { label, .. } => Some(label),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_state_label() {
        assert_eq!(PredictionState::default(), PredictionState::NoPrediction);
        assert_eq!(PredictionState::Pending.label(), None);
        assert_eq!(
            PredictionState::Unavailable {
                reason: "missing".into()
            }
            .label(),
            None
        );

        let done = PredictionState::Predicted {
            index: 0,
            label: "क".into(),
        };
        assert_eq!(done.label(), Some("क"));
    }

    #[test]
    fn test_prediction_state_serializes_with_status_tag() {
        let json = serde_json::to_string(&PredictionState::Predicted {
            index: 36,
            label: "०".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"predicted","index":36,"label":"०"}"#);
    }
}
