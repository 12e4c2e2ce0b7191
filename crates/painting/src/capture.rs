//! Stroke capture from pointer input
//!
//! A press starts a drag session; each move inside the session pairs the
//! previous position with the current one to form a [`StrokeSegment`]. The
//! first move of a session only records a position. Release, leave, or a move
//! that lands outside the surface ends the session.

use lipi_ipc::{ElementRect, PointerEvent};
use tracing::{debug, trace};

use crate::types::{Point, StrokeSegment};
use crate::validation::{in_surface_bounds, to_surface_local};

/// Drag session state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    /// Pointer is pressed; `prev` is the last position seen in this session
    Dragging { prev: Option<Point> },
}

/// Turns pointer events into stroke segments for one surface
#[derive(Debug, Clone)]
pub struct StrokeCapturer {
    state: CaptureState,
    width: u32,
    height: u32,
}

impl StrokeCapturer {
    /// Create a capturer for a surface of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: CaptureState::Idle,
            width,
            height,
        }
    }

    /// Current session state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Check if a drag session is in progress
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, CaptureState::Dragging { .. })
    }

    /// Feed one pointer event
    ///
    /// Returns the segment to draw, if the event completes one.
    pub fn handle(&mut self, event: &PointerEvent, rect: &ElementRect) -> Option<StrokeSegment> {
        match *event {
            PointerEvent::Down { .. } => {
                // A new press always starts a fresh session
                if self.is_dragging() {
                    debug!("StrokeCapturer: press during drag, restarting session");
                }
                self.state = CaptureState::Dragging { prev: None };
                None
            }
            PointerEvent::Move { client_x, client_y } => {
                let CaptureState::Dragging { prev } = self.state else {
                    return None;
                };

                let current = to_surface_local(client_x, client_y, rect, self.width, self.height);
                if !in_surface_bounds(current, self.width, self.height) {
                    trace!(
                        "StrokeCapturer: move at ({:.1}, {:.1}) outside surface, ending session",
                        current.x, current.y
                    );
                    self.end_session();
                    return None;
                }

                self.state = CaptureState::Dragging {
                    prev: Some(current),
                };
                prev.map(|prev| StrokeSegment::new(prev, current))
            }
            PointerEvent::Up { .. } | PointerEvent::Leave => {
                self.end_session();
                None
            }
        }
    }

    /// Drop any session in progress
    pub fn end_session(&mut self) {
        self.state = CaptureState::Idle;
    }
}
