//! Touch event delivery to the host

use crate::config::Orientation;

/// Receiver for raw touch positions
///
/// The driver declares the raw coordinate space once during setup, then
/// forwards every active finger of each valid report.
pub trait TouchSink {
    /// Declare the raw extents and orientation used by later positions
    fn set_orientation(&mut self, orientation: Orientation);

    /// A finger at raw position (`x`, `y`)
    fn add_raw_touch(&mut self, id: u8, x: u16, y: u16);

    /// Called before the touches of a new report are forwarded, and when a
    /// report says no finger is down
    fn release_touches(&mut self) {}
}

/// Outcome of reading one touch report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchUpdate {
    /// This many fingers were forwarded to the sink
    Touches(u8),
    /// Report claimed no active fingers, nothing forwarded
    Released,
    /// Report with an impossible finger count, nothing forwarded
    Discarded(u8),
}

/// A touch in logical screen coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchPoint {
    pub id: u8,
    pub x: u16,
    pub y: u16,
    pub x_raw: u16,
    pub y_raw: u16,
}

/// Sink that keeps the latest positions mapped onto a screen
///
/// Positions are replaced by each forwarded report; a discarded report
/// leaves the previous positions in place.
pub struct LogicalTouches {
    width: u16,
    height: u16,
    orientation: Orientation,
    points: [Option<TouchPoint>; 2],
}

impl LogicalTouches {
    pub fn new(width: u16, height: u16) -> Self {
        LogicalTouches {
            width,
            height,
            orientation: Orientation::default(),
            points: [None; 2],
        }
    }

    /// Forget all positions, typically before the next poll
    pub fn clear(&mut self) {
        self.points = [None; 2];
    }

    pub fn get(&self, id: u8) -> Option<TouchPoint> {
        self.points.get(id as usize).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TouchPoint> {
        self.points.iter().flatten()
    }
}

impl TouchSink for LogicalTouches {
    fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    fn release_touches(&mut self) {
        self.clear();
    }

    fn add_raw_touch(&mut self, id: u8, x: u16, y: u16) {
        let (lx, ly) = self.orientation.to_logical(x, y, self.width, self.height);
        if let Some(slot) = self.points.get_mut(id as usize) {
            *slot = Some(TouchPoint {
                id,
                x: lx,
                y: ly,
                x_raw: x,
                y_raw: y,
            });
        }
    }
}
