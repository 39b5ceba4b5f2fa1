//! `wl_output` geometry tracking.

use wayland_client::WEnum;
use wayland_client::protocol::wl_output;

use crate::geometry::Monitor;

/// Position, current mode and scale reported by one output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputInfo {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub scale: i32,
}

impl OutputInfo {
    /// Fold one output event into the tracked state.
    pub fn apply(&mut self, event: wl_output::Event) {
        match event {
            wl_output::Event::Geometry { x, y, .. } => {
                self.x = x;
                self.y = y;
            }
            wl_output::Event::Mode {
                flags,
                width,
                height,
                ..
            } => {
                // Only the current mode describes the visible area.
                if let WEnum::Value(flags) = flags
                    && flags.contains(wl_output::Mode::Current)
                {
                    self.width = width;
                    self.height = height;
                }
            }
            wl_output::Event::Scale { factor } => self.scale = factor,
            _ => {}
        }
    }

    /// The output as a monitor, once a current mode has been reported.
    pub fn as_monitor(&self) -> Option<Monitor> {
        if self.width <= 0 || self.height <= 0 {
            return None;
        }
        Some(Monitor {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            scale: self.scale.max(1),
        })
    }
}
