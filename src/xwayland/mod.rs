//! XWayland integration — decides when the pointer should be locked.
//!
//! A lock is wanted while the focused X11 window covers the whole screen
//! and the cursor image is hidden (XFixes reports an image of at most
//! 1x1). Games running under XWayland do exactly this when they expect
//! relative pointer motion.

pub mod warp;

use std::ffi::OsString;

use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::xfixes;
use x11rb::protocol::xproto::{self, Window};
use x11rb::rust_connection::RustConnection;

pub use warp::WarpThread;

/// XFixes version requested; cursor images need 4.0 or later.
const XFIXES_MAJOR: u32 = 5;
const XFIXES_MINOR: u32 = 0;

/// X11 probe errors.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("X11: {0}")]
    X11(String),
}

/// Whether the environment is a Wayland session with XWayland available.
pub fn session_has_xwayland(lookup: impl Fn(&str) -> Option<OsString>) -> bool {
    lookup("WAYLAND_DISPLAY").is_some() && lookup("DISPLAY").is_some()
}

/// Whether a window of `window` size covers a screen of `screen` size.
pub fn covers_screen(window: (u16, u16), screen: (u16, u16)) -> bool {
    window.0 >= screen.0 && window.1 >= screen.1
}

/// Whether a cursor image of this size is effectively invisible.
pub fn cursor_is_hidden(width: u16, height: u16) -> bool {
    width <= 1 && height <= 1
}

/// XFixes version the server agreed to, or `None` when the extension is
/// missing.
///
/// A send-time failure (the server does not list the extension at all) and
/// a failed reply both leave the probe running without cursor checks.
fn negotiated_version<C>(
    sent: Result<C, ConnectionError>,
    reply: impl FnOnce(C) -> Result<(u32, u32), ReplyError>,
) -> Option<(u32, u32)> {
    let result = match sent {
        Ok(cookie) => reply(cookie),
        Err(e) => Err(ReplyError::ConnectionError(e)),
    };
    match result {
        Ok((major, minor)) => {
            tracing::debug!(major, minor, "XFixes available");
            Some((major, minor))
        }
        Err(e) => {
            tracing::warn!(error = %e, "XFixes unavailable, cursor visibility unknown");
            None
        }
    }
}

/// X11 connection used to inspect the focused XWayland window.
pub struct FocusProbe {
    conn: RustConnection,
    root: Window,
    screen_size: (u16, u16),
    xfixes: bool,
}

impl FocusProbe {
    /// Connect to `DISPLAY` and negotiate XFixes.
    pub fn connect() -> Result<Self, ProbeError> {
        let (conn, screen_num) = RustConnection::connect(None)
            .map_err(|e| ProbeError::X11(format!("connect failed: {e}")))?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let screen_size = (screen.width_in_pixels, screen.height_in_pixels);

        let xfixes = negotiated_version(
            xfixes::query_version(&conn, XFIXES_MAJOR, XFIXES_MINOR),
            |cookie| {
                cookie
                    .reply()
                    .map(|r| (r.major_version, r.minor_version))
            },
        )
        .is_some();

        tracing::debug!(
            width = screen_size.0,
            height = screen_size.1,
            "connected to X11 display"
        );

        Ok(Self {
            conn,
            root,
            screen_size,
            xfixes,
        })
    }

    /// Focused window, or `None` for no focus, the root, or PointerRoot.
    fn focused_window(&self) -> Result<Option<Window>, ProbeError> {
        let focus = xproto::get_input_focus(&self.conn)
            .map_err(|e| ProbeError::X11(format!("get_input_focus: {e}")))?
            .reply()
            .map_err(|e| ProbeError::X11(format!("get_input_focus reply: {e}")))?
            .focus;

        let none = u32::from(xproto::InputFocus::NONE);
        let pointer_root = u32::from(xproto::InputFocus::POINTER_ROOT);
        if focus == none || focus == pointer_root || focus == self.root {
            return Ok(None);
        }
        Ok(Some(focus))
    }

    /// Whether the focused window is fullscreen with a hidden cursor.
    pub fn should_lock(&self) -> Result<bool, ProbeError> {
        let Some(window) = self.focused_window()? else {
            return Ok(false);
        };

        let geometry = xproto::get_geometry(&self.conn, window)
            .map_err(|e| ProbeError::X11(format!("get_geometry: {e}")))?
            .reply()
            .map_err(|e| ProbeError::X11(format!("get_geometry reply: {e}")))?;

        if !covers_screen((geometry.width, geometry.height), self.screen_size) {
            return Ok(false);
        }

        if !self.xfixes {
            return Ok(false);
        }

        let cursor = xfixes::get_cursor_image(&self.conn)
            .map_err(|e| ProbeError::X11(format!("get_cursor_image: {e}")))?
            .reply()
            .map_err(|e| ProbeError::X11(format!("get_cursor_image reply: {e}")))?;

        let hidden = cursor_is_hidden(cursor.width, cursor.height);
        tracing::trace!(
            window,
            cursor_width = cursor.width,
            cursor_height = cursor.height,
            hidden,
            "fullscreen window focused"
        );
        Ok(hidden)
    }

    /// Center of the focused window in root coordinates.
    pub fn focused_window_center(&self) -> Result<Option<(i32, i32)>, ProbeError> {
        let Some(window) = self.focused_window()? else {
            return Ok(None);
        };

        let geometry = xproto::get_geometry(&self.conn, window)
            .map_err(|e| ProbeError::X11(format!("get_geometry: {e}")))?
            .reply()
            .map_err(|e| ProbeError::X11(format!("get_geometry reply: {e}")))?;

        let origin = xproto::translate_coordinates(&self.conn, window, self.root, 0, 0)
            .map_err(|e| ProbeError::X11(format!("translate_coordinates: {e}")))?
            .reply()
            .map_err(|e| ProbeError::X11(format!("translate_coordinates reply: {e}")))?;

        Ok(Some((
            i32::from(origin.dst_x) + i32::from(geometry.width) / 2,
            i32::from(origin.dst_y) + i32::from(geometry.height) / 2,
        )))
    }
}
