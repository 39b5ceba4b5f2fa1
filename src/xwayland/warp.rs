//! Cursor warp thread — pins the X11 cursor while the pointer is locked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use x11rb::connection::Connection;
use x11rb::protocol::xproto;
use x11rb::rust_connection::RustConnection;

use super::ProbeError;

/// Background thread that repeatedly warps the cursor to one point.
///
/// Owns its own X11 connection; the only shared state is the stop flag.
pub struct WarpThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl WarpThread {
    /// Start warping to `target` (root coordinates) every `interval`.
    pub fn spawn(target: (i32, i32), interval: Duration) -> Result<Self, ProbeError> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("cursor-warp".into())
            .spawn(move || run(target, interval, &flag))
            .map_err(|e| ProbeError::X11(format!("spawn warp thread: {e}")))?;

        Ok(Self { stop, handle })
    }

    /// Signal the thread to stop and wait for it.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Err(e) = self.handle.join() {
            tracing::warn!("warp thread panicked: {e:?}");
        }
    }
}

/// Clamp a root coordinate into the X11 16-bit range.
fn to_x11_coord(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

fn run(target: (i32, i32), interval: Duration, stop: &AtomicBool) {
    let (conn, screen_num) = match RustConnection::connect(None) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "could not open X display for warping");
            return;
        }
    };
    let root = conn.setup().roots[screen_num].root;
    let (x, y) = (to_x11_coord(target.0), to_x11_coord(target.1));

    tracing::debug!(x, y, "cursor warping started");

    while !stop.load(Ordering::Relaxed) {
        let sent = xproto::warp_pointer(&conn, x11rb::NONE, root, 0, 0, 0, 0, x, y)
            .map(|_| ())
            .and_then(|()| conn.flush());
        if let Err(e) = sent {
            tracing::error!(error = %e, "warp_pointer failed, stopping warp thread");
            return;
        }
        std::thread::sleep(interval);
    }

    tracing::debug!("cursor warping stopped");
}
