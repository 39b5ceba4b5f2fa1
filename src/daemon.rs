//! Pointer lock daemon — polls XWayland and applies lock transitions.
//!
//! Every tick: dispatch Wayland events, ask the focus probe whether a
//! fullscreen window with a hidden cursor is focused, then lock or unlock.
//! Runs until SIGINT/SIGTERM; an active lock is released on the way out.

use std::path::PathBuf;
use std::time::Duration;

use tokio::signal::unix::{SignalKind, signal as tokio_signal};

use crate::constraints::{ConstraintsProtocol, LockSession, PointerConstraints};
use crate::geometry::{self, ScreenSize};
use crate::wayland::WaylandSession;
use crate::xwayland::{self, FocusProbe, ProbeError, WarpThread};

/// Used when no screen geometry can be determined at all.
const LAST_RESORT_CENTER: (i32, i32) = (960, 540);

/// Daemon errors.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon configuration, built from the `run` command line.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// How often the focus probe runs.
    pub poll_interval: Duration,
    /// How often the cursor is warped while locked.
    pub warp_interval: Duration,
    /// Whether to warp the X11 cursor while locked.
    pub warp: bool,
    /// GNOME monitors.xml location; `None` skips it.
    pub monitors_file: Option<PathBuf>,
    /// Screen size used when no monitor information is available.
    pub fallback_screen: ScreenSize,
}

/// What a tick should do given the desired and current lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Lock,
    Unlock,
    Stay,
}

fn transition(should_lock: bool, locked: bool) -> Transition {
    match (should_lock, locked) {
        (true, false) => Transition::Lock,
        (false, true) => Transition::Unlock,
        _ => Transition::Stay,
    }
}

/// A failed check, including an unreadable cursor image, never locks.
fn lock_wanted(checked: &Result<bool, ProbeError>) -> bool {
    matches!(checked, Ok(true))
}

/// A lock the daemon holds, with the warp thread pinning the cursor.
struct ActiveLock<L> {
    locked: L,
    warp: Option<WarpThread>,
}

/// Lock state and the connections it depends on.
pub struct PointerLockDaemon<S: LockSession = WaylandSession> {
    config: DaemonConfig,
    session: Option<S>,
    constraints: PointerConstraints<S>,
    probe: Option<FocusProbe>,
    active: Option<ActiveLock<S::Lock>>,
}

impl PointerLockDaemon {
    /// Connect to Wayland and bind pointer constraints.
    ///
    /// A missing Wayland display is not fatal: the daemon keeps running
    /// without pointer constraints.
    pub fn new(config: DaemonConfig) -> Self {
        let session = match WaylandSession::connect() {
            Ok(s) => {
                tracing::info!("connected to Wayland display");
                Some(s)
            }
            Err(e) => {
                tracing::warn!(error = %e, "running without pointer constraints");
                eprintln!("failed to connect to Wayland: {e}, running without pointer constraints");
                None
            }
        };
        Self::with_session(config, session)
    }
}

impl<S: LockSession> PointerLockDaemon<S> {
    /// Bind pointer constraints on an already connected session.
    fn with_session(config: DaemonConfig, mut session: Option<S>) -> Self {
        let mut constraints = PointerConstraints::new();
        if let Err(e) = constraints.init(session.as_mut()) {
            tracing::warn!(error = %e, "pointer constraints unavailable");
        }

        Self {
            config,
            session,
            constraints,
            probe: None,
            active: None,
        }
    }

    fn is_locked(&self) -> bool {
        self.active.is_some()
    }

    /// One poll tick.
    pub fn update(&mut self) {
        if let Some(session) = self.session.as_mut()
            && let Err(e) = session.dispatch_pending()
        {
            tracing::warn!(error = %e, "Wayland dispatch failed");
        }

        let should_lock = self.should_lock();
        match transition(should_lock, self.is_locked()) {
            Transition::Lock => self.lock(),
            Transition::Unlock => self.unlock(),
            Transition::Stay => {}
        }
    }

    fn should_lock(&mut self) -> bool {
        if !xwayland::session_has_xwayland(|k| std::env::var_os(k)) {
            return false;
        }

        let Some(probe) = self.focus_probe() else {
            return false;
        };
        let checked = probe.should_lock();
        if let Err(e) = &checked {
            tracing::warn!(error = %e, "focus probe failed, reconnecting next tick");
            self.probe = None;
        }
        lock_wanted(&checked)
    }

    /// The focus probe, connecting on demand.
    fn focus_probe(&mut self) -> Option<&FocusProbe> {
        if self.probe.is_none() {
            match FocusProbe::connect() {
                Ok(p) => self.probe = Some(p),
                Err(e) => {
                    tracing::debug!(error = %e, "X11 probe unavailable");
                    return None;
                }
            }
        }
        self.probe.as_ref()
    }

    fn lock(&mut self) {
        let Some(session) = self.session.as_mut() else {
            tracing::debug!("no Wayland session, cannot lock");
            return;
        };
        if !self.constraints.is_bound() {
            tracing::debug!("pointer constraints protocol not available");
            return;
        }
        let Some((surface, pointer)) = session.lock_target() else {
            tracing::debug!("surface or pointer device not available");
            return;
        };

        tracing::info!("locking pointer for fullscreen XWayland window with hidden cursor");
        let locked = match self.constraints.lock_pointer(session, &surface, &pointer) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "pointer lock failed");
                return;
            }
        };

        if let Err(e) = session.dispatch_pending() {
            tracing::warn!(error = %e, "dispatch after lock failed");
        }

        let warp = if self.config.warp {
            let center = self.warp_center();
            match WarpThread::spawn(center, self.config.warp_interval) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::error!(error = %e, "cursor warping unavailable");
                    None
                }
            }
        } else {
            None
        };

        self.active = Some(ActiveLock { locked, warp });
    }

    fn unlock(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        tracing::info!("unlocking pointer");
        if let Some(warp) = active.warp {
            warp.stop();
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.release_lock(active.locked) {
            tracing::warn!(error = %e, "releasing pointer lock failed");
        }
        if let Err(e) = session.dispatch_pending() {
            tracing::debug!(error = %e, "dispatch after unlock failed");
        }
    }

    /// Where the cursor is pinned: monitors.xml, then Wayland outputs,
    /// then the configured fallback screen.
    fn warp_center(&self) -> (i32, i32) {
        let focus = self
            .probe
            .as_ref()
            .and_then(|p| p.focused_window_center().ok().flatten());

        if let Some(path) = &self.config.monitors_file
            && let Some(monitors) = geometry::load_monitors_xml(path)
            && let Some(center) = geometry::select_center(&monitors, focus)
        {
            tracing::debug!(?center, monitors = monitors.len(), "warp center from monitors.xml");
            return center;
        }

        if let Some(session) = &self.session {
            let outputs = session.outputs();
            if let Some(center) = geometry::select_center(&outputs, focus) {
                tracing::debug!(?center, outputs = outputs.len(), "warp center from Wayland outputs");
                return center;
            }
        }

        let center = self.config.fallback_screen.center();
        if center.0 > 0 && center.1 > 0 {
            center
        } else {
            LAST_RESORT_CENTER
        }
    }

    /// Release any active lock.
    pub fn shutdown(&mut self) {
        self.unlock();
        tracing::info!(
            compositor_lock_active = self.session.as_ref().is_some_and(|s| s.lock_active()),
            "daemon stopped"
        );
    }
}

/// Run the daemon until a termination signal arrives.
pub async fn run(config: DaemonConfig) -> Result<(), DaemonError> {
    tracing::info!(
        poll_ms = config.poll_interval.as_millis() as u64,
        warp = config.warp,
        "starting demonhide daemon"
    );

    let poll_interval = config.poll_interval;
    let mut daemon = PointerLockDaemon::new(config);

    let mut sig_term = tokio_signal(SignalKind::terminate())?;
    let mut sig_int = tokio_signal(SignalKind::interrupt())?;
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!("daemon running — press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = ticker.tick() => daemon.update(),

            _ = sig_term.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                break;
            }

            _ = sig_int.recv() => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    daemon.shutdown();
    Ok(())
}
