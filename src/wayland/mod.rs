//! Wayland session — connection, event queue and the globals a pointer
//! lock needs.
//!
//! Binds `wl_seat` (for a `wl_pointer`), `wl_compositor` (for a committed
//! surface to lock against) and every `wl_output` (for warp geometry).
//! The pointer constraints manager itself is bound through
//! `PointerConstraints`, which drives this session via
//! `ConstraintsProtocol`.

mod output;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use wayland_client::protocol::{
    wl_compositor, wl_output, wl_pointer, wl_registry, wl_seat, wl_surface,
};
use wayland_client::{Connection, Dispatch, EventQueue, QueueHandle, WEnum, delegate_noop};
use wayland_protocols::wp::pointer_constraints::zv1::client::{
    zwp_locked_pointer_v1, zwp_pointer_constraints_v1,
};

use crate::constraints::{
    ConstraintsError, ConstraintsProtocol, Global, Lifetime, LockSession, first_advertised,
};
use crate::geometry::Monitor;

use output::OutputInfo;

const SEAT_VERSION: u32 = 1;
const COMPOSITOR_VERSION: u32 = 4;
const OUTPUT_VERSION: u32 = 3;

/// Wayland session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connect: {0}")]
    Connect(#[from] wayland_client::ConnectError),
    #[error("dispatch: {0}")]
    Dispatch(String),
    #[error("I/O: {0}")]
    Io(String),
}

/// Objects and events collected while dispatching.
#[derive(Default)]
pub struct SessionState {
    globals: Vec<Global>,
    seat: Option<wl_seat::WlSeat>,
    pointer: Option<wl_pointer::WlPointer>,
    compositor: Option<wl_compositor::WlCompositor>,
    surface: Option<wl_surface::WlSurface>,
    outputs: Vec<(wl_output::WlOutput, OutputInfo)>,
    lock_active: bool,
}

/// A live Wayland connection with its event queue.
pub struct WaylandSession {
    _conn: Connection,
    queue: EventQueue<SessionState>,
    qh: QueueHandle<SessionState>,
    registry: wl_registry::WlRegistry,
    state: SessionState,
}

impl WaylandSession {
    /// Connect via `WAYLAND_DISPLAY`, bind seat/compositor/outputs and
    /// commit a bare surface for locking.
    pub fn connect() -> Result<Self, SessionError> {
        let conn = Connection::connect_to_env()?;
        let queue = conn.new_event_queue();
        let qh = queue.handle();
        let registry = conn.display().get_registry(&qh, ());

        let mut session = Self {
            _conn: conn,
            queue,
            qh,
            registry,
            state: SessionState::default(),
        };

        // First roundtrip: globals.
        session.roundtrip()?;
        session.bind_core_globals();

        // Second roundtrip: seat capabilities and output geometry.
        session.roundtrip()?;

        if let Some(compositor) = &session.state.compositor {
            let surface = compositor.create_surface(&session.qh, ());
            surface.commit();
            session.state.surface = Some(surface);
            tracing::debug!("created surface for pointer locking");
        } else {
            tracing::warn!("compositor missing, cannot create surface");
        }

        tracing::info!(
            globals = session.state.globals.len(),
            outputs = session.state.outputs.len(),
            "Wayland session initialized"
        );
        Ok(session)
    }

    fn roundtrip(&mut self) -> Result<usize, SessionError> {
        self.queue
            .roundtrip(&mut self.state)
            .map_err(|e| SessionError::Dispatch(format!("roundtrip: {e}")))
    }

    fn bind_core_globals(&mut self) {
        let globals = self.state.globals.clone();

        if let Some(g) = first_advertised(&globals, "wl_seat") {
            let seat = self.registry.bind::<wl_seat::WlSeat, _, _>(
                g.name,
                g.version.min(SEAT_VERSION),
                &self.qh,
                (),
            );
            tracing::debug!(global = g.name, "bound wl_seat");
            self.state.seat = Some(seat);
        }

        if let Some(g) = first_advertised(&globals, "wl_compositor") {
            let compositor = self.registry.bind::<wl_compositor::WlCompositor, _, _>(
                g.name,
                g.version.min(COMPOSITOR_VERSION),
                &self.qh,
                (),
            );
            tracing::debug!(global = g.name, "bound wl_compositor");
            self.state.compositor = Some(compositor);
        }

        for g in globals.iter().filter(|g| g.interface == "wl_output") {
            let output = self.registry.bind::<wl_output::WlOutput, _, _>(
                g.name,
                g.version.min(OUTPUT_VERSION),
                &self.qh,
                (),
            );
            tracing::debug!(global = g.name, "bound wl_output");
            self.state.outputs.push((output, OutputInfo::default()));
        }
    }

    /// Globals advertised so far, in advertisement order.
    pub fn globals(&self) -> &[Global] {
        &self.state.globals
    }
}

impl ConstraintsProtocol for WaylandSession {
    type Manager = zwp_pointer_constraints_v1::ZwpPointerConstraintsV1;
    type Surface = wl_surface::WlSurface;
    type Pointer = wl_pointer::WlPointer;
    type Lock = zwp_locked_pointer_v1::ZwpLockedPointerV1;

    fn roundtrip_globals(&mut self) -> Result<Vec<Global>, ConstraintsError> {
        self.roundtrip()
            .map_err(|e| ConstraintsError::Protocol(e.to_string()))?;
        Ok(self.state.globals.clone())
    }

    fn bind_manager(
        &mut self,
        global: &Global,
        version: u32,
    ) -> Result<Self::Manager, ConstraintsError> {
        Ok(self
            .registry
            .bind::<zwp_pointer_constraints_v1::ZwpPointerConstraintsV1, _, _>(
                global.name,
                version,
                &self.qh,
                (),
            ))
    }

    fn request_lock(
        &mut self,
        manager: &Self::Manager,
        surface: &Self::Surface,
        pointer: &Self::Pointer,
        lifetime: Lifetime,
    ) -> Result<Self::Lock, ConstraintsError> {
        let lock = manager.lock_pointer(surface, pointer, None, lifetime.into(), &self.qh, ());
        self.queue
            .flush()
            .map_err(|e| ConstraintsError::Protocol(format!("flush: {e}")))?;
        Ok(lock)
    }

    fn release_lock(&mut self, lock: Self::Lock) -> Result<(), ConstraintsError> {
        lock.destroy();
        self.state.lock_active = false;
        self.queue
            .flush()
            .map_err(|e| ConstraintsError::Protocol(format!("flush: {e}")))
    }
}

impl LockSession for WaylandSession {
    type Error = SessionError;

    fn lock_target(&self) -> Option<(Self::Surface, Self::Pointer)> {
        Some((self.state.surface.clone()?, self.state.pointer.clone()?))
    }

    fn outputs(&self) -> Vec<Monitor> {
        self.state
            .outputs
            .iter()
            .filter_map(|(_, info)| info.as_monitor())
            .collect()
    }

    fn lock_active(&self) -> bool {
        self.state.lock_active
    }

    /// Flush requests, read whatever is readable without blocking, and
    /// dispatch queued events.
    fn dispatch_pending(&mut self) -> Result<usize, SessionError> {
        self.queue
            .flush()
            .map_err(|e| SessionError::Io(format!("flush: {e}")))?;

        if let Some(guard) = self.queue.prepare_read() {
            let readable = {
                let mut fds = [PollFd::new(guard.connection_fd(), PollFlags::POLLIN)];
                match poll(&mut fds, PollTimeout::ZERO) {
                    Ok(n) => n > 0,
                    Err(nix::Error::EINTR) => false,
                    Err(e) => return Err(SessionError::Io(format!("poll: {e}"))),
                }
            };
            if readable {
                guard
                    .read()
                    .map_err(|e| SessionError::Io(format!("read: {e}")))?;
            }
        }

        self.queue
            .dispatch_pending(&mut self.state)
            .map_err(|e| SessionError::Dispatch(format!("dispatch_pending: {e}")))
    }
}

impl From<Lifetime> for zwp_pointer_constraints_v1::Lifetime {
    fn from(lifetime: Lifetime) -> Self {
        match lifetime {
            Lifetime::Oneshot => Self::Oneshot,
            Lifetime::Persistent => Self::Persistent,
        }
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for SessionState {
    fn event(
        state: &mut Self,
        _: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                tracing::trace!(name, %interface, version, "global advertised");
                state.globals.push(Global {
                    name,
                    interface,
                    version,
                });
            }
            wl_registry::Event::GlobalRemove { name } => {
                tracing::debug!(name, "global removed");
                state.globals.retain(|g| g.name != name);
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for SessionState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_seat::Event::Capabilities { capabilities } = event {
            let has_pointer = matches!(
                capabilities,
                WEnum::Value(caps) if caps.contains(wl_seat::Capability::Pointer)
            );
            tracing::debug!(?capabilities, "seat capabilities");

            if has_pointer {
                if state.pointer.is_none() {
                    state.pointer = Some(seat.get_pointer(qh, ()));
                    tracing::info!("created pointer device");
                }
            } else {
                tracing::warn!("seat has no pointer capability");
            }
        }
    }
}

impl Dispatch<wl_output::WlOutput, ()> for SessionState {
    fn event(
        state: &mut Self,
        output: &wl_output::WlOutput,
        event: wl_output::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let Some((_, info)) = state.outputs.iter_mut().find(|(o, _)| o == output) {
            info.apply(event);
        }
    }
}

impl Dispatch<zwp_locked_pointer_v1::ZwpLockedPointerV1, ()> for SessionState {
    fn event(
        state: &mut Self,
        _: &zwp_locked_pointer_v1::ZwpLockedPointerV1,
        event: zwp_locked_pointer_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwp_locked_pointer_v1::Event::Locked => {
                state.lock_active = true;
                tracing::info!("pointer locked");
            }
            zwp_locked_pointer_v1::Event::Unlocked => {
                // Persistent locks may be reactivated, so the object is kept.
                state.lock_active = false;
                tracing::info!("pointer unlocked by compositor");
            }
            _ => {}
        }
    }
}

delegate_noop!(SessionState: ignore wl_compositor::WlCompositor);
delegate_noop!(SessionState: ignore wl_surface::WlSurface);
delegate_noop!(SessionState: ignore wl_pointer::WlPointer);
delegate_noop!(SessionState: ignore zwp_pointer_constraints_v1::ZwpPointerConstraintsV1);
