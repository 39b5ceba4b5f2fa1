//! Pointer constraints binder — registry lookup and persistent lock requests.
//!
//! Binds `zwp_pointer_constraints_v1` from the compositor's advertised
//! globals and issues `lock_pointer` requests against it. The protocol
//! plumbing sits behind `ConstraintsProtocol` so the binder's state
//! machine (unbound → bound, at most once) is independent of the
//! Wayland connection that carries it.

#[cfg(test)]
pub(crate) mod mock;

use crate::geometry::Monitor;

/// Interface name of the pointer constraints manager global.
pub const POINTER_CONSTRAINTS_INTERFACE: &str = "zwp_pointer_constraints_v1";

/// Highest manager version this client speaks.
pub const POINTER_CONSTRAINTS_VERSION: u32 = 1;

/// Errors returned by the binder.
#[derive(Debug, thiserror::Error)]
pub enum ConstraintsError {
    /// No display connection was supplied.
    #[error("no Wayland display")]
    NoDisplay,

    /// The compositor finished enumerating globals without offering the
    /// manager interface.
    #[error("compositor does not advertise zwp_pointer_constraints_v1")]
    NotAdvertised,

    /// A lock was requested before a successful bind.
    #[error("zwp_pointer_constraints_v1 is not bound")]
    Unbound,

    /// Roundtrip or request failure on the underlying connection.
    #[error("protocol: {0}")]
    Protocol(String),
}

/// A global object advertised by the compositor registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    /// Registry name (numeric id) of the global.
    pub name: u32,
    /// Interface name, e.g. `wl_seat`.
    pub interface: String,
    /// Highest version the compositor supports.
    pub version: u32,
}

/// How long a pointer constraint stays in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Destroyed by the compositor after the first deactivation.
    #[allow(dead_code)]
    Oneshot,
    /// Survives deactivation and may be reactivated by the compositor.
    Persistent,
}

/// Returns the first global advertising `interface`, in advertisement order.
pub fn first_advertised<'a>(globals: &'a [Global], interface: &str) -> Option<&'a Global> {
    globals.iter().find(|g| g.interface == interface)
}

/// Requests the binder needs from a live compositor connection.
///
/// Handle types are associated so that a pointer can never be passed
/// where a surface is expected.
pub trait ConstraintsProtocol {
    /// Bound `zwp_pointer_constraints_v1` manager.
    type Manager;
    /// Surface the pointer is locked to.
    type Surface;
    /// Pointer device being locked.
    type Pointer;
    /// Lock object returned by a lock request.
    type Lock;

    /// Flush pending requests and block until the compositor has answered
    /// them, then return the globals advertised so far.
    fn roundtrip_globals(&mut self) -> Result<Vec<Global>, ConstraintsError>;

    /// Bind the manager from `global` at `version`.
    fn bind_manager(
        &mut self,
        global: &Global,
        version: u32,
    ) -> Result<Self::Manager, ConstraintsError>;

    /// Issue one lock request with no confinement region.
    fn request_lock(
        &mut self,
        manager: &Self::Manager,
        surface: &Self::Surface,
        pointer: &Self::Pointer,
        lifetime: Lifetime,
    ) -> Result<Self::Lock, ConstraintsError>;

    /// Destroy a lock object, ending the constraint.
    fn release_lock(&mut self, lock: Self::Lock) -> Result<(), ConstraintsError>;
}

/// A compositor connection that can also supply what a lock is issued
/// against and pump its event queue.
pub trait LockSession: ConstraintsProtocol {
    type Error: std::fmt::Display;

    /// Surface and pointer to lock, if both exist.
    fn lock_target(&self) -> Option<(Self::Surface, Self::Pointer)>;

    /// Flush requests and dispatch whatever events have arrived.
    fn dispatch_pending(&mut self) -> Result<usize, Self::Error>;

    /// Outputs that have reported a current mode.
    fn outputs(&self) -> Vec<Monitor>;

    /// Whether the compositor currently reports the lock as active.
    fn lock_active(&self) -> bool;
}

/// Caller-owned pointer constraints binding.
///
/// Starts unbound; `init` binds it at most once for its lifetime.
pub struct PointerConstraints<P: ConstraintsProtocol> {
    manager: Option<P::Manager>,
    global: Option<u32>,
}

impl<P: ConstraintsProtocol> PointerConstraints<P> {
    pub fn new() -> Self {
        Self {
            manager: None,
            global: None,
        }
    }

    /// Whether a manager has been bound.
    pub fn is_bound(&self) -> bool {
        self.manager.is_some()
    }

    /// Enumerate globals once and bind the first pointer constraints
    /// manager.
    ///
    /// Returns the registry name of the bound global. Calling this on an
    /// already bound value returns the existing name without touching the
    /// registry.
    pub fn init(&mut self, display: Option<&mut P>) -> Result<u32, ConstraintsError> {
        let Some(display) = display else {
            tracing::error!("cannot bind pointer constraints: display is missing");
            return Err(ConstraintsError::NoDisplay);
        };

        if let Some(name) = self.global {
            return Ok(name);
        }

        let globals = display.roundtrip_globals()?;
        let Some(global) = first_advertised(&globals, POINTER_CONSTRAINTS_INTERFACE) else {
            tracing::warn!(
                globals = globals.len(),
                "failed to bind {POINTER_CONSTRAINTS_INTERFACE}: not advertised"
            );
            return Err(ConstraintsError::NotAdvertised);
        };

        let version = global.version.min(POINTER_CONSTRAINTS_VERSION);
        let manager = display.bind_manager(global, version)?;
        tracing::info!(global = global.name, version, "bound {POINTER_CONSTRAINTS_INTERFACE}");

        self.manager = Some(manager);
        self.global = Some(global.name);
        Ok(global.name)
    }

    /// Lock `pointer` to `surface` for a persistent lifetime with no region.
    ///
    /// Makes no request at all when unbound.
    pub fn lock_pointer(
        &self,
        display: &mut P,
        surface: &P::Surface,
        pointer: &P::Pointer,
    ) -> Result<P::Lock, ConstraintsError> {
        let manager = self.manager.as_ref().ok_or(ConstraintsError::Unbound)?;
        let lock = display.request_lock(manager, surface, pointer, Lifetime::Persistent)?;
        tracing::info!("pointer lock requested");
        Ok(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockCompositor, Pointer, Request, Surface};
    use super::*;

    fn binder() -> PointerConstraints<MockCompositor> {
        PointerConstraints::new()
    }

    // -- Registry binding --

    #[test]
    fn missing_display_makes_no_registry_access() {
        let mut pc = binder();
        let err = pc.init(None).unwrap_err();
        assert!(matches!(err, ConstraintsError::NoDisplay));
        assert!(!pc.is_bound());
    }

    #[test]
    fn binds_advertised_manager() {
        let mut comp = MockCompositor::advertising(&[
            (1, "wl_compositor", 6),
            (7, POINTER_CONSTRAINTS_INTERFACE, 1),
            (9, "wl_seat", 9),
        ]);
        let mut pc = binder();
        assert_eq!(pc.init(Some(&mut comp)).unwrap(), 7);
        assert!(pc.is_bound());
        assert_eq!(
            comp.requests,
            vec![Request::Roundtrip, Request::Bind { name: 7, version: 1 }]
        );
    }

    #[test]
    fn binds_first_of_duplicate_globals() {
        let mut comp = MockCompositor::advertising(&[
            (4, POINTER_CONSTRAINTS_INTERFACE, 1),
            (5, POINTER_CONSTRAINTS_INTERFACE, 1),
        ]);
        let mut pc = binder();
        assert_eq!(pc.init(Some(&mut comp)).unwrap(), 4);
        assert_eq!(comp.count(|r| matches!(r, Request::Bind { .. })), 1);
    }

    #[test]
    fn clamps_bind_version() {
        let mut comp = MockCompositor::advertising(&[(3, POINTER_CONSTRAINTS_INTERFACE, 5)]);
        let mut pc = binder();
        pc.init(Some(&mut comp)).unwrap();
        assert!(comp.requests.contains(&Request::Bind { name: 3, version: 1 }));
    }

    #[test]
    fn unadvertised_manager_stays_unbound() {
        let mut comp = MockCompositor::advertising(&[(1, "wl_compositor", 6), (2, "wl_seat", 9)]);
        let mut pc = binder();
        let err = pc.init(Some(&mut comp)).unwrap_err();
        assert!(matches!(err, ConstraintsError::NotAdvertised));
        assert!(!pc.is_bound());
        assert_eq!(comp.requests, vec![Request::Roundtrip]);
    }

    #[test]
    fn init_on_bound_binder_skips_registry() {
        let mut comp = MockCompositor::advertising(&[(7, POINTER_CONSTRAINTS_INTERFACE, 1)]);
        let mut pc = binder();
        pc.init(Some(&mut comp)).unwrap();
        assert_eq!(pc.init(Some(&mut comp)).unwrap(), 7);
        assert_eq!(comp.count(|r| *r == Request::Roundtrip), 1);
        assert_eq!(comp.count(|r| matches!(r, Request::Bind { .. })), 1);
    }

    #[test]
    fn roundtrip_failure_is_reported() {
        let mut comp = MockCompositor::advertising(&[(7, POINTER_CONSTRAINTS_INTERFACE, 1)]);
        comp.fail_roundtrip = true;
        let mut pc = binder();
        let err = pc.init(Some(&mut comp)).unwrap_err();
        assert!(matches!(err, ConstraintsError::Protocol(_)));
        assert!(!pc.is_bound());
    }

    // -- Lock requests --

    #[test]
    fn lock_before_bind_makes_no_requests() {
        let mut comp = MockCompositor::advertising(&[(7, POINTER_CONSTRAINTS_INTERFACE, 1)]);
        let pc = binder();
        let err = pc
            .lock_pointer(&mut comp, &Surface(10), &Pointer(20))
            .unwrap_err();
        assert!(matches!(err, ConstraintsError::Unbound));
        assert!(comp.requests.is_empty());
    }

    #[test]
    fn lock_after_bind_issues_one_persistent_request() {
        let mut comp = MockCompositor::advertising(&[(7, POINTER_CONSTRAINTS_INTERFACE, 1)]);
        let mut pc = binder();
        pc.init(Some(&mut comp)).unwrap();
        comp.requests.clear();

        let lock = pc
            .lock_pointer(&mut comp, &Surface(10), &Pointer(20))
            .unwrap();
        assert_eq!(lock, 1);
        assert_eq!(
            comp.requests,
            vec![Request::Lock {
                manager: 7,
                surface: 10,
                pointer: 20,
                lifetime: Lifetime::Persistent,
            }]
        );
    }

    #[test]
    fn first_advertised_preserves_order() {
        let globals = vec![
            Global {
                name: 2,
                interface: "wl_output".into(),
                version: 4,
            },
            Global {
                name: 3,
                interface: "wl_output".into(),
                version: 4,
            },
        ];
        assert_eq!(first_advertised(&globals, "wl_output").map(|g| g.name), Some(2));
        assert!(first_advertised(&globals, "wl_seat").is_none());
    }
}
