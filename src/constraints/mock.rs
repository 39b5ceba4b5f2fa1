//! Recording compositor stand-in for binder and daemon tests.

use super::{ConstraintsError, ConstraintsProtocol, Global, Lifetime, LockSession};
use crate::geometry::Monitor;

/// A protocol request observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    Roundtrip,
    Bind { name: u32, version: u32 },
    Lock {
        manager: u32,
        surface: u32,
        pointer: u32,
        lifetime: Lifetime,
    },
    Release(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Surface(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pointer(pub u32);

/// Compositor stand-in that records every request it receives.
#[derive(Default)]
pub(crate) struct MockCompositor {
    pub globals: Vec<Global>,
    pub requests: Vec<Request>,
    pub fail_roundtrip: bool,
    /// Surface and pointer handed out by `lock_target`.
    pub target: Option<(Surface, Pointer)>,
    next_lock: u32,
}

impl MockCompositor {
    pub fn advertising(globals: &[(u32, &str, u32)]) -> Self {
        Self {
            globals: globals
                .iter()
                .map(|&(name, interface, version)| Global {
                    name,
                    interface: interface.to_string(),
                    version,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn count(&self, pred: impl Fn(&Request) -> bool) -> usize {
        self.requests.iter().filter(|r| pred(r)).count()
    }
}

impl ConstraintsProtocol for MockCompositor {
    type Manager = u32;
    type Surface = Surface;
    type Pointer = Pointer;
    type Lock = u32;

    fn roundtrip_globals(&mut self) -> Result<Vec<Global>, ConstraintsError> {
        self.requests.push(Request::Roundtrip);
        if self.fail_roundtrip {
            return Err(ConstraintsError::Protocol("roundtrip: broken pipe".into()));
        }
        Ok(self.globals.clone())
    }

    fn bind_manager(&mut self, global: &Global, version: u32) -> Result<u32, ConstraintsError> {
        self.requests.push(Request::Bind {
            name: global.name,
            version,
        });
        Ok(global.name)
    }

    fn request_lock(
        &mut self,
        manager: &u32,
        surface: &Surface,
        pointer: &Pointer,
        lifetime: Lifetime,
    ) -> Result<u32, ConstraintsError> {
        self.requests.push(Request::Lock {
            manager: *manager,
            surface: surface.0,
            pointer: pointer.0,
            lifetime,
        });
        self.next_lock += 1;
        Ok(self.next_lock)
    }

    fn release_lock(&mut self, lock: u32) -> Result<(), ConstraintsError> {
        self.requests.push(Request::Release(lock));
        Ok(())
    }
}

impl LockSession for MockCompositor {
    type Error = ConstraintsError;

    fn lock_target(&self) -> Option<(Surface, Pointer)> {
        self.target
    }

    fn dispatch_pending(&mut self) -> Result<usize, ConstraintsError> {
        Ok(0)
    }

    fn outputs(&self) -> Vec<Monitor> {
        Vec::new()
    }

    fn lock_active(&self) -> bool {
        false
    }
}
