//! One-shot probe — bind pointer constraints and report the result.

use crate::constraints::{
    ConstraintsError, LockSession, POINTER_CONSTRAINTS_INTERFACE, PointerConstraints,
};
use crate::wayland::{SessionError, WaylandSession};

/// Probe errors.
#[derive(Debug, thiserror::Error)]
pub enum ProbeCommandError {
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Constraints(#[from] ConstraintsError),
}

/// Connect, bind pointer constraints and print what was found.
///
/// With `list_globals`, every advertised global is printed first.
pub fn run(list_globals: bool) -> Result<(), ProbeCommandError> {
    let mut session = WaylandSession::connect()?;

    if list_globals {
        for g in session.globals() {
            println!("[{}] {} (v{})", g.name, g.interface, g.version);
        }
    }

    let mut constraints = PointerConstraints::new();
    let name = constraints.init(Some(&mut session))?;
    println!("bound {POINTER_CONSTRAINTS_INTERFACE} (global {name})");

    match session.lock_target() {
        Some(_) => println!("pointer device and surface available"),
        None => println!("no pointer device or surface, locking would be skipped"),
    }
    Ok(())
}
