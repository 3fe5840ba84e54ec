//! OS signal wiring: SIGHUP requests a reload, SIGTERM/SIGINT/SIGQUIT a
//! shutdown. Handlers only set flags; the supervisor loop acts on them.

use signal_hook::SigId;
use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};

use super::supervisor::ControlFlags;
use crate::core::errors::{OpsError, Result};

/// Registered handler ids, kept so they can be removed again.
#[derive(Debug)]
pub struct SignalGuard {
    ids: Vec<SigId>,
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// Route process signals to `control`.
///
/// # Errors
/// Returns [`OpsError::Runtime`] if a handler cannot be installed.
pub fn install(control: &ControlFlags) -> Result<SignalGuard> {
    let mut ids = Vec::with_capacity(4);
    let wiring = [
        (SIGHUP, control.reload_flag()),
        (SIGTERM, control.terminate_flag()),
        (SIGINT, control.terminate_flag()),
        (SIGQUIT, control.terminate_flag()),
    ];
    for (signal, flag) in wiring {
        let id = signal_hook::flag::register(signal, flag).map_err(|err| OpsError::Runtime {
            details: format!("failed to register handler for signal {signal}: {err}"),
        })?;
        ids.push(id);
    }
    Ok(SignalGuard { ids })
}
