//! Signal handling for the interactive loop.
//!
//! The shell never dies from SIGINT, SIGTERM or SIGHUP. A listener thread
//! records the latest one in a pending flag that the REPL checks between
//! commands, and relays termination requests to whatever foreground children
//! are being waited on.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use log::{debug, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use once_cell::sync::OnceCell;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

/// Pids of the children the shell is currently waiting on in the foreground.
#[derive(Clone, Default)]
pub struct Foreground {
    pids: Arc<Mutex<HashSet<u32>>>,
}

impl Foreground {
    fn lock(&self) -> MutexGuard<'_, HashSet<u32>> {
        self.pids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `pids` until the returned guard is dropped.
    pub fn track(&self, pids: impl IntoIterator<Item = u32>) -> ForegroundGuard {
        let pids: Vec<u32> = pids.into_iter().collect();
        self.lock().extend(pids.iter().copied());
        ForegroundGuard {
            foreground: self.clone(),
            pids,
        }
    }

    pub fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.lock().iter().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn forward(&self, signal: Signal) {
        for pid in self.pids() {
            match kill(Pid::from_raw(pid as i32), signal) {
                Ok(()) => debug!("forwarded {} to {}", signal, pid),
                Err(Errno::ESRCH) => {}
                Err(e) => warn!("could not forward {} to {}: {}", signal, pid, e),
            }
        }
    }
}

pub struct ForegroundGuard {
    foreground: Foreground,
    pids: Vec<u32>,
}

impl Drop for ForegroundGuard {
    fn drop(&mut self) {
        let mut set = self.foreground.lock();
        for pid in &self.pids {
            set.remove(pid);
        }
    }
}

/// The most recent signal not yet handled by the REPL.
#[derive(Clone, Default)]
pub struct Pending {
    signal: Arc<AtomicI32>,
}

impl Pending {
    pub(super) fn record(&self, signal: i32) {
        self.signal.store(signal, Ordering::SeqCst);
    }

    pub fn take(&self) -> Option<i32> {
        match self.signal.swap(0, Ordering::SeqCst) {
            0 => None,
            signal => Some(signal),
        }
    }
}

/// Process-wide signal state shared by the REPL and the executor.
#[derive(Clone, Default)]
pub struct SignalState {
    pub pending: Pending,
    pub foreground: Foreground,
}

static INSTALLED: OnceCell<SignalState> = OnceCell::new();

/// Starts the listener thread on first call; later calls return the same
/// state.
pub fn install() -> io::Result<&'static SignalState> {
    INSTALLED.get_or_try_init(|| {
        let state = SignalState::default();
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
        let listener = state.clone();
        thread::Builder::new()
            .name("conduit-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    info!("received signal {}", signal);
                    listener.pending.record(signal);
                    if signal == SIGINT {
                        continue;
                    }
                    if let Ok(signal) = Signal::try_from(signal) {
                        listener.foreground.forward(signal);
                    }
                }
            })?;
        debug!("signal listener installed");
        Ok(state)
    })
}
