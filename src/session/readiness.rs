//! Background readiness polling
//!
//! The engine must report initialized before the controller may ask it to
//! download a map. The check runs on its own tokio task with a short fixed
//! sleep between attempts and posts a single `EngineReady` envelope back to
//! the control context. It never touches session state itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, trace};

use crate::session::ports::MappingEngine;
use crate::session::state::{Envelope, SessionEvent};

/// How a poller finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The engine reported initialized and `EngineReady` was posted
    Ready,
    /// The session was reset while polling; nothing was posted
    Superseded,
    /// The control context went away
    ControlClosed,
}

/// Spawn a poller for the session generation `epoch`.
///
/// `current_epoch` is the controller's live counter; the poller gives up as
/// soon as it moves past `epoch`.
pub fn spawn_readiness_poller(
    engine: Arc<dyn MappingEngine>,
    interval: Duration,
    epoch: u64,
    current_epoch: Arc<AtomicU64>,
    events: UnboundedSender<Envelope>,
) -> JoinHandle<PollOutcome> {
    tokio::spawn(async move {
        let mut attempts: u64 = 0;
        loop {
            if current_epoch.load(Ordering::Acquire) != epoch {
                debug!(epoch, attempts, "readiness poll superseded");
                return PollOutcome::Superseded;
            }
            if events.is_closed() {
                return PollOutcome::ControlClosed;
            }
            if engine.initialized() {
                debug!(epoch, attempts, "mapping engine ready");
                return match events.send(Envelope::new(epoch, SessionEvent::EngineReady)) {
                    Ok(()) => PollOutcome::Ready,
                    Err(_) => PollOutcome::ControlClosed,
                };
            }
            attempts += 1;
            trace!(epoch, attempts, "mapping engine not ready");
            time::sleep(interval).await;
        }
    })
}
