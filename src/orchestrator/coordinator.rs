//! Dependency coordinator.
//!
//! A single actor task owns the waiter list. Registrations and notifications
//! arrive through one ordered inbox, so a notification only reaches the
//! waiters registered before it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::{KumiageError, Result};

/// Outcome delivered to a waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The dependency is ready.
    Ready,
    /// The dependency failed to launch.
    Failed,
}

enum Event {
    Register {
        dependency: String,
        reply: oneshot::Sender<Readiness>,
        or_launched: bool,
    },
    Notify {
        service: String,
        readiness: Readiness,
    },
}

/// Handle to the coordinator actor. Clones share the same inbox.
#[derive(Debug, Clone)]
pub struct Coordinator {
    inbox: mpsc::UnboundedSender<Event>,
    registrations: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Register { dependency, .. } => write!(f, "Register({})", dependency),
            Event::Notify { service, readiness } => {
                write!(f, "Notify({}, {:?})", service, readiness)
            }
        }
    }
}

impl Coordinator {
    /// Spawns the actor on the current runtime.
    ///
    /// The actor stops once every handle has been dropped.
    pub fn spawn() -> Self {
        let (inbox, events) = mpsc::unbounded_channel();
        tokio::spawn(run(events));
        Self {
            inbox,
            registrations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of waits registered through any clone of this handle.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::Acquire)
    }

    /// Registers interest in `dependency` becoming ready.
    ///
    /// Only notifications processed after this registration signal the
    /// returned handle.
    pub fn register_wait(&self, dependency: &str) -> WaitHandle {
        self.register(dependency, false)
    }

    /// Like [`register_wait`](Self::register_wait), but resolves immediately
    /// when `dependency` was already notified during this run.
    pub fn register_wait_or_launched(&self, dependency: &str) -> WaitHandle {
        self.register(dependency, true)
    }

    fn register(&self, dependency: &str, or_launched: bool) -> WaitHandle {
        let (reply, rx) = oneshot::channel();
        self.registrations.fetch_add(1, Ordering::AcqRel);
        // A closed inbox drops `reply`, which the handle reports as a failure.
        let _ = self.inbox.send(Event::Register {
            dependency: dependency.to_string(),
            reply,
            or_launched,
        });
        WaitHandle {
            dependency: dependency.to_string(),
            rx,
        }
    }

    /// Signals every waiter currently registered for `service` as ready.
    pub fn notify_ready(&self, service: &str) {
        self.notify(service, Readiness::Ready);
    }

    /// Signals every waiter currently registered for `service` as failed.
    pub fn notify_failed(&self, service: &str) {
        self.notify(service, Readiness::Failed);
    }

    fn notify(&self, service: &str, readiness: Readiness) {
        let _ = self.inbox.send(Event::Notify {
            service: service.to_string(),
            readiness,
        });
    }
}

async fn run(mut events: mpsc::UnboundedReceiver<Event>) {
    let mut waiters: HashMap<String, Vec<oneshot::Sender<Readiness>>> = HashMap::new();
    let mut launched: HashMap<String, Readiness> = HashMap::new();

    while let Some(event) = events.recv().await {
        trace!(?event, "Coordinator event");
        match event {
            Event::Register {
                dependency,
                reply,
                or_launched,
            } => {
                if or_launched {
                    if let Some(readiness) = launched.get(&dependency) {
                        let _ = reply.send(*readiness);
                        continue;
                    }
                }
                waiters.entry(dependency).or_default().push(reply);
            }
            Event::Notify { service, readiness } => {
                let pending = waiters.remove(&service).unwrap_or_default();
                debug!(
                    service = %service,
                    ?readiness,
                    waiters = pending.len(),
                    "Releasing waiters"
                );
                for reply in pending {
                    let _ = reply.send(readiness);
                }
                launched.insert(service, readiness);
            }
        }
    }
    debug!("Coordinator stopped");
}

/// A pending wait on one dependency.
#[derive(Debug)]
pub struct WaitHandle {
    dependency: String,
    rx: oneshot::Receiver<Readiness>,
}

impl WaitHandle {
    /// Suspends until the dependency is signalled.
    ///
    /// A coordinator that shut down without signalling reports a failure.
    pub async fn wait(self) -> Readiness {
        self.rx.await.unwrap_or(Readiness::Failed)
    }

    /// Like [`wait`](Self::wait), bounded by an optional deadline.
    pub async fn wait_for(self, deadline: Option<Duration>) -> Result<Readiness> {
        let Some(deadline) = deadline else {
            return Ok(self.wait().await);
        };
        let dependency = self.dependency.clone();
        tokio::time::timeout(deadline, self.wait())
            .await
            .map_err(|_| KumiageError::Timeout {
                operation: format!("waiting for dependency '{}'", dependency),
                seconds: deadline.as_secs(),
            })
    }
}
