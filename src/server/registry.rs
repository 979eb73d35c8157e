//! Session registry
//!
//! Tracks the task of every live control connection by peer address so the
//! server can cancel them all on shutdown.

use log::{debug, info};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Registry of running session tasks, shared between the accept loop and
/// the sessions themselves.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SocketAddr, JoinHandle<()>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `session` and registers its handle under `addr`.
    ///
    /// The lock is held across spawn and insert, so the session's own
    /// removal on exit always happens after it was registered.
    pub async fn spawn<F>(&self, addr: SocketAddr, session: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut sessions = self.sessions.lock().await;
        let registry = self.clone();

        let handle = tokio::spawn(async move {
            session.await;
            registry.remove(&addr).await;
        });

        if let Some(previous) = sessions.insert(addr, handle) {
            previous.abort();
        }
        debug!("Registered session {} ({} active)", addr, sessions.len());
    }

    /// Removes `addr` if present. Removing an unknown address is a no-op.
    pub async fn remove(&self, addr: &SocketAddr) -> bool {
        let removed = self.sessions.lock().await.remove(addr).is_some();
        if removed {
            debug!("Unregistered session {}", addr);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Cancels every registered session and waits for them to finish.
    pub async fn cancel_all(&self) {
        let handles: Vec<(SocketAddr, JoinHandle<()>)> =
            self.sessions.lock().await.drain().collect();

        if handles.is_empty() {
            return;
        }

        info!("Closing {} active session(s)", handles.len());
        for (_, handle) in &handles {
            handle.abort();
        }
        for (addr, handle) in handles {
            // Cancellation is the expected outcome here
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    debug!("Session {} ended abnormally: {}", addr, e);
                }
            }
        }
    }
}
