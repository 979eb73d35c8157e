use log::{error, info, warn};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::client::handle_client;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::server::registry::SessionRegistry;
use crate::storage::Sandbox;

/// Embeddable FTP server.
///
/// `start` binds the control socket and returns once the accept loop is
/// running in the background; `stop` tears everything down again.
#[derive(Debug)]
pub struct Server {
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
    sessions: SessionRegistry,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Server {
    pub fn new(
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        root_directory: impl Into<PathBuf>,
    ) -> Self {
        Self::with_config(ServerConfig::new(port, username, password, root_directory))
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            running: Arc::new(AtomicBool::new(false)),
            sessions: SessionRegistry::new(),
            acceptor: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the control socket and spawns the accept loop.
    ///
    /// Calling it while the server is already running only logs a warning.
    /// On error the server stays stopped.
    pub async fn start(&self) -> Result<(), ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Server already running, ignoring start");
            return Ok(());
        }

        match self.bind().await {
            Ok((listener, sandbox, addr)) => {
                info!(
                    "FTP server listening on {} serving {}",
                    addr,
                    sandbox.root().display()
                );
                *self.local_addr.lock().await = Some(addr);

                let handle = tokio::spawn(accept_loop(
                    listener,
                    Arc::clone(&self.config),
                    sandbox,
                    self.sessions.clone(),
                    Arc::clone(&self.running),
                ));
                *self.acceptor.lock().await = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!("Server startup failed: {}", e);
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn bind(&self) -> Result<(TcpListener, Arc<Sandbox>, SocketAddr), ServerError> {
        let root = &self.config.root_directory;
        let sandbox = Sandbox::new(root).map_err(|source| ServerError::RootDirectory {
            path: root.display().to_string(),
            source,
        })?;

        let socket = self.config.control_socket()?;
        let listener = TcpListener::bind(socket)
            .await
            .map_err(|source| ServerError::Bind {
                addr: socket.to_string(),
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: socket.to_string(),
            source,
        })?;

        Ok((listener, Arc::new(sandbox), addr))
    }

    /// Closes the listening socket and cancels every session.
    ///
    /// Safe to call any number of times, including before `start`.
    pub async fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);

        if let Some(acceptor) = self.acceptor.lock().await.take() {
            acceptor.abort();
            // Awaiting guarantees the listener has been dropped
            let _ = acceptor.await;
        }

        self.sessions.cancel_all().await;
        *self.local_addr.lock().await = None;

        if was_running {
            info!("FTP server stopped");
        }
    }

    /// Address the control socket is bound to, while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of control connections currently being served.
    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    sandbox: Arc<Sandbox>,
    sessions: SessionRegistry,
    running: Arc<AtomicBool>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let session = handle_client(
                    stream,
                    addr,
                    Arc::clone(&config),
                    Arc::clone(&sandbox),
                );
                sessions.spawn(addr, session).await;
            }
            Err(e) => {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                error!("Error accepting connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::new(0, "admin", "password", dir.path());

        server.stop().await;
        server.stop().await;
        assert!(!server.is_running());
        assert_eq!(server.local_addr().await, None);
    }

    #[tokio::test]
    async fn missing_root_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::new(0, "admin", "password", dir.path().join("missing"));

        let result = server.start().await;

        assert!(matches!(result, Err(ServerError::RootDirectory { .. })));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn start_is_idempotent_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::new(0, "admin", "password", dir.path());
        config.bind_address = "127.0.0.1".into();
        let server = Server::with_config(config);

        server.start().await.unwrap();
        let addr = server.local_addr().await;
        server.start().await.unwrap();

        assert!(server.is_running());
        assert_eq!(server.local_addr().await, addr);

        server.stop().await;
        assert!(!server.is_running());
    }
}
