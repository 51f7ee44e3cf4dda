//! The network retrieval service.
//!
//! A `ServiceRegistry` runs any number of concurrent listeners, each
//! bound to a network address and a request-path prefix and serving
//! read-only lookups against one manager's store.  The (address, prefix)
//! pair identifies a running service: starting a duplicate fails, and
//! `stop` targets a service by the same pair.
//!
//! Two scheduling variants share the same handlers: Simple serves one
//! request at a time end to end, Multi serves requests concurrently.
//! Either way the store's own locking is what keeps operations safe.

pub mod access;
mod handlers;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::{LockboxError, Result};
use crate::service::access::AccessCallback;
use crate::service::handlers::ServiceState;
use crate::store::normalize_id;
use crate::store::registry::Registry;

pub use access::{debug_access, full_access, no_access};

/// Scheduling policy of a running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceMode {
    /// One request in flight at a time.
    Simple,
    /// Requests handled concurrently.
    Multi,
}

impl ServiceMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Multi => "multi",
        }
    }
}

struct RunningService {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Tracks running retrieval services and their lifecycles.
pub struct ServiceRegistry {
    registry: Arc<Registry>,
    running: tokio::sync::Mutex<HashMap<(String, String), RunningService>>,
}

impl ServiceRegistry {
    /// Create a service registry serving managers from `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            running: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Start a service that completes one request before accepting the
    /// next.
    pub async fn start_simple(
        &self,
        address: &str,
        prefix: &str,
        manager_name: &str,
        callback: Option<AccessCallback>,
    ) -> Result<()> {
        self.start(address, prefix, manager_name, callback, ServiceMode::Simple)
            .await
    }

    /// Start a service that handles requests concurrently.
    pub async fn start_multi(
        &self,
        address: &str,
        prefix: &str,
        manager_name: &str,
        callback: Option<AccessCallback>,
    ) -> Result<()> {
        self.start(address, prefix, manager_name, callback, ServiceMode::Multi)
            .await
    }

    async fn start(
        &self,
        address: &str,
        prefix: &str,
        manager_name: &str,
        callback: Option<AccessCallback>,
        mode: ServiceMode,
    ) -> Result<()> {
        let callback = callback.ok_or_else(|| {
            LockboxError::InvalidArgument("an access callback is required".into())
        })?;

        let prefix = normalize_id(prefix);
        let key = (address.to_string(), prefix.clone());

        // Hold the map lock across the duplicate check, the bind and the
        // insert, so two concurrent starts cannot both claim the key.
        let mut running = self.running.lock().await;
        if running.contains_key(&key) {
            return Err(LockboxError::AlreadyRunning {
                address: address.to_string(),
                prefix: format!("/{prefix}"),
            });
        }

        // The manager binding is resolved once, at start time.
        let manager = self.registry.manager(manager_name)?;

        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?;

        let state = ServiceState {
            manager,
            callback,
            serialize: match mode {
                ServiceMode::Simple => Some(Arc::new(tokio::sync::Mutex::new(()))),
                ServiceMode::Multi => None,
            },
        };
        let app = handlers::router(&prefix, state);

        let (shutdown, signal) = oneshot::channel::<()>();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = signal.await;
            })
            .await;

            if let Err(e) = result {
                error!(address = %task_key.0, prefix = %task_key.1, error = %e, "service stopped");
            }
        });

        let route = format!("/{prefix}");
        info!(
            %address,
            prefix = %route,
            manager = %manager_name,
            mode = mode.as_str(),
            bound = %local_addr,
            "service started"
        );

        running.insert(
            key,
            RunningService {
                shutdown,
                task,
                local_addr,
            },
        );
        Ok(())
    }

    /// Gracefully stop the service bound to `(address, prefix)`.
    ///
    /// New requests stop being accepted immediately; in-flight requests
    /// get up to `timeout` to finish, after which they are abandoned.
    /// The binding is released either way.
    pub async fn stop(&self, timeout: Duration, address: &str, prefix: &str) -> Result<()> {
        let prefix = normalize_id(prefix);
        let key = (address.to_string(), prefix.clone());

        let service = self.running.lock().await.remove(&key).ok_or_else(|| {
            LockboxError::ServiceNotRunning {
                address: address.to_string(),
                prefix: format!("/{prefix}"),
            }
        })?;

        let _ = service.shutdown.send(());

        let route = format!("/{prefix}");
        let mut task = service.task;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(_) => {
                info!(%address, prefix = %route, "service stopped");
            }
            Err(_) => {
                task.abort();
                warn!(
                    %address,
                    prefix = %route,
                    "shutdown deadline elapsed, abandoning in-flight requests"
                );
            }
        }

        Ok(())
    }

    /// The socket address a running service is actually bound to.
    ///
    /// Useful when the service was started on port 0.
    pub async fn local_addr(&self, address: &str, prefix: &str) -> Option<SocketAddr> {
        let key = (address.to_string(), normalize_id(prefix));
        self.running.lock().await.get(&key).map(|s| s.local_addr)
    }

    /// Number of currently running services.
    pub async fn running_count(&self) -> usize {
        self.running.lock().await.len()
    }
}
