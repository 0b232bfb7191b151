//! Broker startup: socket binding and dispatcher wiring.
//!
//! # Security
//!
//! The socket is a filesystem Unix socket; access is governed by its file
//! permissions. Roles are taken from the handshake as announced.

use crate::config::{ConfigStore, PanelConfig};
use crate::dispatch::Dispatcher;
use crate::engine::{EngineHost, ModuleRegistry};
use crate::error::CoreError;
use crate::error::ipc::IpcError;
use crate::observer::PanelObserver;
use crate::supervisor::{ModuleWatcher, Supervisor};

use common::ErrorLocation;

use std::fs::Permissions;
use std::future::Future;
use std::os::unix::fs::PermissionsExt;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

/// Owner read/write only.
const SOCKET_MODE: u32 = 0o600;

/// Bind the broker socket at `path`.
///
/// A leftover socket file nobody answers on is removed first. A live one
/// means another broker owns the path.
pub async fn bind_socket(path: &Path) -> Result<UnixListener, IpcError> {
    if path.exists() {
        if UnixStream::connect(path).await.is_ok() {
            return Err(IpcError::Listen {
                message: format!("another broker is listening on {}", path.display()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        warn!("Removing stale socket {}", path.display());
        std::fs::remove_file(path).map_err(|e| IpcError::Listen {
            message: format!("cannot remove stale socket {}: {e}", path.display()),
            location: ErrorLocation::from(Location::caller()),
        })?;
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| IpcError::Listen {
            message: format!("cannot create {}: {e}", dir.display()),
            location: ErrorLocation::from(Location::caller()),
        })?;
    }

    let listener = UnixListener::bind(path).map_err(|e| IpcError::Listen {
        message: format!("cannot bind {}: {e}", path.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;
    std::fs::set_permissions(path, Permissions::from_mode(SOCKET_MODE)).map_err(|e| {
        IpcError::Listen {
            message: format!("cannot restrict {}: {e}", path.display()),
            location: ErrorLocation::from(Location::caller()),
        }
    })?;
    info!("Panel listening on {}", path.display());
    Ok(listener)
}

/// A bound broker ready to serve.
pub struct PanelServer {
    socket_path: PathBuf,
    listener: UnixListener,
    dispatcher: Dispatcher,
    watcher: Option<ModuleWatcher>,
    module_changes: Option<mpsc::Receiver<()>>,
    reap_interval: Duration,
}

impl PanelServer {
    /// Load the catalogue, open the config store, bind the socket and
    /// watch the module directories.
    ///
    /// A watcher that cannot be set up is logged and skipped; modules are
    /// then only picked up by `RescanModules`.
    pub async fn start(
        config: &PanelConfig,
        config_dir: &Path,
        observer: Box<dyn PanelObserver>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let supervisor = Supervisor::start(config.supervisor_settings());
        let store = ConfigStore::open(config.store_path(config_dir))?;
        let engines = EngineHost::new(ModuleRegistry::default());

        let (watcher, module_changes) = match ModuleWatcher::new() {
            Ok((mut watcher, changes)) => {
                for dir in supervisor.watch_dirs() {
                    if let Err(e) = watcher.watch(dir) {
                        warn!("{}", e);
                    }
                }
                (Some(watcher), Some(changes))
            }
            Err(e) => {
                warn!("Module directories will not be watched: {}", e);
                (None, None)
            }
        };

        let dispatcher =
            Dispatcher::new(config.frame_limits(), engines, supervisor, store, observer)?;
        let listener = bind_socket(&config.socket.path).await?;

        Ok(Self {
            socket_path: config.socket.path.clone(),
            listener,
            dispatcher,
            watcher,
            module_changes,
            reap_interval: config.reap_interval(),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serve until `shutdown` resolves or a client sends `Exit`, then remove
    /// the socket file.
    pub async fn run<F>(self, shutdown: F) -> Result<(), IpcError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            socket_path,
            listener,
            dispatcher,
            watcher,
            module_changes,
            reap_interval,
        } = self;

        let result = dispatcher
            .run(listener, module_changes, reap_interval, shutdown)
            .await;
        drop(watcher);

        if let Err(e) = std::fs::remove_file(&socket_path) {
            warn!("Could not remove socket {}: {}", socket_path.display(), e);
        }
        info!("Panel stopped");
        result
    }
}
