//! Client-side stand-in for engines hosted by a remote broker.
//!
//! [`RemoteEngineProxy`] lets an application drive keyboard engines as if
//! they were local. Factory metadata is answered from the catalogue; every
//! instance call is a round trip whose callbacks are fed to the caller's
//! [`ClientCallbacks`].
//!
//! When the broker connection breaks, the failing call returns
//! [`ProxyError::Transport`] and the proxy reconnects with exponential
//! backoff, recreating every instance under its old [`InstanceHandle`]. The
//! failed call itself is not replayed.

pub mod callbacks;
pub mod connection;
pub mod instance;

pub use callbacks::{ClientCallbacks, NoCallbacks};
pub use connection::{CallReply, ProxyConnection};
pub use instance::{InstanceHandle, RemoteInstance};

use crate::error::proxy::ProxyError;
use crate::supervisor::Catalogue;
use crate::transaction::records::get_ise_list;
use crate::transaction::{FrameLimits, Opcode, Transaction};

use common::ErrorLocation;
use models::{IseInfo, IseMode, KeyEvent};

use std::collections::BTreeMap;
use std::panic::Location;
use std::path::PathBuf;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use tokio::time::sleep as TokioSleep;

const RECONNECT_MAX_ELAPSED: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub socket_path: PathBuf,
    pub limits: FrameLimits,
    /// Catalogue cache shared with the broker; `None` always asks the broker.
    pub cache_path: Option<PathBuf>,
    pub reconnect_max_elapsed: Duration,
}

impl ProxySettings {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            limits: FrameLimits::default(),
            cache_path: None,
            reconnect_max_elapsed: RECONNECT_MAX_ELAPSED,
        }
    }
}

pub struct RemoteEngineProxy {
    settings: ProxySettings,
    connection: Option<ProxyConnection>,
    catalogue: Catalogue,
    handles: BTreeMap<InstanceHandle, RemoteInstance>,
    next_handle: u32,
}

impl RemoteEngineProxy {
    /// Connect, handshake and load the catalogue.
    ///
    /// The cache file is preferred; an empty or missing cache falls back to
    /// asking the broker with `GetIseList`.
    pub async fn connect(settings: ProxySettings) -> Result<Self, ProxyError> {
        let connection = ProxyConnection::open(&settings.socket_path, &settings.limits).await?;
        let mut proxy = Self {
            settings,
            connection: Some(connection),
            catalogue: Catalogue::new(),
            handles: BTreeMap::new(),
            next_handle: 0,
        };

        let cached = match &proxy.settings.cache_path {
            Some(path) => Catalogue::load(path).unwrap_or_else(|e| {
                warn!("Ignoring catalogue cache: {}", e);
                Catalogue::new()
            }),
            None => Catalogue::new(),
        };
        proxy.catalogue = if cached.is_empty() {
            proxy.fetch_catalogue().await?
        } else {
            cached
        };

        info!(
            "Proxy ready with {} catalogue entries",
            proxy.catalogue.len()
        );
        Ok(proxy)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    // ============================================
    // FACTORY METADATA
    // ============================================

    /// Keyboard ISE uuids for `language`; an empty language matches all.
    pub fn factory_list(&self, language: &str) -> Vec<String> {
        self.catalogue
            .with_mode(IseMode::Keyboard)
            .filter(|info| language.is_empty() || info.language == language)
            .map(|info| info.uuid.clone())
            .collect()
    }

    fn factory(&self, uuid: &str) -> Option<&IseInfo> {
        self.catalogue
            .get(uuid)
            .filter(|info| info.mode == IseMode::Keyboard)
    }

    pub fn factory_name(&self, uuid: &str) -> Option<&str> {
        self.factory(uuid).map(|info| info.name.as_str())
    }

    pub fn factory_language(&self, uuid: &str) -> Option<&str> {
        self.factory(uuid).map(|info| info.language.as_str())
    }

    pub fn factory_icon(&self, uuid: &str) -> Option<&str> {
        self.factory(uuid).map(|info| info.icon.as_str())
    }

    pub fn factory_locales(&self, uuid: &str) -> Option<&[String]> {
        self.factory(uuid).map(|info| info.locales.as_slice())
    }

    // ============================================
    // INSTANCES
    // ============================================

    pub fn handles(&self) -> Vec<InstanceHandle> {
        self.handles.keys().copied().collect()
    }

    /// The broker-side id currently behind `handle`.
    pub fn remote_id(&self, handle: InstanceHandle) -> Option<u32> {
        self.handles.get(&handle).and_then(|instance| instance.remote)
    }

    pub async fn create_instance(
        &mut self,
        uuid: &str,
        encoding: &str,
    ) -> Result<InstanceHandle, ProxyError> {
        let remote = self.new_remote_instance(uuid, encoding).await?;
        self.next_handle += 1;
        let handle = InstanceHandle::new(self.next_handle);
        self.handles.insert(
            handle,
            RemoteInstance {
                uuid: uuid.to_string(),
                encoding: encoding.to_string(),
                remote: Some(remote),
            },
        );
        debug!("{} -> remote instance {}", handle, remote);
        Ok(handle)
    }

    pub async fn delete_instance(
        &mut self,
        handle: InstanceHandle,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        let result = self
            .instance_call(handle, Opcode::DeleteInstance, |_| {}, callbacks)
            .await;
        self.handles.remove(&handle);
        result.map(|_| ())
    }

    // ============================================
    // INSTANCE CALLS
    // ============================================

    /// Returns whether the engine consumed the key. A `Fail` from the broker
    /// is an error, not a declined key.
    pub async fn process_key_event(
        &mut self,
        handle: InstanceHandle,
        key: &KeyEvent,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<bool, ProxyError> {
        let mut reply = self
            .call_for(
                handle,
                Opcode::ProcessKeyEvent,
                |trans| {
                    trans.put(key);
                },
                callbacks,
            )
            .await?;
        if !reply.ok {
            return Err(ProxyError::Rejected {
                message: format!("broker failed the key event for {handle}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(reply.results.get::<u32>()? != 0)
    }

    pub async fn move_caret(
        &mut self,
        handle: InstanceHandle,
        position: u32,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        self.instance_call(handle, Opcode::MoveCaret, |trans| {
            trans.put(&position);
        }, callbacks)
        .await
    }

    pub async fn select_candidate(
        &mut self,
        handle: InstanceHandle,
        index: u32,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        self.instance_call(handle, Opcode::SelectCandidate, |trans| {
            trans.put(&index);
        }, callbacks)
        .await
    }

    pub async fn update_lookup_table_page_size(
        &mut self,
        handle: InstanceHandle,
        size: u32,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        self.instance_call(handle, Opcode::UpdateLookupTablePageSize, |trans| {
            trans.put(&size);
        }, callbacks)
        .await
    }

    pub async fn lookup_table_page_up(
        &mut self,
        handle: InstanceHandle,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        self.instance_call(handle, Opcode::LookupTablePageUp, |_| {}, callbacks)
            .await
    }

    pub async fn lookup_table_page_down(
        &mut self,
        handle: InstanceHandle,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        self.instance_call(handle, Opcode::LookupTablePageDown, |_| {}, callbacks)
            .await
    }

    pub async fn reset(
        &mut self,
        handle: InstanceHandle,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        self.instance_call(handle, Opcode::Reset, |_| {}, callbacks)
            .await
    }

    pub async fn focus_in(
        &mut self,
        handle: InstanceHandle,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        self.instance_call(handle, Opcode::FocusIn, |_| {}, callbacks)
            .await
    }

    pub async fn focus_out(
        &mut self,
        handle: InstanceHandle,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        self.instance_call(handle, Opcode::FocusOut, |_| {}, callbacks)
            .await
    }

    pub async fn trigger_property(
        &mut self,
        handle: InstanceHandle,
        property: &str,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        self.instance_call(handle, Opcode::TriggerProperty, |trans| {
            trans.put(property);
        }, callbacks)
        .await
    }

    pub async fn update_client_capabilities(
        &mut self,
        handle: InstanceHandle,
        capabilities: u32,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        self.instance_call(handle, Opcode::UpdateClientCapabilities, |trans| {
            trans.put(&capabilities);
        }, callbacks)
        .await
    }

    // ============================================
    // PLUMBING
    // ============================================

    /// A call whose `Fail` status is an error.
    async fn instance_call(
        &mut self,
        handle: InstanceHandle,
        opcode: Opcode,
        args: impl FnOnce(&mut Transaction),
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<(), ProxyError> {
        let reply = self.call_for(handle, opcode, args, callbacks).await?;
        if reply.ok {
            Ok(())
        } else {
            Err(ProxyError::Rejected {
                message: format!("broker failed {opcode} for {handle}"),
                location: ErrorLocation::from(Location::caller()),
            })
        }
    }

    /// `[opcode][remote id][args…]` for the instance behind `handle`.
    async fn call_for(
        &mut self,
        handle: InstanceHandle,
        opcode: Opcode,
        args: impl FnOnce(&mut Transaction),
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<CallReply, ProxyError> {
        let remote = match self.handles.get(&handle) {
            Some(RemoteInstance {
                remote: Some(remote),
                ..
            }) => *remote,
            Some(_) => {
                return Err(ProxyError::Rejected {
                    message: format!("{handle} was lost in a reconnect"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            None => {
                return Err(ProxyError::UnknownHandle {
                    message: format!("{handle} is not an instance of this proxy"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        self.call(
            |trans| {
                trans.put_command(opcode).put(&remote);
                args(trans);
            },
            callbacks,
        )
        .await
    }

    /// Send one request and wait for its final status, reconnecting when the
    /// transport fails.
    async fn call(
        &mut self,
        build: impl FnOnce(&mut Transaction),
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<CallReply, ProxyError> {
        if self.connection.is_none() {
            self.reconnect().await?;
        }
        let Some(connection) = self.connection.as_mut() else {
            return Err(disconnected());
        };

        let mut request = connection.request();
        build(&mut request);

        let result = connection
            .exchange(&request, &self.settings.limits, &self.handles, callbacks)
            .await;

        if let Err(ProxyError::Transport { message, .. }) = &result {
            warn!("Broker connection lost: {}", message);
            self.connection = None;
            if let Err(e) = self.reconnect().await {
                warn!("Reconnect failed: {}", e);
            }
        }
        result
    }

    async fn new_remote_instance(&mut self, uuid: &str, encoding: &str) -> Result<u32, ProxyError> {
        let mut reply = self
            .call(
                |trans| {
                    trans
                        .put_command(Opcode::NewInstance)
                        .put(uuid)
                        .put(encoding);
                },
                &mut NoCallbacks,
            )
            .await?;
        if !reply.ok {
            return Err(ProxyError::Rejected {
                message: format!("broker refused an instance of {uuid}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(reply.results.get::<u32>()?)
    }

    async fn fetch_catalogue(&mut self) -> Result<Catalogue, ProxyError> {
        let mut reply = self
            .call(
                |trans| {
                    trans.put_command(Opcode::GetIseList);
                },
                &mut NoCallbacks,
            )
            .await?;
        if !reply.ok {
            return Err(ProxyError::Rejected {
                message: "broker refused GetIseList".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(get_ise_list(&mut reply.results)?.into_iter().collect())
    }

    /// Re-dial with exponential backoff, then recreate every instance.
    async fn reconnect(&mut self) -> Result<(), ProxyError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.settings.reconnect_max_elapsed),
            ..Default::default()
        };

        let connection = loop {
            match ProxyConnection::open(&self.settings.socket_path, &self.settings.limits).await {
                Ok(connection) => break connection,
                Err(e) => match backoff.next_backoff() {
                    Some(duration) => {
                        trace!("Broker not reachable ({}), retrying after {:?}", e, duration);
                        TokioSleep(duration).await;
                    }
                    None => {
                        return Err(ProxyError::Transport {
                            message: format!(
                                "broker unreachable for {:?}: {e}",
                                self.settings.reconnect_max_elapsed
                            ),
                            location: ErrorLocation::from(Location::caller()),
                        });
                    }
                },
            }
        };
        self.connection = Some(connection);
        info!("Reconnected to broker, recreating {} instances", self.handles.len());

        let handles: Vec<(InstanceHandle, String, String)> = self
            .handles
            .iter()
            .map(|(handle, instance)| (*handle, instance.uuid.clone(), instance.encoding.clone()))
            .collect();
        for (handle, uuid, encoding) in handles {
            // Stale ids must not resolve callbacks while recreating.
            if let Some(instance) = self.handles.get_mut(&handle) {
                instance.remote = None;
            }
            let remote = match self.new_remote_instance_once(&uuid, &encoding).await {
                Ok(remote) => Some(remote),
                Err(e) => {
                    warn!("Could not recreate {} ({}): {}", handle, uuid, e);
                    None
                }
            };
            if let Some(instance) = self.handles.get_mut(&handle) {
                instance.remote = remote;
            }
        }
        Ok(())
    }

    /// `NewInstance` without the reconnect-on-failure path of `call`.
    async fn new_remote_instance_once(
        &mut self,
        uuid: &str,
        encoding: &str,
    ) -> Result<u32, ProxyError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(disconnected());
        };
        let mut request = connection.request();
        request.put_command(Opcode::NewInstance).put(uuid).put(encoding);
        let mut reply = connection
            .exchange(&request, &self.settings.limits, &self.handles, &mut NoCallbacks)
            .await?;
        if !reply.ok {
            return Err(ProxyError::Rejected {
                message: format!("broker refused an instance of {uuid}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(reply.results.get::<u32>()?)
    }
}

#[track_caller]
fn disconnected() -> ProxyError {
    ProxyError::Transport {
        message: "not connected to the broker".to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}
