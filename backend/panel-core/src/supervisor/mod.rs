//! Helper ISE supervision.
//!
//! Keeps the ISE [`Catalogue`] in step with the module directories and the
//! cache file, launches helper processes and tracks each helper through
//!
//! ```text
//! Registered --start + RegisterHelper--> Running --connection closed--> Stopped
//! ```
//!
//! A launched helper only counts as `Running` once its own connection has
//! completed the handshake and sent `RegisterHelper`. Stopping a helper is a
//! protocol message to that connection; the process is never signalled.

pub mod catalogue;
pub mod launcher;
pub mod process_table;
pub mod scan;
pub mod watcher;

pub use catalogue::Catalogue;
pub use launcher::{LaunchSettings, build_launch_command};
pub use process_table::{ExitRecord, ProcessTable};
pub use scan::ModuleManifest;
pub use watcher::ModuleWatcher;

use crate::error::catalogue::CatalogueError;
use crate::error::spawn::SpawnError;
use crate::session::ConnectionId;

use common::ErrorLocation;
use models::{HelperDescriptor, IseMode, helper_descriptor::option};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperState {
    Registered,
    Running,
    Stopped,
}

impl fmt::Display for HelperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HelperState::Registered => "registered",
            HelperState::Running => "running",
            HelperState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub keyboard_dir: PathBuf,
    pub helper_dir: PathBuf,
    pub cache_path: PathBuf,
    pub launch: LaunchSettings,
    pub max_restarts: u32,
    pub restart_window: Duration,
}

#[derive(Debug, Clone, Copy)]
struct HelperEntry {
    state: HelperState,
    connection: Option<ConnectionId>,
}

pub struct Supervisor {
    settings: SupervisorSettings,
    catalogue: Catalogue,
    modules: BTreeMap<String, ModuleManifest>,
    /// Manifests installed from outside the module directories.
    installed: BTreeSet<PathBuf>,
    helpers: BTreeMap<String, HelperEntry>,
    active: BTreeSet<String>,
    processes: ProcessTable,
}

impl Supervisor {
    pub fn new(settings: SupervisorSettings) -> Self {
        let processes = ProcessTable::new(settings.max_restarts, settings.restart_window);
        Self {
            settings,
            catalogue: Catalogue::new(),
            modules: BTreeMap::new(),
            installed: BTreeSet::new(),
            helpers: BTreeMap::new(),
            active: BTreeSet::new(),
            processes,
        }
    }

    /// Load the cache file, then reconcile it with the module directories.
    ///
    /// An unreadable cache is treated as empty.
    pub fn start(settings: SupervisorSettings) -> Self {
        let mut supervisor = Self::new(settings);
        match Catalogue::load(&supervisor.settings.cache_path) {
            Ok(catalogue) => supervisor.catalogue = catalogue,
            Err(e) => warn!("Ignoring catalogue cache: {}", e),
        }
        if let Err(e) = supervisor.rescan() {
            warn!("Initial module scan incomplete: {}", e);
        }
        supervisor
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn watch_dirs(&self) -> [&Path; 2] {
        [&self.settings.keyboard_dir, &self.settings.helper_dir]
    }

    /// Re-read every module manifest and rebuild the catalogue from them.
    ///
    /// Entries whose module has no manifest any more are dropped. Returns
    /// true when the cached form of the catalogue changed.
    pub fn rescan(&mut self) -> Result<bool, CatalogueError> {
        let mut modules = BTreeMap::new();
        for manifest in scan::scan_dir(&self.settings.keyboard_dir, IseMode::Keyboard)
            .into_iter()
            .chain(scan::scan_dir(&self.settings.helper_dir, IseMode::Helper))
        {
            modules.insert(manifest.module.clone(), manifest);
        }

        let installed: Vec<PathBuf> = self.installed.iter().cloned().collect();
        for path in installed {
            match scan::read_manifest(&path, self.mode_for(&path)) {
                Ok(manifest) => {
                    modules.insert(manifest.module.clone(), manifest);
                }
                Err(e) => {
                    warn!("Installed manifest gone: {}", e);
                    self.installed.remove(&path);
                }
            }
        }

        let before = self.catalogue.clone();
        let dropped = self.catalogue.retain_modules(|module| modules.contains_key(module));
        for uuid in &dropped {
            info!("ISE {} no longer has a module, dropping it", uuid);
        }
        for manifest in modules.values() {
            self.catalogue
                .replace_module(&manifest.module, manifest.entries.clone());
        }
        self.modules = modules;
        self.sync_helpers();

        let changed = !self.catalogue.same_cache(&before);
        self.catalogue.save(&self.settings.cache_path)?;
        info!(
            "Module scan found {} modules, {} ISEs",
            self.modules.len(),
            self.catalogue.len()
        );
        Ok(changed)
    }

    /// Add or refresh the module described by `manifest_path`.
    ///
    /// Installing an unchanged manifest again changes nothing, including
    /// the cache file.
    pub fn install(&mut self, manifest_path: &Path) -> Result<bool, CatalogueError> {
        let manifest = scan::read_manifest(manifest_path, self.mode_for(manifest_path))?;
        if !self.in_module_dir(manifest_path) {
            self.installed.insert(manifest_path.to_path_buf());
        }

        let changed = self
            .catalogue
            .replace_module(&manifest.module, manifest.entries.clone());
        info!(
            "Installed module {} ({} ISEs, changed: {})",
            manifest.module,
            manifest.entries.len(),
            changed
        );
        self.modules.insert(manifest.module.clone(), manifest);
        self.sync_helpers();
        self.catalogue.save(&self.settings.cache_path)?;
        Ok(changed)
    }

    /// Remove every ISE of `module`. Unknown modules are a no-op.
    pub fn uninstall(&mut self, module: &str) -> Result<bool, CatalogueError> {
        if let Some(manifest) = self.modules.remove(module) {
            self.installed.remove(&manifest.manifest_path);
        }
        let changed = self.catalogue.remove_module(module);
        if changed {
            info!("Uninstalled module {}", module);
        }
        self.sync_helpers();
        self.catalogue.save(&self.settings.cache_path)?;
        Ok(changed)
    }

    pub fn helper_list(&self) -> Vec<HelperDescriptor> {
        self.catalogue.helpers()
    }

    pub fn state(&self, uuid: &str) -> Option<HelperState> {
        self.helpers.get(uuid).map(|entry| entry.state)
    }

    /// Uuids of helpers whose process the broker launched and has not yet
    /// seen exit.
    pub fn active_helpers(&self) -> Vec<String> {
        self.active.iter().cloned().collect()
    }

    pub fn running_helpers(&self) -> Vec<String> {
        self.helpers
            .iter()
            .filter(|(_, entry)| entry.state == HelperState::Running)
            .map(|(uuid, _)| uuid.clone())
            .collect()
    }

    pub fn connection_of(&self, uuid: &str) -> Option<ConnectionId> {
        self.helpers.get(uuid).and_then(|entry| entry.connection)
    }

    /// Launch the helper process for `uuid`.
    ///
    /// Returns as soon as the process is spawned; the helper reports in
    /// later over its own connection.
    #[track_caller]
    pub fn start_helper(&mut self, uuid: &str) -> Result<(), SpawnError> {
        let info = self
            .catalogue
            .get(uuid)
            .filter(|info| info.mode == IseMode::Helper)
            .ok_or_else(|| SpawnError::UnknownHelper {
                message: format!("no helper ISE with uuid '{uuid}'"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        if self.state(uuid) == Some(HelperState::Running) {
            debug!("Helper {} is already running", uuid);
            return Ok(());
        }

        let module_path = self
            .modules
            .get(&info.module)
            .map(|manifest| manifest.module_path.clone())
            .unwrap_or_else(|| self.settings.helper_dir.join(&info.module));

        let command = build_launch_command(&self.settings.launch, &module_path, uuid);
        self.processes.spawn(uuid, command)?;
        self.active.insert(uuid.to_string());
        Ok(())
    }

    /// Launch every helper flagged to start with the broker.
    pub fn auto_start(&mut self) {
        let uuids: Vec<String> = self
            .helper_list()
            .into_iter()
            .filter(|helper| helper.has_option(option::AUTO_START))
            .map(|helper| helper.uuid)
            .collect();
        for uuid in uuids {
            if let Err(e) = self.start_helper(&uuid) {
                warn!("Auto-start of helper {} failed: {}", uuid, e);
            }
        }
    }

    /// A helper's connection announced itself.
    #[track_caller]
    pub fn register_helper(
        &mut self,
        uuid: &str,
        connection: ConnectionId,
    ) -> Result<(), SpawnError> {
        let entry = self
            .helpers
            .get_mut(uuid)
            .ok_or_else(|| SpawnError::UnknownHelper {
                message: format!("unknown helper '{uuid}' tried to register"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        entry.state = HelperState::Running;
        entry.connection = Some(connection);
        info!("Helper {} running on {}", uuid, connection);
        Ok(())
    }

    /// The connection a stop request must be delivered to.
    #[track_caller]
    pub fn stop_helper(&self, uuid: &str) -> Result<ConnectionId, SpawnError> {
        match self.helpers.get(uuid) {
            Some(HelperEntry {
                state: HelperState::Running,
                connection: Some(connection),
            }) => Ok(*connection),
            Some(_) => Err(SpawnError::NotRunning {
                message: format!("helper '{uuid}' is not running"),
                location: ErrorLocation::from(Location::caller()),
            }),
            None => Err(SpawnError::UnknownHelper {
                message: format!("no helper ISE with uuid '{uuid}'"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Mark every helper served by `connection` as stopped.
    pub fn on_connection_closed(&mut self, connection: ConnectionId) -> Vec<String> {
        let mut stopped = Vec::new();
        for (uuid, entry) in self.helpers.iter_mut() {
            if entry.connection == Some(connection) {
                entry.state = HelperState::Stopped;
                entry.connection = None;
                info!("Helper {} stopped", uuid);
                stopped.push(uuid.clone());
            }
        }
        stopped
    }

    /// Collect exited helper processes. Helpers flagged for auto-restart
    /// are relaunched unless they are crash looping.
    pub fn reap(&mut self) -> Vec<ExitRecord> {
        let records = self.processes.reap();
        for record in &records {
            self.active.remove(&record.uuid);

            let restart = record.is_abnormal()
                && self
                    .catalogue
                    .get(&record.uuid)
                    .is_some_and(|info| info.option & option::AUTO_RESTART != 0);
            if restart {
                match self.start_helper(&record.uuid) {
                    Ok(()) => info!("Restarted helper {}", record.uuid),
                    Err(e) => warn!("Not restarting helper {}: {}", record.uuid, e),
                }
            }
        }
        records
    }

    pub async fn shutdown(&mut self) {
        self.processes.shutdown().await;
        self.active.clear();
    }

    fn in_module_dir(&self, path: &Path) -> bool {
        path.parent().is_some_and(|dir| {
            dir == self.settings.keyboard_dir || dir == self.settings.helper_dir
        })
    }

    fn mode_for(&self, manifest_path: &Path) -> IseMode {
        if manifest_path.parent() == Some(self.settings.helper_dir.as_path()) {
            IseMode::Helper
        } else {
            IseMode::Keyboard
        }
    }

    /// Keep one lifecycle entry per helper in the catalogue.
    fn sync_helpers(&mut self) {
        let uuids: BTreeSet<String> = self
            .catalogue
            .with_mode(IseMode::Helper)
            .map(|info| info.uuid.clone())
            .collect();

        self.helpers.retain(|uuid, entry| {
            uuids.contains(uuid) || entry.state == HelperState::Running
        });
        for uuid in uuids {
            self.helpers.entry(uuid).or_insert(HelperEntry {
                state: HelperState::Registered,
                connection: None,
            });
        }
    }
}
