//! Child processes launched for helper ISEs.
//!
//! Children are polled with `try_wait` on every reap tick instead of being
//! left to the OS, so every exit is observed and recorded. Abnormal exits
//! feed the crash-loop check that gates further launches of the same uuid.

use crate::error::spawn::SpawnError;

use common::ErrorLocation;

use std::collections::{HashMap, VecDeque};
use std::panic::Location;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use log::{info, warn};
use tokio::process::{Child as TokioChild, Command as TokioCommand};

/// One observed child exit.
#[derive(Debug, Clone)]
pub struct ExitRecord {
    pub uuid: String,
    pub pid: Option<u32>,
    pub status: Option<ExitStatus>,
    pub ran_for: Duration,
}

impl ExitRecord {
    /// Exits other than status 0 count against the crash-loop limit.
    pub fn is_abnormal(&self) -> bool {
        !self.status.is_some_and(|status| status.success())
    }
}

struct TrackedChild {
    child: TokioChild,
    pid: Option<u32>,
    started: Instant,
}

pub struct ProcessTable {
    children: HashMap<String, TrackedChild>,
    crashes: HashMap<String, VecDeque<Instant>>,
    max_restarts: u32,
    restart_window: Duration,
}

impl ProcessTable {
    pub fn new(max_restarts: u32, restart_window: Duration) -> Self {
        Self {
            children: HashMap::new(),
            crashes: HashMap::new(),
            max_restarts,
            restart_window,
        }
    }

    pub fn is_running(&self, uuid: &str) -> bool {
        self.children.contains_key(uuid)
    }

    pub fn pid(&self, uuid: &str) -> Option<u32> {
        self.children.get(uuid).and_then(|tracked| tracked.pid)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// True when `uuid` crashed more than `max_restarts` times within the
    /// restart window.
    pub fn is_crash_looping(&mut self, uuid: &str) -> bool {
        let window = self.restart_window;
        let now = Instant::now();
        let Some(crashes) = self.crashes.get_mut(uuid) else {
            return false;
        };
        while crashes
            .front()
            .is_some_and(|at| now.duration_since(*at) > window)
        {
            crashes.pop_front();
        }
        crashes.len() > self.max_restarts as usize
    }

    /// Spawn `command` for `uuid` and start tracking it.
    #[track_caller]
    pub fn spawn(
        &mut self,
        uuid: &str,
        mut command: TokioCommand,
    ) -> Result<Option<u32>, SpawnError> {
        if self.is_running(uuid) {
            return Err(SpawnError::Spawn {
                message: format!("helper {uuid} already has a live process"),
                location: ErrorLocation::from(Location::caller()),
                source: "duplicate launch".into(),
            });
        }

        if self.is_crash_looping(uuid) {
            return Err(SpawnError::CrashLoop {
                message: format!(
                    "helper {uuid} exited abnormally more than {} times within {:?}",
                    self.max_restarts, self.restart_window
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let child = command.spawn().map_err(|e| SpawnError::Spawn {
            message: format!("failed to launch helper {uuid}: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?;

        let pid = child.id();
        info!("Launched helper {} (PID: {:?})", uuid, pid);
        self.children.insert(
            uuid.to_string(),
            TrackedChild {
                child,
                pid,
                started: Instant::now(),
            },
        );
        Ok(pid)
    }

    /// Collect every child that has exited since the last call.
    pub fn reap(&mut self) -> Vec<ExitRecord> {
        let mut exited = Vec::new();
        for (uuid, tracked) in self.children.iter_mut() {
            match tracked.child.try_wait() {
                Ok(Some(status)) => exited.push((uuid.clone(), Some(status))),
                Ok(None) => {}
                Err(e) => {
                    warn!("Lost track of helper {} (PID: {:?}): {}", uuid, tracked.pid, e);
                    exited.push((uuid.clone(), None));
                }
            }
        }

        let mut records = Vec::with_capacity(exited.len());
        for (uuid, status) in exited {
            let Some(tracked) = self.children.remove(&uuid) else {
                continue;
            };
            let record = ExitRecord {
                uuid,
                pid: tracked.pid,
                status,
                ran_for: tracked.started.elapsed(),
            };
            if record.is_abnormal() {
                warn!(
                    "Helper {} (PID: {:?}) exited abnormally: {:?}",
                    record.uuid, record.pid, record.status
                );
                self.record_crash(&record.uuid);
            } else {
                info!("Helper {} (PID: {:?}) exited", record.uuid, record.pid);
            }
            records.push(record);
        }
        records
    }

    pub fn record_crash(&mut self, uuid: &str) {
        self.crashes
            .entry(uuid.to_string())
            .or_default()
            .push_back(Instant::now());
    }

    /// Kill every remaining child and wait for it.
    pub async fn shutdown(&mut self) {
        for (uuid, mut tracked) in self.children.drain() {
            if let Err(e) = tracked.child.kill().await {
                warn!("Failed to stop helper {} (PID: {:?}): {}", uuid, tracked.pid, e);
            }
        }
    }
}
