//! The ISE catalogue and its cache file.
//!
//! One record per installed ISE, keyed by uuid. The cache file holds one
//! line per record:
//!
//! ```text
//! name:uuid:module:language:icon:mode:option:locales
//! ```
//!
//! with `locales` joined by `,`. The file is shared with other processes and
//! is only ever replaced through a temp file and a rename.

use crate::error::catalogue::CatalogueError;

use common::ErrorLocation;
use models::{HelperDescriptor, IseInfo, IseMode};

use std::collections::BTreeMap;
use std::panic::Location;
use std::path::Path;

use log::{debug, info, warn};

const CACHE_FIELDS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalogue {
    entries: BTreeMap<String, IseInfo>,
}

/// Format one cache line, without the trailing newline.
pub fn format_line(info: &IseInfo) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}:{}:{}",
        info.name,
        info.uuid,
        info.module,
        info.language,
        info.icon,
        info.mode.as_str(),
        info.option,
        info.locales.join(",")
    )
}

/// Parse one cache line. Returns `None` for anything malformed.
pub fn parse_line(line: &str) -> Option<IseInfo> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() != CACHE_FIELDS {
        return None;
    }
    let uuid = fields[1].trim();
    let module = fields[2].trim();
    if uuid.is_empty() || module.is_empty() {
        return None;
    }
    let mode = IseMode::parse(fields[5].trim())?;
    let option = fields[6].trim().parse().ok()?;
    let locales = fields[7]
        .split(',')
        .map(str::trim)
        .filter(|locale| !locale.is_empty())
        .map(str::to_string)
        .collect();

    Some(IseInfo {
        name: fields[0].to_string(),
        uuid: uuid.to_string(),
        module: module.to_string(),
        language: fields[3].to_string(),
        icon: fields[4].to_string(),
        mode,
        option,
        locales,
        description: String::new(),
    })
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse cache file content, skipping lines that do not parse.
    pub fn parse(content: &str) -> Self {
        let mut catalogue = Self::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Some(info) => {
                    catalogue.entries.insert(info.uuid.clone(), info);
                }
                None => warn!("Skipping malformed catalogue line {}: {:?}", number + 1, line),
            }
        }
        catalogue
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for info in self.entries.values() {
            out.push_str(&format_line(info));
            out.push('\n');
        }
        out
    }

    /// True when both catalogues render to the same cache file.
    ///
    /// Descriptions are not cached, so a catalogue loaded from the cache and
    /// one rebuilt from manifests compare equal.
    pub fn same_cache(&self, other: &Catalogue) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .values()
                .zip(other.entries.values())
                .all(|(a, b)| format_line(a) == format_line(b))
    }

    /// Load the cache file. A missing file is an empty catalogue.
    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        if !path.exists() {
            debug!("No catalogue cache at {}", path.display());
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path).map_err(|e| CatalogueError::Read {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        })?;
        let catalogue = Self::parse(&content);
        info!(
            "Loaded {} catalogue entries from {}",
            catalogue.len(),
            path.display()
        );
        Ok(catalogue)
    }

    /// Write the cache file through a temp file and rename.
    ///
    /// Returns false without touching the file when it already holds
    /// exactly this content.
    pub fn save(&self, path: &Path) -> Result<bool, CatalogueError> {
        let content = self.render();
        if std::fs::read_to_string(path).is_ok_and(|existing| existing == content) {
            debug!("Catalogue cache {} unchanged", path.display());
            return Ok(false);
        }

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| CatalogueError::Write {
                location: ErrorLocation::from(Location::caller()),
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let mut temp_name = path.as_os_str().to_os_string();
        temp_name.push(format!(".{}.tmp", std::process::id()));
        let temp_path = std::path::PathBuf::from(temp_name);

        std::fs::write(&temp_path, &content).map_err(|e| CatalogueError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, path).map_err(|e| CatalogueError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        })?;

        info!("Catalogue cache written to {}", path.display());
        Ok(true)
    }

    pub fn get(&self, uuid: &str) -> Option<&IseInfo> {
        self.entries.get(uuid)
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.entries.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IseInfo> {
        self.entries.values()
    }

    pub fn uuids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn with_mode(&self, mode: IseMode) -> impl Iterator<Item = &IseInfo> {
        self.entries.values().filter(move |info| info.mode == mode)
    }

    pub fn helpers(&self) -> Vec<HelperDescriptor> {
        self.with_mode(IseMode::Helper)
            .map(HelperDescriptor::from)
            .collect()
    }

    pub fn modules(&self) -> Vec<String> {
        let mut modules: Vec<String> =
            self.entries.values().map(|info| info.module.clone()).collect();
        modules.sort();
        modules.dedup();
        modules
    }

    /// Replace every entry of `module` with `entries`.
    ///
    /// Returns true when the cached form of the catalogue changed.
    pub fn replace_module(&mut self, module: &str, entries: Vec<IseInfo>) -> bool {
        let mut next = self.clone();
        next.entries.retain(|_, info| info.module != module);
        for info in entries {
            if info.module != module {
                warn!(
                    "Entry {} claims module {} while installing {}",
                    info.uuid, info.module, module
                );
                continue;
            }
            next.entries.insert(info.uuid.clone(), info);
        }
        let changed = !next.same_cache(self);
        *self = next;
        changed
    }

    /// Returns true when anything was removed.
    pub fn remove_module(&mut self, module: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|_, info| info.module != module);
        before != self.entries.len()
    }

    /// Drop entries whose module fails `keep`, returning their uuids.
    pub fn retain_modules(&mut self, keep: impl Fn(&str) -> bool) -> Vec<String> {
        let mut dropped = Vec::new();
        self.entries.retain(|uuid, info| {
            let kept = keep(&info.module);
            if !kept {
                dropped.push(uuid.clone());
            }
            kept
        });
        dropped
    }
}

impl FromIterator<IseInfo> for Catalogue {
    fn from_iter<I: IntoIterator<Item = IseInfo>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|info| (info.uuid.clone(), info))
                .collect(),
        }
    }
}
