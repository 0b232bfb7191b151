//! Module manifests.
//!
//! Every module directory holds one `*.ise` TOML manifest per module:
//!
//! ```toml
//! module = "handwriting"          # defaults to the file stem
//! path = "/opt/ise/handwriting"   # defaults to <dir>/<module>
//!
//! [[ise]]
//! name = "Handwriting"
//! uuid = "6f1d6c1e-..."
//! language = "en"
//! locales = ["en_US", "en_GB"]
//! option = 2
//! ```
//!
//! `mode` defaults to the kind of directory the manifest was found in.

use crate::error::catalogue::CatalogueError;
use crate::MANIFEST_EXTENSION;

use common::ErrorLocation;
use models::{HelperDescriptorBuilder, IseInfo, IseMode};

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ManifestFile {
    module: Option<String>,
    path: Option<PathBuf>,
    #[serde(default, rename = "ise")]
    ises: Vec<ManifestIse>,
}

#[derive(Debug, Deserialize)]
struct ManifestIse {
    name: String,
    uuid: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    icon: String,
    mode: Option<IseMode>,
    #[serde(default)]
    option: u32,
    #[serde(default)]
    locales: Vec<String>,
    #[serde(default)]
    description: String,
}

/// A parsed module manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleManifest {
    pub module: String,
    pub manifest_path: PathBuf,
    /// What the launcher is pointed at for helper ISEs.
    pub module_path: PathBuf,
    pub entries: Vec<IseInfo>,
}

#[track_caller]
fn manifest_error(path: &Path, reason: impl Into<String>) -> CatalogueError {
    CatalogueError::Manifest {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

pub fn read_manifest(path: &Path, default_mode: IseMode) -> Result<ModuleManifest, CatalogueError> {
    let content = std::fs::read_to_string(path).map_err(|e| CatalogueError::Read {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_manifest(path, &content, default_mode)
}

pub fn parse_manifest(
    path: &Path,
    content: &str,
    default_mode: IseMode,
) -> Result<ModuleManifest, CatalogueError> {
    let file: ManifestFile =
        toml::from_str(content).map_err(|e| manifest_error(path, e.to_string()))?;

    let module = match file.module {
        Some(module) => module,
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .ok_or_else(|| manifest_error(path, "cannot derive module name from file name"))?,
    };

    let module_path = match file.path {
        Some(module_path) => module_path,
        None => path
            .parent()
            .map(|dir| dir.join(&module))
            .unwrap_or_else(|| PathBuf::from(&module)),
    };

    if file.ises.is_empty() {
        return Err(manifest_error(path, "manifest lists no ISEs"));
    }

    let mut entries = Vec::with_capacity(file.ises.len());
    for ise in file.ises {
        // The builder rejects empty ids and characters that would break a
        // cache line.
        HelperDescriptorBuilder::default()
            .with_uuid(ise.uuid.as_str())
            .with_name(ise.name.as_str())
            .with_icon(ise.icon.as_str())
            .with_module(module.as_str())
            .with_option(ise.option)
            .build()
            .map_err(|e| manifest_error(path, e.to_string()))?;

        let reserved = |value: &str| value.contains([':', ',', '\n', '\r']);
        if ise.language.contains([':', '\n', '\r']) || ise.locales.iter().any(|l| reserved(l)) {
            return Err(manifest_error(
                path,
                format!("ISE {} has a reserved character in its language or locales", ise.uuid),
            ));
        }

        entries.push(IseInfo {
            name: ise.name,
            uuid: ise.uuid,
            module: module.clone(),
            language: ise.language,
            icon: ise.icon,
            mode: ise.mode.unwrap_or(default_mode),
            option: ise.option,
            locales: ise.locales,
            description: ise.description,
        });
    }

    Ok(ModuleManifest {
        module,
        manifest_path: path.to_path_buf(),
        module_path,
        entries,
    })
}

/// Read every manifest in `dir`. Unreadable manifests are logged and
/// skipped; a missing directory yields nothing.
pub fn scan_dir(dir: &Path, default_mode: IseMode) -> Vec<ModuleManifest> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) => {
            debug!("Module directory {} not readable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == MANIFEST_EXTENSION))
        .collect();
    paths.sort();

    let mut manifests = Vec::new();
    for path in paths {
        match read_manifest(&path, default_mode) {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => warn!("Ignoring module manifest: {}", e),
        }
    }
    manifests
}
