//! Selection import/export: a named pivot plus an ordered list of entity
//! snapshots, written either as the native binary format (magic + version
//! header, bincode payload) or as JSON for hand editing and sharing.
//!
//! Loading never aborts on unknown assets: records whose asset name fails
//! to resolve against the world's catalog are skipped and reported back.

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::{EntityState, World};

/// Magic header bytes for the native selection file format.
const MAGIC: &[u8; 4] = b"MVKS";
/// Current file format version.
const VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("reading {} failed: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding {} failed: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("decoding {} failed: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("JSON for {} failed: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} is not a selection file: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
    #[error("{} has file version {version}, newer than supported", path.display())]
    Version { path: PathBuf, version: u32 },
}

/// One exported entity: the snapshot plus the asset name it instantiates,
/// so a load on another save can resolve (or report) it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedState {
    pub asset: String,
    pub state: EntityState,
}

/// A portable selection: pivot point plus ordered snapshot records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionFile {
    pub name: String,
    pub center: Vec3,
    pub states: Vec<SavedState>,
}

/// Outcome of resolving a loaded selection against a world's asset
/// catalog.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub name: String,
    pub center: Vec3,
    pub states: Vec<EntityState>,
    /// Asset names that did not resolve; their records were dropped.
    pub missing: Vec<String>,
}

/// Save a selection in the native binary format.
pub fn save_selection(selection: &SelectionFile, path: &Path) -> Result<(), IoError> {
    let payload = bincode::serialize(selection).map_err(|source| IoError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let mut data = Vec::with_capacity(MAGIC.len() + 4 + payload.len());
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&VERSION.to_le_bytes());
    data.extend_from_slice(&payload);

    fs::write(path, &data).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a native selection file without resolving assets.
pub fn load_selection_file(path: &Path) -> Result<SelectionFile, IoError> {
    let data = fs::read(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if data.len() < 8 {
        return Err(IoError::Format {
            path: path.to_path_buf(),
            reason: "file too small".to_string(),
        });
    }
    if &data[0..4] != MAGIC {
        return Err(IoError::Format {
            path: path.to_path_buf(),
            reason: "bad magic".to_string(),
        });
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version > VERSION {
        return Err(IoError::Version {
            path: path.to_path_buf(),
            version,
        });
    }

    bincode::deserialize(&data[8..]).map_err(|source| IoError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Export a selection as pretty JSON for interchange.
pub fn export_json(selection: &SelectionFile, path: &Path) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(selection).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn import_json(path: &Path) -> Result<SelectionFile, IoError> {
    let data = fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve a loaded selection against the world's asset catalog. Records
/// with unknown assets are skipped and listed; the load itself proceeds.
pub fn resolve(selection: SelectionFile, world: &dyn World) -> LoadReport {
    let mut states = Vec::with_capacity(selection.states.len());
    let mut missing = Vec::new();
    for saved in selection.states {
        if world.knows_asset(&saved.asset) {
            states.push(saved.state);
        } else if !missing.contains(&saved.asset) {
            missing.push(saved.asset);
        }
    }
    if !missing.is_empty() {
        log::warn!(
            "selection '{}': skipping {} record(s) with missing assets: {}",
            selection.name,
            missing.len(),
            missing.join(", ")
        );
    }
    LoadReport {
        name: selection.name,
        center: selection.center,
        states,
        missing,
    }
}

/// Load a native selection file and resolve it in one step.
pub fn load_selection(path: &Path, world: &dyn World) -> Result<LoadReport, IoError> {
    Ok(resolve(load_selection_file(path)?, world))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ArenaWorld, EntityId, StateExtra};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("movekit-{}-{name}", std::process::id()))
    }

    fn sample() -> SelectionFile {
        SelectionFile {
            name: "plaza".to_string(),
            center: Vec3::new(4.0, 0.0, 4.0),
            states: vec![
                SavedState {
                    asset: "oak".to_string(),
                    state: EntityState::new(
                        EntityId::tree(1),
                        Vec3::new(0.0, 0.0, 0.0),
                        0.0,
                        StateExtra::Tree {
                            scale: 1.1,
                            brightness: 0.8,
                        },
                    ),
                },
                SavedState {
                    asset: "bench".to_string(),
                    state: EntityState::new(
                        EntityId::prop(1),
                        Vec3::new(8.0, 0.0, 8.0),
                        1.2,
                        StateExtra::None,
                    ),
                },
            ],
        }
    }

    #[test]
    fn native_roundtrip() {
        let path = scratch("roundtrip.mvks");
        save_selection(&sample(), &path).unwrap();
        let loaded = load_selection_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.name, "plaza");
        assert_eq!(loaded.center, Vec3::new(4.0, 0.0, 4.0));
        assert_eq!(loaded.states.len(), 2);
        assert_eq!(loaded.states[1].state.angle, 1.2);
    }

    #[test]
    fn json_roundtrip() {
        let path = scratch("roundtrip.json");
        export_json(&sample(), &path).unwrap();
        let loaded = import_json(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded.states.len(), 2);
        assert_eq!(loaded.states[0].asset, "oak");
    }

    #[test]
    fn rejects_foreign_files() {
        let path = scratch("foreign.mvks");
        fs::write(&path, b"NOPE\x01\x00\x00\x00junk").unwrap();
        let err = load_selection_file(&path).unwrap_err();
        let _ = fs::remove_file(&path);
        assert!(matches!(err, IoError::Format { .. }));
    }

    #[test]
    fn rejects_newer_versions() {
        let path = scratch("future.mvks");
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&99u32.to_le_bytes());
        fs::write(&path, &data).unwrap();
        let err = load_selection_file(&path).unwrap_err();
        let _ = fs::remove_file(&path);
        assert!(matches!(err, IoError::Version { version: 99, .. }));
    }

    #[test]
    fn missing_assets_are_skipped_and_reported() {
        let mut world = ArenaWorld::new();
        world.register_asset("oak");

        let report = resolve(sample(), &world);
        assert_eq!(report.states.len(), 1);
        assert_eq!(report.missing, vec!["bench".to_string()]);
        // The surviving record is usable as a clone source.
        assert_eq!(report.states[0].id.kind, crate::world::EntityKind::Tree);
    }
}
