//! On-disk persistence of generated courses, keyed by `(map type, run id)`.

use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{CarsimError, Result};
use crate::map::types::{MapType, ObstacleList, ObstacleSpec};

/// Bumped whenever the document layout changes.
pub const MAP_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct MapDocument {
    format_version: u32,
    map_type: MapType,
    layout: MapType,
    run_id: u32,
    obstacles: Vec<ObstacleSpec>,
}

/// A directory of saved obstacle maps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapStore {
    root: PathBuf,
}

impl MapStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    /// File path for a key. Stable: the same key always maps to the same path.
    pub fn path_for(&self, map_type: MapType, run_id: u32) -> PathBuf {
        self.root.join(map_type.to_string()).join(format!("run_{run_id:06}.json"))
    }

    pub fn contains(&self, map_type: MapType, run_id: u32) -> bool {
        self.path_for(map_type, run_id).is_file()
    }

    /// Persist `list` under `(list.map_type, run_id)`.
    pub fn save(&self, run_id: u32, list: &ObstacleList) -> Result<PathBuf> {
        if list.run_id != run_id {
            return Err(CarsimError::Configuration(format!(
                "obstacle list for run {} cannot be saved as run {run_id}",
                list.run_id
            )));
        }
        let path = self.path_for(list.map_type, run_id);
        let io_err = |source: std::io::Error| CarsimError::Io { path: path.clone(), source };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let doc = MapDocument {
            format_version: MAP_FORMAT_VERSION,
            map_type: list.map_type,
            layout: list.layout,
            run_id,
            obstacles: list.obstacles.clone(),
        };
        let file = fs::File::create(&path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &doc)
            .map_err(|e| io_err(std::io::Error::new(ErrorKind::Other, e)))?;
        writer.flush().map_err(io_err)?;
        tracing::info!(map_type = %list.map_type, run_id, path = %path.display(), "saved obstacle map");
        Ok(path)
    }

    /// Load the map saved under `(map_type, run_id)`.
    pub fn load(&self, map_type: MapType, run_id: u32) -> Result<ObstacleList> {
        let path = self.path_for(map_type, run_id);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CarsimError::NotFound { path }),
            Err(source) => return Err(CarsimError::Io { path, source }),
        };
        let doc: MapDocument = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CarsimError::Format { path: path.clone(), reason: e.to_string() })?;
        let format_err = |reason: String| CarsimError::Format { path: path.clone(), reason };
        if doc.format_version != MAP_FORMAT_VERSION {
            return Err(format_err(format!("unsupported format version {}", doc.format_version)));
        }
        if doc.map_type != map_type || doc.run_id != run_id {
            return Err(format_err(format!(
                "file holds ({}, {}) but ({map_type}, {run_id}) was requested",
                doc.map_type, doc.run_id
            )));
        }
        if !doc.map_type.candidates().contains(&doc.layout) {
            return Err(format_err(format!("layout {} is not a valid resolution of {}", doc.layout, doc.map_type)));
        }
        tracing::info!(%map_type, run_id, path = %path.display(), "loaded obstacle map");
        Ok(ObstacleList { map_type: doc.map_type, layout: doc.layout, run_id: doc.run_id, obstacles: doc.obstacles })
    }
}
