//! Crash-recovery snapshot persistence with file locking.
//!
//! An active session periodically saves a [`SessionSnapshot`] so that a
//! crash or force-quit loses at most one snapshot interval of progress. The
//! snapshot file is the sole signal that an interrupted session exists: a
//! finished or discarded session removes it.

use crate::{Error, Result, SessionSnapshot};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

impl SessionSnapshot {
    /// Load a snapshot with shared locking.
    ///
    /// Returns `Ok(None)` when no snapshot exists. A snapshot that cannot
    /// be opened or parsed is treated the same as a missing one, with a
    /// warning, so a corrupt file never blocks the next workout.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open snapshot {:?}: {}. Ignoring it.", path, e);
                return Ok(None);
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock snapshot {:?}: {}. Ignoring it.", path, e);
            return Ok(None);
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read snapshot {:?}: {}. Ignoring it.", path, e);
            return Ok(None);
        }

        file.unlock()?;

        match serde_json::from_str::<SessionSnapshot>(&contents) {
            Ok(snapshot) => {
                tracing::debug!("Loaded session snapshot from {:?}", path);
                Ok(Some(snapshot))
            }
            Err(e) => {
                tracing::warn!("Failed to parse snapshot {:?}: {}. Ignoring it.", path, e);
                Ok(None)
            }
        }
    }

    /// Save the snapshot atomically with exclusive locking.
    ///
    /// Writes to a temp file in the same directory, syncs, then renames
    /// over the previous snapshot so readers never see a half-written file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "snapshot path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved session snapshot to {:?}", path);
        Ok(())
    }

    /// Remove the snapshot file. Missing files are fine; that just means
    /// there was nothing to clear.
    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!("Cleared session snapshot at {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
