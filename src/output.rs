//! JSON export files.
//!
//! Files are staged next to their destination and only renamed into place on
//! [`PendingFile::commit`], so a reader never observes a half-written export.
//! [`commit_all`] replaces several files as a unit.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::{NamedTempFile, TempPath};

use crate::error::{ExportError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonFormat {
    #[default]
    Pretty,
    Compact,
}

/// A fully written temporary file waiting to replace `path`.
#[derive(Debug)]
pub struct PendingFile {
    file: NamedTempFile,
    path: PathBuf,
}

impl PendingFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(self) -> Result<PathBuf> {
        let Self { file, path } = self;
        file.persist(&path).map_err(|e| ExportError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        Ok(path)
    }

    /// Move any existing file at `path` aside, then rename the staged file
    /// into place.
    fn replace(self) -> Result<Replaced> {
        let Self { file, path } = self;

        let backup = match fs::symlink_metadata(&path) {
            Ok(_) => {
                let backup = tempfile::Builder::new()
                    .prefix(".nft-export-backup")
                    .tempfile_in(parent_dir(&path))
                    .map_err(io_error(&path))?
                    .into_temp_path();
                fs::rename(&path, &backup).map_err(io_error(&path))?;
                Some(backup)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_error(&path)(e)),
        };

        if let Err(e) = file.persist(&path) {
            if let Some(backup) = backup {
                restore(backup, &path);
            }
            return Err(io_error(&path)(e.error));
        }
        Ok(Replaced { path, backup })
    }
}

/// A committed file and the previous file it displaced, if any.
struct Replaced {
    path: PathBuf,
    backup: Option<TempPath>,
}

impl Replaced {
    fn roll_back(self) {
        match self.backup {
            Some(backup) => restore(backup, &self.path),
            None => {
                if let Err(error) = fs::remove_file(&self.path) {
                    tracing::warn!(
                        target: "nft_export::output",
                        path = %self.path.display(),
                        error = %error,
                        "Failed to remove export file while rolling back"
                    );
                }
            }
        }
    }
}

fn restore(backup: TempPath, path: &Path) {
    if let Err(error) = fs::rename(&backup, path) {
        let kept = backup.keep().ok();
        tracing::warn!(
            target: "nft_export::output",
            path = %path.display(),
            backup = ?kept,
            error = %error,
            "Failed to restore previous export file"
        );
    }
}

/// Commit staged files together.
///
/// Either every file replaces its destination or, on the first failure,
/// the files already committed are rolled back to their previous state.
pub fn commit_all(files: Vec<PendingFile>) -> Result<()> {
    let mut replaced = Vec::with_capacity(files.len());
    for file in files {
        match file.replace() {
            Ok(done) => replaced.push(done),
            Err(error) => {
                for done in replaced.into_iter().rev() {
                    done.roll_back();
                }
                return Err(error);
            }
        }
    }
    // displaced files are deleted as their backups drop
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize `value` into a temporary file beside `path`.
pub fn stage_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    format: JsonFormat,
) -> Result<PendingFile> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent).map_err(io_error(parent))?;

    let mut file = NamedTempFile::new_in(parent).map_err(io_error(parent))?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        match format {
            JsonFormat::Pretty => serde_json::to_writer_pretty(&mut writer, value)?,
            JsonFormat::Compact => serde_json::to_writer(&mut writer, value)?,
        }
        writer.write_all(b"\n").map_err(io_error(path))?;
        writer.flush().map_err(io_error(path))?;
    }
    file.as_file().sync_all().map_err(io_error(path))?;

    Ok(PendingFile {
        file,
        path: path.to_path_buf(),
    })
}

/// Write `value` to `path` atomically.
pub fn write_json_file<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    format: JsonFormat,
) -> Result<PathBuf> {
    stage_json(path, value, format)?.commit()
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).map_err(io_error(path))?;
    Ok(serde_json::from_str(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        let value = json!({ "a": [1, 2, 3], "b": null });

        write_json_file(&path, &value, JsonFormat::Pretty).unwrap();
        let back: Value = read_json_file(&path).unwrap();
        assert_eq!(back, value);
        assert!(fs::read_to_string(&path).unwrap().contains("\n  \"a\""));
    }

    #[test]
    fn test_compact_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json_file(&path, &json!({ "a": 1 }), JsonFormat::Compact).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}\n");
    }

    #[test]
    fn test_staged_file_is_invisible_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let pending = stage_json(&path, &json!([1]), JsonFormat::Pretty).unwrap();
        assert!(!path.exists());
        drop(pending);
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        let pending = stage_json(&path, &json!([2]), JsonFormat::Pretty).unwrap();
        assert_eq!(pending.path(), path.as_path());
        pending.commit().unwrap();
        assert_eq!(read_json_file::<Value>(&path).unwrap(), json!([2]));
    }

    #[test]
    fn test_commit_all_replaces_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        write_json_file(&first, &json!("old"), JsonFormat::Compact).unwrap();

        let staged = vec![
            stage_json(&first, &json!("new"), JsonFormat::Compact).unwrap(),
            stage_json(&second, &json!("new"), JsonFormat::Compact).unwrap(),
        ];
        commit_all(staged).unwrap();

        assert_eq!(read_json_file::<Value>(&first).unwrap(), json!("new"));
        assert_eq!(read_json_file::<Value>(&second).unwrap(), json!("new"));
        // no backup or staging files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_commit_all_rolls_back_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let fresh = dir.path().join("fresh.json");
        let blocked = dir.path().join("blocked.json");
        write_json_file(&first, &json!("old"), JsonFormat::Compact).unwrap();
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), b"x").unwrap();

        let staged = vec![
            stage_json(&first, &json!("new"), JsonFormat::Compact).unwrap(),
            stage_json(&fresh, &json!("new"), JsonFormat::Compact).unwrap(),
            stage_json(&blocked, &json!("new"), JsonFormat::Compact).unwrap(),
        ];
        let err = commit_all(staged).unwrap_err();

        assert!(matches!(err, ExportError::Io { path, .. } if path == blocked));
        assert_eq!(read_json_file::<Value>(&first).unwrap(), json!("old"));
        assert!(!fresh.exists());
        assert!(blocked.join("keep").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_json_file::<Value>(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }
}
