//! Filesystem mirror of decompressed file bodies.
//!
//! The external full-text engine indexes this tree, not the store.
//! Layout: `<project>/<relative_path>` for source files and
//! `_assets/<content_path>.<ext>` for synthetic asset entries, plus a
//! bootstrap marker recording the last build.
//!
//! Mirror writes are best-effort from the core's point of view:
//! failures are logged by the caller and never abort ingest.

use crate::config::BuildInfo;
use crate::types::{FileRecord, Language};
use std::io;
use std::path::{Path, PathBuf};

/// Directory prefix separating asset entries from source trees.
pub const ASSETS_PREFIX: &str = "_assets/";

const BOOTSTRAP_MARKER: &str = ".uindex-bootstrap.json";

pub struct Mirror {
    root: PathBuf,
}

impl Mirror {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mirror-relative path for a file record.
    ///
    /// Synthetic asset entries keep their `_assets/` path verbatim;
    /// source files land under their project name. Files without a
    /// relative path fall back to their basename.
    #[must_use]
    pub fn relative_path_for(file: &FileRecord) -> String {
        let rel = file.relative_path.as_deref().unwrap_or_else(|| {
            file.path.rsplit(['/', '\\']).next().unwrap_or(&file.path)
        });
        let rel = rel.replace('\\', "/");
        let rel = rel.trim_start_matches('/');
        if file.language == Language::Asset && rel.starts_with(ASSETS_PREFIX) {
            rel.to_string()
        } else {
            format!("{}/{}", file.project, rel)
        }
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        // Keep writes inside the mirror even for hostile relative paths.
        let mut clean = PathBuf::new();
        for part in Path::new(relative).components() {
            if let std::path::Component::Normal(p) = part {
                clean.push(p);
            }
        }
        self.root.join(clean)
    }

    /// Writes or replaces a mirror file.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` when the directory or file cannot be
    /// written.
    pub fn update_file(&self, relative: &str, content: &[u8]) -> io::Result<()> {
        let path = self.resolve(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dunce::simplified(&path), content)
    }

    /// Removes a mirror file. Absent files are not an error.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` for failures other than the file missing.
    pub fn delete_file(&self, relative: &str) -> io::Result<bool> {
        let path = self.resolve(relative);
        match std::fs::remove_file(dunce::simplified(&path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Writes the bootstrap marker after a successful batch.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` when the marker cannot be written.
    pub fn write_bootstrap_marker(&self, build: &BuildInfo, timestamp_ms: i64) -> io::Result<()> {
        let marker = serde_json::json!({
            "version": build.version,
            "gitHash": build.git_hash,
            "lastBuildMs": timestamp_ms,
        });
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(
            self.root.join(BOOTSTRAP_MARKER),
            serde_json::to_vec_pretty(&marker).unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileId;

    fn file_record(path: &str, project: &str, rel: Option<&str>, language: Language) -> FileRecord {
        FileRecord {
            id: FileId::new(1),
            path: path.into(),
            project: project.into(),
            module: String::new(),
            language,
            mtime: 0,
            relative_path: rel.map(Into::into),
        }
    }

    #[test]
    fn test_source_layout() {
        let rec = file_record("/work/g/Source/Hero.h", "Game", Some("Source/Hero.h"), Language::Cpp);
        assert_eq!(Mirror::relative_path_for(&rec), "Game/Source/Hero.h");
    }

    #[test]
    fn test_asset_layout_kept_verbatim() {
        let rec = file_record(
            "/work/g/Content/BP_Hero.uasset",
            "Game",
            Some("_assets/Game/Blueprints/BP_Hero.txt"),
            Language::Asset,
        );
        assert_eq!(
            Mirror::relative_path_for(&rec),
            "_assets/Game/Blueprints/BP_Hero.txt"
        );
    }

    #[test]
    fn test_fallback_to_basename() {
        let rec = file_record("/work/g/Source/Hero.h", "Game", None, Language::Cpp);
        assert_eq!(Mirror::relative_path_for(&rec), "Game/Hero.h");
    }

    #[test]
    fn test_write_delete_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let mirror = Mirror::new(dir.path().to_path_buf());

        mirror.update_file("Game/Source/Hero.h", b"class AHero {};").unwrap();
        let on_disk = std::fs::read(dir.path().join("Game/Source/Hero.h")).unwrap();
        assert_eq!(on_disk, b"class AHero {};");

        assert!(mirror.delete_file("Game/Source/Hero.h").unwrap());
        assert!(!mirror.delete_file("Game/Source/Hero.h").unwrap());
    }

    #[test]
    fn test_traversal_components_dropped() {
        let dir = tempfile::TempDir::new().unwrap();
        let mirror = Mirror::new(dir.path().to_path_buf());

        mirror.update_file("../escape.txt", b"x").unwrap();
        assert!(dir.path().join("escape.txt").exists());
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn test_bootstrap_marker() {
        let dir = tempfile::TempDir::new().unwrap();
        let mirror = Mirror::new(dir.path().to_path_buf());
        mirror
            .write_bootstrap_marker(&BuildInfo::default(), 123)
            .unwrap();

        let text = std::fs::read_to_string(dir.path().join(".uindex-bootstrap.json")).unwrap();
        assert!(text.contains("lastBuildMs"));
    }
}
