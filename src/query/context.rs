//! Context-line and signature attachment, and response path shaping.
//!
//! Non-grep responses can carry a window of body lines around a hit
//! (`contextLines`) or just the trimmed definition line
//! (`includeSignatures`). Bodies are decompressed once per response
//! and cached per file, so a result list touching one file many times
//! reads it once.

use crate::ingest::inflate;
use crate::store::Store;
use crate::types::{FileId, FileRecord};
use ahash::AHashMap;

/// A window of body lines around a hit.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextWindow {
    /// 1-indexed line number of the first line in `lines`.
    pub start_line: u32,
    pub lines: Vec<String>,
}

/// Batched body reader for one response.
pub struct ContextAttacher<'a> {
    store: &'a Store,
    bodies: AHashMap<FileId, Option<Vec<String>>>,
}

impl<'a> ContextAttacher<'a> {
    #[must_use]
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            bodies: AHashMap::new(),
        }
    }

    fn body_lines(&mut self, file_id: FileId) -> Option<&[String]> {
        let store = self.store;
        self.bodies
            .entry(file_id)
            .or_insert_with(|| {
                let (compressed, _) = store.file_content(file_id).ok()??;
                let bytes = inflate(&compressed)?;
                let text = String::from_utf8_lossy(&bytes);
                Some(text.lines().map(ToString::to_string).collect())
            })
            .as_deref()
    }

    /// A window of `context_lines` lines on each side of `line`.
    pub fn window(
        &mut self,
        file_id: FileId,
        line: u32,
        context_lines: usize,
    ) -> Option<ContextWindow> {
        if context_lines == 0 || line == 0 {
            return None;
        }
        let lines = self.body_lines(file_id)?;
        let center = (line as usize).saturating_sub(1);
        if center >= lines.len() {
            return None;
        }
        let start = center.saturating_sub(context_lines);
        let end = (center + context_lines + 1).min(lines.len());
        Some(ContextWindow {
            start_line: (start + 1) as u32,
            lines: lines[start..end].to_vec(),
        })
    }

    /// The trimmed definition line itself.
    pub fn signature(&mut self, file_id: FileId, line: u32) -> Option<String> {
        if line == 0 {
            return None;
        }
        let lines = self.body_lines(file_id)?;
        lines
            .get((line as usize).saturating_sub(1))
            .map(|l| l.trim().to_string())
    }
}

/// Normalized display path: forward slashes, per-project prefix
/// stripped, project name prepended for cross-project uniqueness.
#[must_use]
pub fn display_path(file: &FileRecord) -> String {
    match &file.relative_path {
        Some(rel) => format!(
            "{}/{}",
            file.project,
            rel.replace('\\', "/").trim_start_matches('/')
        ),
        None => {
            let flat = file.path.replace('\\', "/");
            let basename = flat.rsplit('/').next().unwrap_or(&flat);
            format!("{}/{}", file.project, basename)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::deflate;
    use crate::trigram::{content_hash, extract_trigrams};
    use crate::types::Language;

    fn store_with_body(body: &str) -> (Store, FileId) {
        let store = Store::in_memory().unwrap();
        let id = store
            .upsert_file("/g/A.h", "Game", "m", 1, Language::Cpp, Some("A.h"))
            .unwrap();
        store
            .upsert_file_content(
                id,
                &deflate(body.as_bytes()),
                content_hash(body.as_bytes()),
                &extract_trigrams(body.as_bytes()),
            )
            .unwrap();
        (store, id)
    }

    #[test]
    fn test_window_centering() {
        let (store, id) = store_with_body("l1\nl2\nl3\nl4\nl5\n");
        let mut attacher = ContextAttacher::new(&store);

        let w = attacher.window(id, 3, 1).unwrap();
        assert_eq!(w.start_line, 2);
        assert_eq!(w.lines, vec!["l2", "l3", "l4"]);
    }

    #[test]
    fn test_window_clamps_at_edges() {
        let (store, id) = store_with_body("l1\nl2\nl3\n");
        let mut attacher = ContextAttacher::new(&store);

        let w = attacher.window(id, 1, 2).unwrap();
        assert_eq!(w.start_line, 1);
        assert_eq!(w.lines, vec!["l1", "l2", "l3"]);

        assert!(attacher.window(id, 99, 2).is_none());
        assert!(attacher.window(id, 2, 0).is_none());
    }

    #[test]
    fn test_signature_trims() {
        let (store, id) = store_with_body("class A {\n    void Jump();\n}\n");
        let mut attacher = ContextAttacher::new(&store);
        assert_eq!(attacher.signature(id, 2).unwrap(), "void Jump();");
    }

    #[test]
    fn test_missing_body_yields_none() {
        let store = Store::in_memory().unwrap();
        let id = store
            .upsert_file("/g/B.h", "Game", "m", 1, Language::Cpp, None)
            .unwrap();
        let mut attacher = ContextAttacher::new(&store);
        assert!(attacher.window(id, 1, 2).is_none());
        assert!(attacher.signature(id, 1).is_none());
    }

    #[test]
    fn test_display_path() {
        let file = FileRecord {
            id: FileId::new(1),
            path: "C:\\work\\g\\Source\\Hero.h".into(),
            project: "Game".into(),
            module: String::new(),
            language: Language::Cpp,
            mtime: 0,
            relative_path: Some("Source\\Hero.h".into()),
        };
        assert_eq!(display_path(&file), "Game/Source/Hero.h");

        let bare = FileRecord {
            relative_path: None,
            ..file
        };
        assert_eq!(display_path(&bare), "Game/Hero.h");
    }
}
