//! Unified diff of what `sync` would write against what is on disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use crate::emit::FileKind;
use crate::error::io_err;
use crate::synchronizer::Synchronizer;
use crate::SyncError;

/// A single rendered file diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub kind: FileKind,
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Render every file in memory and diff it against the output directory.
///
/// Files whose content already matches are left out. Nothing is written.
pub async fn diff_outputs(synchronizer: &Synchronizer) -> Result<Vec<FileDiff>, SyncError> {
    let root = synchronizer.snapshot().output_dir.clone();
    let mut diffs = Vec::new();

    for file in synchronizer.preview().await? {
        let rendered = normalize_line_endings(&file.contents);
        let existing = read_existing_or_empty(&file.path)?;
        if existing == rendered {
            continue;
        }

        let relative = file.path.strip_prefix(&root).unwrap_or(file.path.as_path());
        let old_header = format!("a/{}", relative.display());
        let new_header = format!("b/{}", relative.display());
        let unified = TextDiff::from_lines(&existing, &rendered)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();

        diffs.push(FileDiff {
            kind: file.kind,
            path: file.path,
            unified_diff: unified,
        });
    }

    Ok(diffs)
}

fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(normalize_line_endings(&content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use postsync_core::{AppConfig, MapMode, NewRelay};
    use postsync_store::{MemoryRepository, Repository};
    use tempfile::TempDir;

    use super::*;

    async fn synchronizer(dir: &Path) -> Synchronizer {
        let repo = MemoryRepository::new();
        repo.create_relay(NewRelay::new("a@x", "b@y")).await.unwrap();
        let mut cfg = AppConfig::default();
        cfg.db.uri = Some("mysql://relay:pw@db/mail".into());
        cfg.output.dir = dir.to_path_buf();
        cfg.output.mode = MapMode::PreRendered;
        let repo: Arc<dyn Repository> = Arc::new(repo);
        Synchronizer::new(cfg.snapshot().unwrap(), repo)
    }

    #[tokio::test]
    async fn no_diffs_after_clean_sync() {
        let out = TempDir::new().expect("out");
        let sync = synchronizer(out.path()).await;
        sync.run().await.expect("sync");

        let diffs = diff_outputs(&sync).await.expect("diff");
        assert!(diffs.is_empty(), "synced directory should have no diff");
    }

    #[tokio::test]
    async fn missing_files_diff_against_empty() {
        let out = TempDir::new().expect("out");
        let sync = synchronizer(out.path()).await;

        let diffs = diff_outputs(&sync).await.expect("diff");
        assert_eq!(diffs.len(), 3);
        assert!(!out.path().join("main.cf").exists(), "diff must not write");
    }

    #[tokio::test]
    async fn local_edit_produces_unified_diff() {
        let out = TempDir::new().expect("out");
        let sync = synchronizer(out.path()).await;
        sync.run().await.expect("sync");

        let target = out.path().join("virtual_alias");
        fs::write(&target, "a@x   someone@else\n").expect("write");

        let diffs = diff_outputs(&sync).await.expect("diff");
        assert_eq!(diffs.len(), 1);
        let alias = &diffs[0];
        assert_eq!(alias.kind, FileKind::AliasMap);
        assert!(alias.unified_diff.contains("--- a/virtual_alias"));
        assert!(alias.unified_diff.contains("+++ b/virtual_alias"));
        assert!(alias.unified_diff.contains("+a@x   b@y"));
        assert!(alias.unified_diff.contains("@@"));
    }

    #[tokio::test]
    async fn crlf_on_disk_is_not_a_difference() {
        let out = TempDir::new().expect("out");
        let sync = synchronizer(out.path()).await;
        sync.run().await.expect("sync");

        let target = out.path().join("virtual_alias");
        fs::write(&target, "a@x   b@y\r\n").expect("write");
        assert!(diff_outputs(&sync).await.expect("diff").is_empty());
    }
}
