//! Deterministic source tree fingerprinting.
//!
//! The fingerprint is a pure function of file contents and relative paths:
//! timestamps, permissions, and traversal order do not affect it. Identical
//! trees always produce identical fingerprints; any byte-level change, added,
//! removed, or renamed file produces a different one.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use shipwright_state::ContentDigest;
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};

/// One agent's deployable source unit: a root directory and the sorted set
/// of regular files beneath it. Immutable per build invocation.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
    /// Relative paths of member files, sorted for determinism.
    files: Vec<PathBuf>,
}

impl SourceTree {
    /// Scan `root`, collecting all regular files as sorted relative paths.
    ///
    /// Fails with `EmptyTree` when no files are found (a build input with
    /// nothing in it is ambiguous) and with `Io` when the tree is unreadable.
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut files = Vec::new();

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| PipelineError::Io {
                path: root.display().to_string(),
                detail: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_path_buf();
            files.push(rel);
        }

        if files.is_empty() {
            return Err(PipelineError::EmptyTree {
                root: root.display().to_string(),
            });
        }

        // WalkDir sorts per directory; sort the flattened list to make the
        // enumeration order explicit.
        files.sort();

        Ok(Self { root, files })
    }

    /// The tree's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted relative paths of the member files.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Absolute path of a member file.
    pub(crate) fn absolute(&self, rel: &Path) -> PathBuf {
        self.root.join(rel)
    }

    /// Compute the tree's content fingerprint.
    ///
    /// Hashes one `F:{relative_path}:{sha256(content)}` line per file in
    /// sorted path order, then digests the whole.
    pub fn fingerprint(&self) -> Result<ContentDigest> {
        let mut hasher = Sha256::new();
        for rel in &self.files {
            let file_hash = hash_file(&self.absolute(rel))?;
            hasher.update(format!("F:{}:{}\n", rel.display(), file_hash));
        }
        Ok(ContentDigest::from_hasher(hasher))
    }
}

/// Hash a single file's contents, streaming in 8 KiB chunks.
fn hash_file(path: &Path) -> Result<String> {
    let io_err = |e: std::io::Error| PipelineError::Io {
        path: path.display().to_string(),
        detail: e.to_string(),
    };

    let mut file = fs::File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn fingerprint_of(root: &Path) -> ContentDigest {
        SourceTree::scan(root).unwrap().fingerprint().unwrap()
    }

    #[test]
    fn empty_tree_is_rejected() {
        let temp = tempdir().unwrap();
        let err = SourceTree::scan(temp.path()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyTree { .. }));
    }

    #[test]
    fn unreadable_tree_is_io_error() {
        let err = SourceTree::scan("/definitely/not/a/real/path").unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("agent.py"), "entry").unwrap();
        fs::write(temp.path().join("tools.py"), "tools").unwrap();

        assert_eq!(fingerprint_of(temp.path()), fingerprint_of(temp.path()));
    }

    #[test]
    fn identical_content_in_two_trees_matches() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        for root in [a.path(), b.path()] {
            fs::create_dir(root.join("app")).unwrap();
            fs::write(root.join("app/main.py"), "main").unwrap();
            fs::write(root.join("agent.py"), "entry").unwrap();
        }

        assert_eq!(fingerprint_of(a.path()), fingerprint_of(b.path()));
    }

    #[test]
    fn single_byte_change_flips_fingerprint() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("agent.py"), "version = 1").unwrap();
        let before = fingerprint_of(temp.path());

        fs::write(temp.path().join("agent.py"), "version = 2").unwrap();
        assert_ne!(before, fingerprint_of(temp.path()));
    }

    #[test]
    fn added_file_flips_fingerprint() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("agent.py"), "entry").unwrap();
        let before = fingerprint_of(temp.path());

        fs::write(temp.path().join("extra.py"), "more").unwrap();
        assert_ne!(before, fingerprint_of(temp.path()));
    }

    #[test]
    fn removed_file_flips_fingerprint() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("agent.py"), "entry").unwrap();
        fs::write(temp.path().join("extra.py"), "more").unwrap();
        let before = fingerprint_of(temp.path());

        fs::remove_file(temp.path().join("extra.py")).unwrap();
        assert_ne!(before, fingerprint_of(temp.path()));
    }

    #[test]
    fn renamed_file_flips_fingerprint() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("agent.py"), "entry").unwrap();
        let before = fingerprint_of(temp.path());

        fs::rename(temp.path().join("agent.py"), temp.path().join("main.py")).unwrap();
        assert_ne!(before, fingerprint_of(temp.path()));
    }

    #[test]
    fn scan_lists_sorted_relative_paths() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("app")).unwrap();
        fs::write(temp.path().join("zeta.py"), "z").unwrap();
        fs::write(temp.path().join("app/alpha.py"), "a").unwrap();

        let tree = SourceTree::scan(temp.path()).unwrap();
        let files: Vec<_> = tree.files().iter().map(|p| p.display().to_string()).collect();
        assert_eq!(files, vec!["app/alpha.py", "zeta.py"]);
    }
}
