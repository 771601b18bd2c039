//! Stable repository and slot identity, per spec §3 and §4.1.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Canonicalise `path`: resolve symlinks and make it absolute. Falls back to
/// the absolute (unresolved) form when `path` does not exist on disk, so a
/// not-yet-created slot still gets a stable id.
fn canonicalize_or_absolute(path: &Path) -> std::path::PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Stable repository id: the SHA-256 hex digest of the canonicalised Git
/// common directory path.
#[must_use]
pub fn repo_id(common_dir: &Path) -> String {
    let canon = canonicalize_or_absolute(common_dir);
    sha256_hex(&canon.to_string_lossy())
}

/// Stable slot id: the SHA-256 hex digest of `repo_id + ":" + canonical-path`.
///
/// `slot_path` is canonicalised independently from `repo_root`; a slot's id
/// depends only on (repo, path), never on branch or content.
#[must_use]
pub fn slot_id(common_dir: &Path, slot_path: &Path) -> String {
    let repo = repo_id(common_dir);
    let canon_slot = canonicalize_or_absolute(slot_path);
    sha256_hex(&format!("{repo}:{}", canon_slot.to_string_lossy()))
}
