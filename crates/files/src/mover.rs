//! Whole-directory moves with empty-ancestor pruning.
//!
//! Record directories move when their layout-derived path changes (for example a
//! template layout keyed on an identifier that was edited). After the move, the
//! folders that only existed to hold the old location are pruned, walking upward
//! until a non-empty folder or the data root is reached.
//!
//! Failures here never abort the caller: the stored bytes are intact either way and
//! a layout inconsistency can be fixed by retrying the move, so every failure is
//! logged and reported through [`RenameOutcome`].

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Result of [`DirectoryMover::rename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The old directory was moved to the new location
    Moved { pruned: usize },

    /// The old directory did not exist; the new one was created empty
    Created,

    /// The move or the creation failed; nothing was pruned
    Failed { reason: String },
}

/// Moves record directories inside a data root.
///
/// Paths are compared after making them absolute and folding `.` and `..`
/// components, so a relative root and an absolute path beneath it are treated
/// alike, and `root/../elsewhere` is recognised as outside the root.
#[derive(Debug, Clone)]
pub struct DirectoryMover {
    root: PathBuf,
    anchor: PathBuf,
}

impl DirectoryMover {
    /// Creates a mover that never prunes at or above `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let anchor = normalize(&root);
        Self { root, anchor }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Moves `old_path` to `new_path`.
    ///
    /// - Both paths must lie strictly inside the root; otherwise nothing is touched
    /// - If `old_path` exists, the parent of `new_path` is created, the directory
    ///   is renamed, and emptied ancestors of `old_path` are pruned
    /// - Otherwise `new_path` is simply created
    pub fn rename(&self, old_path: &Path, new_path: &Path) -> RenameOutcome {
        for path in [old_path, new_path] {
            if !self.contains(&normalize(path)) {
                let reason = format!(
                    "Refusing to move {} to {}: {} is outside the data directory {}",
                    old_path.display(),
                    new_path.display(),
                    path.display(),
                    self.root.display()
                );
                tracing::error!("Datastore issue. {}", reason);
                return RenameOutcome::Failed { reason };
            }
        }
        let old_path = &normalize(old_path);
        let new_path = &normalize(new_path);

        if !old_path.exists() {
            return match fs::create_dir_all(new_path) {
                Ok(()) => RenameOutcome::Created,
                Err(e) => {
                    let reason = format!(
                        "Failed to create folder {}. Error is: {}",
                        new_path.display(),
                        e
                    );
                    tracing::error!("Datastore issue. {}", reason);
                    RenameOutcome::Failed { reason }
                }
            };
        }

        if let Some(parent) = new_path.parent() {
            // A failure here surfaces again as a rename failure below.
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::error!(
                    "Datastore issue. Failed to create parent folders of {}. Error is: {}",
                    new_path.display(),
                    e
                );
            }
        }

        match fs::rename(old_path, new_path) {
            Ok(()) => {
                let pruned = self.prune_empty_ancestors(old_path);
                tracing::info!(
                    "moved {} to {} ({} empty folders pruned)",
                    old_path.display(),
                    new_path.display(),
                    pruned
                );
                RenameOutcome::Moved { pruned }
            }
            Err(e) => {
                let reason = format!(
                    "Failed to rename {} in {}. Error is: {}",
                    old_path.display(),
                    new_path.display(),
                    e
                );
                tracing::error!("Datastore issue. {}", reason);
                RenameOutcome::Failed { reason }
            }
        }
    }

    /// Deletes `path` and its ancestors while they are empty directories.
    ///
    /// Stops at the first non-empty directory, at the first failure, or when the
    /// walk reaches the root; the root itself is never deleted and paths outside
    /// the root are left alone. Missing directories are skipped. Returns the number
    /// of directories removed.
    pub fn prune_empty_ancestors(&self, path: &Path) -> usize {
        let path = normalize(path);
        let mut removed = 0;
        let mut current = Some(path.as_path());

        while let Some(dir) = current {
            if !self.contains(dir) {
                break;
            }

            if dir.exists() {
                match is_empty_dir(dir) {
                    Ok(true) => {
                        if let Err(e) = fs::remove_dir(dir) {
                            // A concurrent writer may have repopulated it.
                            tracing::error!(
                                "Datastore issue. Failed to empty parent folder {}. Error is: {}",
                                dir.display(),
                                e
                            );
                            break;
                        }
                        removed += 1;
                    }
                    Ok(false) => break,
                    Err(e) => {
                        tracing::error!(
                            "Datastore issue. Failed to inspect parent folder {}. Error is: {}",
                            dir.display(),
                            e
                        );
                        break;
                    }
                }
            }

            current = dir.parent();
        }

        removed
    }

    /// Whether a normalized `path` lies strictly beneath the root.
    fn contains(&self, path: &Path) -> bool {
        path != self.anchor && path.starts_with(&self.anchor)
    }
}

/// Makes `path` absolute against the working directory and folds `.` and `..`
/// without touching the filesystem. Symbolic links are not resolved.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => {
                tracing::warn!(
                    "unable to resolve working directory for {}: {}",
                    path.display(),
                    e
                );
                path.to_path_buf()
            }
        }
    };

    absolute
        .components()
        .fold(PathBuf::new(), |mut acc, component| {
            match component {
                Component::ParentDir => {
                    acc.pop();
                }
                Component::CurDir => {}
                other => acc.push(other.as_os_str()),
            }
            acc
        })
}

fn is_empty_dir(dir: &Path) -> std::io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}
