//! Filesystem operations on attachment files
//!
//! Every function here takes concrete paths and wraps I/O failures in
//! [`FilesError::Io`] with the operation and path that failed, so callers can log
//! or surface a useful message without re-deriving context.
//!
//! # Atomic writes
//!
//! [`write_atomic`] streams content into a `NamedTempFile` created in the target's
//! own directory (same filesystem, so the final rename is atomic) and then
//! persists it over the target. Temporary files are named with a leading `.`, so
//! [`list_files`] never reports a write that is still in flight. They are created
//! with the mode a plain `fs::File::create` would give, so stored files stay
//! readable by other processes sharing the data directory.

use crate::{FilesError, FilesResult};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

/// Size and modification time of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Last modification time, UTC
    pub modified: DateTime<Utc>,
}

/// A file found by [`list_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    /// Path relative to the listed directory, `/`-separated
    pub relative_name: String,

    /// Absolute (or caller-relative) path of the file
    pub path: PathBuf,

    pub info: FileInfo,
}

/// Creates `dir` and all missing parents.
///
/// Succeeds when the directory already exists, including when another thread or
/// process creates it concurrently.
pub fn ensure_dir(dir: &Path) -> FilesResult<()> {
    fs::create_dir_all(dir).map_err(|e| FilesError::io("create directory", dir, e))
}

/// Writes `content` to `target`, atomically replacing any existing file.
///
/// Missing parent directories are created. Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`FilesError::Io`] if:
/// - `target` has no parent directory
/// - the parent directory or temporary file cannot be created
/// - reading `content` or writing the temporary file fails
/// - the temporary file cannot replace `target`
pub fn write_atomic(target: &Path, content: &mut dyn Read) -> FilesResult<u64> {
    let parent = target.parent().ok_or_else(|| {
        FilesError::io(
            "resolve parent of",
            target,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory"),
        )
    })?;
    ensure_dir(parent)?;

    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Same mode as `fs::File::create`; the process umask still applies.
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut temp = builder
        .tempfile_in(parent)
        .map_err(|e| FilesError::io("create temporary file in", parent, e))?;

    let written =
        io::copy(content, &mut temp).map_err(|e| FilesError::io("write", temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| FilesError::io("sync", temp.path(), e))?;

    temp.persist(target)
        .map_err(|e| FilesError::io("replace", target, e.error))?;

    tracing::debug!("wrote {} bytes to {}", written, target.display());
    Ok(written)
}

/// Sets the modification time of `path`.
pub fn set_modified(path: &Path, modified: DateTime<Utc>) -> FilesResult<()> {
    let time = FileTime::from_system_time(SystemTime::from(modified));
    filetime::set_file_mtime(path, time)
        .map_err(|e| FilesError::io("set modification time of", path, e))
}

/// Reads the size and modification time of `path`.
pub fn file_info(path: &Path) -> FilesResult<FileInfo> {
    let metadata = fs::metadata(path).map_err(|e| FilesError::io("read metadata of", path, e))?;
    let modified = metadata
        .modified()
        .map_err(|e| FilesError::io("read modification time of", path, e))?;

    Ok(FileInfo {
        size_bytes: metadata.len(),
        modified: DateTime::<Utc>::from(modified),
    })
}

/// Recursively lists the regular files beneath `dir` whose file name matches the
/// glob `pattern` (for example `*` or `*.png`).
///
/// - Hidden files and folders (leading `.`) are skipped, including their contents
/// - Files in subfolders are reported with `/`-joined relative names
/// - The result is sorted by relative name
/// - A missing `dir` yields an empty list
///
/// Files removed while the listing runs are silently left out.
pub fn list_files(dir: &Path, pattern: &str) -> FilesResult<Vec<ListedFile>> {
    let matcher = glob::Pattern::new(pattern).map_err(|e| FilesError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })?;

    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut listed = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(dir).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
                if source.kind() == io::ErrorKind::NotFound {
                    continue;
                }
                return Err(FilesError::io("list", &path, source));
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            tracing::warn!("skipping non UTF-8 file name in {}", dir.display());
            continue;
        };
        if !matcher.matches(file_name) {
            continue;
        }

        let Some(relative_name) = relative_name(dir, entry.path()) else {
            tracing::warn!("skipping non UTF-8 path {}", entry.path().display());
            continue;
        };

        let info = match file_info(entry.path()) {
            Ok(info) => info,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        };

        listed.push(ListedFile {
            relative_name,
            path: entry.into_path(),
            info,
        });
    }

    listed.sort_by(|a, b| a.relative_name.cmp(&b.relative_name));
    Ok(listed)
}

/// Moves a single file. Both paths must be on the same filesystem.
pub fn move_file(from: &Path, to: &Path) -> FilesResult<()> {
    fs::rename(from, to).map_err(|e| FilesError::io("move", from, e))
}

/// Copies `from` to `to` atomically and carries over the modification time.
///
/// Returns the number of bytes copied.
pub fn copy_file(from: &Path, to: &Path) -> FilesResult<u64> {
    let info = file_info(from)?;
    let mut source = fs::File::open(from).map_err(|e| FilesError::io("open", from, e))?;
    let copied = write_atomic(to, &mut source)?;
    set_modified(to, info.modified)?;
    Ok(copied)
}

/// Removes a single file.
///
/// Returns `Ok(false)` if the file was already gone.
pub fn remove_file(path: &Path) -> FilesResult<bool> {
    forced_removal_error(path)?;
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FilesError::io("remove", path, e)),
    }
}

/// Removes a directory and everything beneath it.
///
/// Returns `Ok(false)` if the directory was already gone.
pub fn remove_tree(path: &Path) -> FilesResult<bool> {
    forced_removal_error(path)?;
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FilesError::io("remove directory", path, e)),
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("/"))
}

#[cfg(any(test, feature = "test-hooks"))]
static FORCE_REMOVAL_ERROR_FOR_THREADS: std::sync::Mutex<Vec<std::thread::ThreadId>> =
    std::sync::Mutex::new(Vec::new());

/// Makes the next [`remove_file`] or [`remove_tree`] call on the current thread fail.
#[cfg(any(test, feature = "test-hooks"))]
pub fn force_removal_error_for_current_thread() {
    let mut guard = FORCE_REMOVAL_ERROR_FOR_THREADS
        .lock()
        .expect("FORCE_REMOVAL_ERROR_FOR_THREADS mutex poisoned");
    guard.push(std::thread::current().id());
}

#[cfg(any(test, feature = "test-hooks"))]
fn forced_removal_error(path: &Path) -> FilesResult<()> {
    let current_id = std::thread::current().id();
    let mut guard = FORCE_REMOVAL_ERROR_FOR_THREADS
        .lock()
        .expect("FORCE_REMOVAL_ERROR_FOR_THREADS mutex poisoned");

    if let Some(pos) = guard.iter().position(|id| *id == current_id) {
        guard.swap_remove(pos);
        return Err(FilesError::io(
            "remove",
            path,
            io::Error::other("forced removal failure (test hook)"),
        ));
    }
    Ok(())
}

#[cfg(not(any(test, feature = "test-hooks")))]
#[inline]
fn forced_removal_error(_path: &Path) -> FilesResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a/b/c");

        ensure_dir(&dir).expect("first create");
        ensure_dir(&dir).expect("second create");

        assert!(dir.is_dir());
    }

    #[test]
    fn test_write_atomic_creates_parents_and_writes_bytes() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("00000-00099/42/public/map.png");

        let written = write_atomic(&target, &mut &b"png bytes"[..]).unwrap();

        assert_eq!(written, 9);
        assert_eq!(fs::read(&target).unwrap(), b"png bytes");
    }

    #[test]
    fn test_write_atomic_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("doc.txt");
        write(&target, b"a much longer original content");

        write_atomic(&target, &mut &b"short"[..]).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"short");
    }

    #[test]
    fn test_write_atomic_leaves_no_temporary_files() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("doc.txt");

        write_atomic(&target, &mut &b"content"[..]).unwrap();

        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().flatten().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_uses_default_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let target = temp.path().join("doc.txt");
        let plain = temp.path().join("plain.txt");

        write_atomic(&target, &mut &b"content"[..]).unwrap();
        fs::write(&plain, b"content").unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&target), mode(&plain));
    }

    #[test]
    fn test_concurrent_writes_leave_one_complete_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("00000-00099/42/public/map.png");
        let contents: Vec<Vec<u8>> = (1..=8u8).map(|n| vec![n; n as usize * 1024]).collect();

        std::thread::scope(|scope| {
            for content in &contents {
                let target = &target;
                scope.spawn(move || {
                    write_atomic(target, &mut content.as_slice()).unwrap();
                });
            }
        });

        let stored = fs::read(&target).unwrap();
        assert!(contents.iter().any(|content| *content == stored));

        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .flatten()
            .map(|entry| entry.file_name())
            .filter(|name| name != "map.png")
            .collect();
        assert!(leftovers.is_empty(), "temporary files left: {leftovers:?}");
    }

    #[test]
    fn test_concurrent_ensure_dir_all_succeed() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("00000-00099/42/private/maps");

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| ensure_dir(&dir)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results.iter().all(Result::is_ok));
        assert!(dir.is_dir());
    }

    #[test]
    fn test_set_modified_round_trips_through_file_info() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("doc.txt");
        write(&target, b"content");
        let stamp = Utc.with_ymd_and_hms(2020, 5, 17, 8, 30, 0).unwrap();

        set_modified(&target, stamp).unwrap();

        let info = file_info(&target).unwrap();
        assert_eq!(info.modified, stamp);
        assert_eq!(info.size_bytes, 7);
    }

    #[test]
    fn test_list_files_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let listed = list_files(&temp.path().join("missing"), "*").unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn test_list_files_flattens_subfolders_and_sorts() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("zeta.txt"), b"z");
        write(&temp.path().join("alpha.txt"), b"a");
        write(&temp.path().join("img/map.png"), b"png");

        let names: Vec<_> = list_files(temp.path(), "*")
            .unwrap()
            .into_iter()
            .map(|f| f.relative_name)
            .collect();

        assert_eq!(names, vec!["alpha.txt", "img/map.png", "zeta.txt"]);
    }

    #[test]
    fn test_list_files_skips_hidden_entries() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("visible.txt"), b"v");
        write(&temp.path().join(".hidden.txt"), b"h");
        write(&temp.path().join(".cache/inner.txt"), b"i");

        let listed = list_files(temp.path(), "*").unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].relative_name, "visible.txt");
    }

    #[test]
    fn test_list_files_applies_pattern_to_file_names() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("map.png"), b"1");
        write(&temp.path().join("doc.pdf"), b"2");
        write(&temp.path().join("thumbs/small.png"), b"3");

        let names: Vec<_> = list_files(temp.path(), "*.png")
            .unwrap()
            .into_iter()
            .map(|f| f.relative_name)
            .collect();

        assert_eq!(names, vec!["map.png", "thumbs/small.png"]);
    }

    #[test]
    fn test_list_files_rejects_bad_pattern() {
        let temp = TempDir::new().unwrap();
        let result = list_files(temp.path(), "[unclosed");
        assert!(matches!(result, Err(FilesError::InvalidPattern { .. })));
    }

    #[test]
    fn test_copy_file_preserves_modification_time() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/doc.pdf");
        let target = temp.path().join("dst/nested/doc.pdf");
        write(&source, b"pdf");
        let stamp = Utc.with_ymd_and_hms(2019, 1, 2, 3, 4, 5).unwrap();
        set_modified(&source, stamp).unwrap();

        let copied = copy_file(&source, &target).unwrap();

        assert_eq!(copied, 3);
        assert_eq!(fs::read(&target).unwrap(), b"pdf");
        assert_eq!(file_info(&target).unwrap().modified, stamp);
    }

    #[test]
    fn test_move_file() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("public/doc.pdf");
        let to = temp.path().join("private/doc.pdf");
        write(&from, b"pdf");
        ensure_dir(to.parent().unwrap()).unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"pdf");
    }

    #[test]
    fn test_remove_file_reports_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.pdf");
        write(&path, b"pdf");

        assert!(remove_file(&path).unwrap());
        assert!(!remove_file(&path).unwrap());
    }

    #[test]
    fn test_remove_tree() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("00000-00099/42");
        write(&dir.join("public/a.txt"), b"a");

        assert!(remove_tree(&dir).unwrap());
        assert!(!dir.exists());
        assert!(!remove_tree(&dir).unwrap());
    }

    #[test]
    fn test_forced_removal_error_applies_once() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.pdf");
        write(&path, b"pdf");

        force_removal_error_for_current_thread();
        assert!(remove_file(&path).is_err());
        assert!(path.exists());

        assert!(remove_file(&path).unwrap());
    }

    #[test]
    fn test_not_found_detection() {
        let temp = TempDir::new().unwrap();
        let err = file_info(&temp.path().join("missing")).unwrap_err();
        assert!(err.is_not_found());
    }
}
