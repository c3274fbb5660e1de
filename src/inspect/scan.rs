//! HDF5 file discovery and glob patterns

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;
use walkdir::WalkDir;

use crate::Result;

/// Pattern reported when nothing was found.
pub const DEFAULT_PATTERN: &str = "*.h5";

/// Extensions tried in order; the second only when the first finds nothing.
const EXTENSIONS: [&str; 2] = ["h5", "hdf5"];

/// Discovered files and the pattern describing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// Files sorted by path
    pub files: Vec<PathBuf>,
    /// Descriptive glob relative to the scanned root
    pub pattern: String,
}

/// Recursively find `.h5` files under `root` (falling back to `.hdf5`).
///
/// Unreadable directory entries are skipped. An empty scan is not an error.
#[must_use]
pub fn find_h5_files(root: &Path) -> Scan {
    for extension in EXTENSIONS {
        let files = files_with_extension(root, extension);
        if !files.is_empty() {
            let pattern = infer_pattern(root, &files, extension);
            return Scan { files, pattern };
        }
    }
    Scan {
        files: Vec::new(),
        pattern: DEFAULT_PATTERN.to_string(),
    }
}

fn files_with_extension(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    files
}

/// Describe `files` (all under `root`) with a glob.
///
/// - every file has the same name: one `*` per parent level, then the name
/// - every file sits directly in `root`: `*.{ext}`
/// - otherwise: `**/*.{ext}`
#[must_use]
pub fn infer_pattern(root: &Path, files: &[PathBuf], extension: &str) -> String {
    let relative: Vec<Vec<String>> = files
        .iter()
        .map(|f| relative_components(root, f))
        .collect();
    let Some(first) = relative.first() else {
        return DEFAULT_PATTERN.to_string();
    };

    let same_name = relative.iter().all(|parts| parts.last() == first.last());
    if same_name {
        let mut parts = vec!["*".to_string(); first.len().saturating_sub(1)];
        parts.extend(first.last().cloned());
        return parts.join("/");
    }
    if relative.iter().all(|parts| parts.len() == 1) {
        return format!("*.{extension}");
    }
    format!("**/*.{extension}")
}

/// Path of `file` relative to `root`, `/`-joined.
#[must_use]
pub fn relative_path(root: &Path, file: &Path) -> String {
    relative_components(root, file).join("/")
}

fn relative_components(root: &Path, file: &Path) -> Vec<String> {
    file.strip_prefix(root)
        .unwrap_or(file)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

/// Compile a file pattern matched against `/`-separated relative paths.
///
/// `*`, `?` and `[...]` stay within one path component, `{a,b}` picks an
/// alternative, and `**/` spans zero or more directories.
///
/// # Errors
///
/// Returns [`crate::Error::Glob`] if the pattern is malformed
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    let pattern = pattern.trim_start_matches("./").trim_start_matches('/');
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// Files under `root` whose relative path matches `pattern`, sorted.
///
/// # Errors
///
/// Returns error if the pattern cannot be compiled
pub fn glob_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = compile_pattern(pattern)?;
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| matcher.is_match(relative_path(root, path)))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_flat_directory_pattern() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.h5");
        touch(dir.path(), "a.h5");
        touch(dir.path(), "notes.txt");
        let scan = find_h5_files(dir.path());
        assert_eq!(scan.pattern, "*.h5");
        assert_eq!(scan.files.len(), 2);
        assert!(scan.files[0].ends_with("a.h5"));
    }

    #[test]
    fn test_same_name_pattern() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "run1/x/simulations.h5");
        touch(dir.path(), "run2/y/simulations.h5");
        let scan = find_h5_files(dir.path());
        assert_eq!(scan.pattern, "*/*/simulations.h5");
    }

    #[test]
    fn test_mixed_depth_pattern() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.h5");
        touch(dir.path(), "sub/b.h5");
        assert_eq!(find_h5_files(dir.path()).pattern, "**/*.h5");
    }

    #[test]
    fn test_hdf5_fallback_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let empty = find_h5_files(dir.path());
        assert!(empty.files.is_empty());
        assert_eq!(empty.pattern, DEFAULT_PATTERN);

        touch(dir.path(), "a.hdf5");
        touch(dir.path(), "b.hdf5");
        let scan = find_h5_files(dir.path());
        assert_eq!(scan.files.len(), 2);
        assert_eq!(scan.pattern, "*.hdf5");
    }

    #[test]
    fn test_compile_pattern() {
        let m = compile_pattern("**/*.h5").unwrap();
        assert!(m.is_match("a.h5"));
        assert!(m.is_match("x/y/a.h5"));
        assert!(!m.is_match("a.hdf5"));

        let m = compile_pattern("*/data.h5").unwrap();
        assert!(m.is_match("run1/data.h5"));
        assert!(!m.is_match("data.h5"));
        assert!(!m.is_match("a/b/data.h5"));

        assert!(matches!(compile_pattern("run_[0-9.h5"), Err(Error::Glob(_))));
    }

    #[test]
    fn test_glob_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.h5");
        touch(dir.path(), "sub/b.h5");
        assert_eq!(glob_files(dir.path(), "*.h5").unwrap().len(), 1);
        assert_eq!(glob_files(dir.path(), "**/*.h5").unwrap().len(), 2);
    }

    #[test]
    fn test_glob_files_class_and_alternation() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "run_1.h5");
        touch(dir.path(), "run_x.h5");
        touch(dir.path(), "run_y.h5");
        let digits = glob_files(dir.path(), "run_[0-9].h5").unwrap();
        assert_eq!(digits, vec![dir.path().join("run_1.h5")]);
        let picked = glob_files(dir.path(), "run_{1,x}.h5").unwrap();
        assert_eq!(picked, vec![dir.path().join("run_1.h5"), dir.path().join("run_x.h5")]);
    }
}
