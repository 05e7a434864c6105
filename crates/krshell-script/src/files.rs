// File helpers: script cache naming, asset extraction and permissions
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Interpreter line written at the top of cached scripts
pub const SCRIPT_HEADER: &str = "#!/system/bin/sh\n\n";

/// Cache location of an inline script, relative to the data directory
pub fn cache_relative_path(script: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(script.as_bytes());
    PathBuf::from("kr-script")
        .join("cache")
        .join(format!("{}.sh", hex::encode(hasher.finalize())))
}

/// Cached file body: header plus the script with `\n` line endings
pub fn cached_script_body(script: &str) -> String {
    format!("{}{}", SCRIPT_HEADER, normalize_newlines(script))
}

pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Write `content` to `path`, creating parents, and mark it executable
pub fn write_executable(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    make_executable(path)
}

/// Copy a directory tree, keeping files that already exist in `to`
pub fn copy_dir_missing(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).with_context(|| format!("Failed to create {}", to.display()))?;

    for entry in fs::read_dir(from).with_context(|| format!("Failed to read {}", from.display()))? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_missing(&entry.path(), &target)?;
        } else if !target.exists() {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
            make_executable(&target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_cache_path_is_content_addressed() {
        let first = cache_relative_path("echo hi");
        assert_eq!(first, cache_relative_path("echo hi"));
        assert_ne!(first, cache_relative_path("echo ho"));

        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".sh"));
        assert_eq!(name.len(), 64 + 3);
        assert!(first.starts_with("kr-script/cache"));
    }

    #[test]
    fn test_cached_script_body() {
        assert_eq!(
            cached_script_body("echo a\r\necho b\recho c"),
            "#!/system/bin/sh\n\necho a\necho b\necho c"
        );
    }

    #[test]
    fn test_copy_dir_missing() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("from");
        fs::create_dir_all(from.join("nested")).unwrap();
        fs::write(from.join("a.sh"), "new").unwrap();
        fs::write(from.join("nested/b.sh"), "b").unwrap();

        let to = temp_dir.path().join("to");
        fs::create_dir_all(&to).unwrap();
        fs::write(to.join("a.sh"), "kept").unwrap();

        copy_dir_missing(&from, &to).unwrap();
        assert_eq!(fs::read_to_string(to.join("a.sh")).unwrap(), "kept");
        assert_eq!(fs::read_to_string(to.join("nested/b.sh")).unwrap(), "b");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_executable_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("deep/run.sh");
        write_executable(&path, b"echo").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
