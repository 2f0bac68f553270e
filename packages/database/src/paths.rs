#![allow(clippy::module_name_repetitions)]
//! Directory helpers for store files and output artifacts.

use std::path::Path;

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Ensures the parent directory of `path` exists.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_parent_directories() {
        let dir = std::env::temp_dir().join(format!(
            "crime_pipeline_paths_{}",
            std::process::id()
        ));
        let file = dir.join("generated").join("nested").join("out.csv");
        ensure_parent(&file).unwrap();
        assert!(file.parent().unwrap().is_dir());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn bare_file_names_need_no_parent() {
        assert!(ensure_parent(Path::new("out.csv")).is_ok());
    }
}
