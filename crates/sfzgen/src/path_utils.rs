use crate::error::Result;
use std::path::{Component, Path, PathBuf};

/// Normalize a path string for use in an SFZ file
///
/// SFZ players accept forward slashes on every platform, so backslashes are
/// always converted.
///
/// # Example
///
/// ```
/// use sfzgen::path_utils::normalize_path;
///
/// assert_eq!(normalize_path("samples\\piano\\C4.wav"), "samples/piano/C4.wav");
/// ```
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Make a path absolute against the working directory and fold away `.`
/// and `..` components without touching the filesystem
fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

fn prefix(path: &Path) -> Option<Component<'_>> {
    path.components()
        .next()
        .filter(|c| matches!(c, Component::Prefix(_)))
}

/// Express `target` relative to the directory `base`
///
/// Works lexically: neither path has to exist. When the two paths sit on
/// different roots (Windows drives), the absolute target is returned.
///
/// # Example
///
/// ```
/// use sfzgen::path_utils::relative_path;
/// use std::path::{Path, PathBuf};
///
/// let rel = relative_path(Path::new("/music/samples/c3.wav"), Path::new("/music/out")).unwrap();
/// assert_eq!(rel, PathBuf::from("../samples/c3.wav"));
/// ```
pub fn relative_path(target: &Path, base: &Path) -> Result<PathBuf> {
    let target = absolute(target)?;
    let base = absolute(base)?;

    if prefix(&target) != prefix(&base) {
        return Ok(target);
    }

    let target_parts: Vec<_> = target.components().collect();
    let base_parts: Vec<_> = base.components().collect();
    let common = target_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base_parts.len() {
        rel.push("..");
    }
    for part in &target_parts[common..] {
        rel.push(part.as_os_str());
    }

    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    Ok(rel)
}

/// The `sample=` value for a file in a layer directory, relative to the
/// directory the SFZ file is written to
pub fn sample_path(source: &Path, filename: &str, output_dir: &Path) -> Result<String> {
    let rel = relative_path(&source.join(filename), output_dir)?;
    Ok(normalize_path(&rel.to_string_lossy()))
}
