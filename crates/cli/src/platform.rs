//! Locating a directory of platform base-library binaries.

use std::path::{Path, PathBuf};

const SHARED_RUNTIME: &str = "shared/Microsoft.NETCore.App";

const STANDARD_ROOTS: &[&str] = &[
    "/usr/share/dotnet",
    "/usr/lib/dotnet",
    "/usr/local/share/dotnet",
    "/opt/dotnet",
    "C:\\Program Files\\dotnet",
];

/// An explicit directory wins. Otherwise the newest shared runtime under
/// `DOTNET_ROOT`, `~/.dotnet` or a standard install root is used. `None`
/// leaves only the built-in root types.
pub(crate) fn resolve_platform_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }
    let mut roots: Vec<PathBuf> = Vec::new();
    if let Some(root) = std::env::var_os("DOTNET_ROOT") {
        roots.push(PathBuf::from(root));
    }
    if let Some(home) = std::env::var_os("HOME") {
        roots.push(PathBuf::from(home).join(".dotnet"));
    }
    roots.extend(STANDARD_ROOTS.iter().map(PathBuf::from));

    let found = roots.iter().find_map(|root| newest_runtime(root));
    match &found {
        Some(dir) => tracing::debug!(path = %dir.display(), "using platform directory"),
        None => tracing::debug!("no platform directory found; using built-in root types"),
    }
    found
}

/// `<root>/shared/Microsoft.NETCore.App/<highest version>`.
pub(crate) fn newest_runtime(root: &Path) -> Option<PathBuf> {
    let shared = root.join(SHARED_RUNTIME);
    let entries = std::fs::read_dir(&shared).ok()?;
    entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            Some((version_key(&name)?, e.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}

/// Numeric release parts; a prerelease sorts below its release.
fn version_key(name: &str) -> Option<(Vec<u64>, bool)> {
    let (release, prerelease) = match name.split_once('-') {
        Some((release, _)) => (release, true),
        None => (name, false),
    };
    let parts = release
        .split('.')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    Some((parts, !prerelease))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_highest_runtime_version() {
        let root = tempfile::tempdir().unwrap();
        for v in ["6.0.25", "8.0.1", "8.0.10", "8.0.10-rc.1", "notes"] {
            std::fs::create_dir_all(root.path().join(SHARED_RUNTIME).join(v)).unwrap();
        }
        let found = newest_runtime(root.path()).unwrap();
        assert!(found.ends_with("8.0.10"), "{}", found.display());
    }

    #[test]
    fn prerelease_sorts_below_release() {
        assert!(version_key("9.0.0-rc.1").unwrap() < version_key("9.0.0").unwrap());
        assert!(version_key("9.0.0-rc.1").unwrap() > version_key("8.0.10").unwrap());
    }

    #[test]
    fn explicit_directory_wins() {
        let dir = Path::new("/opt/platform");
        assert_eq!(resolve_platform_dir(Some(dir)), Some(dir.to_path_buf()));
        assert!(newest_runtime(Path::new("/definitely/not/here")).is_none());
    }
}
