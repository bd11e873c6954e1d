//! Sidecar executable resolution

use crate::config::{SidecarConfig, SidecarMode};
use crate::error::{Error, Result};
use std::env::consts::{ARCH, EXE_SUFFIX, OS};
use std::path::{Path, PathBuf};
use tracing::debug;

/// What `start` should do once the mode is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Spawn the bundled binary at this path
    Embedded(PathBuf),
    /// An externally-run server is expected; nothing is spawned
    External,
}

/// Searches the known install locations for the sidecar binary
#[derive(Debug, Clone)]
pub struct BinaryLocator {
    mode: SidecarMode,
    binary_name: String,
    binary_path: Option<PathBuf>,
    resource_dirs: Vec<PathBuf>,
    exe_dir: Option<PathBuf>,
}

impl BinaryLocator {
    pub fn from_config(config: &SidecarConfig) -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            mode: config.mode,
            binary_name: config.binary_name.clone(),
            binary_path: config.binary_path.clone(),
            resource_dirs: config.resource_dirs.clone(),
            exe_dir,
        }
    }

    /// Override the directory default roots are derived from
    pub fn with_exe_dir(mut self, exe_dir: Option<PathBuf>) -> Self {
        self.exe_dir = exe_dir;
        self
    }

    /// Executable file name with the platform suffix
    pub fn file_name(&self) -> String {
        format!("{}{}", self.binary_name, EXE_SUFFIX)
    }

    /// `<os>-<arch>` directory used for per-platform bundles
    pub fn platform_dir() -> String {
        format!("{}-{}", OS, ARCH)
    }

    /// Resource roots shipped next to the application executable
    fn bundle_roots(&self) -> Vec<PathBuf> {
        let Some(exe_dir) = &self.exe_dir else {
            return Vec::new();
        };
        vec![
            exe_dir.join("resources"),
            // macOS: Contents/MacOS/<exe> next to Contents/Resources
            exe_dir.join("..").join("Resources"),
        ]
    }

    fn search_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.resource_dirs.clone();
        roots.extend(self.bundle_roots());
        if let Some(exe_dir) = &self.exe_dir {
            roots.push(exe_dir.clone());
        }
        roots
    }

    /// Every path checked for the binary, in search order
    pub fn candidates(&self) -> Vec<PathBuf> {
        let file_name = self.file_name();
        let platform = Self::platform_dir();
        self.search_roots()
            .into_iter()
            .flat_map(|root| {
                [
                    root.join("sidecar").join(&platform).join(&file_name),
                    root.join("sidecar").join(&file_name),
                    root.join(&file_name),
                ]
            })
            .collect()
    }

    /// Resolve `auto` to packaged or development
    pub fn resolve_mode(&self) -> SidecarMode {
        match self.mode {
            SidecarMode::Auto => {
                let packaged = self.binary_path.is_some()
                    || !self.resource_dirs.is_empty()
                    || self.bundle_roots().iter().any(|root| root.is_dir());
                if packaged {
                    SidecarMode::Packaged
                } else {
                    SidecarMode::Development
                }
            }
            mode => mode,
        }
    }

    /// Find the launch target, failing with [`Error::BinaryNotFound`] when a
    /// packaged binary is expected but absent everywhere.
    pub fn locate(&self) -> Result<LaunchTarget> {
        if self.resolve_mode() == SidecarMode::Development {
            return Ok(LaunchTarget::External);
        }

        let searched = match &self.binary_path {
            Some(path) => vec![path.clone()],
            None => self.candidates(),
        };

        for candidate in &searched {
            debug!("Checking sidecar candidate {:?}", candidate);
            if candidate.is_file() {
                return Ok(LaunchTarget::Embedded(candidate.clone()));
            }
        }

        Err(Error::BinaryNotFound {
            binary: self.file_name(),
            searched,
        })
    }
}

/// Make sure the binary carries execute permission.
///
/// Archive extraction on some platforms drops the mode bits.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let spawn_failure = |source| Error::SpawnFailure {
        path: path.to_path_buf(),
        source,
    };

    let mut permissions = std::fs::metadata(path)
        .map_err(spawn_failure)?
        .permissions();
    let mode = permissions.mode();
    if mode & 0o111 == 0o111 {
        return Ok(());
    }

    debug!("Setting execute permission on {:?}", path);
    permissions.set_mode(mode | 0o755);
    std::fs::set_permissions(path, permissions).map_err(spawn_failure)
}

#[cfg(not(unix))]
pub fn ensure_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn locator(mode: SidecarMode, resource_dirs: Vec<PathBuf>) -> BinaryLocator {
        let config = SidecarConfig {
            mode,
            binary_name: "analysis".to_string(),
            resource_dirs,
            ..Default::default()
        };
        BinaryLocator::from_config(&config).with_exe_dir(None)
    }

    #[test]
    fn test_candidates_prefer_platform_dir() {
        let tmp = TempDir::new().unwrap();
        let loc = locator(SidecarMode::Packaged, vec![tmp.path().to_path_buf()]);
        let candidates = loc.candidates();

        assert_eq!(candidates.len(), 3);
        assert_eq!(
            candidates[0],
            tmp.path()
                .join("sidecar")
                .join(BinaryLocator::platform_dir())
                .join(loc.file_name())
        );
        assert_eq!(candidates[2], tmp.path().join(loc.file_name()));
    }

    #[test]
    fn test_locate_finds_binary_in_sidecar_dir() {
        let tmp = TempDir::new().unwrap();
        let loc = locator(SidecarMode::Packaged, vec![tmp.path().to_path_buf()]);
        let dir = tmp.path().join("sidecar");
        std::fs::create_dir_all(&dir).unwrap();
        let binary = dir.join(loc.file_name());
        std::fs::write(&binary, b"").unwrap();

        assert_eq!(loc.locate().unwrap(), LaunchTarget::Embedded(binary));
    }

    #[test]
    fn test_missing_binary_lists_searched_paths() {
        let tmp = TempDir::new().unwrap();
        let loc = locator(SidecarMode::Packaged, vec![tmp.path().to_path_buf()]);

        match loc.locate() {
            Err(Error::BinaryNotFound { binary, searched }) => {
                assert_eq!(binary, loc.file_name());
                assert_eq!(searched, loc.candidates());
            }
            other => panic!("expected BinaryNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_auto_mode_resolution() {
        let tmp = TempDir::new().unwrap();

        // Nothing bundled: development
        let loc = locator(SidecarMode::Auto, Vec::new());
        assert_eq!(loc.resolve_mode(), SidecarMode::Development);
        assert_eq!(loc.locate().unwrap(), LaunchTarget::External);

        // A resources directory beside the executable: packaged
        std::fs::create_dir_all(tmp.path().join("resources")).unwrap();
        let loc = locator(SidecarMode::Auto, Vec::new())
            .with_exe_dir(Some(tmp.path().to_path_buf()));
        assert_eq!(loc.resolve_mode(), SidecarMode::Packaged);
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_executable_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bin");
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        ensure_executable(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
