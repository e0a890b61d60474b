//! Host build tools: flutter, node, hvigor and ohpm
//!
//! Located once per command. Lookups prefer the DevEco Studio installation
//! (`DEVECO_HOME` or `[sdk] deveco_home`) and fall back to `PATH`.

use std::path::{Path, PathBuf};

use fohos_core::prelude::*;
use fohos_daemon::process::is_executable;
use fohos_daemon::{DEVECO_HOME_ENV, NODE_HOME_ENV};

use crate::config::Settings;

#[cfg(windows)]
const EXE_SUFFIX: &str = ".exe";
#[cfg(not(windows))]
const EXE_SUFFIX: &str = "";

#[cfg(windows)]
const OHPM_BINARY: &str = "ohpm.bat";
#[cfg(not(windows))]
const OHPM_BINARY: &str = "ohpm";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTools {
    pub flutter: PathBuf,
    pub node: PathBuf,
    /// `hvigorw.js`, run through `node`
    pub hvigorw: PathBuf,
    pub ohpm: PathBuf,
}

impl BuildTools {
    /// Locate every tool, failing on the first one missing
    pub fn locate(settings: &Settings, ohos_dir: &Path) -> Result<Self> {
        let deveco = deveco_home(settings);

        let flutter = settings
            .build
            .flutter
            .clone()
            .filter(|p| p.exists())
            .or_else(|| which::which("flutter").ok())
            .ok_or_else(|| {
                Error::tool_not_found(
                    "flutter",
                    "add the OpenHarmony-enabled Flutter SDK to PATH or set [build] flutter",
                )
            })?;

        let node = std::env::var_os(NODE_HOME_ENV)
            .map(|home| PathBuf::from(home).join("bin").join(format!("node{EXE_SUFFIX}")))
            .filter(|p| is_executable(p))
            .or_else(|| {
                deveco.as_ref().map(|home| {
                    home.join("tools")
                        .join("node")
                        .join("bin")
                        .join(format!("node{EXE_SUFFIX}"))
                })
            })
            .filter(|p| is_executable(p))
            .or_else(|| which::which("node").ok())
            .ok_or_else(|| {
                Error::tool_not_found("node", format!("set {} or {}", NODE_HOME_ENV, DEVECO_HOME_ENV))
            })?;

        let hvigorw = deveco
            .as_ref()
            .map(|home| home.join("tools").join("hvigor").join("bin").join("hvigorw.js"))
            .filter(|p| p.is_file())
            .or_else(|| {
                let local = ohos_dir.join("hvigor").join("hvigorw.js");
                local.is_file().then_some(local)
            })
            .ok_or_else(|| {
                Error::tool_not_found(
                    "hvigorw.js",
                    format!("set {} to the DevEco Studio installation", DEVECO_HOME_ENV),
                )
            })?;

        let ohpm = deveco
            .as_ref()
            .map(|home| home.join("tools").join("ohpm").join("bin").join(OHPM_BINARY))
            .filter(|p| is_executable(p))
            .or_else(|| which::which("ohpm").ok())
            .ok_or_else(|| {
                Error::tool_not_found(
                    "ohpm",
                    format!("set {} or add ohpm to PATH", DEVECO_HOME_ENV),
                )
            })?;

        debug!(
            "Build tools: flutter={} node={} hvigorw={} ohpm={}",
            flutter.display(),
            node.display(),
            hvigorw.display(),
            ohpm.display()
        );
        Ok(Self {
            flutter,
            node,
            hvigorw,
            ohpm,
        })
    }

    /// Flutter SDK root, two levels above `bin/flutter`
    pub fn flutter_root(&self) -> Option<PathBuf> {
        let flutter = dunce::canonicalize(&self.flutter).unwrap_or_else(|_| self.flutter.clone());
        flutter.parent()?.parent().map(Path::to_path_buf)
    }

    /// Directory holding `node`, written to `local.properties` as `nodejs.dir`
    pub fn node_home(&self) -> Option<PathBuf> {
        let bin = self.node.parent()?;
        if bin.file_name().is_some_and(|n| n == "bin") {
            bin.parent().map(Path::to_path_buf)
        } else {
            Some(bin.to_path_buf())
        }
    }
}

fn deveco_home(settings: &Settings) -> Option<PathBuf> {
    std::env::var_os(DEVECO_HOME_ENV)
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .or_else(|| settings.sdk.deveco_home.clone().filter(|p| p.is_dir()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    fn executable(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    #[test]
    #[serial]
    #[cfg(unix)]
    fn test_locate_from_deveco_home() {
        let dir = tempdir().unwrap();
        let deveco = dir.path().join("deveco");
        executable(&deveco.join("tools/node/bin/node"));
        executable(&deveco.join("tools/ohpm/bin/ohpm"));
        executable(&deveco.join("tools/hvigor/bin/hvigorw.js"));
        let flutter = dir.path().join("flutter/bin/flutter");
        executable(&flutter);

        std::env::remove_var(NODE_HOME_ENV);
        std::env::set_var(DEVECO_HOME_ENV, &deveco);
        let mut settings = Settings::default();
        settings.build.flutter = Some(flutter.clone());

        let tools = BuildTools::locate(&settings, dir.path());
        std::env::remove_var(DEVECO_HOME_ENV);
        let tools = tools.unwrap();

        assert_eq!(tools.node, deveco.join("tools/node/bin/node"));
        assert_eq!(tools.ohpm, deveco.join("tools/ohpm/bin/ohpm"));
        assert_eq!(tools.hvigorw, deveco.join("tools/hvigor/bin/hvigorw.js"));
        assert_eq!(tools.node_home(), Some(deveco.join("tools/node")));
        assert_eq!(
            tools.flutter_root(),
            Some(dunce::canonicalize(dir.path().join("flutter")).unwrap())
        );
    }

    #[test]
    #[serial]
    #[cfg(unix)]
    fn test_missing_hvigor_names_variable() {
        let dir = tempdir().unwrap();
        let flutter = dir.path().join("flutter/bin/flutter");
        executable(&flutter);
        let node_home = dir.path().join("node");
        executable(&node_home.join("bin/node"));

        std::env::remove_var(DEVECO_HOME_ENV);
        std::env::set_var(NODE_HOME_ENV, &node_home);
        let mut settings = Settings::default();
        settings.build.flutter = Some(flutter);

        let result = BuildTools::locate(&settings, dir.path());
        std::env::remove_var(NODE_HOME_ENV);

        let err = result.unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { ref tool, .. } if tool == "hvigorw.js"));
        assert!(err.to_string().contains(DEVECO_HOME_ENV));
    }
}
