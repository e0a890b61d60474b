//! Settings parser for .fohos/config.toml

use super::types::Settings;
use fohos_core::prelude::*;
use std::path::Path;

const CONFIG_FILENAME: &str = "config.toml";
pub const FOHOS_DIR: &str = ".fohos";

/// Load settings from `.fohos/config.toml`, falling back to defaults
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(FOHOS_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create `.fohos/config.toml` with commented defaults if it does not exist
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let fohos_dir = project_path.join(FOHOS_DIR);

    if !fohos_dir.exists() {
        std::fs::create_dir_all(&fohos_dir)
            .map_err(|e| Error::config(format!("Failed to create .fohos dir: {}", e)))?;
    }

    let config_path = fohos_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        let default_content = r#"# Flutter OpenHarmony tooling configuration

[sdk]
# path = "/path/to/ohos-sdk"      # used when OHOS_SDK_HOME / HOS_SDK_HOME are unset
# deveco_home = "/path/to/deveco"  # used when DEVECO_HOME is unset

[build]
mode = "debug"
flavor = "default"
target_file = "lib/main.dart"

[device]
discovery_timeout_secs = 30
vm_service_timeout_secs = 60

[logs]
past_tag = "Flutter"
"#;
        std::fs::write(&config_path, default_content)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config at {:?}", config_path);
    }

    Ok(())
}

/// Save settings, replacing the file atomically
pub fn save_settings(project_path: &Path, settings: &Settings) -> Result<()> {
    let fohos_dir = project_path.join(FOHOS_DIR);

    if !fohos_dir.exists() {
        std::fs::create_dir_all(&fohos_dir)
            .map_err(|e| Error::config(format!("Failed to create .fohos dir: {}", e)))?;
    }

    let config_path = fohos_dir.join(CONFIG_FILENAME);
    let temp_path = fohos_dir.join(".config.toml.tmp");

    let content = toml::to_string_pretty(settings)
        .map_err(|e| Error::config(format!("Failed to serialize settings: {}", e)))?;
    let full_content = format!("# Flutter OpenHarmony tooling configuration\n\n{}", content);

    std::fs::write(&temp_path, &full_content)
        .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;
    std::fs::rename(&temp_path, &config_path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    info!("Saved settings to {:?}", config_path);
    Ok(())
}
