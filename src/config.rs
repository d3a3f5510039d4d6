use std::{env, fs, path::PathBuf};

use directories::BaseDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Unix socket the host runtime listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    /// Settings page opened in the host webview on a show-configuration
    /// request. Injected here rather than baked into the bridge so it can
    /// point at whatever network the configuration server actually lives on.
    #[serde(default = "default_configuration_url")]
    pub configuration_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            configuration_url: default_configuration_url(),
        }
    }
}

pub fn load() -> Result<Config> {
    let path = config_path()?;
    let mut figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed("LOCBRIDGE_"));

    if path.exists() {
        figment = figment.merge(Toml::file(&path));
    }

    figment.extract().map_err(|_| AppError::ConfigLoad)
}

pub fn save(config: &Config) -> Result<()> {
    let path = config_path()?;
    let Some(parent) = path.parent() else {
        return Err(AppError::HomeDirUnavailable);
    };

    fs::create_dir_all(parent)
        .map_err(|_| AppError::CreateConfigDir(parent.display().to_string()))?;

    let toml_text = toml::to_string_pretty(config).map_err(|_| AppError::ConfigSerialize)?;
    fs::write(&path, toml_text).map_err(|_| AppError::WriteConfig(path.display().to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

pub fn config_path() -> Result<PathBuf> {
    let Some(base_dirs) = BaseDirs::new() else {
        return Err(AppError::HomeDirUnavailable);
    };
    Ok(base_dirs.config_dir().join("locbridge").join("config.toml"))
}

fn default_socket_path() -> String {
    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir)
            .join("locbridge-host.sock")
            .to_string_lossy()
            .into_owned();
    }
    "/tmp/locbridge-host.sock".to_string()
}

fn default_configuration_url() -> String {
    "http://127.0.0.1:8000/configuration.html".to_string()
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults_are_usable_without_a_config_file() {
        let config = Config::default();
        assert!(config.socket_path.ends_with("locbridge-host.sock"));
        assert_eq!(
            config.configuration_url,
            "http://127.0.0.1:8000/configuration.html"
        );
    }
}
