//! Tool settings

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default log filter covering every crate in the workspace
pub const DEFAULT_LOG_FILTER: &str = "wb_emit=info,wb_ffi=info,wb_emitter=info,wb_sim=info";

/// Where the controller library should be loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySource {
    /// An explicit library file
    Path(PathBuf),
    /// A simulator installation directory
    Home(PathBuf),
    /// The installation named by `WEBOTS_HOME`
    Environment,
}

/// Settings read from `settings.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Controller library file, takes precedence over `webots_home`
    pub library_path: Option<PathBuf>,
    /// Simulator installation directory
    pub webots_home: Option<PathBuf>,
    /// Name of the emitter device to send through
    pub device: String,
    /// Simulation step run after sending, in milliseconds
    pub step_ms: u32,
    /// Log filter used when `RUST_LOG` is not set
    pub log_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            library_path: None,
            webots_home: None,
            device: "emitter".to_string(),
            step_ms: 32,
            log_filter: None,
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wb-emit").join("settings.json"))
    }

    /// Load settings from `path`, or from the default location
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse a settings file
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Parse settings from JSON text
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Where to load the controller library from
    pub fn library_source(&self) -> LibrarySource {
        if let Some(path) = &self.library_path {
            LibrarySource::Path(path.clone())
        } else if let Some(home) = &self.webots_home {
            LibrarySource::Home(home.clone())
        } else {
            LibrarySource::Environment
        }
    }

    /// Log filter to use when `RUST_LOG` is not set
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.device, "emitter");
        assert_eq!(settings.step_ms, 32);
        assert_eq!(settings.library_source(), LibrarySource::Environment);
        assert_eq!(settings.log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings = Settings::from_json(r#"{ "device": "radio" }"#).unwrap();
        assert_eq!(settings.device, "radio");
        assert_eq!(settings.step_ms, 32);
        assert!(settings.library_path.is_none());
    }

    #[test]
    fn test_library_path_wins_over_home() {
        let settings = Settings::from_json(
            r#"{ "library_path": "/tmp/libController.so", "webots_home": "/opt/webots" }"#,
        )
        .unwrap();
        assert_eq!(
            settings.library_source(),
            LibrarySource::Path(PathBuf::from("/tmp/libController.so"))
        );
    }

    #[test]
    fn test_home_source() {
        let settings = Settings::from_json(r#"{ "webots_home": "/opt/webots" }"#).unwrap();
        assert_eq!(
            settings.library_source(),
            LibrarySource::Home(PathBuf::from("/opt/webots"))
        );
    }

    #[test]
    fn test_custom_log_filter() {
        let settings = Settings::from_json(r#"{ "log_filter": "debug" }"#).unwrap();
        assert_eq!(settings.log_filter(), "debug");
    }

    #[test]
    fn test_invalid_json() {
        assert!(Settings::from_json("{ not json").is_err());
        assert!(Settings::from_json(r#"{ "step_ms": "fast" }"#).is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/settings.json"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/settings.json"));
    }

    #[test]
    fn test_json_roundtrip_keeps_fields() {
        let settings = Settings {
            device: "em2".to_string(),
            step_ms: 16,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
    }
}
