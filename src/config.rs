//! `catcov.toml` loading.
//!
//! Looked up in the working directory first, then in the platform config
//! directory. A missing file or a file that does not parse yields defaults;
//! unknown keys are ignored. Values that would break the viewer (a zero line
//! height) are reported and replaced with their defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::layers::CoverageToggles;
use crate::viewer::ViewerOptions;

pub const CONFIG_FILE_NAME: &str = "catcov.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("viewer.line_height must be at least 1")]
    ZeroLineHeight,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ViewerSection {
    pub line_height: usize,
    pub overscan: usize,
    pub quiescence_ms: u64,
    pub scroll_step: usize,
}

impl Default for ViewerSection {
    fn default() -> Self {
        Self {
            line_height: 1,
            overscan: 3,
            quiescence_ms: 150,
            scroll_step: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CoverageSection {
    pub show_covered: bool,
    pub show_partial: bool,
    pub show_uncovered: bool,
}

impl Default for CoverageSection {
    fn default() -> Self {
        Self {
            show_covered: true,
            show_partial: true,
            show_uncovered: true,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ThemeSection {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub viewer: ViewerSection,
    #[serde(default)]
    pub coverage: CoverageSection,
    #[serde(default)]
    pub theme: ThemeSection,
}

impl ConfigFile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.viewer.line_height == 0 {
            return Err(ConfigError::ZeroLineHeight);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub path: Option<PathBuf>,
    pub raw: Option<String>,
    pub file: ConfigFile,
}

pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("catcov").join(CONFIG_FILE_NAME);
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(discover);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let mut file = match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => file,
        Err(err) => {
            warn!(target: "config", path = %path.display(), %err, "config_parse_failed_using_defaults");
            return Ok(Config {
                path: Some(path),
                raw: Some(content),
                file: ConfigFile::default(),
            });
        }
    };

    if let Err(err) = file.validate() {
        warn!(target: "config", path = %path.display(), %err, "config_value_replaced");
        file.viewer.line_height = ViewerSection::default().line_height;
    }
    info!(target: "config", path = %path.display(), "config_loaded");

    Ok(Config {
        path: Some(path),
        raw: Some(content),
        file,
    })
}

impl Config {
    pub fn toggles(&self) -> CoverageToggles {
        CoverageToggles {
            covered: self.file.coverage.show_covered,
            partial: self.file.coverage.show_partial,
            uncovered: self.file.coverage.show_uncovered,
        }
    }

    pub fn viewer_options(&self) -> ViewerOptions {
        ViewerOptions {
            line_height: self.file.viewer.line_height.max(1),
            overscan: self.file.viewer.overscan,
            quiescence: Duration::from_millis(self.file.viewer.quiescence_ms),
            toggles: self.toggles(),
        }
    }

    pub fn theme_name(&self) -> Option<&str> {
        self.file.theme.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn defaults_when_file_missing() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_catcov__.toml"))).unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
        let options = cfg.viewer_options();
        assert_eq!(options.line_height, 1);
        assert_eq!(options.overscan, 3);
        assert_eq!(options.quiescence, Duration::from_millis(150));
        assert_eq!(options.toggles, CoverageToggles::default());
    }

    #[test]
    fn parses_sections() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[viewer]\noverscan = 8\nquiescence_ms = 90\n\n[coverage]\nshow_partial = false\n\n[theme]\nname = \"InspiredGitHub\"\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.viewer.overscan, 8);
        assert_eq!(cfg.file.viewer.line_height, 1);
        assert_eq!(cfg.file.viewer.scroll_step, 3);
        assert_eq!(cfg.viewer_options().quiescence, Duration::from_millis(90));
        assert!(!cfg.toggles().partial);
        assert!(cfg.toggles().covered);
        assert_eq!(cfg.theme_name(), Some("InspiredGitHub"));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[viewer\noverscan = ").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
        assert!(cfg.raw.is_some());
    }

    #[test]
    fn zero_line_height_is_replaced() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[viewer]\nline_height = 0\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.viewer.line_height, 1);

        let file = ConfigFile {
            viewer: ViewerSection {
                line_height: 0,
                ..ViewerSection::default()
            },
            ..ConfigFile::default()
        };
        assert!(matches!(file.validate(), Err(ConfigError::ZeroLineHeight)));
    }

    #[test]
    fn unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from(Some(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
