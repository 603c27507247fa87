use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::color::{Color, DEFAULT_PALETTE};
use crate::render::{PipelineConfig, WidthTracker};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "planmark";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Retries while the surface is not attached
    pub retry_limit: u32,
    pub retry_delay_ms: u64,
    pub page_cache_size: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            retry_limit: 5,
            retry_delay_ms: 100,
            page_cache_size: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    pub resize_threshold: f32,
    pub min_width: f32,
    pub fallback_width: f32,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            resize_threshold: WidthTracker::DEFAULT_THRESHOLD,
            min_width: WidthTracker::DEFAULT_MIN_WIDTH,
            fallback_width: WidthTracker::DEFAULT_FALLBACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub sample_interval_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: crate::capture::DEFAULT_SAMPLE_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// JSON record store used by the command line tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    #[serde(default)]
    pub render: RenderSettings,

    #[serde(default)]
    pub viewport: ViewportSettings,

    #[serde(default)]
    pub capture: CaptureSettings,

    /// Category colors; the built-in palette when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub palette: Vec<Color>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_log_file() -> String {
    "planmark.log".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            log_file: default_log_file(),
            log_level: default_log_level(),
            store_path: None,
            render: RenderSettings::default(),
            viewport: ViewportSettings::default(),
            capture: CaptureSettings::default(),
            palette: Vec::new(),
        }
    }
}

impl Settings {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            retry_limit: self.render.retry_limit,
            retry_delay: Duration::from_millis(self.render.retry_delay_ms),
            cache_size: self.render.page_cache_size,
        }
    }

    pub fn width_tracker(&self) -> WidthTracker {
        WidthTracker::new(
            self.viewport.resize_threshold,
            self.viewport.min_width,
            self.viewport.fallback_width,
        )
    }

    pub fn palette(&self) -> Vec<Color> {
        if self.palette.is_empty() {
            DEFAULT_PALETTE.to_vec()
        } else {
            self.palette.clone()
        }
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load the settings file into the global settings, creating it with
/// defaults when missing
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        let settings = load_settings_from(&path);
        if let Ok(mut global) = SETTINGS.write() {
            *global = settings;
        }
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

/// Read settings from `path`. Unreadable or unparsable files give defaults.
pub fn load_settings_from(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
                Settings::default()
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            Settings::default()
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, cannot save settings");
        return;
    };

    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, &path);
    }
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = match serde_yaml::to_string(settings) {
        Ok(yaml) => format!("{SETTINGS_HEADER}{yaml}"),
        Err(e) => {
            error!("Failed to encode settings: {e}");
            return;
        }
    };

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r##"# ============================================================================
# planmark settings
# ============================================================================
# render.retry_delay_ms    delay between attempts while the page surface is
#                          not attached yet
# viewport.*               container width debouncing (pixels)
# capture.sample_interval_ms
#                          minimum spacing of lasso samples
# palette                  category colors as "#RRGGBB" strings

"##;

// Public API for accessing/modifying settings

pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 1\nrender:\n  retry_limit: 2\n").unwrap();

        let settings = load_settings_from(&path);
        assert_eq!(settings.render.retry_limit, 2);
        assert_eq!(settings.render.retry_delay_ms, 100);
        assert_eq!(settings.viewport, ViewportSettings::default());
        assert_eq!(settings.capture.sample_interval_ms, 10);
        assert_eq!(settings.palette(), DEFAULT_PALETTE.to_vec());
    }

    #[test]
    fn broken_yaml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "render: [not, a, map").unwrap();
        assert_eq!(load_settings_from(&path), Settings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let settings = Settings {
            log_level: "debug".into(),
            palette: vec![Color::rgb(1, 2, 3)],
            ..Settings::default()
        };
        save_settings_to_file(&settings, &path);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# ====="));
        assert!(written.contains("\"#RRGGBB\" strings"));

        let loaded = load_settings_from(&path);
        assert_eq!(loaded, settings);
        assert_eq!(loaded.log_level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn old_version_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 0\n").unwrap();

        assert_eq!(load_settings_from(&path).version, CURRENT_VERSION);
        assert!(fs::read_to_string(&path).unwrap().contains("version: 1"));
    }

    #[test]
    fn pipeline_config_mirrors_render_settings() {
        let settings = Settings::default();
        let config = settings.pipeline_config();
        assert_eq!(config, PipelineConfig::default());
    }
}
