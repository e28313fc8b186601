use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::geometry::Insets;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "stickynote";
const APP_CONFIG_FILE: &str = "config.json";

const DEFAULT_DENSITY: f64 = 2.0;
const DEFAULT_NOTE_FONT: &str = "Permanent Marker";
const DEFAULT_CAPTION_FONT: &str = "Sans";
const DEFAULT_TOUCH_SLOP_DP: f64 = 8.0;
const DEFAULT_WIDGET_SIZE_DP: f64 = 180.0;
const MAX_WIDGET_SIZE_DP: f64 = 600.0;
const DEFAULT_CARD_TILT_DEGREES: f64 = -6.0;

/// Settings from `config.json`. Every field may be omitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pixels per density-independent unit.
    pub density: f64,
    pub note_font_family: String,
    pub caption_font_family: String,
    pub touch_slop_dp: f64,
    pub default_widget_size_dp: f64,
    pub max_widget_size_dp: f64,
    pub card_tilt_degrees: f64,
    pub note_layer_path: Option<PathBuf>,
    pub clip_layer_path: Option<PathBuf>,
    pub note_art_path: Option<PathBuf>,
    pub frame_insets_dp: Option<Insets>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            density: DEFAULT_DENSITY,
            note_font_family: DEFAULT_NOTE_FONT.to_string(),
            caption_font_family: DEFAULT_CAPTION_FONT.to_string(),
            touch_slop_dp: DEFAULT_TOUCH_SLOP_DP,
            default_widget_size_dp: DEFAULT_WIDGET_SIZE_DP,
            max_widget_size_dp: MAX_WIDGET_SIZE_DP,
            card_tilt_degrees: DEFAULT_CARD_TILT_DEGREES,
            note_layer_path: None,
            clip_layer_path: None,
            note_art_path: None,
            frame_insets_dp: None,
        }
    }
}

impl AppConfig {
    pub fn dp(&self, value: f64) -> f64 {
        value * self.density
    }

    pub fn touch_slop_px(&self) -> f64 {
        self.dp(self.touch_slop_dp)
    }

    /// Replaces non-positive or non-finite numbers with defaults.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let positive = |value: f64, fallback: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        self.density = positive(self.density, defaults.density);
        self.touch_slop_dp = positive(self.touch_slop_dp, defaults.touch_slop_dp);
        self.default_widget_size_dp =
            positive(self.default_widget_size_dp, defaults.default_widget_size_dp);
        self.max_widget_size_dp = positive(self.max_widget_size_dp, defaults.max_widget_size_dp);
        if !self.card_tilt_degrees.is_finite() {
            self.card_tilt_degrees = defaults.card_tilt_degrees;
        }
        self
    }

    /// Directory holding the persisted note store.
    pub fn data_dir() -> Result<PathBuf, ConfigPathError> {
        let (xdg_data_home, home) = data_env_dirs();
        data_dir_with(xdg_data_home.as_deref(), home.as_deref())
    }
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return AppConfig::default(),
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str::<AppConfig>(&contents)
            .map(AppConfig::sanitized)
            .unwrap_or_else(|err| {
                tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
                AppConfig::default()
            }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

fn data_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = xdg_root(xdg_config_home, home, ".config")?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn data_dir_with(
    xdg_data_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = xdg_root(xdg_data_home, home, ".local/share")?;
    path.push(APP_DIR);
    Ok(path)
}

fn xdg_root(
    xdg_home: Option<&Path>,
    home: Option<&Path>,
    home_fallback: &str,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(home_fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_config_path_prefers_xdg_config_home() {
        let path = app_config_path(
            "stickynote",
            "config.json",
            Some(Path::new("/tmp/config-root")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(
            path,
            PathBuf::from("/tmp/config-root/stickynote/config.json")
        );
    }

    #[test]
    fn app_config_path_falls_back_to_home_dot_config() {
        let path = app_config_path(
            "stickynote",
            "config.json",
            None,
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(
            path,
            PathBuf::from("/tmp/home/.config/stickynote/config.json")
        );
    }

    #[test]
    fn app_config_path_errors_when_home_missing_and_xdg_unset() {
        let error = app_config_path("stickynote", "config.json", None, None).unwrap_err();
        assert_eq!(error, ConfigPathError::MissingHomeDirectory);
    }

    #[test]
    fn data_dir_uses_xdg_data_home_or_local_share() {
        assert_eq!(
            data_dir_with(Some(Path::new("/tmp/data")), None).expect("xdg"),
            PathBuf::from("/tmp/data/stickynote")
        );
        assert_eq!(
            data_dir_with(None, Some(Path::new("/tmp/home"))).expect("home"),
            PathBuf::from("/tmp/home/.local/share/stickynote")
        );
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let raw = r#"{
            "density": 3.0,
            "frame_insets_dp": { "left": 1, "top": 2, "right": 3, "bottom": 4 }
        }"#;
        let config: AppConfig = serde_json::from_str(raw).expect("parse");
        assert_eq!(config.density, 3.0);
        assert_eq!(config.note_font_family, "Permanent Marker");
        assert_eq!(config.frame_insets_dp, Some(Insets::new(1.0, 2.0, 3.0, 4.0)));
    }

    #[test]
    fn invalid_numbers_are_replaced_by_defaults() {
        let config = AppConfig {
            density: 0.0,
            touch_slop_dp: -1.0,
            card_tilt_degrees: f64::NAN,
            ..AppConfig::default()
        }
        .sanitized();
        assert_eq!(config.density, 2.0);
        assert_eq!(config.touch_slop_dp, 8.0);
        assert_eq!(config.card_tilt_degrees, -6.0);
    }

    #[test]
    fn unreadable_config_file_yields_defaults() {
        let root = std::env::temp_dir().join(format!("stickynote-config-{}", std::process::id()));
        let dir = root.join(APP_DIR);
        std::fs::create_dir_all(&dir).expect("create dir");
        std::fs::write(dir.join(APP_CONFIG_FILE), "{ not json").expect("write");

        let config = load_app_config_with(Some(&root), None);
        assert_eq!(config, AppConfig::default());

        let _ = std::fs::remove_dir_all(root);
    }
}
