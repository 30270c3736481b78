use std::path::PathBuf;

use crate::components::tools::{ERASER_SIZE_RANGE, PENCIL_OPACITY_RANGE, PENCIL_SIZE_RANGE};
use crate::styles::ColorStyle;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Which generator produces stencils.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Gemini,
    /// Local edge-detection sketch, no network.
    Sketch,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Gemini => "gemini",
            Backend::Sketch => "sketch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Some(Backend::Gemini),
            "sketch" | "offline" => Some(Backend::Sketch),
            _ => None,
        }
    }
}

/// Application settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    pub backend: Backend,
    /// Generation model name
    pub model: String,
    /// Environment variable holding the API key. The key itself is never saved.
    pub api_key_env: String,
    /// Base URL of the generation service
    pub endpoint: String,
    /// Style selected at startup
    pub default_style: ColorStyle,
    pub pencil_size: f32,
    pub pencil_opacity: f32,
    pub eraser_size: f32,
    /// Overlay opacity in percent
    pub overlay_opacity: f32,
    /// Recolor into lines on a transparent background
    pub transparent_background: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Gemini,
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            default_style: ColorStyle::Negras,
            pencil_size: 3.0,
            pencil_opacity: 100.0,
            eraser_size: 12.0,
            overlay_opacity: 50.0,
            transparent_background: false,
        }
    }
}

/// Per-user configuration directory.
/// On Linux:   ~/.config/easystencil  (XDG_CONFIG_HOME respected)
/// On Windows: %APPDATA%\EasyStencil
/// On macOS:   ~/Library/Application Support/EasyStencil
/// Fallback:   same directory as the executable.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                PathBuf::from(home).join(".config")
            })
            .join("easystencil");
        let _ = std::fs::create_dir_all(&dir);
        return Some(dir);
    }
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| {
                std::env::current_exe()
                    .ok()
                    .and_then(|p| p.parent().map(|d| d.to_string_lossy().into_owned()))
                    .unwrap_or_default()
            });
        let dir = PathBuf::from(appdata).join("EasyStencil");
        let _ = std::fs::create_dir_all(&dir);
        return Some(dir);
    }
    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
        let dir = PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("EasyStencil");
        let _ = std::fs::create_dir_all(&dir);
        return Some(dir);
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.to_path_buf()))
    }
}

fn clamp_to(v: f32, range: &std::ops::RangeInclusive<f32>) -> f32 {
    v.clamp(*range.start(), *range.end())
}

impl AppSettings {
    pub fn settings_path() -> Option<PathBuf> {
        config_dir().map(|d| d.join("easystencil_settings.cfg"))
    }

    /// Serialize to the `key=value` config format.
    pub fn to_config(&self) -> String {
        format!(
            "backend={}\n\
             model={}\n\
             api_key_env={}\n\
             endpoint={}\n\
             default_style={}\n\
             pencil_size={}\n\
             pencil_opacity={}\n\
             eraser_size={}\n\
             overlay_opacity={}\n\
             transparent_background={}\n",
            self.backend.as_str(),
            self.model,
            self.api_key_env,
            self.endpoint,
            self.default_style.id(),
            self.pencil_size,
            self.pencil_opacity,
            self.eraser_size,
            self.overlay_opacity,
            self.transparent_background,
        )
    }

    /// Parse the config format. Unknown keys and bad values fall back to defaults.
    pub fn from_config(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "backend" => {
                    s.backend = Backend::parse(val).unwrap_or_default();
                }
                "model" if !val.is_empty() => {
                    s.model = val.to_string();
                }
                "api_key_env" if !val.is_empty() => {
                    s.api_key_env = val.to_string();
                }
                "endpoint" if !val.is_empty() => {
                    s.endpoint = val.trim_end_matches('/').to_string();
                }
                "default_style" => {
                    s.default_style = ColorStyle::from_id(val).unwrap_or_default();
                }
                "pencil_size" => {
                    s.pencil_size = clamp_to(val.parse().unwrap_or(3.0), &PENCIL_SIZE_RANGE);
                }
                "pencil_opacity" => {
                    s.pencil_opacity = clamp_to(val.parse().unwrap_or(100.0), &PENCIL_OPACITY_RANGE);
                }
                "eraser_size" => {
                    s.eraser_size = clamp_to(val.parse().unwrap_or(12.0), &ERASER_SIZE_RANGE);
                }
                "overlay_opacity" => {
                    s.overlay_opacity = val.parse::<f32>().unwrap_or(50.0).clamp(0.0, 100.0);
                }
                "transparent_background" => {
                    s.transparent_background = val == "true";
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config()) {
            crate::log_warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config(&content)
    }

    /// API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}
