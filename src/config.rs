// Configuration - load settings from config.toml
//
// Every section has defaults; a missing or broken config file falls back
// to them with a warning rather than failing startup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
    pub scene: SceneConfig,
    pub camera: CameraConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "meshview".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "mailbox".to_string(),
            clear_color: [0.05, 0.05, 0.10, 1.0],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation: bool,
    pub debug_utils: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation: true,
            debug_utils: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Optional Wavefront OBJ to display; a procedural cube otherwise.
    pub model: Option<PathBuf>,
    pub vert_shader: PathBuf,
    pub frag_shader: PathBuf,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            model: None,
            vert_shader: PathBuf::from("shaders/mesh.vert.spv"),
            frag_shader: PathBuf::from("shaders/mesh.frag.spv"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fovy_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub eye: [f32; 3],
    pub center: [f32; 3],
    pub up: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fovy_degrees: 60.0,
            near: 0.1,
            far: 100.0,
            eye: [0.0, 0.0, 2.0],
            center: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found.
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {e}. Using defaults.");
            Config::default()
        })
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {path:?}, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path:?}"))?;

        log::info!("Loaded configuration from {path:?}");
        Ok(config)
    }

    /// Preferred present mode; the swapchain falls back to MAILBOX then
    /// FIFO when the preference is not offered.
    pub fn present_mode(&self) -> ash::vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => ash::vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => ash::vk::PresentModeKHR::MAILBOX,
            "fifo" => ash::vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => ash::vk::PresentModeKHR::FIFO_RELAXED,
            other => {
                log::warn!("Unknown present mode '{other}', defaulting to mailbox");
                ash::vk::PresentModeKHR::MAILBOX
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert!(config.scene.model.is_none());
        assert_eq!(config.camera.eye, [0.0, 0.0, 2.0]);
        assert_eq!(config.present_mode(), ash::vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [window]
            width = 640
            height = 480

            [scene]
            model = "assets/bunny.obj"
            "#,
        )
        .unwrap();
        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.title, "meshview");
        assert_eq!(
            config.scene.model.as_deref(),
            Some(Path::new("assets/bunny.obj"))
        );
        assert_eq!(config.scene.vert_shader, Path::new("shaders/mesh.vert.spv"));
    }

    #[test]
    fn present_mode_names_map_to_vulkan_enums() {
        let mut config = Config::default();
        for (name, mode) in [
            ("immediate", ash::vk::PresentModeKHR::IMMEDIATE),
            ("MAILBOX", ash::vk::PresentModeKHR::MAILBOX),
            ("fifo", ash::vk::PresentModeKHR::FIFO),
            ("fifo_relaxed", ash::vk::PresentModeKHR::FIFO_RELAXED),
            ("bogus", ash::vk::PresentModeKHR::MAILBOX),
        ] {
            config.graphics.present_mode = name.to_string();
            assert_eq!(config.present_mode(), mode);
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load_from_path("/definitely/not/a/config.toml").unwrap();
        assert_eq!(config.window.title, "meshview");
    }
}
