//! Game instance contract and application configuration.
//!
//! The engine hosts exactly one [`Application`]. All four hooks are part of
//! the trait, so a game that forgets one simply does not compile; there is
//! no optional-callback validation at boot time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineContext;
use crate::platform::PlatformKind;
use crate::render::RendererBackendKind;

/// A failure reported by game code.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct GameError(pub String);

impl GameError {
    /// Builds an error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The hooks the engine drives on the hosted game.
pub trait Application {
    /// Runs once after every engine subsystem is up.
    fn initialize(&mut self, ctx: &mut EngineContext<'_>) -> Result<(), GameError>;

    /// Advances game state by `delta_time` seconds. An error stops the run
    /// loop fatally.
    fn update(&mut self, ctx: &mut EngineContext<'_>, delta_time: f32) -> Result<(), GameError>;

    /// Prepares render state for the frame about to be drawn.
    fn render(&mut self, ctx: &mut EngineContext<'_>, delta_time: f32) -> Result<(), GameError>;

    /// Observes framebuffer size changes, including the synthetic one fired
    /// at boot with the startup size.
    fn on_resize(&mut self, width: u32, height: u32);
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Unsupported format.
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Startup settings for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Window title and the name reported to the graphics API.
    pub name: String,
    /// Initial window x position.
    pub x: i32,
    /// Initial window y position.
    pub y: i32,
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Pace frames to 1/60 s. Off by default; the platform sleep is coarse.
    pub limit_frame_rate: bool,
    /// Renderer backend to construct.
    pub renderer_backend: RendererBackendKind,
    /// Platform implementation to construct.
    pub platform: PlatformKind,
}

impl ApplicationConfig {
    /// Loads a configuration from a TOML file.
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Saves the configuration as pretty TOML.
    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        if !path.ends_with(".toml") {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Keel Testbed".to_string(),
            x: 100,
            y: 100,
            width: 800,
            height: 600,
            limit_frame_rate: false,
            renderer_backend: RendererBackendKind::default(),
            platform: PlatformKind::default(),
        }
    }
}
