//! # Keel Engine
//!
//! The bootstrap and runtime core of a small real-time engine with Vulkan
//! rendering support.
//!
//! ## Features
//!
//! - **Two-Phase Boot**: Subsystems size themselves, then commit into one arena
//! - **Synchronous Events**: Fire-and-forget bus with per-code payload contracts
//! - **Double-Buffered Input**: Frame-coherent keyboard and mouse snapshots
//! - **Vulkan Rendering**: First-fit device selection behind an API-agnostic frontend
//! - **Headless Testing**: Scripted platform and recording backend, no window needed
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keel_engine::prelude::*;
//!
//! struct MyGame;
//!
//! impl Application for MyGame {
//!     fn initialize(&mut self, _ctx: &mut EngineContext<'_>) -> Result<(), GameError> {
//!         // Load what the game needs
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, _ctx: &mut EngineContext<'_>, _delta_time: f32) -> Result<(), GameError> {
//!         // Advance game state
//!         Ok(())
//!     }
//!
//!     fn render(&mut self, _ctx: &mut EngineContext<'_>, _delta_time: f32) -> Result<(), GameError> {
//!         // Push render state for this frame
//!         Ok(())
//!     }
//!
//!     fn on_resize(&mut self, _width: u32, _height: u32) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let mut engine = Engine::new(config, Box::new(MyGame))?;
//!     engine.run()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod application;
pub mod engine;
pub mod events;
pub mod input;
pub mod logging;
pub mod memory;
pub mod platform;
pub mod render;

pub use application::{Application, ApplicationConfig, ConfigError, GameError};
pub use engine::{Engine, EngineContext, EngineError};

/// Common imports for engine users.
pub mod prelude {
    pub use crate::application::{Application, ApplicationConfig, GameError};
    pub use crate::engine::{Engine, EngineContext, EngineError};
    pub use crate::events::{EventCode, EventContext, EventSystem, ListenerId};
    pub use crate::input::{InputSystem, Key, MouseButton};
    pub use crate::memory::{MemorySystem, MemoryTag};
    pub use crate::platform::{Platform, PlatformEvent, PlatformKind};
    pub use crate::render::{
        RenderPacket, RendererBackendKind, TextureDescriptor, TextureHandle,
    };
}
