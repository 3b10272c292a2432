//! Platform boundary: OS window, message pump, time and sleep.
//!
//! Everything OS-specific sits behind the [`Platform`] trait. The engine
//! consumes translated [`PlatformEvent`]s and never sees native messages;
//! window-system plumbing, input translation and presentation hooks live in
//! the implementations ([`DesktopPlatform`] for real windows,
//! [`HeadlessPlatform`] for tests and display-less environments).

pub mod clock;
pub mod desktop;
pub mod headless;

pub use clock::Clock;
pub use desktop::DesktopPlatform;
pub use headless::HeadlessPlatform;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ApplicationConfig;
use crate::input::{Key, MouseButton};
use crate::memory::{Subsystem, SubsystemError};

/// Which platform implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// A real OS window.
    #[default]
    Desktop,
    /// The scripted platform; no display required.
    Headless,
}

/// Platform layer failures.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The windowing layer refused to come up.
    #[error("platform initialization failed: {0}")]
    InitializationFailed(String),

    /// The OS window could not be created.
    #[error("window creation failed: {0}")]
    WindowCreation(String),

    /// A platform call arrived before `startup` (or after `shutdown`).
    #[error("platform is not started")]
    NotStarted,

    /// The platform cannot provide the requested service.
    #[error("unsupported platform operation: {0}")]
    Unsupported(&'static str),

    /// Presentation surface creation failed.
    #[error("surface creation failed: {0}")]
    SurfaceCreation(String),
}

/// A native message translated into engine terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    /// A key changed state (or auto-repeated; the input layer deduplicates).
    Key {
        /// Which key.
        key: Key,
        /// Down or up.
        pressed: bool,
    },
    /// A mouse button changed state.
    MouseButton {
        /// Which button.
        button: MouseButton,
        /// Down or up.
        pressed: bool,
    },
    /// The pointer moved, in window coordinates.
    MouseMoved {
        /// Pointer x.
        x: i16,
        /// Pointer y.
        y: i16,
    },
    /// The wheel turned; delta is normalized to -1 or 1.
    MouseWheel {
        /// Normalized turn direction.
        delta: i8,
    },
    /// The framebuffer changed size. Zero dimensions mean minimized.
    Resized {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// The user asked the window to close.
    CloseRequested,
}

/// Services the engine requires from the OS layer.
pub trait Platform {
    /// Brings the OS layer up: native handles, the window, event plumbing.
    fn startup(&mut self, config: &ApplicationConfig) -> Result<(), PlatformError>;

    /// Tears the OS layer down. Safe to call more than once.
    fn shutdown(&mut self);

    /// Drains pending native messages and returns them translated, in
    /// arrival order. An error is fatal to the application loop.
    fn pump_messages(&mut self) -> Result<Vec<PlatformEvent>, PlatformError>;

    /// Monotonic time in seconds from an arbitrary epoch.
    fn absolute_time(&self) -> f64;

    /// Blocks the calling thread for `ms` milliseconds.
    fn sleep(&self, ms: u64);

    /// Current framebuffer size in pixels; (0, 0) before startup.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Vulkan instance extensions this platform's surfaces require.
    fn required_vulkan_extensions(&self) -> Result<Vec<String>, PlatformError>;

    /// Creates a presentation surface on `instance`.
    fn create_vulkan_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> Result<ash::vk::SurfaceKHR, PlatformError>;
}

/// Boot arguments for the platform layer.
pub struct PlatformArgs<'a> {
    /// The implementation to start; chosen by the bootstrapper.
    pub platform: Box<dyn Platform>,
    /// Window title, position and size.
    pub config: &'a ApplicationConfig,
}

/// The platform layer as a bootable subsystem.
///
/// Owns the chosen [`Platform`] implementation and runs its `startup` and
/// `shutdown` hooks on the boot protocol's schedule.
pub struct PlatformSystem {
    platform: Box<dyn Platform>,
}

impl PlatformSystem {
    /// The running platform.
    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// The running platform, mutably.
    pub fn platform_mut(&mut self) -> &mut dyn Platform {
        self.platform.as_mut()
    }
}

impl Subsystem for PlatformSystem {
    const NAME: &'static str = "platform system";

    type Args<'a> = PlatformArgs<'a>;

    fn initialize(args: Self::Args<'_>) -> Result<Self, SubsystemError> {
        let mut platform = args.platform;
        platform
            .startup(args.config)
            .map_err(|e| SubsystemError::new(Self::NAME, e.to_string()))?;
        Ok(Self { platform })
    }

    fn shutdown(&mut self) {
        self.platform.shutdown();
    }
}
