//! Renderer backend contract.
//!
//! A backend is the API-specific half of the renderer behind a fixed
//! operation table. The implementation is chosen exactly once, by
//! [`create_backend`] at frontend construction, and never reassigned;
//! everything above the trait goes through the frontend and never branches
//! on the concrete type.

use nalgebra::{Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

use crate::platform::Platform;

/// Renderer failures.
#[derive(Debug, Error)]
pub enum RendererError {
    /// The backend could not be brought up.
    #[error("renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// No enumerated GPU satisfied the device requirements.
    #[error("no GPU meets the engine's device requirements")]
    NoSuitableDevice,

    /// A raw Vulkan call failed.
    #[error("Vulkan API error: {0}")]
    Api(#[from] ash::vk::Result),

    /// The backend failed to submit or present a frame.
    #[error("frame submission failed")]
    FrameSubmitFailed,

    /// A texture handle did not resolve to a live texture.
    #[error("unknown texture handle")]
    UnknownTexture,

    /// The platform refused a service the backend needs.
    #[error(transparent)]
    Platform(#[from] crate::platform::PlatformError),
}

/// Renderer result alias.
pub type RendererResult<T> = Result<T, RendererError>;

new_key_type! {
    /// Handle to a backend-owned texture.
    pub struct TextureHandle;
}

/// Immutable description of a texture to create.
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    /// Diagnostic name.
    pub name: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channels per pixel.
    pub channel_count: u8,
    /// Whether any texel has non-opaque alpha.
    pub has_transparency: bool,
}

/// Per-frame global shader state.
#[derive(Debug, Clone, Copy)]
pub struct GlobalState {
    /// Scene projection matrix.
    pub projection: Matrix4<f32>,
    /// Scene view matrix.
    pub view: Matrix4<f32>,
    /// Camera position in world space.
    pub view_position: Vector3<f32>,
    /// Flat ambient light colour.
    pub ambient_colour: Vector4<f32>,
    /// Shader debug mode selector.
    pub mode: i32,
}

/// Which backend implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererBackendKind {
    /// The Vulkan backend; needs a presentation-capable platform.
    #[default]
    Vulkan,
    /// The recording backend; no GPU or display required.
    Headless,
}

/// The fixed operation table every backend provides.
pub trait RendererBackend {
    /// Tears the backend down. Runs before drop so ordering stays explicit;
    /// safe to call more than once.
    fn shutdown(&mut self);

    /// Reacts to a framebuffer size change.
    fn resized(&mut self, width: u32, height: u32);

    /// Starts a frame. `false` means "not ready, skip this frame" and is
    /// not an error.
    fn begin_frame(&mut self, delta_time: f32) -> bool;

    /// Uploads the per-frame global state.
    fn update_global_state(&mut self, state: &GlobalState);

    /// Uploads one object's model transform.
    fn update_object(&mut self, model: &Matrix4<f32>);

    /// Ends the frame and presents. `false` is a submission failure.
    fn end_frame(&mut self, delta_time: f32) -> bool;

    /// Creates a texture from raw pixels.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        pixels: &[u8],
    ) -> RendererResult<TextureHandle>;

    /// Destroys a texture. Unknown handles are an error.
    fn destroy_texture(&mut self, handle: TextureHandle) -> RendererResult<()>;
}

/// Constructs the backend for `kind`.
pub fn create_backend(
    kind: RendererBackendKind,
    application_name: &str,
    platform: &mut dyn Platform,
) -> RendererResult<Box<dyn RendererBackend>> {
    match kind {
        RendererBackendKind::Vulkan => Ok(Box::new(super::vulkan::VulkanBackend::new(
            application_name,
            platform,
        )?)),
        RendererBackendKind::Headless => Ok(Box::new(super::headless::HeadlessBackend::new())),
    }
}
