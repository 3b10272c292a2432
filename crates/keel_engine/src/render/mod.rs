//! Renderer frontend and backend selection.
//!
//! The frontend owns the boxed backend and every piece of state the backend
//! does not: the frame counter, the projection, and the view handed in by
//! game code. Game and engine code talk to the frontend only; the concrete
//! backend is picked once at initialization.

pub mod backend;
pub mod headless;
pub mod vulkan;

use std::collections::HashMap;
use std::f32::consts::FRAC_PI_4;

use nalgebra::{Matrix4, Perspective3, Vector3, Vector4};

pub use self::backend::{
    create_backend, GlobalState, RendererBackend, RendererBackendKind, RendererError,
    RendererResult, TextureDescriptor, TextureHandle,
};
pub use self::headless::{BackendRecord, HeadlessBackend};
pub use self::vulkan::VulkanBackend;

use crate::memory::{Subsystem, SubsystemError};
use crate::platform::Platform;

/// Everything the frontend needs to render one frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderPacket {
    /// Seconds since the previous frame.
    pub delta_time: f32,
}

/// Construction arguments for the renderer subsystem.
pub struct RendererArgs<'a> {
    /// Which backend to construct.
    pub kind: RendererBackendKind,
    /// Application name reported to the graphics API.
    pub application_name: &'a str,
    /// Platform supplying the surface and extensions.
    pub platform: &'a mut dyn Platform,
    /// Initial framebuffer width in pixels.
    pub width: u32,
    /// Initial framebuffer height in pixels.
    pub height: u32,
}

/// API-agnostic half of the renderer.
pub struct RendererFrontend {
    backend: Box<dyn RendererBackend>,
    frame_number: u64,
    projection: Matrix4<f32>,
    view: Matrix4<f32>,
    near_clip: f32,
    far_clip: f32,
    texture_sizes: HashMap<TextureHandle, u64>,
}

impl RendererFrontend {
    /// Wraps an already-built backend. Tests use this to slot in a recording
    /// backend without going through [`create_backend`].
    pub fn from_backend(backend: Box<dyn RendererBackend>, width: u32, height: u32) -> Self {
        let near_clip = 0.1;
        let far_clip = 1000.0;
        let aspect = if height > 0 {
            width as f32 / height as f32
        } else {
            1.0
        };

        Self {
            backend,
            frame_number: 0,
            projection: Perspective3::new(aspect, FRAC_PI_4, near_clip, far_clip)
                .to_homogeneous(),
            view: Matrix4::new_translation(&Vector3::new(0.0, 0.0, -30.0)),
            near_clip,
            far_clip,
            texture_sizes: HashMap::new(),
        }
    }

    /// Renders one frame described by `packet`.
    ///
    /// A backend that refuses to begin is not an error; the frame is skipped
    /// and the counter stays put. A failed submission is an error, and the
    /// counter stays put then too.
    pub fn draw_frame(&mut self, packet: &RenderPacket) -> RendererResult<()> {
        if !self.backend.begin_frame(packet.delta_time) {
            return Ok(());
        }

        let global = GlobalState {
            projection: self.projection,
            view: self.view,
            view_position: Vector3::zeros(),
            ambient_colour: Vector4::new(1.0, 1.0, 1.0, 1.0),
            mode: 0,
        };
        self.backend.update_global_state(&global);

        if !self.backend.end_frame(packet.delta_time) {
            log::error!("end_frame failed; frame {} not submitted", self.frame_number);
            return Err(RendererError::FrameSubmitFailed);
        }

        self.frame_number += 1;
        Ok(())
    }

    /// Refreshes the projection for the new framebuffer and notifies the
    /// backend. Zero-area sizes keep the previous projection; the scheduler
    /// suspends rendering before they can matter.
    pub fn on_resized(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            let aspect = width as f32 / height as f32;
            self.projection =
                Perspective3::new(aspect, FRAC_PI_4, self.near_clip, self.far_clip)
                    .to_homogeneous();
        }
        self.backend.resized(width, height);
    }

    /// Replaces the view matrix used for subsequent frames.
    pub fn set_view(&mut self, view: Matrix4<f32>) {
        self.view = view;
    }

    /// Pushes one object's model transform to the backend.
    pub fn update_object(&mut self, model: &Matrix4<f32>) {
        self.backend.update_object(model);
    }

    /// Creates a texture on the backend.
    pub fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        pixels: &[u8],
    ) -> RendererResult<TextureHandle> {
        let handle = self.backend.create_texture(descriptor, pixels)?;
        self.texture_sizes.insert(handle, pixels.len() as u64);
        Ok(handle)
    }

    /// Destroys a backend texture and returns the pixel bytes released.
    pub fn destroy_texture(&mut self, handle: TextureHandle) -> RendererResult<u64> {
        self.backend.destroy_texture(handle)?;
        Ok(self.texture_sizes.remove(&handle).unwrap_or(0))
    }

    /// Frames successfully submitted since initialization.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }
}

impl Subsystem for RendererFrontend {
    const NAME: &'static str = "renderer";

    type Args<'a> = RendererArgs<'a>;

    fn initialize(args: RendererArgs<'_>) -> Result<Self, SubsystemError> {
        let backend = create_backend(args.kind, args.application_name, args.platform)
            .map_err(|e| SubsystemError::new(Self::NAME, e.to_string()))?;
        Ok(Self::from_backend(backend, args.width, args.height))
    }

    fn shutdown(&mut self) {
        self.backend.shutdown();
    }
}
