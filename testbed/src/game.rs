//! The testbed game: a freely flying camera and a spinning demo object.

use keel_engine::prelude::*;
use nalgebra::{Matrix4, Rotation3, Vector3};

const MOVE_SPEED: f32 = 50.0;
const LOOK_SPEED: f32 = 1.0;

/// Flying camera driven by the keyboard.
///
/// WASD translates along the current view basis, the arrow keys yaw and
/// pitch, and releasing `M` prints the allocation counter. The view matrix
/// is rebuilt lazily: movement marks it dirty and the rebuild happens once
/// per update.
pub struct CameraGame {
    camera_position: Vector3<f32>,
    pitch: f32,
    yaw: f32,
    view: Matrix4<f32>,
    view_dirty: bool,
    model_angle: f32,
    frame_alloc_count: u64,
}

impl CameraGame {
    /// A camera parked on the +Z axis looking at the origin.
    pub fn new() -> Self {
        let mut game = Self {
            camera_position: Vector3::new(0.0, 0.0, 30.0),
            pitch: 0.0,
            yaw: 0.0,
            view: Matrix4::identity(),
            view_dirty: true,
            model_angle: 0.0,
            frame_alloc_count: 0,
        };
        game.recalculate_view();
        game
    }

    fn camera_yaw(&mut self, amount: f32) {
        self.yaw += amount;
        self.view_dirty = true;
    }

    fn camera_pitch(&mut self, amount: f32) {
        let limit = 89.0_f32.to_radians();
        self.pitch = (self.pitch + amount).clamp(-limit, limit);
        self.view_dirty = true;
    }

    /// Rebuilds the view as the inverse of the camera's world transform
    /// (translate after yaw-then-pitch rotation), but only when dirty.
    fn recalculate_view(&mut self) {
        if !self.view_dirty {
            return;
        }
        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), self.yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.pitch);
        self.view = rotation.inverse().to_homogeneous()
            * Matrix4::new_translation(&-self.camera_position);
        self.view_dirty = false;
    }

    // The camera's world-space basis vectors sit in the rows of the view
    // matrix's rotation part.
    fn view_row(view: &Matrix4<f32>, row: usize) -> Vector3<f32> {
        Vector3::new(view[(row, 0)], view[(row, 1)], view[(row, 2)])
    }

    fn forward(view: &Matrix4<f32>) -> Vector3<f32> {
        -Self::view_row(view, 2).normalize()
    }

    fn backward(view: &Matrix4<f32>) -> Vector3<f32> {
        Self::view_row(view, 2).normalize()
    }

    fn left(view: &Matrix4<f32>) -> Vector3<f32> {
        -Self::view_row(view, 0).normalize()
    }

    fn right(view: &Matrix4<f32>) -> Vector3<f32> {
        Self::view_row(view, 0).normalize()
    }
}

impl Default for CameraGame {
    fn default() -> Self {
        Self::new()
    }
}

impl Application for CameraGame {
    fn initialize(&mut self, _ctx: &mut EngineContext<'_>) -> Result<(), GameError> {
        self.camera_position = Vector3::new(0.0, 0.0, 30.0);
        self.pitch = 0.0;
        self.yaw = 0.0;
        self.view_dirty = true;
        self.recalculate_view();
        log::debug!("Game initialized");
        Ok(())
    }

    fn update(&mut self, ctx: &mut EngineContext<'_>, delta_time: f32) -> Result<(), GameError> {
        let previous = self.frame_alloc_count;
        self.frame_alloc_count = ctx.memory().allocation_count();
        if ctx.input().key_up(Key::M) && ctx.input().was_key_down(Key::M) {
            log::debug!(
                "Allocations: {} ({} this frame)",
                self.frame_alloc_count,
                self.frame_alloc_count - previous
            );
        }

        if ctx.input().key_down(Key::Left) {
            self.camera_yaw(LOOK_SPEED * delta_time);
        }
        if ctx.input().key_down(Key::Right) {
            self.camera_yaw(-LOOK_SPEED * delta_time);
        }
        if ctx.input().key_down(Key::Up) {
            self.camera_pitch(LOOK_SPEED * delta_time);
        }
        if ctx.input().key_down(Key::Down) {
            self.camera_pitch(-LOOK_SPEED * delta_time);
        }

        // Movement uses the previous frame's basis; the rebuild below picks
        // up the new position.
        let mut velocity = Vector3::zeros();
        if ctx.input().key_down(Key::W) {
            velocity += Self::forward(&self.view);
        }
        if ctx.input().key_down(Key::S) {
            velocity += Self::backward(&self.view);
        }
        if ctx.input().key_down(Key::A) {
            velocity += Self::left(&self.view);
        }
        if ctx.input().key_down(Key::D) {
            velocity += Self::right(&self.view);
        }

        if velocity.norm_squared() > 0.0002 * 0.0002 {
            self.camera_position += velocity.normalize() * MOVE_SPEED * delta_time;
            self.view_dirty = true;
        }

        self.recalculate_view();
        ctx.set_view(self.view);
        Ok(())
    }

    fn render(&mut self, ctx: &mut EngineContext<'_>, delta_time: f32) -> Result<(), GameError> {
        self.model_angle += 0.5 * delta_time;
        let model = Rotation3::from_axis_angle(&Vector3::z_axis(), self.model_angle)
            .to_homogeneous();
        ctx.update_object(&model);
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        log::debug!("CameraGame resized to {}x{}", width, height);
    }
}
