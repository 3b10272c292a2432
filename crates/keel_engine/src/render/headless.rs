//! Recording backend for tests and display-less environments.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use nalgebra::Matrix4;
use slotmap::SlotMap;

use super::backend::{
    GlobalState, RendererBackend, RendererError, RendererResult, TextureDescriptor, TextureHandle,
};

/// What the backend has been asked to do, observable from outside after the
/// backend has been boxed behind the trait.
#[derive(Debug, Default)]
pub struct BackendRecord {
    /// Frames the backend agreed to begin.
    pub frames_begun: u64,
    /// Frames submitted.
    pub frames_ended: u64,
    /// Resize notifications, in order.
    pub resizes: Vec<(u32, u32)>,
    /// Global-state uploads.
    pub global_updates: u64,
    /// Object-transform uploads.
    pub object_updates: u64,
    /// Textures created.
    pub textures_created: u64,
    /// Textures destroyed.
    pub textures_destroyed: u64,
}

/// A backend that renders nothing and records everything.
pub struct HeadlessBackend {
    ready: Rc<Cell<bool>>,
    submission: Rc<Cell<bool>>,
    record: Rc<RefCell<BackendRecord>>,
    textures: SlotMap<TextureHandle, (TextureDescriptor, Vec<u8>)>,
}

impl HeadlessBackend {
    /// A ready backend with an empty record.
    pub fn new() -> Self {
        Self {
            ready: Rc::new(Cell::new(true)),
            submission: Rc::new(Cell::new(true)),
            record: Rc::new(RefCell::new(BackendRecord::default())),
            textures: SlotMap::with_key(),
        }
    }

    /// Shared readiness flag; clearing it makes `begin_frame` refuse.
    pub fn readiness(&self) -> Rc<Cell<bool>> {
        self.ready.clone()
    }

    /// Shared submission flag; clearing it makes `end_frame` fail.
    pub fn submission(&self) -> Rc<Cell<bool>> {
        self.submission.clone()
    }

    /// Shared call record.
    pub fn record(&self) -> Rc<RefCell<BackendRecord>> {
        self.record.clone()
    }

    /// Stored pixels for `handle`, if it is live.
    pub fn texture(&self, handle: TextureHandle) -> Option<(&TextureDescriptor, &[u8])> {
        self.textures
            .get(handle)
            .map(|(descriptor, pixels)| (descriptor, pixels.as_slice()))
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererBackend for HeadlessBackend {
    fn shutdown(&mut self) {
        self.textures.clear();
    }

    fn resized(&mut self, width: u32, height: u32) {
        self.record.borrow_mut().resizes.push((width, height));
    }

    fn begin_frame(&mut self, _delta_time: f32) -> bool {
        if !self.ready.get() {
            return false;
        }
        self.record.borrow_mut().frames_begun += 1;
        true
    }

    fn update_global_state(&mut self, _state: &GlobalState) {
        self.record.borrow_mut().global_updates += 1;
    }

    fn update_object(&mut self, _model: &Matrix4<f32>) {
        self.record.borrow_mut().object_updates += 1;
    }

    fn end_frame(&mut self, _delta_time: f32) -> bool {
        if !self.submission.get() {
            return false;
        }
        self.record.borrow_mut().frames_ended += 1;
        true
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        pixels: &[u8],
    ) -> RendererResult<TextureHandle> {
        self.record.borrow_mut().textures_created += 1;
        Ok(self
            .textures
            .insert((descriptor.clone(), pixels.to_vec())))
    }

    fn destroy_texture(&mut self, handle: TextureHandle) -> RendererResult<()> {
        match self.textures.remove(handle) {
            Some(_) => {
                self.record.borrow_mut().textures_destroyed += 1;
                Ok(())
            }
            None => Err(RendererError::UnknownTexture),
        }
    }
}
