//! GLFW-backed desktop platform.
//!
//! Owns the GLFW context, the window and its event receiver, translates
//! native messages into [`PlatformEvent`]s, and provides the Vulkan surface
//! hooks (GLFW queries the instance extension list and creates the surface
//! itself, so no window-system-specific code is needed here).

use std::ptr;
use std::thread;
use std::time::{Duration, Instant};

use crate::application::ApplicationConfig;
use crate::input::{Key, MouseButton};

use super::{Platform, PlatformError, PlatformEvent};

struct DesktopState {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

/// Real-window platform implementation.
pub struct DesktopPlatform {
    state: Option<DesktopState>,
    epoch: Instant,
}

impl DesktopPlatform {
    /// A platform that has not been started yet.
    pub fn new() -> Self {
        Self {
            state: None,
            epoch: Instant::now(),
        }
    }
}

impl Default for DesktopPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for DesktopPlatform {
    fn startup(&mut self, config: &ApplicationConfig) -> Result<(), PlatformError> {
        if self.state.is_some() {
            log::warn!("platform startup called twice; keeping the existing window");
            return Ok(());
        }

        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|e| PlatformError::InitializationFailed(e.to_string()))?;

        // Vulkan presents; no client API context.
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(
                config.width,
                config.height,
                &config.name,
                glfw::WindowMode::Windowed,
            )
            .ok_or_else(|| {
                PlatformError::WindowCreation("GLFW returned no window".to_string())
            })?;

        window.set_pos(config.x, config.y);
        window.set_key_polling(true);
        window.set_mouse_button_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_scroll_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_close_polling(true);

        log::info!(
            "window '{}' created at {},{} ({}x{})",
            config.name,
            config.x,
            config.y,
            config.width,
            config.height
        );
        self.state = Some(DesktopState {
            glfw,
            window,
            events,
        });
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.state.take().is_some() {
            log::debug!("platform window destroyed");
        }
    }

    fn pump_messages(&mut self) -> Result<Vec<PlatformEvent>, PlatformError> {
        let state = self.state.as_mut().ok_or(PlatformError::NotStarted)?;
        state.glfw.poll_events();

        let mut translated = Vec::new();
        for (_, event) in glfw::flush_messages(&state.events) {
            match event {
                glfw::WindowEvent::Key(key, _, action, _) => {
                    if let Some(key) = translate_key(key) {
                        // Repeats map to presses; the input snapshot
                        // deduplicates held keys.
                        let pressed = !matches!(action, glfw::Action::Release);
                        translated.push(PlatformEvent::Key { key, pressed });
                    }
                }
                glfw::WindowEvent::MouseButton(button, action, _) => {
                    if let Some(button) = translate_button(button) {
                        let pressed = matches!(action, glfw::Action::Press);
                        translated.push(PlatformEvent::MouseButton { button, pressed });
                    }
                }
                glfw::WindowEvent::CursorPos(x, y) => {
                    translated.push(PlatformEvent::MouseMoved {
                        x: x as i16,
                        y: y as i16,
                    });
                }
                glfw::WindowEvent::Scroll(_, vertical) => {
                    if vertical != 0.0 {
                        // Flatten to an OS-independent -1 or 1.
                        let delta = if vertical < 0.0 { -1 } else { 1 };
                        translated.push(PlatformEvent::MouseWheel { delta });
                    }
                }
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    translated.push(PlatformEvent::Resized {
                        width: width.max(0) as u32,
                        height: height.max(0) as u32,
                    });
                }
                glfw::WindowEvent::Close => translated.push(PlatformEvent::CloseRequested),
                _ => {}
            }
        }
        Ok(translated)
    }

    fn absolute_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn sleep(&self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        match &self.state {
            Some(state) => {
                let (width, height) = state.window.get_framebuffer_size();
                (width.max(0) as u32, height.max(0) as u32)
            }
            None => (0, 0),
        }
    }

    fn required_vulkan_extensions(&self) -> Result<Vec<String>, PlatformError> {
        let state = self.state.as_ref().ok_or(PlatformError::NotStarted)?;
        state
            .glfw
            .get_required_instance_extensions()
            .ok_or(PlatformError::Unsupported(
                "GLFW reports no Vulkan instance extensions",
            ))
    }

    fn create_vulkan_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> Result<ash::vk::SurfaceKHR, PlatformError> {
        let state = self.state.as_mut().ok_or(PlatformError::NotStarted)?;
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = state
            .window
            .create_window_surface(instance, ptr::null(), &mut surface);
        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(PlatformError::SurfaceCreation(format!("{:?}", result)))
        }
    }
}

fn translate_key(key: glfw::Key) -> Option<Key> {
    Some(match key {
        glfw::Key::Backspace => Key::Backspace,
        glfw::Key::Tab => Key::Tab,
        glfw::Key::Enter => Key::Enter,
        glfw::Key::LeftShift | glfw::Key::RightShift => Key::Shift,
        glfw::Key::LeftControl | glfw::Key::RightControl => Key::Control,
        glfw::Key::LeftAlt | glfw::Key::RightAlt => Key::Alt,
        glfw::Key::Pause => Key::Pause,
        glfw::Key::CapsLock => Key::CapsLock,
        glfw::Key::Escape => Key::Escape,
        glfw::Key::Space => Key::Space,
        glfw::Key::PageUp => Key::PageUp,
        glfw::Key::PageDown => Key::PageDown,
        glfw::Key::End => Key::End,
        glfw::Key::Home => Key::Home,
        glfw::Key::Left => Key::Left,
        glfw::Key::Up => Key::Up,
        glfw::Key::Right => Key::Right,
        glfw::Key::Down => Key::Down,
        glfw::Key::Insert => Key::Insert,
        glfw::Key::Delete => Key::Delete,
        glfw::Key::Num0 => Key::Key0,
        glfw::Key::Num1 => Key::Key1,
        glfw::Key::Num2 => Key::Key2,
        glfw::Key::Num3 => Key::Key3,
        glfw::Key::Num4 => Key::Key4,
        glfw::Key::Num5 => Key::Key5,
        glfw::Key::Num6 => Key::Key6,
        glfw::Key::Num7 => Key::Key7,
        glfw::Key::Num8 => Key::Key8,
        glfw::Key::Num9 => Key::Key9,
        glfw::Key::A => Key::A,
        glfw::Key::B => Key::B,
        glfw::Key::C => Key::C,
        glfw::Key::D => Key::D,
        glfw::Key::E => Key::E,
        glfw::Key::F => Key::F,
        glfw::Key::G => Key::G,
        glfw::Key::H => Key::H,
        glfw::Key::I => Key::I,
        glfw::Key::J => Key::J,
        glfw::Key::K => Key::K,
        glfw::Key::L => Key::L,
        glfw::Key::M => Key::M,
        glfw::Key::N => Key::N,
        glfw::Key::O => Key::O,
        glfw::Key::P => Key::P,
        glfw::Key::Q => Key::Q,
        glfw::Key::R => Key::R,
        glfw::Key::S => Key::S,
        glfw::Key::T => Key::T,
        glfw::Key::U => Key::U,
        glfw::Key::V => Key::V,
        glfw::Key::W => Key::W,
        glfw::Key::X => Key::X,
        glfw::Key::Y => Key::Y,
        glfw::Key::Z => Key::Z,
        glfw::Key::F1 => Key::F1,
        glfw::Key::F2 => Key::F2,
        glfw::Key::F3 => Key::F3,
        glfw::Key::F4 => Key::F4,
        glfw::Key::F5 => Key::F5,
        glfw::Key::F6 => Key::F6,
        glfw::Key::F7 => Key::F7,
        glfw::Key::F8 => Key::F8,
        glfw::Key::F9 => Key::F9,
        glfw::Key::F10 => Key::F10,
        glfw::Key::F11 => Key::F11,
        glfw::Key::F12 => Key::F12,
        _ => return None,
    })
}

fn translate_button(button: glfw::MouseButton) -> Option<MouseButton> {
    Some(match button {
        glfw::MouseButton::Button1 => MouseButton::Left,
        glfw::MouseButton::Button2 => MouseButton::Right,
        glfw::MouseButton::Button3 => MouseButton::Middle,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_translation_covers_the_engine_set() {
        assert_eq!(translate_key(glfw::Key::A), Some(Key::A));
        assert_eq!(translate_key(glfw::Key::Escape), Some(Key::Escape));
        assert_eq!(translate_key(glfw::Key::Num7), Some(Key::Key7));
        assert_eq!(translate_key(glfw::Key::LeftShift), Some(Key::Shift));
        assert_eq!(translate_key(glfw::Key::RightShift), Some(Key::Shift));
        assert_eq!(translate_key(glfw::Key::KpEnter), None);
    }

    #[test]
    fn button_translation_maps_the_first_three() {
        assert_eq!(
            translate_button(glfw::MouseButton::Button1),
            Some(MouseButton::Left)
        );
        assert_eq!(
            translate_button(glfw::MouseButton::Button3),
            Some(MouseButton::Middle)
        );
        assert_eq!(translate_button(glfw::MouseButton::Button8), None);
    }
}
