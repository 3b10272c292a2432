//! Double-buffered input snapshot.
//!
//! Keyboard and mouse state is kept as a current/previous pair. The
//! `process_*` calls mutate only the current half and only on an actual
//! state change, handing back the event that should be published for it;
//! [`InputSystem::update`] is the single commit point that copies current
//! over previous, called exactly once per frame after rendering. Queries
//! never mutate, so within one frame every consumer sees the same snapshot
//! no matter when it asks.

use crate::events::{EventCode, EventContext};
use crate::memory::{Subsystem, SubsystemError};

/// Keyboard slots tracked; key codes are 8-bit, so 256 covers the space.
pub const MAX_KEYS: usize = 256;

/// Key codes.
///
/// The numeric values are a wire contract (they travel in event payloads),
/// laid out like the classic virtual-key table: letters and digits at their
/// ASCII positions, arrows at 0x25..0x28, function keys from 0x70.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum Key {
    Backspace = 0x08,
    Tab = 0x09,
    Enter = 0x0D,
    Shift = 0x10,
    Control = 0x11,
    Alt = 0x12,
    Pause = 0x13,
    CapsLock = 0x14,
    Escape = 0x1B,
    Space = 0x20,
    PageUp = 0x21,
    PageDown = 0x22,
    End = 0x23,
    Home = 0x24,
    Left = 0x25,
    Up = 0x26,
    Right = 0x27,
    Down = 0x28,
    Insert = 0x2D,
    Delete = 0x2E,

    Key0 = 0x30,
    Key1 = 0x31,
    Key2 = 0x32,
    Key3 = 0x33,
    Key4 = 0x34,
    Key5 = 0x35,
    Key6 = 0x36,
    Key7 = 0x37,
    Key8 = 0x38,
    Key9 = 0x39,

    A = 0x41,
    B = 0x42,
    C = 0x43,
    D = 0x44,
    E = 0x45,
    F = 0x46,
    G = 0x47,
    H = 0x48,
    I = 0x49,
    J = 0x4A,
    K = 0x4B,
    L = 0x4C,
    M = 0x4D,
    N = 0x4E,
    O = 0x4F,
    P = 0x50,
    Q = 0x51,
    R = 0x52,
    S = 0x53,
    T = 0x54,
    U = 0x55,
    V = 0x56,
    W = 0x57,
    X = 0x58,
    Y = 0x59,
    Z = 0x5A,

    F1 = 0x70,
    F2 = 0x71,
    F3 = 0x72,
    F4 = 0x73,
    F5 = 0x74,
    F6 = 0x75,
    F7 = 0x76,
    F8 = 0x77,
    F9 = 0x78,
    F10 = 0x79,
    F11 = 0x7A,
    F12 = 0x7B,
}

impl Key {
    /// The key's numeric code as carried in event payloads.
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Mouse buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
}

impl MouseButton {
    /// Number of tracked buttons, for state arrays.
    pub const COUNT: usize = 3;

    /// The button's numeric code as carried in event payloads.
    pub fn code(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MouseState {
    buttons: [bool; MouseButton::COUNT],
    x: i16,
    y: i16,
}

/// Keyboard and mouse snapshot pair.
#[derive(Debug)]
pub struct InputSystem {
    keyboard_current: [bool; MAX_KEYS],
    keyboard_previous: [bool; MAX_KEYS],
    mouse_current: MouseState,
    mouse_previous: MouseState,
}

impl InputSystem {
    fn new() -> Self {
        Self {
            keyboard_current: [false; MAX_KEYS],
            keyboard_previous: [false; MAX_KEYS],
            mouse_current: MouseState::default(),
            mouse_previous: MouseState::default(),
        }
    }

    /// Commits the frame: current state becomes the previous snapshot.
    ///
    /// Called exactly once per frame, after rendering.
    pub fn update(&mut self) {
        self.keyboard_previous = self.keyboard_current;
        self.mouse_previous = self.mouse_current;
    }

    /// Applies a key transition. Returns the event to publish, or `None`
    /// when the key was already in that state.
    pub fn process_key(&mut self, key: Key, pressed: bool) -> Option<(EventCode, EventContext)> {
        let slot = key.code() as usize;
        if self.keyboard_current[slot] == pressed {
            return None;
        }
        self.keyboard_current[slot] = pressed;
        let code = if pressed {
            EventCode::KEY_PRESSED
        } else {
            EventCode::KEY_RELEASED
        };
        Some((code, EventContext::with_u16(key.code())))
    }

    /// Applies a button transition. Returns the event to publish, or `None`
    /// when the button was already in that state.
    pub fn process_button(
        &mut self,
        button: MouseButton,
        pressed: bool,
    ) -> Option<(EventCode, EventContext)> {
        let slot = button.code() as usize;
        if self.mouse_current.buttons[slot] == pressed {
            return None;
        }
        self.mouse_current.buttons[slot] = pressed;
        let code = if pressed {
            EventCode::BUTTON_PRESSED
        } else {
            EventCode::BUTTON_RELEASED
        };
        Some((code, EventContext::with_u16(button.code())))
    }

    /// Applies a pointer move. Returns the event to publish, or `None` when
    /// the position is unchanged.
    pub fn process_mouse_move(&mut self, x: i16, y: i16) -> Option<(EventCode, EventContext)> {
        if self.mouse_current.x == x && self.mouse_current.y == y {
            return None;
        }
        self.mouse_current.x = x;
        self.mouse_current.y = y;
        Some((
            EventCode::MOUSE_MOVED,
            EventContext::with_u16_pair(x as u16, y as u16),
        ))
    }

    /// Applies a wheel turn. Wheel state is not buffered, so this always
    /// returns an event.
    pub fn process_mouse_wheel(&mut self, delta: i8) -> (EventCode, EventContext) {
        (EventCode::MOUSE_WHEEL, EventContext::with_i8(delta))
    }

    /// Is the key down in the current frame?
    pub fn key_down(&self, key: Key) -> bool {
        self.keyboard_current[key.code() as usize]
    }

    /// Is the key up in the current frame?
    pub fn key_up(&self, key: Key) -> bool {
        !self.key_down(key)
    }

    /// Was the key down in the committed previous frame?
    pub fn was_key_down(&self, key: Key) -> bool {
        self.keyboard_previous[key.code() as usize]
    }

    /// Was the key up in the committed previous frame?
    pub fn was_key_up(&self, key: Key) -> bool {
        !self.was_key_down(key)
    }

    /// Is the button down in the current frame?
    pub fn button_down(&self, button: MouseButton) -> bool {
        self.mouse_current.buttons[button.code() as usize]
    }

    /// Is the button up in the current frame?
    pub fn button_up(&self, button: MouseButton) -> bool {
        !self.button_down(button)
    }

    /// Was the button down in the committed previous frame?
    pub fn was_button_down(&self, button: MouseButton) -> bool {
        self.mouse_previous.buttons[button.code() as usize]
    }

    /// Was the button up in the committed previous frame?
    pub fn was_button_up(&self, button: MouseButton) -> bool {
        !self.was_button_down(button)
    }

    /// Pointer position in the current frame.
    pub fn mouse_position(&self) -> (i16, i16) {
        (self.mouse_current.x, self.mouse_current.y)
    }

    /// Pointer position in the committed previous frame.
    pub fn previous_mouse_position(&self) -> (i16, i16) {
        (self.mouse_previous.x, self.mouse_previous.y)
    }
}

impl Subsystem for InputSystem {
    const NAME: &'static str = "input system";
    type Args<'a> = ();

    fn initialize(_args: ()) -> Result<Self, SubsystemError> {
        Ok(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booted() -> InputSystem {
        InputSystem::initialize(()).unwrap()
    }

    #[test]
    fn key_codes_are_a_stable_numeric_contract() {
        assert_eq!(Key::Escape.code(), 0x1B);
        assert_eq!(Key::Space.code(), 0x20);
        assert_eq!(Key::A.code(), 0x41);
        assert_eq!(Key::Key0.code(), 0x30);
        assert_eq!(Key::Left.code(), 0x25);
        assert_eq!(Key::F12.code(), 0x7B);
    }

    #[test]
    fn repeated_press_produces_exactly_one_event() {
        let mut input = booted();

        let first = input.process_key(Key::A, true);
        let second = input.process_key(Key::A, true);

        let (code, context) = first.unwrap();
        assert_eq!(code, EventCode::KEY_PRESSED);
        assert_eq!(context.u16_at(0), Key::A.code());
        assert!(second.is_none());
        assert!(input.key_down(Key::A));
    }

    #[test]
    fn release_fires_only_after_a_press() {
        let mut input = booted();

        assert!(input.process_key(Key::W, false).is_none());
        input.process_key(Key::W, true);
        let (code, _) = input.process_key(Key::W, false).unwrap();
        assert_eq!(code, EventCode::KEY_RELEASED);
    }

    #[test]
    fn update_commits_current_into_previous() {
        let mut input = booted();
        input.process_key(Key::D, true);

        assert!(input.key_down(Key::D));
        assert!(input.was_key_up(Key::D));

        input.update();
        assert!(input.was_key_down(Key::D));

        input.process_key(Key::D, false);
        assert!(input.key_up(Key::D));
        assert!(input.was_key_down(Key::D));

        input.update();
        assert!(input.was_key_up(Key::D));
    }

    #[test]
    fn buttons_change_detect_like_keys() {
        let mut input = booted();

        let (code, context) = input.process_button(MouseButton::Right, true).unwrap();
        assert_eq!(code, EventCode::BUTTON_PRESSED);
        assert_eq!(context.u16_at(0), MouseButton::Right.code());
        assert!(input.process_button(MouseButton::Right, true).is_none());
        assert!(input.button_down(MouseButton::Right));
        assert!(input.was_button_up(MouseButton::Right));
    }

    #[test]
    fn mouse_moves_are_deduplicated() {
        let mut input = booted();

        let (code, context) = input.process_mouse_move(10, -4).unwrap();
        assert_eq!(code, EventCode::MOUSE_MOVED);
        assert_eq!(context.u16_at(0), 10u16);
        assert_eq!(context.u16_at(1), (-4i16) as u16);
        assert!(input.process_mouse_move(10, -4).is_none());

        input.update();
        input.process_mouse_move(11, -4);
        assert_eq!(input.mouse_position(), (11, -4));
        assert_eq!(input.previous_mouse_position(), (10, -4));
    }

    #[test]
    fn wheel_turns_always_fire() {
        let mut input = booted();

        let (code, context) = input.process_mouse_wheel(-1);
        assert_eq!(code, EventCode::MOUSE_WHEEL);
        assert_eq!(context.i8_at(0), -1);

        let (code, _) = input.process_mouse_wheel(-1);
        assert_eq!(code, EventCode::MOUSE_WHEEL);
    }
}
