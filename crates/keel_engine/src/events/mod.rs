//! Synchronous event bus.
//!
//! Components communicate through fire-and-forget events: a listener
//! registers a callback for a numeric event code, and firing that code runs
//! every registered callback immediately, on the firing thread, in
//! registration order. A callback may report the event handled, which is
//! surfaced to the firer, but it never stops the remaining callbacks from
//! running.
//!
//! Dispatch works over a snapshot of the listener list, so callbacks are free
//! to register, unregister, and fire further events mid-dispatch; mutations
//! only affect later fires.
//!
//! Callbacks are plain function pointers over a context type `C` (the engine
//! threads itself through); the pair (listener identity, callback address)
//! identifies a registration, so the same function can serve several
//! listeners and one listener can hang several callbacks off one code.

use std::collections::HashMap;
use std::mem;

use smallvec::SmallVec;

use crate::memory::{Subsystem, SubsystemError};

/// Numeric identifier classifying a fired event.
///
/// Codes `0x01..=0xFF` are reserved for the engine; applications are free to
/// define their own codes above [`EventCode::MAX_SYSTEM_CODE`]. The engine
/// codes are a stable wire contract: listeners and payload layouts rely on
/// the numeric values, so they must never be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventCode(pub u16);

impl EventCode {
    /// Shut the application down on the next loop iteration. No payload.
    pub const APPLICATION_QUIT: EventCode = EventCode(0x01);
    /// A key went down. Key code in u16 slot 0.
    pub const KEY_PRESSED: EventCode = EventCode(0x02);
    /// A key came up. Key code in u16 slot 0.
    pub const KEY_RELEASED: EventCode = EventCode(0x03);
    /// A mouse button went down. Button code in u16 slot 0.
    pub const BUTTON_PRESSED: EventCode = EventCode(0x04);
    /// A mouse button came up. Button code in u16 slot 0.
    pub const BUTTON_RELEASED: EventCode = EventCode(0x05);
    /// The mouse moved. X in u16 slot 0, y in u16 slot 1.
    pub const MOUSE_MOVED: EventCode = EventCode(0x06);
    /// The mouse wheel turned. Signed delta in i8 slot 0.
    pub const MOUSE_WHEEL: EventCode = EventCode(0x07);
    /// The framebuffer was resized. Width in u16 slot 0, height in u16 slot 1.
    pub const RESIZED: EventCode = EventCode(0x08);

    /// Highest code the engine will ever claim.
    pub const MAX_SYSTEM_CODE: EventCode = EventCode(0xFF);
}

/// Opaque identity of a listener, used to disambiguate registrations that
/// share a callback. [`ListenerId::NONE`] is the anonymous identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl ListenerId {
    /// Anonymous listener identity.
    pub const NONE: ListenerId = ListenerId(0);
}

/// Fixed 16-byte event payload.
///
/// The bus never interprets the bytes; the firing and listening sides agree
/// on a layout per event code (the engine codes document theirs on
/// [`EventCode`]). Typed slot accessors read and write the payload as a
/// little array of the given type: slot `n` of type `T` covers bytes
/// `n * size_of::<T>() ..` of the payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventContext {
    data: [u8; 16],
}

macro_rules! context_slots {
    ($($ty:ty => $get:ident, $set:ident;)+) => {
        $(
            #[doc = concat!("Reads the `", stringify!($ty), "` in slot `slot`.")]
            ///
            /// # Panics
            ///
            /// Panics when the slot does not fit the 16-byte payload.
            pub fn $get(&self, slot: usize) -> $ty {
                let size = mem::size_of::<$ty>();
                let start = slot * size;
                bytemuck::pod_read_unaligned(&self.data[start..start + size])
            }

            #[doc = concat!("Writes the `", stringify!($ty), "` in slot `slot`.")]
            ///
            /// # Panics
            ///
            /// Panics when the slot does not fit the 16-byte payload.
            pub fn $set(&mut self, slot: usize, value: $ty) {
                let size = mem::size_of::<$ty>();
                let start = slot * size;
                self.data[start..start + size].copy_from_slice(bytemuck::bytes_of(&value));
            }
        )+
    };
}

impl EventContext {
    context_slots! {
        u8 => u8_at, set_u8;
        i8 => i8_at, set_i8;
        u16 => u16_at, set_u16;
        i16 => i16_at, set_i16;
        u32 => u32_at, set_u32;
        i32 => i32_at, set_i32;
        u64 => u64_at, set_u64;
        f32 => f32_at, set_f32;
    }

    /// Payload with a single u16 in slot 0 (key and button events).
    pub fn with_u16(value: u16) -> Self {
        let mut context = Self::default();
        context.set_u16(0, value);
        context
    }

    /// Payload with u16s in slots 0 and 1 (motion and resize events).
    pub fn with_u16_pair(first: u16, second: u16) -> Self {
        let mut context = Self::default();
        context.set_u16(0, first);
        context.set_u16(1, second);
        context
    }

    /// Payload with a single i8 in slot 0 (wheel events).
    pub fn with_i8(value: i8) -> Self {
        let mut context = Self::default();
        context.set_i8(0, value);
        context
    }
}

/// Listener callback over the context type `C`.
///
/// Receives the context, the fired code, the sender's identity and the
/// payload. Returns true to report the event handled; the bus surfaces that
/// to the firer but keeps dispatching either way.
pub type EventCallback<C> = fn(&mut C, EventCode, ListenerId, &EventContext) -> bool;

/// One registration: (listener identity, callback address).
#[derive(Debug)]
pub struct ListenerEntry<C> {
    listener: ListenerId,
    callback: EventCallback<C>,
}

impl<C> ListenerEntry<C> {
    fn matches(&self, listener: ListenerId, callback: EventCallback<C>) -> bool {
        // Identity is the callback's address, as in any C-style listener
        // table; `C` carries no bounds so Clone/Copy are implemented by hand.
        self.listener == listener && self.callback as usize == callback as usize
    }
}

impl<C> Clone for ListenerEntry<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ListenerEntry<C> {}

/// Snapshot of the listeners registered for one code.
pub type ListenerSnapshot<C> = SmallVec<[ListenerEntry<C>; 8]>;

/// Registry of event listeners keyed by code.
#[derive(Debug)]
pub struct EventSystem<C> {
    registry: HashMap<EventCode, Vec<ListenerEntry<C>>>,
}

impl<C> EventSystem<C> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
        }
    }

    /// Registers `callback` under `(code, listener)`.
    ///
    /// Registering an identical pair twice is a caller error; the bus does
    /// not deduplicate (the entry will fire once per registration) and warns
    /// so the bug is visible.
    pub fn register(&mut self, code: EventCode, listener: ListenerId, callback: EventCallback<C>) {
        let entries = self.registry.entry(code).or_default();
        if entries.iter().any(|entry| entry.matches(listener, callback)) {
            log::warn!(
                "duplicate listener registration for {:?}; it will fire once per registration",
                code
            );
        }
        entries.push(ListenerEntry { listener, callback });
    }

    /// Removes the first registration matching `(code, listener, callback)`.
    ///
    /// Returns false when no such registration exists; that is a safe no-op
    /// (noted at debug level), so unregistering twice cannot corrupt the
    /// registry.
    pub fn unregister(
        &mut self,
        code: EventCode,
        listener: ListenerId,
        callback: EventCallback<C>,
    ) -> bool {
        let Some(entries) = self.registry.get_mut(&code) else {
            log::debug!("unregister: nothing registered for {:?}", code);
            return false;
        };
        match entries.iter().position(|entry| entry.matches(listener, callback)) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => {
                log::debug!("unregister: no matching listener for {:?}", code);
                false
            }
        }
    }

    /// Copies the listeners currently registered for `code`, in registration
    /// order.
    ///
    /// Dispatch runs over such a snapshot so callbacks can mutate the
    /// registry (or fire further events) mid-dispatch without affecting the
    /// fire in progress.
    pub fn snapshot(&self, code: EventCode) -> ListenerSnapshot<C> {
        self.registry
            .get(&code)
            .map(|entries| entries.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of listeners currently registered for `code`.
    pub fn listener_count(&self, code: EventCode) -> usize {
        self.registry.get(&code).map_or(0, Vec::len)
    }

    /// Runs one dispatch of `context` to `entries` against `ctx`.
    ///
    /// Every entry runs exactly once, in order; a true return marks the
    /// event handled without stopping the rest. Returns whether anyone
    /// handled it. An empty snapshot returns false.
    pub fn dispatch(
        ctx: &mut C,
        code: EventCode,
        sender: ListenerId,
        context: &EventContext,
        entries: &ListenerSnapshot<C>,
    ) -> bool {
        let mut handled = false;
        for entry in entries {
            handled |= (entry.callback)(ctx, code, sender, context);
        }
        handled
    }
}

impl<C> Default for EventSystem<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Subsystem for EventSystem<C> {
    const NAME: &'static str = "event system";

    type Args<'a> = ();

    fn initialize(_args: Self::Args<'_>) -> Result<Self, SubsystemError> {
        Ok(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestCtx {
        events: EventSystem<TestCtx>,
        seen: Vec<(&'static str, u16)>,
    }

    impl TestCtx {
        fn new() -> Self {
            Self {
                events: EventSystem::new(),
                seen: Vec::new(),
            }
        }

        fn fire(&mut self, code: EventCode, context: EventContext) -> bool {
            let snapshot = self.events.snapshot(code);
            EventSystem::dispatch(self, code, ListenerId::NONE, &context, &snapshot)
        }
    }

    const CODE_X: EventCode = EventCode(0x100);
    const CODE_Y: EventCode = EventCode(0x101);

    fn records_a(ctx: &mut TestCtx, _: EventCode, _: ListenerId, data: &EventContext) -> bool {
        ctx.seen.push(("a", data.u16_at(0)));
        false
    }

    fn records_b(ctx: &mut TestCtx, _: EventCode, _: ListenerId, data: &EventContext) -> bool {
        ctx.seen.push(("b", data.u16_at(0)));
        false
    }

    fn consumes(ctx: &mut TestCtx, _: EventCode, _: ListenerId, data: &EventContext) -> bool {
        ctx.seen.push(("consumes", data.u16_at(0)));
        true
    }

    fn unregisters_b(ctx: &mut TestCtx, _: EventCode, _: ListenerId, _: &EventContext) -> bool {
        ctx.seen.push(("unregisters_b", 0));
        ctx.events.unregister(CODE_X, ListenerId(2), records_b);
        false
    }

    fn fires_y(ctx: &mut TestCtx, _: EventCode, _: ListenerId, _: &EventContext) -> bool {
        ctx.seen.push(("fires_y", 0));
        ctx.fire(CODE_Y, EventContext::with_u16(9));
        false
    }

    #[test]
    fn engine_codes_are_a_stable_numeric_contract() {
        assert_eq!(EventCode::APPLICATION_QUIT.0, 0x01);
        assert_eq!(EventCode::KEY_PRESSED.0, 0x02);
        assert_eq!(EventCode::KEY_RELEASED.0, 0x03);
        assert_eq!(EventCode::BUTTON_PRESSED.0, 0x04);
        assert_eq!(EventCode::BUTTON_RELEASED.0, 0x05);
        assert_eq!(EventCode::MOUSE_MOVED.0, 0x06);
        assert_eq!(EventCode::MOUSE_WHEEL.0, 0x07);
        assert_eq!(EventCode::RESIZED.0, 0x08);
    }

    #[test]
    fn fire_runs_listeners_in_registration_order_exactly_once() {
        let mut ctx = TestCtx::new();
        ctx.events.register(CODE_X, ListenerId(1), records_a);
        ctx.events.register(CODE_X, ListenerId(2), records_b);

        let handled = ctx.fire(CODE_X, EventContext::with_u16(7));

        assert!(!handled);
        assert_eq!(ctx.seen, vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn consuming_does_not_stop_propagation() {
        let mut ctx = TestCtx::new();
        ctx.events.register(CODE_X, ListenerId(1), consumes);
        ctx.events.register(CODE_X, ListenerId(2), records_b);

        let handled = ctx.fire(CODE_X, EventContext::with_u16(3));

        assert!(handled);
        assert_eq!(ctx.seen, vec![("consumes", 3), ("b", 3)]);
    }

    #[test]
    fn fire_with_no_listeners_reports_unhandled() {
        let mut ctx = TestCtx::new();
        assert!(!ctx.fire(CODE_X, EventContext::default()));
        assert!(ctx.seen.is_empty());
    }

    #[test]
    fn unregister_removes_only_the_exact_pair() {
        let mut ctx = TestCtx::new();
        ctx.events.register(CODE_X, ListenerId(1), records_a);
        ctx.events.register(CODE_X, ListenerId(1), records_b);

        assert!(ctx.events.unregister(CODE_X, ListenerId(1), records_a));
        ctx.fire(CODE_X, EventContext::with_u16(1));

        assert_eq!(ctx.seen, vec![("b", 1)]);
    }

    #[test]
    fn listener_identity_disambiguates_shared_callbacks() {
        let mut ctx = TestCtx::new();
        ctx.events.register(CODE_X, ListenerId(1), records_a);
        ctx.events.register(CODE_X, ListenerId(2), records_a);

        assert!(ctx.events.unregister(CODE_X, ListenerId(2), records_a));
        ctx.fire(CODE_X, EventContext::with_u16(4));

        assert_eq!(ctx.seen.len(), 1);
    }

    #[test]
    fn double_unregister_is_a_safe_noop() {
        let mut ctx = TestCtx::new();
        ctx.events.register(CODE_X, ListenerId(1), records_a);

        assert!(ctx.events.unregister(CODE_X, ListenerId(1), records_a));
        assert!(!ctx.events.unregister(CODE_X, ListenerId(1), records_a));
        assert!(!ctx.events.unregister(CODE_Y, ListenerId(1), records_a));

        ctx.fire(CODE_X, EventContext::default());
        assert!(ctx.seen.is_empty());
    }

    #[test]
    fn duplicate_registration_fires_once_per_entry() {
        let mut ctx = TestCtx::new();
        ctx.events.register(CODE_X, ListenerId(1), records_a);
        ctx.events.register(CODE_X, ListenerId(1), records_a);

        ctx.fire(CODE_X, EventContext::with_u16(2));
        assert_eq!(ctx.seen, vec![("a", 2), ("a", 2)]);
    }

    #[test]
    fn mid_fire_unregistration_only_affects_later_fires() {
        let mut ctx = TestCtx::new();
        ctx.events.register(CODE_X, ListenerId(1), unregisters_b);
        ctx.events.register(CODE_X, ListenerId(2), records_b);

        ctx.fire(CODE_X, EventContext::default());
        assert_eq!(ctx.seen, vec![("unregisters_b", 0), ("b", 0)]);

        ctx.seen.clear();
        ctx.fire(CODE_X, EventContext::default());
        assert_eq!(ctx.seen, vec![("unregisters_b", 0)]);
    }

    #[test]
    fn listeners_can_fire_events_themselves() {
        let mut ctx = TestCtx::new();
        ctx.events.register(CODE_X, ListenerId(1), fires_y);
        ctx.events.register(CODE_Y, ListenerId(1), records_a);

        ctx.fire(CODE_X, EventContext::default());
        assert_eq!(ctx.seen, vec![("fires_y", 0), ("a", 9)]);
    }

    #[test]
    fn context_slots_round_trip() {
        let context = EventContext::with_u16_pair(1280, 720);
        assert_eq!(context.u16_at(0), 1280);
        assert_eq!(context.u16_at(1), 720);

        let mut context = EventContext::default();
        context.set_i8(0, -3);
        assert_eq!(context.i8_at(0), -3);

        context.set_f32(1, 0.25);
        assert_eq!(context.f32_at(1), 0.25);

        context.set_u64(1, u64::MAX);
        assert_eq!(context.u64_at(1), u64::MAX);
    }

    #[test]
    #[should_panic]
    fn context_slot_out_of_range_panics() {
        let context = EventContext::default();
        let _ = context.u64_at(2);
    }
}
