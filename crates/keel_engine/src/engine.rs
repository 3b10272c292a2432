//! Engine bootstrap, frame scheduling and teardown.
//!
//! [`Engine`] owns every subsystem through the two-phase boot protocol: the
//! state structs live in one arena sized up front, and come up in a fixed
//! order (memory accounting, logging, input, event bus, platform, renderer)
//! so each may rely on its predecessors. The run loop pumps the platform,
//! steps the game, draws a frame and commits the input snapshot once per
//! iteration, all on one thread.
//!
//! The engine is itself a listener on its own event bus: it answers quit
//! requests, turns escape into a quit, and routes resizes to the game and
//! the renderer. Everything an engine needs lives inside the [`Engine`]
//! value, so several instances can coexist in one process.

use nalgebra::Matrix4;
use thiserror::Error;

use crate::application::{Application, ApplicationConfig};
use crate::events::{EventCode, EventContext, EventSystem, ListenerId};
use crate::input::{InputSystem, Key, MouseButton};
use crate::logging::LoggingSystem;
use crate::memory::{LinearAllocator, MemorySystem, MemoryTag, SystemSlot};
use crate::platform::{
    Clock, DesktopPlatform, HeadlessPlatform, Platform, PlatformArgs, PlatformEvent, PlatformKind,
    PlatformSystem,
};
use crate::render::{
    RenderPacket, RendererArgs, RendererFrontend, RendererResult, TextureDescriptor, TextureHandle,
};

/// Frame budget the pacer aims for when `limit_frame_rate` is configured.
const TARGET_FRAME_SECONDS: f64 = 1.0 / 60.0;

/// Listener identity for the engine's own registrations.
const ENGINE_LISTENER: ListenerId = ListenerId(1);

/// Boot or run failure, naming the stage that failed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Memory accounting could not be committed.
    #[error("memory accounting failed to start: {0}")]
    MemoryInit(String),

    /// Logging could not be committed.
    #[error("logging failed to start: {0}")]
    LoggingInit(String),

    /// The input system could not be committed.
    #[error("input failed to start: {0}")]
    InputInit(String),

    /// The event bus could not be committed.
    #[error("event bus failed to start: {0}")]
    EventsInit(String),

    /// The platform layer refused to start (window, native plumbing).
    #[error("platform failed to start: {0}")]
    PlatformStartup(String),

    /// The renderer backend could not be built.
    #[error("renderer failed to start: {0}")]
    RendererInit(String),

    /// The game's own initialization hook failed.
    #[error("game failed to initialize: {0}")]
    GameInitialize(String),

    /// The game's update hook failed mid-loop.
    #[error("game update failed: {0}")]
    GameUpdate(String),

    /// The game's render hook failed mid-loop.
    #[error("game render failed: {0}")]
    GameRender(String),

    /// The platform message pump failed mid-loop.
    #[error("message pump failed: {0}")]
    MessagePump(String),
}

/// Engine services handed to the game's hooks.
///
/// Borrows the subsystems a game is allowed to touch while the engine holds
/// the rest. Texture creation and destruction go through the context so
/// pixel memory is accounted under [`MemoryTag::Texture`].
pub struct EngineContext<'a> {
    input: &'a InputSystem,
    memory: &'a mut MemorySystem,
    renderer: &'a mut RendererFrontend,
    width: u32,
    height: u32,
}

impl EngineContext<'_> {
    /// Input snapshot queries.
    pub fn input(&self) -> &InputSystem {
        self.input
    }

    /// Allocation accounting queries.
    pub fn memory(&self) -> &MemorySystem {
        self.memory
    }

    /// Current framebuffer size in pixels.
    pub fn window_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Replaces the view matrix used for subsequent frames.
    pub fn set_view(&mut self, view: Matrix4<f32>) {
        self.renderer.set_view(view);
    }

    /// Pushes one object's model transform to the renderer.
    pub fn update_object(&mut self, model: &Matrix4<f32>) {
        self.renderer.update_object(model);
    }

    /// Frames submitted since the renderer came up.
    pub fn frame_number(&self) -> u64 {
        self.renderer.frame_number()
    }

    /// Creates a texture and tracks its pixel memory.
    pub fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        pixels: &[u8],
    ) -> RendererResult<TextureHandle> {
        let handle = self.renderer.create_texture(descriptor, pixels)?;
        self.memory
            .track_alloc(pixels.len() as u64, MemoryTag::Texture);
        Ok(handle)
    }

    /// Destroys a texture and releases its tracked pixel memory.
    pub fn destroy_texture(&mut self, handle: TextureHandle) -> RendererResult<()> {
        let released = self.renderer.destroy_texture(handle)?;
        self.memory.track_free(released, MemoryTag::Texture);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RunState {
    is_running: bool,
    is_suspended: bool,
    width: u32,
    height: u32,
}

/// Byte requirements recorded during the sizing phase, one per subsystem.
struct SystemRequirements {
    memory: usize,
    logging: usize,
    input: usize,
    events: usize,
    platform: usize,
    renderer: usize,
}

impl SystemRequirements {
    fn total(&self) -> usize {
        self.memory + self.logging + self.input + self.events + self.platform + self.renderer
    }
}

/// The engine: subsystem owner, event listener and frame scheduler.
pub struct Engine {
    game: Box<dyn Application>,
    config: ApplicationConfig,
    state: RunState,
    clock: Clock,
    last_frame_time: f64,
    memory: SystemSlot<MemorySystem>,
    logging: SystemSlot<LoggingSystem>,
    input: SystemSlot<InputSystem>,
    events: SystemSlot<EventSystem<Engine>>,
    platform: SystemSlot<PlatformSystem>,
    renderer: SystemSlot<RendererFrontend>,
    // Declared last: the arena must outlive every subsystem carved from it.
    arena: LinearAllocator,
}

impl Engine {
    /// Boots an engine with the platform named in `config`.
    pub fn new(config: ApplicationConfig, game: Box<dyn Application>) -> Result<Self, EngineError> {
        let platform: Box<dyn Platform> = match config.platform {
            PlatformKind::Desktop => Box::new(DesktopPlatform::new()),
            PlatformKind::Headless => Box::new(HeadlessPlatform::new()),
        };
        Self::with_platform(config, game, platform)
    }

    /// Boots an engine over an injected platform implementation.
    pub fn with_platform(
        config: ApplicationConfig,
        game: Box<dyn Application>,
        platform: Box<dyn Platform>,
    ) -> Result<Self, EngineError> {
        let mut memory = SystemSlot::<MemorySystem>::new();
        let mut logging = SystemSlot::<LoggingSystem>::new();
        let mut input = SystemSlot::<InputSystem>::new();
        let mut events = SystemSlot::<EventSystem<Engine>>::new();
        let mut platform_slot = SystemSlot::<PlatformSystem>::new();
        let mut renderer = SystemSlot::<RendererFrontend>::new();

        let requirements = SystemRequirements {
            memory: memory.query_size(),
            logging: logging.query_size(),
            input: input.query_size(),
            events: events.query_size(),
            platform: platform_slot.query_size(),
            renderer: renderer.query_size(),
        };
        let arena = LinearAllocator::new(requirements.total());

        let mut engine = Self {
            game,
            config,
            state: RunState::default(),
            clock: Clock::new(),
            last_frame_time: 0.0,
            memory,
            logging,
            input,
            events,
            platform: platform_slot,
            renderer,
            arena,
        };
        engine.commit_systems(platform, &requirements)?;
        Ok(engine)
    }

    /// Phase two of the boot: commits every subsystem in dependency order,
    /// then brings the game up. Any failure aborts the boot; the engine's
    /// drop path tears the committed prefix back down.
    fn commit_systems(
        &mut self,
        platform: Box<dyn Platform>,
        requirements: &SystemRequirements,
    ) -> Result<(), EngineError> {
        self.memory
            .commit(&mut self.arena, ())
            .map_err(|e| EngineError::MemoryInit(e.to_string()))?;
        {
            let memory = self.memory.state_mut();
            memory.track_alloc(requirements.total() as u64, MemoryTag::LinearAllocator);
            memory.track_alloc(requirements.memory as u64, MemoryTag::Application);
        }

        self.logging
            .commit(&mut self.arena, ())
            .map_err(|e| EngineError::LoggingInit(e.to_string()))?;
        self.memory
            .state_mut()
            .track_alloc(requirements.logging as u64, MemoryTag::Application);
        log::info!("Booting {}", self.config.name);

        self.input
            .commit(&mut self.arena, ())
            .map_err(|e| EngineError::InputInit(e.to_string()))?;
        self.memory
            .state_mut()
            .track_alloc(requirements.input as u64, MemoryTag::Input);

        self.events
            .commit(&mut self.arena, ())
            .map_err(|e| EngineError::EventsInit(e.to_string()))?;
        self.memory
            .state_mut()
            .track_alloc(requirements.events as u64, MemoryTag::Event);

        self.platform
            .commit(
                &mut self.arena,
                PlatformArgs {
                    platform,
                    config: &self.config,
                },
            )
            .map_err(|e| EngineError::PlatformStartup(e.to_string()))?;
        self.memory
            .state_mut()
            .track_alloc(requirements.platform as u64, MemoryTag::Application);

        let (width, height) = self.platform.state().platform().framebuffer_size();
        self.state.width = width;
        self.state.height = height;

        {
            let Self {
                platform,
                renderer,
                arena,
                config,
                ..
            } = self;
            renderer
                .commit(
                    arena,
                    RendererArgs {
                        kind: config.renderer_backend,
                        application_name: &config.name,
                        platform: platform.state_mut().platform_mut(),
                        width,
                        height,
                    },
                )
                .map_err(|e| EngineError::RendererInit(e.to_string()))?;
        }
        self.memory
            .state_mut()
            .track_alloc(requirements.renderer as u64, MemoryTag::Renderer);

        self.register_engine_listeners();

        let game_result = {
            let (game, mut context) = self.split_game_context();
            game.initialize(&mut context)
        };
        game_result.map_err(|e| EngineError::GameInitialize(e.to_string()))?;
        self.game.on_resize(width, height);

        self.state.is_running = true;
        Ok(())
    }

    fn register_engine_listeners(&mut self) {
        let events = self.events.state_mut();
        events.register(EventCode::APPLICATION_QUIT, ENGINE_LISTENER, Self::on_quit);
        events.register(EventCode::KEY_PRESSED, ENGINE_LISTENER, Self::on_key);
        events.register(EventCode::KEY_RELEASED, ENGINE_LISTENER, Self::on_key);
        events.register(EventCode::RESIZED, ENGINE_LISTENER, Self::on_resized);
    }

    /// Splits the engine into the game and the context view it runs against.
    fn split_game_context(&mut self) -> (&mut dyn Application, EngineContext<'_>) {
        let Self {
            game,
            state,
            memory,
            input,
            renderer,
            ..
        } = self;
        (
            game.as_mut(),
            EngineContext {
                input: input.state(),
                memory: memory.state_mut(),
                renderer: renderer.state_mut(),
                width: state.width,
                height: state.height,
            },
        )
    }

    /// Fires `code` at every current listener, immediately, on this thread.
    ///
    /// Returns whether any listener reported the event handled. Quietly
    /// returns false once the event bus is shut down.
    pub fn fire_event(
        &mut self,
        code: EventCode,
        sender: ListenerId,
        context: &EventContext,
    ) -> bool {
        let snapshot = match self.events.get() {
            Some(events) => events.snapshot(code),
            None => return false,
        };
        EventSystem::dispatch(self, code, sender, context, &snapshot)
    }

    /// Runs the frame loop until the application stops, then shuts every
    /// subsystem down. The error, if any, names the stage that stopped it.
    pub fn run(&mut self) -> Result<(), EngineError> {
        if !self.state.is_running {
            log::warn!("run called on a stopped engine");
            return Ok(());
        }

        log::info!("{}", self.memory.state().usage_report());

        let now = self.platform.state().platform().absolute_time();
        self.clock.start(now);
        self.clock.update(now);
        self.last_frame_time = self.clock.elapsed();

        let result = self.run_loop();
        self.state.is_running = false;
        self.shutdown_systems();
        result
    }

    fn run_loop(&mut self) -> Result<(), EngineError> {
        while self.state.is_running {
            let events = match self.platform.state_mut().platform_mut().pump_messages() {
                Ok(events) => events,
                Err(e) => {
                    log::error!("message pump failed: {}", e);
                    return Err(EngineError::MessagePump(e.to_string()));
                }
            };
            for event in events {
                self.apply_platform_event(event);
            }

            if !self.state.is_running {
                break;
            }
            if self.state.is_suspended {
                continue;
            }

            let now = self.platform.state().platform().absolute_time();
            self.clock.update(now);
            let current_time = self.clock.elapsed();
            let delta = (current_time - self.last_frame_time) as f32;
            let frame_start = now;

            let frame_result = {
                let (game, mut context) = self.split_game_context();
                game.update(&mut context, delta)
                    .map_err(|e| EngineError::GameUpdate(e.to_string()))
                    .and_then(|()| {
                        game.render(&mut context, delta)
                            .map_err(|e| EngineError::GameRender(e.to_string()))
                    })
            };
            if let Err(e) = frame_result {
                log::error!("stopping after frame failure: {}", e);
                return Err(e);
            }

            let packet = RenderPacket { delta_time: delta };
            if let Err(e) = self.renderer.state_mut().draw_frame(&packet) {
                // A dropped frame is recoverable; the loop keeps going.
                log::error!("draw_frame failed: {}", e);
            }

            let frame_end = self.platform.state().platform().absolute_time();
            let remaining_seconds = TARGET_FRAME_SECONDS - (frame_end - frame_start);
            if remaining_seconds > 0.0 {
                let remaining_ms = (remaining_seconds * 1000.0) as u64;
                if remaining_ms > 0 && self.config.limit_frame_rate {
                    self.platform.state().platform().sleep(remaining_ms - 1);
                }
            }

            // The snapshot commit is the last thing a frame does, so the
            // game always compares against the previous frame's state.
            self.input.state_mut().update();
            self.last_frame_time = current_time;
        }
        Ok(())
    }

    /// Routes one translated platform message into input state and events.
    fn apply_platform_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::Key { key, pressed } => {
                if let Some((code, context)) = self.input.state_mut().process_key(key, pressed) {
                    self.fire_event(code, ListenerId::NONE, &context);
                }
            }
            PlatformEvent::MouseButton { button, pressed } => {
                if let Some((code, context)) =
                    self.input.state_mut().process_button(button, pressed)
                {
                    self.fire_event(code, ListenerId::NONE, &context);
                }
            }
            PlatformEvent::MouseMoved { x, y } => {
                if let Some((code, context)) = self.input.state_mut().process_mouse_move(x, y) {
                    self.fire_event(code, ListenerId::NONE, &context);
                }
            }
            PlatformEvent::MouseWheel { delta } => {
                let (code, context) = self.input.state_mut().process_mouse_wheel(delta);
                self.fire_event(code, ListenerId::NONE, &context);
            }
            PlatformEvent::Resized { width, height } => {
                let context = EventContext::with_u16_pair(width as u16, height as u16);
                self.fire_event(EventCode::RESIZED, ListenerId::NONE, &context);
            }
            PlatformEvent::CloseRequested => {
                self.fire_event(
                    EventCode::APPLICATION_QUIT,
                    ListenerId::NONE,
                    &EventContext::default(),
                );
            }
        }
    }

    /// Tears the subsystems down in reverse dependency order. Idempotent.
    fn shutdown_systems(&mut self) {
        if let Some(events) = self.events.get_mut() {
            events.unregister(EventCode::APPLICATION_QUIT, ENGINE_LISTENER, Self::on_quit);
            events.unregister(EventCode::KEY_PRESSED, ENGINE_LISTENER, Self::on_key);
            events.unregister(EventCode::KEY_RELEASED, ENGINE_LISTENER, Self::on_key);
            events.unregister(EventCode::RESIZED, ENGINE_LISTENER, Self::on_resized);
        }
        self.events.shut_down();
        self.input.shut_down();
        self.renderer.shut_down();
        self.platform.shut_down();
        self.logging.shut_down();
        self.memory.shut_down();
    }

    /// True between a successful boot and the end of [`Engine::run`].
    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    /// True while a zero-area framebuffer has rendering parked.
    pub fn is_suspended(&self) -> bool {
        self.state.is_suspended
    }

    /// Current framebuffer size in pixels.
    pub fn window_size(&self) -> (u32, u32) {
        (self.state.width, self.state.height)
    }

    /// Is `key` down right now? False once input is shut down.
    pub fn key_down(&self, key: Key) -> bool {
        self.input.get().map_or(false, |input| input.key_down(key))
    }

    /// Was `key` down on the previous frame? False once input is shut down.
    pub fn was_key_down(&self, key: Key) -> bool {
        self.input
            .get()
            .map_or(false, |input| input.was_key_down(key))
    }

    /// Is `button` down right now? False once input is shut down.
    pub fn button_down(&self, button: MouseButton) -> bool {
        self.input
            .get()
            .map_or(false, |input| input.button_down(button))
    }

    /// Current pointer position; (0, 0) once input is shut down.
    pub fn mouse_position(&self) -> (i16, i16) {
        self.input
            .get()
            .map_or((0, 0), |input| input.mouse_position())
    }

    fn on_quit(
        engine: &mut Engine,
        _code: EventCode,
        _sender: ListenerId,
        _context: &EventContext,
    ) -> bool {
        log::info!("application quit requested; stopping the run loop");
        engine.state.is_running = false;
        true
    }

    fn on_key(
        engine: &mut Engine,
        code: EventCode,
        _sender: ListenerId,
        context: &EventContext,
    ) -> bool {
        if code == EventCode::KEY_PRESSED && context.u16_at(0) == Key::Escape.code() {
            engine.fire_event(
                EventCode::APPLICATION_QUIT,
                ENGINE_LISTENER,
                &EventContext::default(),
            );
            return true;
        }
        false
    }

    fn on_resized(
        engine: &mut Engine,
        _code: EventCode,
        _sender: ListenerId,
        context: &EventContext,
    ) -> bool {
        let width = u32::from(context.u16_at(0));
        let height = u32::from(context.u16_at(1));
        if width == engine.state.width && height == engine.state.height {
            return false;
        }
        engine.state.width = width;
        engine.state.height = height;

        if width == 0 || height == 0 {
            log::info!("window minimized; suspending rendering");
            engine.state.is_suspended = true;
            return false;
        }
        if engine.state.is_suspended {
            log::info!("window restored; resuming rendering");
            engine.state.is_suspended = false;
        }
        engine.game.on_resize(width, height);
        if let Some(renderer) = engine.renderer.get_mut() {
            renderer.on_resized(width, height);
        }
        // Reported, not handled: other listeners may care about resizes too.
        false
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown_systems();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::application::GameError;
    use crate::render::RendererBackendKind;

    #[derive(Default)]
    struct GameLog {
        initialized: u32,
        updates: u32,
        renders: u32,
        resizes: Vec<(u32, u32)>,
        last_frame_number: u64,
    }

    struct TestGame {
        log: Rc<RefCell<GameLog>>,
        fail_initialize: bool,
        fail_update: bool,
    }

    impl TestGame {
        fn new() -> (Self, Rc<RefCell<GameLog>>) {
            let log = Rc::new(RefCell::new(GameLog::default()));
            let game = Self {
                log: Rc::clone(&log),
                fail_initialize: false,
                fail_update: false,
            };
            (game, log)
        }

        fn failing_initialize() -> Self {
            Self {
                fail_initialize: true,
                ..Self::new().0
            }
        }

        fn failing_update() -> Self {
            Self {
                fail_update: true,
                ..Self::new().0
            }
        }
    }

    impl Application for TestGame {
        fn initialize(&mut self, _context: &mut EngineContext<'_>) -> Result<(), GameError> {
            if self.fail_initialize {
                return Err(GameError::new("scripted initialize failure"));
            }
            self.log.borrow_mut().initialized += 1;
            Ok(())
        }

        fn update(
            &mut self,
            context: &mut EngineContext<'_>,
            _delta_time: f32,
        ) -> Result<(), GameError> {
            if self.fail_update {
                return Err(GameError::new("scripted update failure"));
            }
            let mut log = self.log.borrow_mut();
            log.updates += 1;
            log.last_frame_number = context.frame_number();
            Ok(())
        }

        fn render(
            &mut self,
            _context: &mut EngineContext<'_>,
            _delta_time: f32,
        ) -> Result<(), GameError> {
            self.log.borrow_mut().renders += 1;
            Ok(())
        }

        fn on_resize(&mut self, width: u32, height: u32) {
            self.log.borrow_mut().resizes.push((width, height));
        }
    }

    fn headless_config() -> ApplicationConfig {
        ApplicationConfig {
            name: "engine test".to_string(),
            renderer_backend: RendererBackendKind::Headless,
            platform: PlatformKind::Headless,
            ..ApplicationConfig::default()
        }
    }

    fn booted(
        script: Vec<Vec<PlatformEvent>>,
    ) -> (Engine, Rc<RefCell<GameLog>>) {
        let (game, log) = TestGame::new();
        let platform = HeadlessPlatform::new().with_script(script);
        let engine =
            Engine::with_platform(headless_config(), Box::new(game), Box::new(platform))
                .expect("boot");
        (engine, log)
    }

    #[test]
    fn boot_then_scripted_close_runs_cleanly() {
        let (mut engine, log) = booted(vec![vec![], vec![], vec![]]);
        assert!(engine.is_running());

        engine.run().unwrap();

        let log = log.borrow();
        assert_eq!(log.initialized, 1);
        assert_eq!(log.resizes, vec![(800, 600)]);
        assert_eq!(log.updates, 3);
        assert_eq!(log.renders, 3);
        // draw_frame runs after the hooks, so the last update saw two
        // already-submitted frames.
        assert_eq!(log.last_frame_number, 2);
        assert!(!engine.is_running());
    }

    #[test]
    fn escape_key_stops_the_loop_before_any_update() {
        let (mut engine, log) = booted(vec![
            vec![PlatformEvent::Key {
                key: Key::Escape,
                pressed: true,
            }],
            vec![],
        ]);

        engine.run().unwrap();

        assert_eq!(log.borrow().updates, 0);
        assert_eq!(log.borrow().renders, 0);
    }

    #[test]
    fn zero_width_suspends_until_a_real_resize() {
        let (mut engine, log) = booted(vec![
            vec![PlatformEvent::Resized {
                width: 0,
                height: 600,
            }],
            vec![],
            vec![PlatformEvent::Resized {
                width: 1280,
                height: 720,
            }],
            vec![],
        ]);

        engine.run().unwrap();

        let log = log.borrow();
        // The minimize never reaches the game; the restore does, once.
        assert_eq!(log.resizes, vec![(800, 600), (1280, 720)]);
        assert_eq!(log.updates, 2);
        assert_eq!(log.renders, 2);
    }

    #[test]
    fn same_size_resize_is_ignored() {
        let (mut engine, log) = booted(vec![
            vec![PlatformEvent::Resized {
                width: 800,
                height: 600,
            }],
            vec![],
        ]);

        engine.run().unwrap();

        assert_eq!(log.borrow().resizes, vec![(800, 600)]);
        assert_eq!(log.borrow().updates, 2);
    }

    #[test]
    fn resize_is_reported_not_handled_but_quit_consumes() {
        let (mut engine, log) = booted(vec![]);

        let handled = engine.fire_event(
            EventCode::RESIZED,
            ListenerId::NONE,
            &EventContext::with_u16_pair(640, 480),
        );
        assert!(!handled);
        assert_eq!(log.borrow().resizes, vec![(800, 600), (640, 480)]);

        let handled = engine.fire_event(
            EventCode::APPLICATION_QUIT,
            ListenerId::NONE,
            &EventContext::default(),
        );
        assert!(handled);
        assert!(!engine.is_running());
    }

    #[test]
    fn escape_press_is_consumed_and_other_keys_are_not() {
        let (mut engine, _log) = booted(vec![]);

        let handled = engine.fire_event(
            EventCode::KEY_PRESSED,
            ListenerId::NONE,
            &EventContext::with_u16(Key::W.code()),
        );
        assert!(!handled);
        assert!(engine.is_running());

        let handled = engine.fire_event(
            EventCode::KEY_PRESSED,
            ListenerId::NONE,
            &EventContext::with_u16(Key::Escape.code()),
        );
        assert!(handled);
        assert!(!engine.is_running());
    }

    #[test]
    fn boot_failures_name_their_stage() {
        let (game, _log) = TestGame::new();
        let err = Engine::with_platform(
            headless_config(),
            Box::new(game),
            Box::new(HeadlessPlatform::failing()),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::PlatformStartup(_)));

        let err = Engine::with_platform(
            headless_config(),
            Box::new(TestGame::failing_initialize()),
            Box::new(HeadlessPlatform::new()),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::GameInitialize(_)));

        let mut config = headless_config();
        config.renderer_backend = RendererBackendKind::Vulkan;
        let (game, _log) = TestGame::new();
        let err = Engine::with_platform(config, Box::new(game), Box::new(HeadlessPlatform::new()))
            .unwrap_err();
        assert!(matches!(err, EngineError::RendererInit(_)));
    }

    #[test]
    fn pump_failure_surfaces_as_message_pump() {
        let (game, log) = TestGame::new();
        let platform = HeadlessPlatform::new()
            .with_script(vec![vec![], vec![], vec![], vec![]])
            .with_pump_failure(2);
        let mut engine =
            Engine::with_platform(headless_config(), Box::new(game), Box::new(platform)).unwrap();

        let err = engine.run().unwrap_err();

        assert!(matches!(err, EngineError::MessagePump(_)));
        assert_eq!(log.borrow().updates, 2);
    }

    #[test]
    fn update_failure_stops_with_its_stage() {
        let platform = HeadlessPlatform::new().with_script(vec![vec![], vec![]]);
        let mut engine = Engine::with_platform(
            headless_config(),
            Box::new(TestGame::failing_update()),
            Box::new(platform),
        )
        .unwrap();

        let err = engine.run().unwrap_err();

        assert!(matches!(err, EngineError::GameUpdate(_)));
        assert!(!engine.is_running());
    }

    #[test]
    fn limiter_sleeps_only_when_configured() {
        let (game, _log) = TestGame::new();
        let platform = HeadlessPlatform::new().with_script(vec![vec![], vec![]]);
        let recorder = platform.sleep_recorder();
        let mut config = headless_config();
        config.limit_frame_rate = true;
        let mut engine =
            Engine::with_platform(config, Box::new(game), Box::new(platform)).unwrap();
        engine.run().unwrap();
        assert!(recorder.get() > 0);

        let (game, _log) = TestGame::new();
        let platform = HeadlessPlatform::new().with_script(vec![vec![], vec![]]);
        let recorder = platform.sleep_recorder();
        let mut engine =
            Engine::with_platform(headless_config(), Box::new(game), Box::new(platform)).unwrap();
        engine.run().unwrap();
        assert_eq!(recorder.get(), 0);
    }

    #[test]
    fn post_shutdown_queries_are_quiet() {
        let (mut engine, _log) = booted(vec![]);
        engine.run().unwrap();

        assert!(!engine.key_down(Key::A));
        assert!(!engine.was_key_down(Key::A));
        assert!(!engine.button_down(MouseButton::Left));
        assert_eq!(engine.mouse_position(), (0, 0));
        assert!(!engine.fire_event(
            EventCode::APPLICATION_QUIT,
            ListenerId::NONE,
            &EventContext::default()
        ));
    }

    #[test]
    fn engines_are_independent_within_one_process() {
        let (game_a, log_a) = TestGame::new();
        let (game_b, log_b) = TestGame::new();
        let mut first = Engine::with_platform(
            headless_config(),
            Box::new(game_a),
            Box::new(HeadlessPlatform::new().with_script(vec![vec![]])),
        )
        .unwrap();
        let mut second = Engine::with_platform(
            headless_config(),
            Box::new(game_b),
            Box::new(HeadlessPlatform::new().with_script(vec![vec![]])),
        )
        .unwrap();

        first.run().unwrap();
        second.run().unwrap();

        assert_eq!(log_a.borrow().updates, 1);
        assert_eq!(log_b.borrow().updates, 1);
    }

    #[test]
    fn input_flows_into_queries_during_the_run() {
        struct ProbeGame {
            saw_key_down: Rc<RefCell<Vec<bool>>>,
        }

        impl Application for ProbeGame {
            fn initialize(&mut self, _context: &mut EngineContext<'_>) -> Result<(), GameError> {
                Ok(())
            }

            fn update(
                &mut self,
                context: &mut EngineContext<'_>,
                _delta_time: f32,
            ) -> Result<(), GameError> {
                self.saw_key_down
                    .borrow_mut()
                    .push(context.input().key_down(Key::W));
                Ok(())
            }

            fn render(
                &mut self,
                _context: &mut EngineContext<'_>,
                _delta_time: f32,
            ) -> Result<(), GameError> {
                Ok(())
            }

            fn on_resize(&mut self, _width: u32, _height: u32) {}
        }

        let saw_key_down = Rc::new(RefCell::new(Vec::new()));
        let game = ProbeGame {
            saw_key_down: Rc::clone(&saw_key_down),
        };
        let platform = HeadlessPlatform::new().with_script(vec![
            vec![],
            vec![PlatformEvent::Key {
                key: Key::W,
                pressed: true,
            }],
            vec![PlatformEvent::Key {
                key: Key::W,
                pressed: false,
            }],
        ]);
        let mut engine =
            Engine::with_platform(headless_config(), Box::new(game), Box::new(platform)).unwrap();

        engine.run().unwrap();

        assert_eq!(*saw_key_down.borrow(), vec![false, true, false]);
    }
}
