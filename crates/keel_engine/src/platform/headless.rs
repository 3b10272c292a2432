//! Scripted platform for tests and display-less environments.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::application::ApplicationConfig;

use super::{Platform, PlatformError, PlatformEvent};

/// A platform with no window: time is synthetic, and each message pump pops
/// one scripted frame of events.
///
/// Once the script drains, every further pump returns a close request so
/// loops driven by this platform always terminate.
pub struct HeadlessPlatform {
    started: bool,
    fail_startup: bool,
    fail_pump_after: Option<u64>,
    time: f64,
    time_step: f64,
    framebuffer: (u32, u32),
    script: VecDeque<Vec<PlatformEvent>>,
    pump_count: u64,
    slept_ms: Rc<Cell<u64>>,
}

impl HeadlessPlatform {
    /// A platform with an empty script and a 4 ms synthetic frame step.
    pub fn new() -> Self {
        Self {
            started: false,
            fail_startup: false,
            fail_pump_after: None,
            time: 0.0,
            time_step: 0.004,
            framebuffer: (0, 0),
            script: VecDeque::new(),
            pump_count: 0,
            slept_ms: Rc::new(Cell::new(0)),
        }
    }

    /// A platform whose `startup` fails, for boot-abort tests.
    pub fn failing() -> Self {
        Self {
            fail_startup: true,
            ..Self::new()
        }
    }

    /// Queues `frames`; pump `n` returns the `n`-th frame of events.
    pub fn with_script(mut self, frames: Vec<Vec<PlatformEvent>>) -> Self {
        self.script = frames.into();
        self
    }

    /// Sets how far `absolute_time` advances per pump.
    pub fn with_time_step(mut self, seconds: f64) -> Self {
        self.time_step = seconds;
        self
    }

    /// Makes every pump past the first `pumps` fail, for loop-abort tests.
    pub fn with_pump_failure(mut self, pumps: u64) -> Self {
        self.fail_pump_after = Some(pumps);
        self
    }

    /// Number of message pumps served so far.
    pub fn pump_count(&self) -> u64 {
        self.pump_count
    }

    /// Total milliseconds of requested sleep.
    pub fn slept_ms(&self) -> u64 {
        self.slept_ms.get()
    }

    /// Shared sleep counter, observable after the platform moves away.
    pub fn sleep_recorder(&self) -> Rc<Cell<u64>> {
        Rc::clone(&self.slept_ms)
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HeadlessPlatform {
    fn startup(&mut self, config: &ApplicationConfig) -> Result<(), PlatformError> {
        if self.fail_startup {
            return Err(PlatformError::InitializationFailed(
                "scripted startup failure".to_string(),
            ));
        }
        self.started = true;
        self.framebuffer = (config.width, config.height);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.started = false;
    }

    fn pump_messages(&mut self) -> Result<Vec<PlatformEvent>, PlatformError> {
        if !self.started {
            return Err(PlatformError::NotStarted);
        }
        if self.fail_pump_after.map_or(false, |n| self.pump_count >= n) {
            return Err(PlatformError::InitializationFailed(
                "scripted pump failure".to_string(),
            ));
        }
        self.pump_count += 1;
        self.time += self.time_step;
        Ok(self
            .script
            .pop_front()
            .unwrap_or_else(|| vec![PlatformEvent::CloseRequested]))
    }

    fn absolute_time(&self) -> f64 {
        self.time
    }

    fn sleep(&self, ms: u64) {
        self.slept_ms.set(self.slept_ms.get() + ms);
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer
    }

    fn required_vulkan_extensions(&self) -> Result<Vec<String>, PlatformError> {
        Err(PlatformError::Unsupported(
            "headless platform has no presentation support",
        ))
    }

    fn create_vulkan_surface(
        &mut self,
        _instance: ash::vk::Instance,
    ) -> Result<ash::vk::SurfaceKHR, PlatformError> {
        Err(PlatformError::Unsupported(
            "headless platform has no presentation support",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ApplicationConfig {
        ApplicationConfig::default()
    }

    #[test]
    fn scripted_frames_pop_in_order_then_close() {
        let mut platform = HeadlessPlatform::new().with_script(vec![
            vec![PlatformEvent::MouseWheel { delta: 1 }],
            vec![],
        ]);
        platform.startup(&config()).unwrap();

        assert_eq!(
            platform.pump_messages().unwrap(),
            vec![PlatformEvent::MouseWheel { delta: 1 }]
        );
        assert_eq!(platform.pump_messages().unwrap(), vec![]);
        assert_eq!(
            platform.pump_messages().unwrap(),
            vec![PlatformEvent::CloseRequested]
        );
        assert_eq!(platform.pump_count(), 3);
    }

    #[test]
    fn time_advances_per_pump() {
        let mut platform = HeadlessPlatform::new().with_time_step(0.5);
        platform.startup(&config()).unwrap();

        let before = platform.absolute_time();
        platform.pump_messages().unwrap();
        platform.pump_messages().unwrap();
        assert!((platform.absolute_time() - before - 1.0).abs() < 1e-9);
    }

    #[test]
    fn failing_platform_refuses_startup() {
        let mut platform = HeadlessPlatform::failing();
        assert!(matches!(
            platform.startup(&config()),
            Err(PlatformError::InitializationFailed(_))
        ));
    }

    #[test]
    fn pump_before_startup_is_an_error() {
        let mut platform = HeadlessPlatform::new();
        assert!(matches!(
            platform.pump_messages(),
            Err(PlatformError::NotStarted)
        ));
    }

    #[test]
    fn scripted_pump_failure_fires_after_the_budget() {
        let mut platform = HeadlessPlatform::new().with_pump_failure(1);
        platform.startup(&config()).unwrap();

        assert!(platform.pump_messages().is_ok());
        assert!(matches!(
            platform.pump_messages(),
            Err(PlatformError::InitializationFailed(_))
        ));
    }
}
