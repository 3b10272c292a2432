//! Keel testbed: a flying camera and a spinning demo object.
//!
//! Boots the engine with its default configuration and hands it the
//! [`CameraGame`]. Logging comes up inside the engine, so a failed boot
//! reports through the process exit code and the returned error.

mod game;

use keel_engine::{ApplicationConfig, Engine};

use crate::game::CameraGame;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ApplicationConfig::default();
    let mut engine = Engine::new(config, Box::new(CameraGame::new()))?;
    engine.run()?;
    Ok(())
}
