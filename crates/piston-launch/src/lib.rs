//! Launch orchestration for the Vesta launcher.
//!
//! Turns a version manifest and a configured game profile into a supervised
//! Java process: library filtering, classpath construction, argument
//! assembly, spawn-time credential substitution, per-(game, user) process
//! tracking and log-based failure detection.

pub mod auth;
pub mod config;
pub mod game;
pub mod utils;

pub use config::LauncherSettings;
pub use game::launcher::{
    GameProfile, LaunchError, LaunchResult, Launcher, ProcessRegistry, SessionKey, SessionOutcome,
};
