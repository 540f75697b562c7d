pub mod launcher;

// Re-export commonly used types
pub use launcher::{Credential, GameProfile, LaunchResult, Launcher, ModloaderType};
