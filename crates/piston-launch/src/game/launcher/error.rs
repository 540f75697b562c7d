/// Error types for manifest parsing and launch orchestration
use std::path::PathBuf;

/// Failures while reading or interpreting a version manifest.
///
/// Only structurally required data produces these; optional fields fall back
/// to documented defaults instead.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to parse version manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version manifest is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid Maven coordinates: {coords}")]
    InvalidMavenCoordinate { coords: String },

    #[error("Failed to read version manifest at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Version manifest not found: {0:?}")]
    NotFound(PathBuf),
}

/// Failures raised by the authentication collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Session expired - please sign in again")]
    SessionExpired,

    #[error("No refresh token available for account {0}")]
    MissingRefreshToken(String),

    #[error("Authentication request failed: {0}")]
    Network(String),

    #[error("Failed to exchange for Minecraft token: {0}")]
    Exchange(String),
}

/// Registry-level rejections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Game {game_id} is already running for user {user_id}")]
    AlreadyRunning { game_id: String, user_id: String },

    #[error("No pending launch for game {game_id} and user {user_id}")]
    UnknownReservation { game_id: String, user_id: String },
}

/// Errors surfaced by a launch attempt.
///
/// Runtime crashes are never reported here; they travel through the
/// running-state events and the diagnostics collector.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Java executable not found: {0:?}")]
    JavaNotFound(PathBuf),

    #[error("Java executable is not executable: {0:?}")]
    JavaNotExecutable(PathBuf),

    #[error("Client jar not found: {0:?}")]
    MissingClientJar(PathBuf),

    #[error("Game profile {0} has no main class and no manifest to resolve one from")]
    MissingMainClass(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Credential validation failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Failed to persist refreshed credential: {0}")]
    CredentialPersist(#[source] anyhow::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to spawn game process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl LaunchError {
    /// Configuration problems are not worth retrying without user action.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LaunchError::JavaNotFound(_)
                | LaunchError::JavaNotExecutable(_)
                | LaunchError::MissingClientJar(_)
                | LaunchError::MissingMainClass(_)
        )
    }
}
