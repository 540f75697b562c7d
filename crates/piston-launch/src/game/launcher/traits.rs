/// Collaborators the launcher consumes but does not own
use crate::game::launcher::error::AuthError;
use crate::game::launcher::types::{Credential, GameProfile, MemoryBounds};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Persistent game/profile registry
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_game(&self, id: &str) -> anyhow::Result<Option<GameProfile>>;

    async fn update_running_state(&self, id: &str, running: bool) -> anyhow::Result<()>;

    /// Persist a refreshed credential so later launches do not reuse a stale token
    async fn update_credential(&self, credential: &Credential) -> anyhow::Result<()>;
}

/// Token validation and refresh for online accounts
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn validate_and_refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;
}

/// Read-only launcher preferences
pub trait Settings: Send + Sync {
    fn default_memory(&self) -> MemoryBounds;

    fn default_java_path(&self) -> Option<PathBuf>;

    fn automated_diagnostics_enabled(&self) -> bool;

    fn error_detection_window(&self) -> Duration {
        Duration::from_secs(600)
    }

    fn stop_grace_period(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn launcher_name(&self) -> String {
        "VestaLauncher".to_string()
    }

    fn launcher_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

/// Log/crash collection. Fire-and-forget from the launcher's point of view.
pub trait DiagnosticsCollector: Send + Sync {
    fn collect(&self, game_id: &str);
}
