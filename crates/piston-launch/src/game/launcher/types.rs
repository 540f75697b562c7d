/// Core types for game launching
use crate::game::launcher::crash::SessionOutcome;
use crate::game::launcher::error_detector::ErrorDetectorHandle;
use crate::game::launcher::registry::SessionKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::watch;

/// Modloader type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModloaderType {
    Vanilla,
    Fabric,
    Quilt,
    Forge,
    NeoForge,
}

impl ModloaderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModloaderType::Vanilla => "vanilla",
            ModloaderType::Fabric => "fabric",
            ModloaderType::Quilt => "quilt",
            ModloaderType::Forge => "forge",
            ModloaderType::NeoForge => "neoforge",
        }
    }
}

impl fmt::Display for ModloaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModloaderType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vanilla" | "none" => Ok(ModloaderType::Vanilla),
            "fabric" => Ok(ModloaderType::Fabric),
            "quilt" => Ok(ModloaderType::Quilt),
            "forge" => Ok(ModloaderType::Forge),
            "neoforge" => Ok(ModloaderType::NeoForge),
            other => anyhow::bail!("Unknown modloader type: {}", other),
        }
    }
}

/// Heap bounds in megabytes. `None` defers to the global settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBounds {
    pub min_mb: Option<u32>,
    pub max_mb: Option<u32>,
}

impl MemoryBounds {
    pub fn new(min_mb: u32, max_mb: u32) -> Self {
        Self {
            min_mb: Some(min_mb),
            max_mb: Some(max_mb),
        }
    }

    /// Fill unset bounds from `defaults`
    pub fn or(self, defaults: MemoryBounds) -> MemoryBounds {
        MemoryBounds {
            min_mb: self.min_mb.or(defaults.min_mb),
            max_mb: self.max_mb.or(defaults.max_mb),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Microsoft account; requires a fresh access token
    Msa,
    /// Offline / demo account
    Offline,
}

/// A validated user credential. Token values never appear in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub uuid: String,
    pub username: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub xuid: Option<String>,
    pub kind: AccountKind,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Offline credential with a zero token, as the vanilla launcher uses for demo play
    pub fn offline(username: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            username: username.into(),
            access_token: "0".to_string(),
            refresh_token: None,
            xuid: None,
            kind: AccountKind::Offline,
            expires_at: None,
        }
    }

    /// The user identifier half of a session key
    pub fn user_id(&self) -> &str {
        &self.uuid
    }

    pub fn is_online(&self) -> bool {
        self.kind == AccountKind::Msa
    }

    /// Token expires within `skew` of `now` (or has no recorded expiry)
    pub fn expires_within(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        match self.expires_at {
            Some(at) => at - skew <= now,
            None => true,
        }
    }

    /// Value for the `${user_type}` placeholder
    pub fn user_type(&self) -> &'static str {
        match self.kind {
            AccountKind::Msa => "msa",
            AccountKind::Offline => "legacy",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("uuid", &self.uuid)
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("xuid", &self.xuid)
            .field("kind", &self.kind)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// One configured installation, as persisted by the profile store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProfile {
    /// Unique identifier for this installation
    pub id: String,

    pub name: String,

    /// Minecraft version ID (e.g., "1.20.1")
    pub version_id: String,

    #[serde(default)]
    pub modloader: Option<ModloaderType>,

    #[serde(default)]
    pub modloader_version: Option<String>,

    /// Main class resolved at install time; the manifest's wins when absent
    #[serde(default)]
    pub main_class: Option<String>,

    /// Precomputed argument vector with secrets still as placeholders
    #[serde(default)]
    pub launch_command: Option<Vec<String>>,

    #[serde(default)]
    pub memory: MemoryBounds,

    /// Custom JVM arguments (appended after the manifest's)
    #[serde(default)]
    pub jvm_args: Vec<String>,

    /// Custom game arguments (appended to defaults)
    #[serde(default)]
    pub game_args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Java executable; settings default when unset
    #[serde(default)]
    pub java_path: Option<PathBuf>,

    /// Root data directory (libraries, assets, versions)
    pub data_dir: PathBuf,

    /// Instance-specific game directory
    pub game_dir: PathBuf,

    /// Loader installer output, separated by the platform classpath separator
    #[serde(default)]
    pub extra_classpath: Option<String>,

    #[serde(default)]
    pub window_width: Option<u32>,

    #[serde(default)]
    pub window_height: Option<u32>,

    #[serde(default)]
    pub is_running: bool,

    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
}

impl GameProfile {
    pub fn new(
        id: impl Into<String>,
        version_id: impl Into<String>,
        data_dir: PathBuf,
        game_dir: PathBuf,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version_id: version_id.into(),
            modloader: None,
            modloader_version: None,
            main_class: None,
            launch_command: None,
            memory: MemoryBounds::default(),
            jvm_args: Vec::new(),
            game_args: Vec::new(),
            env: BTreeMap::new(),
            java_path: None,
            data_dir,
            game_dir,
            extra_classpath: None,
            window_width: None,
            window_height: None,
            is_running: false,
            last_played: None,
        }
    }

    /// Get the path to the libraries directory
    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    /// Get the path to the assets directory
    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    /// Get the path to the versions directory
    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }

    /// Natives are shared per version and extracted by the installer
    pub fn natives_dir(&self) -> PathBuf {
        self.data_dir.join("natives").join(&self.version_id)
    }

    /// Where captured stdout/stderr is appended
    pub fn output_log_file(&self) -> PathBuf {
        self.game_dir.join("logs").join("launcher-output.log")
    }

    /// Canonical on-disk version id. Example: "fabric-loader-0.38.2-1.20.1".
    /// For vanilla launches this returns the raw minecraft version id.
    pub fn installed_version_id(&self) -> String {
        match (&self.modloader, &self.modloader_version) {
            (Some(loader), Some(loader_ver)) if *loader != ModloaderType::Vanilla => {
                format!("{}-loader-{}-{}", loader.as_str(), loader_ver, self.version_id)
            }
            _ => self.version_id.clone(),
        }
    }

    /// Prefer a modloader-installed JAR, falling back to the vanilla client
    pub fn client_jar_path(&self) -> PathBuf {
        let installed_id = self.installed_version_id();
        let installed_jar = self
            .versions_dir()
            .join(&installed_id)
            .join(format!("{}.jar", installed_id));

        if installed_id != self.version_id && installed_jar.exists() {
            return installed_jar;
        }

        self.versions_dir()
            .join(&self.version_id)
            .join(format!("{}.jar", self.version_id))
    }
}

/// Result of a successful spawn. Crashes are reported through `outcome`,
/// never as a launch error.
#[derive(Debug, Clone)]
pub struct LaunchResult {
    pub key: SessionKey,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub log_file: PathBuf,
    /// Resolves exactly once, when the process has exited and been purged
    pub outcome: watch::Receiver<Option<SessionOutcome>>,
    pub detector: ErrorDetectorHandle,
}

impl LaunchResult {
    /// Wait for the session to end. Returns `None` only if the supervisor
    /// task was dropped without reporting.
    pub async fn wait(&mut self) -> Option<SessionOutcome> {
        self.outcome
            .wait_for(|o| o.is_some())
            .await
            .ok()
            .and_then(|o| o.clone())
    }
}
