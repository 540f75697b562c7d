#![allow(dead_code)]

use async_trait::async_trait;
use piston_launch::game::launcher::{
    AuthError, AuthService, Credential, DiagnosticsCollector, GameProfile, ProfileStore,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory profile store that records every write
#[derive(Default)]
pub struct MemoryProfileStore {
    pub games: Mutex<HashMap<String, GameProfile>>,
    pub running_updates: Mutex<Vec<(String, bool)>>,
    pub credentials: Mutex<Vec<Credential>>,
    pub fail_credential_update: bool,
}

impl MemoryProfileStore {
    pub fn with_game(profile: GameProfile) -> Self {
        let store = Self::default();
        store
            .games
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
        store
    }

    pub fn running_updates(&self) -> Vec<(String, bool)> {
        self.running_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_game(&self, id: &str) -> anyhow::Result<Option<GameProfile>> {
        Ok(self.games.lock().unwrap().get(id).cloned())
    }

    async fn update_running_state(&self, id: &str, running: bool) -> anyhow::Result<()> {
        self.running_updates
            .lock()
            .unwrap()
            .push((id.to_string(), running));
        Ok(())
    }

    async fn update_credential(&self, credential: &Credential) -> anyhow::Result<()> {
        if self.fail_credential_update {
            anyhow::bail!("profile store is read-only");
        }
        self.credentials.lock().unwrap().push(credential.clone());
        Ok(())
    }
}

/// Auth service returning a canned answer
pub enum StaticAuth {
    PassThrough,
    Refresh { access_token: String },
    Fail(AuthError),
}

#[async_trait]
impl AuthService for StaticAuth {
    async fn validate_and_refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        match self {
            StaticAuth::PassThrough => Ok(credential.clone()),
            StaticAuth::Refresh { access_token } => {
                let mut refreshed = credential.clone();
                refreshed.access_token = access_token.clone();
                refreshed.expires_at = Some(chrono::Utc::now() + chrono::Duration::hours(1));
                Ok(refreshed)
            }
            StaticAuth::Fail(e) => Err(e.clone()),
        }
    }
}

#[derive(Default)]
pub struct CountingDiagnostics {
    pub calls: AtomicUsize,
}

impl CountingDiagnostics {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DiagnosticsCollector for CountingDiagnostics {
    fn collect(&self, _game_id: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lay out a data dir with a vanilla client jar and an empty game dir
pub fn game_profile(root: &Path, id: &str, version: &str) -> GameProfile {
    let data = root.join("data");
    let game = root.join("instances").join(id);
    let version_dir = data.join("versions").join(version);
    std::fs::create_dir_all(&version_dir).unwrap();
    std::fs::write(version_dir.join(format!("{}.jar", version)), b"PK").unwrap();
    std::fs::create_dir_all(&game).unwrap();
    GameProfile::new(id, version, data, game)
}

/// Write `versions/<id>/<id>.json`
pub fn write_manifest(data_dir: &Path, id: &str, manifest: &serde_json::Value) {
    let dir = data_dir.join("versions").join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(format!("{}.json", id)),
        serde_json::to_string_pretty(manifest).unwrap(),
    )
    .unwrap();
}
