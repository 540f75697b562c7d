/// Process registry for tracking running game sessions
///
/// Every read and write goes through one async mutex. No I/O is awaited while
/// it is held: stop requests are a flag plus a channel send, and exit waits
/// happen on the session's own watch channel after the lock is released.
use crate::game::launcher::crash::SessionOutcome;
use crate::game::launcher::error::RegistryError;
use crate::game::launcher::error_detector::ErrorDetectorHandle;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, oneshot, watch, Mutex};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The same game may run once per user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub game_id: String,
    pub user_id: String,
}

impl SessionKey {
    pub fn new(game_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.game_id, self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    /// Slot held while credentials are checked and the process spawns
    Starting,
    #[serde(rename_all = "camelCase")]
    Running { pid: u32, started_at: DateTime<Utc> },
}

/// Proof of a pending launch, required to promote it to running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationToken(u64);

/// Running-state change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RunningStateEvent {
    Started { key: SessionKey, pid: u32 },
    Terminated { key: SessionKey, outcome: SessionOutcome },
}

/// Everything the registry needs to supervise a spawned process
pub struct LiveSession {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub stop_tx: oneshot::Sender<()>,
    pub exit_rx: watch::Receiver<Option<SessionOutcome>>,
    pub detector: Option<ErrorDetectorHandle>,
    pub reservation: Option<ReservationToken>,
}

struct SessionEntry {
    /// Changes on every insert, so a relaunch under the same key is a new entry
    generation: u64,
    state: SessionState,
    token: Option<ReservationToken>,
    manual_stop: bool,
    stop_tx: Option<oneshot::Sender<()>>,
    exit_rx: Option<watch::Receiver<Option<SessionOutcome>>>,
    detector: Option<ErrorDetectorHandle>,
}

/// Point-in-time view of a session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub key: SessionKey,
    pub state: SessionState,
    pub manually_stopped: bool,
    pub detector: Option<ErrorDetectorHandle>,
}

impl SessionSnapshot {
    pub fn pid(&self) -> Option<u32> {
        match self.state {
            SessionState::Running { pid, .. } => Some(pid),
            SessionState::Starting => None,
        }
    }

    pub fn had_error(&self) -> bool {
        self.detector.as_ref().is_some_and(|d| d.had_error())
    }
}

pub struct ProcessRegistry {
    sessions: Mutex<HashMap<SessionKey, SessionEntry>>,
    events: broadcast::Sender<RunningStateEvent>,
    next_token: AtomicU64,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sessions: Mutex::new(HashMap::new()),
            events,
            next_token: AtomicU64::new(1),
        }
    }

    fn next_generation(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    /// Hold the slot for `key` before any slow launch work starts
    pub async fn reserve(&self, key: &SessionKey) -> Result<ReservationToken, RegistryError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(key) {
            return Err(RegistryError::AlreadyRunning {
                game_id: key.game_id.clone(),
                user_id: key.user_id.clone(),
            });
        }

        let generation = self.next_generation();
        let token = ReservationToken(generation);
        sessions.insert(
            key.clone(),
            SessionEntry {
                generation,
                state: SessionState::Starting,
                token: Some(token),
                manual_stop: false,
                stop_tx: None,
                exit_rx: None,
                detector: None,
            },
        );
        log::debug!("[registry] Reserved {}", key);
        Ok(token)
    }

    /// Drop a reservation that never reached running (spawn failure)
    pub async fn release(&self, key: &SessionKey, token: ReservationToken) -> bool {
        let mut sessions = self.sessions.lock().await;
        let owned = sessions
            .get(key)
            .is_some_and(|e| e.state == SessionState::Starting && e.token == Some(token));
        if owned {
            sessions.remove(key);
            log::debug!("[registry] Released reservation for {}", key);
        }
        owned
    }

    /// Register a spawned process. Fails if another session for the same
    /// key exists, or if the reservation it claims was withdrawn.
    pub async fn register(&self, key: &SessionKey, session: LiveSession) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().await;

        let already_running = || RegistryError::AlreadyRunning {
            game_id: key.game_id.clone(),
            user_id: key.user_id.clone(),
        };

        match (sessions.get(key), session.reservation) {
            (None, None) => {}
            (None, Some(_)) => {
                return Err(RegistryError::UnknownReservation {
                    game_id: key.game_id.clone(),
                    user_id: key.user_id.clone(),
                })
            }
            (Some(entry), Some(token))
                if entry.state == SessionState::Starting && entry.token == Some(token) => {}
            (Some(_), _) => return Err(already_running()),
        }

        let pid = session.pid;
        let generation = self.next_generation();
        sessions.insert(
            key.clone(),
            SessionEntry {
                generation,
                state: SessionState::Running {
                    pid,
                    started_at: session.started_at,
                },
                token: session.reservation,
                manual_stop: false,
                stop_tx: Some(session.stop_tx),
                exit_rx: Some(session.exit_rx),
                detector: session.detector,
            },
        );
        drop(sessions);

        log::info!("[registry] Registered {} (PID {})", key, pid);
        Ok(())
    }

    pub async fn get(&self, key: &SessionKey) -> Option<SessionSnapshot> {
        let sessions = self.sessions.lock().await;
        sessions.get(key).map(|e| SessionSnapshot {
            key: key.clone(),
            state: e.state.clone(),
            manually_stopped: e.manual_stop,
            detector: e.detector.clone(),
        })
    }

    /// Flag the session as user-stopped, then signal its exit watcher.
    /// Only running sessions can be stopped; repeated calls return true
    /// without signalling again. Never waits for the process.
    pub async fn request_stop(&self, key: &SessionKey) -> bool {
        let mut sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get_mut(key) else {
            return false;
        };
        if !matches!(entry.state, SessionState::Running { .. }) {
            return false;
        }

        entry.manual_stop = true;
        if let Some(tx) = entry.stop_tx.take() {
            // Err means the watcher already finished; the flag still stands
            let _ = tx.send(());
            log::info!("[registry] Stop requested for {}", key);
        }
        true
    }

    pub async fn is_running(&self, key: &SessionKey) -> bool {
        let sessions = self.sessions.lock().await;
        sessions
            .get(key)
            .is_some_and(|e| matches!(e.state, SessionState::Running { .. }))
    }

    pub async fn is_manually_stopped(&self, key: &SessionKey) -> bool {
        let sessions = self.sessions.lock().await;
        sessions.get(key).is_some_and(|e| e.manual_stop)
    }

    /// Read and clear the manual-stop flag
    pub async fn take_manual_stop(&self, key: &SessionKey) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions
            .get_mut(key)
            .map(|e| std::mem::replace(&mut e.manual_stop, false))
            .unwrap_or(false)
    }

    /// Remove a session; returns its detector for after-the-fact queries
    pub async fn purge(&self, key: &SessionKey) -> Option<ErrorDetectorHandle> {
        let mut sessions = self.sessions.lock().await;
        let removed = sessions.remove(key)?;
        log::debug!("[registry] Purged {}", key);
        removed.detector
    }

    pub async fn sessions_for(&self, game_id: &str) -> Vec<SessionKey> {
        let sessions = self.sessions.lock().await;
        let mut keys: Vec<_> = sessions
            .keys()
            .filter(|k| k.game_id == game_id)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunningStateEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: RunningStateEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Stop every session of `game_id`, wait for their exits, then purge.
    /// Used before a game is deleted. Sessions that register while the
    /// exits are awaited are stopped on the next pass; returns once none
    /// are left.
    pub async fn remove_all_for(&self, game_id: &str) {
        loop {
            let mut waits = Vec::new();
            let mut stopped = Vec::new();
            {
                let mut sessions = self.sessions.lock().await;
                for (key, entry) in sessions.iter_mut().filter(|(k, _)| k.game_id == game_id) {
                    stopped.push((key.clone(), entry.generation));
                    if matches!(entry.state, SessionState::Running { .. }) {
                        entry.manual_stop = true;
                        if let Some(tx) = entry.stop_tx.take() {
                            let _ = tx.send(());
                        }
                    }
                    if let Some(rx) = entry.exit_rx.clone() {
                        waits.push(rx);
                    }
                }
            }

            if stopped.is_empty() {
                return;
            }

            log::info!(
                "[registry] Removing {} session(s) of {}; waiting for {} exit(s)",
                stopped.len(),
                game_id,
                waits.len()
            );

            futures::future::join_all(waits.into_iter().map(|mut rx| async move {
                // Err: the watcher is gone, which also means the process is
                let _ = rx.wait_for(|outcome| outcome.is_some()).await;
            }))
            .await;

            let mut sessions = self.sessions.lock().await;
            for (key, generation) in stopped {
                if sessions.get(&key).is_some_and(|e| e.generation == generation) {
                    sessions.remove(&key);
                }
            }
        }
    }
}
