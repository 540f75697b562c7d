/// Process management and game launch orchestration
use crate::game::launcher::{
    arguments::{build_launch_command, render_template, CommandOptions},
    classpath::{create_classpath_jar, Classpath, ClasspathJar, WINDOWS_COMMAND_LINE_LIMIT},
    crash::{classify_exit, SessionOutcome},
    error::{LaunchError, ManifestError, RegistryError},
    error_detector::{
        spawn_detector, DetectedFailure, ErrorDetectorHandle, FirstMatchTrigger,
        DETECTOR_CHANNEL_CAPACITY,
    },
    registry::{LiveSession, ProcessRegistry, ReservationToken, RunningStateEvent, SessionKey},
    substitution::{resolve_placeholders, SpawnValues},
    traits::{AuthService, DiagnosticsCollector, ProfileStore, Settings},
    types::{Credential, GameProfile, LaunchResult},
    version_parser::{resolve_version_chain, VersionManifest},
};
use crate::utils::hardware::{clamp_heap, get_total_memory_mb};
use crate::utils::process::{request_graceful_exit, PistonCommandExt};
use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt};
use tokio::process::Child;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Log callback type - receives (game_id, line, stream_type)
/// stream_type is "stdout" or "stderr"
pub type LogCallback = Arc<dyn Fn(String, String, String) + Send + Sync + 'static>;

/// How long the supervisor waits for output pumps to drain after exit
const PUMP_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const DEFAULT_MIN_MEMORY_MB: u32 = 2048;
const DEFAULT_MAX_MEMORY_MB: u32 = 4096;

/// Per-attempt launch state, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    ValidatingCredential,
    ValidatingJavaRuntime,
    Spawning,
    Running,
    Terminated,
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaunchState::Idle => "idle",
            LaunchState::ValidatingCredential => "validating credential",
            LaunchState::ValidatingJavaRuntime => "validating java runtime",
            LaunchState::Spawning => "spawning",
            LaunchState::Running => "running",
            LaunchState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

fn transition(key: &SessionKey, state: LaunchState) {
    log::debug!("[launch] {} -> {}", key, state);
}

/// Check that `path` is an executable file and return its canonical form
pub fn verify_java(path: &Path) -> Result<PathBuf, LaunchError> {
    let meta =
        std::fs::metadata(path).map_err(|_| LaunchError::JavaNotFound(path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(LaunchError::JavaNotExecutable(path.to_path_buf()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(LaunchError::JavaNotExecutable(path.to_path_buf()));
        }
    }

    Ok(dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
}

/// Orchestrates launches: credential check, Java check, spawn, supervision.
///
/// Collaborators are injected; the registry is shared with whoever else
/// needs to query or stop sessions.
pub struct Launcher {
    registry: Arc<ProcessRegistry>,
    profiles: Arc<dyn ProfileStore>,
    auth: Arc<dyn AuthService>,
    settings: Arc<dyn Settings>,
    diagnostics: Arc<dyn DiagnosticsCollector>,
    options: CommandOptions,
    log_callback: Option<LogCallback>,
}

impl Launcher {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        profiles: Arc<dyn ProfileStore>,
        auth: Arc<dyn AuthService>,
        settings: Arc<dyn Settings>,
        diagnostics: Arc<dyn DiagnosticsCollector>,
    ) -> Self {
        let options = CommandOptions::new(settings.launcher_name(), settings.launcher_version());
        Self {
            registry,
            profiles,
            auth,
            settings,
            diagnostics,
            options,
            log_callback: None,
        }
    }

    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_log_callback(mut self, callback: LogCallback) -> Self {
        self.log_callback = Some(callback);
        self
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunningStateEvent> {
        self.registry.subscribe()
    }

    /// Ask a running session to stop. Returns immediately.
    pub async fn stop(&self, game_id: &str, user_id: &str) -> bool {
        self.registry.request_stop(&SessionKey::new(game_id, user_id)).await
    }

    pub async fn is_running(&self, game_id: &str, user_id: &str) -> bool {
        self.registry.is_running(&SessionKey::new(game_id, user_id)).await
    }

    /// Stop every session of a game before it is deleted
    pub async fn remove_game(&self, game_id: &str) {
        self.registry.remove_all_for(game_id).await;
    }

    /// Launch `profile` as `credential`.
    ///
    /// Returns once the process is spawned and registered. Failures before
    /// that point leave no session behind.
    pub async fn launch(
        &self,
        profile: &GameProfile,
        credential: Credential,
    ) -> Result<LaunchResult, LaunchError> {
        let key = SessionKey::new(profile.id.clone(), credential.user_id());
        transition(&key, LaunchState::Idle);
        log::info!(
            "[launch] Launching {} (version {}) for {}",
            profile.id,
            profile.version_id,
            credential.username
        );

        // Fail fast; the reservation below is the authoritative check
        if self.registry.get(&key).await.is_some() {
            return Err(RegistryError::AlreadyRunning {
                game_id: key.game_id.clone(),
                user_id: key.user_id.clone(),
            }
            .into());
        }

        transition(&key, LaunchState::ValidatingCredential);
        let credential = self.validate_credential(credential).await.map_err(|e| {
            log::error!("[launch] Credential validation failed for {}: {}", key, e);
            e
        })?;

        transition(&key, LaunchState::ValidatingJavaRuntime);
        let java = self.resolve_java(profile)?;
        log::debug!("[launch] Java: {:?}", java);

        transition(&key, LaunchState::Spawning);
        let token = self.registry.reserve(&key).await?;
        match self.spawn_session(profile, &credential, &java, &key, token).await {
            Ok(result) => {
                transition(&key, LaunchState::Running);
                Ok(result)
            }
            Err(e) => {
                self.registry.release(&key, token).await;
                log::error!("[launch] Failed to launch {}: {}", key, e);
                Err(e)
            }
        }
    }

    async fn validate_credential(&self, credential: Credential) -> Result<Credential, LaunchError> {
        if !credential.is_online() {
            return Ok(credential);
        }

        let refreshed = self.auth.validate_and_refresh(&credential).await?;
        let changed = refreshed.access_token != credential.access_token
            || refreshed.expires_at != credential.expires_at;
        if changed {
            self.profiles
                .update_credential(&refreshed)
                .await
                .map_err(LaunchError::CredentialPersist)?;
            log::info!("[launch] Persisted refreshed token for {}", refreshed.username);
        }
        Ok(refreshed)
    }

    fn resolve_java(&self, profile: &GameProfile) -> Result<PathBuf, LaunchError> {
        let candidate = profile
            .java_path
            .clone()
            .or_else(|| self.settings.default_java_path())
            .or_else(|| which::which("java").ok())
            .ok_or_else(|| LaunchError::JavaNotFound(PathBuf::from("java")))?;
        verify_java(&candidate)
    }

    /// Prefer the loader manifest when one is installed
    async fn load_manifest(&self, profile: &GameProfile) -> Result<VersionManifest, LaunchError> {
        let installed = profile.installed_version_id();
        if installed != profile.version_id {
            match resolve_version_chain(&installed, &profile.data_dir).await {
                Ok(manifest) => return Ok(manifest),
                Err(ManifestError::NotFound(path)) => log::debug!(
                    "[launch] No loader manifest at {:?}; using {}",
                    path,
                    profile.version_id
                ),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(resolve_version_chain(&profile.version_id, &profile.data_dir).await?)
    }

    /// Argument template with secrets still as placeholders
    async fn command_template(
        &self,
        profile: &GameProfile,
    ) -> Result<(Vec<String>, Option<Classpath>), LaunchError> {
        if let Some(template) = profile.launch_command.as_ref().filter(|c| !c.is_empty()) {
            let client_jar = profile.client_jar_path();
            if !client_jar.is_file() {
                return Err(LaunchError::MissingClientJar(client_jar));
            }
            return Ok((template.clone(), None));
        }

        let manifest = self.load_manifest(profile).await?;
        let command = build_launch_command(&manifest, profile, &self.options)?;
        Ok((command.args, Some(command.classpath)))
    }

    fn heap_bounds(&self, profile: &GameProfile) -> (u32, u32) {
        let bounds = profile.memory.or(self.settings.default_memory());
        clamp_heap(
            bounds.min_mb.unwrap_or(DEFAULT_MIN_MEMORY_MB),
            bounds.max_mb.unwrap_or(DEFAULT_MAX_MEMORY_MB),
            get_total_memory_mb(),
        )
    }

    fn first_match_trigger(&self, game_id: &str) -> Option<FirstMatchTrigger> {
        if !self.settings.automated_diagnostics_enabled() {
            return None;
        }
        let diagnostics = self.diagnostics.clone();
        let game_id = game_id.to_string();
        Some(Box::new(move |failure: &DetectedFailure| {
            log::info!(
                "[launch] {} matched {}; collecting diagnostics",
                game_id,
                failure.rule_id
            );
            diagnostics.collect(&game_id);
        }))
    }

    async fn spawn_session(
        &self,
        profile: &GameProfile,
        credential: &Credential,
        java: &Path,
        key: &SessionKey,
        token: ReservationToken,
    ) -> Result<LaunchResult, LaunchError> {
        let (mut template, classpath) = self.command_template(profile).await?;
        let (min_mb, max_mb) = self.heap_bounds(profile);
        log::debug!(
            "[launch] Command for {}: {:?} {}",
            key,
            java,
            render_template(&template)
        );

        let values = SpawnValues::new(credential, min_mb, max_mb);
        let mut resolved = resolve_placeholders(&template, &values);
        let mut classpath_jar = None;

        if cfg!(windows) && resolved.command_line_len() > WINDOWS_COMMAND_LINE_LIMIT {
            if let Some(classpath) = classpath.as_ref() {
                let tmp_dir = profile.data_dir.join("tmp");
                let jar = create_classpath_jar(classpath, &tmp_dir).map_err(|e| LaunchError::Io {
                    path: tmp_dir.clone(),
                    source: std::io::Error::other(e),
                })?;
                log::info!(
                    "[launch] Command line is {} chars; moving classpath into {:?}",
                    resolved.command_line_len(),
                    jar.path()
                );
                let joined = classpath.joined();
                let jar_arg = jar.path().to_string_lossy().to_string();
                for arg in template.iter_mut().filter(|a| **a == joined) {
                    *arg = jar_arg.clone();
                }
                resolved = resolve_placeholders(&template, &values);
                classpath_jar = Some(jar);
            }
        }
        drop(values);

        let log_file = profile.output_log_file();
        for dir in [Some(profile.game_dir.as_path()), log_file.parent()]
            .into_iter()
            .flatten()
        {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| LaunchError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let launch_started = SystemTime::now();
        let mut command = tokio::process::Command::new(java);
        command
            .args(resolved.iter())
            .current_dir(&profile.game_dir)
            .envs(&profile.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .suppress_console();

        log::info!("[launch] Spawning {}", key);
        let spawned = command.spawn();
        // The command keeps its own copy of the arguments
        drop(command);
        drop(resolved);
        let mut child = spawned.map_err(LaunchError::Spawn)?;

        let Some(pid) = child.id() else {
            return Err(LaunchError::Spawn(std::io::Error::other(
                "process exited before its id could be read",
            )));
        };
        log::info!("[launch] Game process started with PID: {}", pid);

        let (line_tx, line_rx) = mpsc::channel(DETECTOR_CHANNEL_CAPACITY);
        let detector = spawn_detector(
            line_rx,
            self.settings.error_detection_window(),
            self.first_match_trigger(&profile.id),
        );

        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump_output(
                stdout,
                "stdout",
                profile.id.clone(),
                log_file.clone(),
                self.log_callback.clone(),
                Some(line_tx.clone()),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_output(
                stderr,
                "stderr",
                profile.id.clone(),
                log_file.clone(),
                self.log_callback.clone(),
                Some(line_tx),
            )));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let started_at = Utc::now();

        let live = LiveSession {
            pid,
            started_at,
            stop_tx,
            exit_rx: exit_rx.clone(),
            detector: Some(detector.clone()),
            reservation: Some(token),
        };
        if let Err(e) = self.registry.register(key, live).await {
            detector.cancel();
            if let Err(kill_err) = child.start_kill() {
                log::warn!("[launch] Failed to kill unregistered PID {}: {}", pid, kill_err);
            }
            return Err(e.into());
        }

        if let Err(e) = self.profiles.update_running_state(&profile.id, true).await {
            log::warn!("[launch] Failed to mark {} as running: {}", profile.id, e);
        }
        self.registry.publish(RunningStateEvent::Started {
            key: key.clone(),
            pid,
        });

        let supervisor = SessionSupervisor {
            registry: self.registry.clone(),
            profiles: self.profiles.clone(),
            settings: self.settings.clone(),
            diagnostics: self.diagnostics.clone(),
            key: key.clone(),
            pid,
            launch_started,
            detector: detector.clone(),
            _classpath_jar: classpath_jar,
        };
        tokio::spawn(supervisor.run(child, stop_rx, pumps, exit_tx));

        Ok(LaunchResult {
            key: key.clone(),
            pid,
            started_at,
            log_file,
            outcome: exit_rx,
            detector,
        })
    }
}

/// Copy one output stream to the log file, the callback and the detector
async fn pump_output<R>(
    stream: R,
    stream_type: &'static str,
    game_id: String,
    log_file: PathBuf,
    callback: Option<LogCallback>,
    mut detector: Option<mpsc::Sender<String>>,
) where
    R: AsyncRead + Unpin,
{
    let mut file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .await
    {
        Ok(file) => Some(file),
        Err(e) => {
            log::warn!("[launch] Cannot open {:?} for {}: {}", log_file, stream_type, e);
            None
        }
    };

    let mut lines = tokio::io::BufReader::new(stream).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::debug!("[launch] {} {} read ended: {}", game_id, stream_type, e);
                break;
            }
        };

        if let Some(f) = file.as_mut() {
            let written = async {
                f.write_all(line.as_bytes()).await?;
                f.write_all(b"\n").await
            }
            .await;
            if let Err(e) = written {
                log::warn!("[launch] Stopped writing {:?}: {}", log_file, e);
                file = None;
            }
        }

        if let Some(tx) = detector.as_ref() {
            // Err: the detector detached
            if tx.send(line.clone()).await.is_err() {
                detector = None;
            }
        }

        if let Some(cb) = callback.as_ref() {
            cb(game_id.clone(), line, stream_type.to_string());
        }
    }

    if let Some(mut f) = file {
        let _ = f.flush().await;
    }
}

enum Wake {
    Exited(std::io::Result<ExitStatus>),
    StopRequested,
    Detached,
}

/// Owns a spawned child until it exits, then runs the termination sequence
struct SessionSupervisor {
    registry: Arc<ProcessRegistry>,
    profiles: Arc<dyn ProfileStore>,
    settings: Arc<dyn Settings>,
    diagnostics: Arc<dyn DiagnosticsCollector>,
    key: SessionKey,
    pid: u32,
    launch_started: SystemTime,
    detector: ErrorDetectorHandle,
    /// Deleted once the session ends
    _classpath_jar: Option<ClasspathJar>,
}

impl SessionSupervisor {
    async fn run(
        self,
        mut child: Child,
        mut stop_rx: oneshot::Receiver<()>,
        pumps: Vec<JoinHandle<()>>,
        exit_tx: watch::Sender<Option<SessionOutcome>>,
    ) {
        let wake = tokio::select! {
            status = child.wait() => Wake::Exited(status),
            signal = &mut stop_rx => match signal {
                Ok(()) => Wake::StopRequested,
                // Registry dropped the sender without a stop request
                Err(_) => Wake::Detached,
            },
        };
        let status = match wake {
            Wake::Exited(status) => status,
            Wake::StopRequested => {
                stop_child(&mut child, self.pid, self.settings.stop_grace_period()).await
            }
            Wake::Detached => child.wait().await,
        };

        let exit_code = match &status {
            Ok(status) => status.code(),
            Err(e) => {
                log::warn!("[launch] Failed to wait for PID {}: {}", self.pid, e);
                None
            }
        };
        log::info!("[launch] {} (PID {}) exited with {:?}", self.key, self.pid, exit_code);

        // Closed pipes end the detector once it has seen every line
        let drained = tokio::time::timeout(PUMP_DRAIN_TIMEOUT, async {
            futures::future::join_all(pumps).await;
            self.detector.wait_detached().await;
        })
        .await;
        if drained.is_err() {
            log::debug!("[launch] Output of {} still open after exit", self.key);
            self.detector.cancel();
        }

        let outcome = self.terminate(exit_code).await;
        exit_tx.send_replace(Some(outcome));
    }

    async fn terminate(&self, exit_code: Option<i32>) -> SessionOutcome {
        let game_id = self.key.game_id.clone();

        let outcome = if self.registry.take_manual_stop(&self.key).await {
            SessionOutcome::ManuallyStopped
        } else {
            let game_dir = match self.profiles.get_game(&game_id).await {
                Ok(Some(profile)) => Some(profile.game_dir),
                Ok(None) => None,
                Err(e) => {
                    log::warn!("[launch] Cannot read profile {}: {}", game_id, e);
                    None
                }
            };
            let started = self.launch_started;
            tokio::task::spawn_blocking(move || classify_exit(exit_code, game_dir.as_deref(), started))
                .await
                .unwrap_or_else(|e| {
                    log::warn!("[launch] Crash classification task failed: {}", e);
                    classify_exit(exit_code, None, started)
                })
        };

        if outcome.is_crash() {
            log::warn!("[launch] {} crashed: {:?}", self.key, outcome);
            if self.settings.automated_diagnostics_enabled() {
                self.diagnostics.collect(&game_id);
            }
        }

        if let Err(e) = self.profiles.update_running_state(&game_id, false).await {
            log::warn!("[launch] Failed to clear running state of {}: {}", game_id, e);
        }
        self.registry.purge(&self.key).await;
        self.registry.publish(RunningStateEvent::Terminated {
            key: self.key.clone(),
            outcome: outcome.clone(),
        });
        transition(&self.key, LaunchState::Terminated);
        outcome
    }
}

/// Graceful request, then a forced kill once `grace` runs out
async fn stop_child(child: &mut Child, pid: u32, grace: Duration) -> std::io::Result<ExitStatus> {
    if request_graceful_exit(pid) {
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => return status,
            Err(_) => log::warn!(
                "[launch] PID {} still running {:?} after stop request; killing",
                pid,
                grace
            ),
        }
    }
    child.kill().await?;
    child.wait().await
}
