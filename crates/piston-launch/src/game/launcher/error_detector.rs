/// Early-failure detection on live game output
///
/// A detector task watches the output lines of a freshly spawned game for a
/// bounded window and records known-fatal signatures, even when the process
/// keeps running. Each rule is recorded at most once per session; the first
/// match of a session fires the diagnostics trigger exactly once.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_DETECTION_WINDOW: Duration = Duration::from_secs(600);

/// Lines queued between the output pumps and the detector
pub const DETECTOR_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    GpuDriver,
    DuplicateMods,
    MixinFailure,
    IncompatibleMods,
    MissingDependency,
    JavaVersion,
    OutOfMemory,
    LoaderError,
    RuntimeException,
}

impl FailureCategory {
    pub fn description(&self) -> &'static str {
        match self {
            FailureCategory::GpuDriver => "Graphics driver does not support the required OpenGL version",
            FailureCategory::DuplicateMods => "The same mod is installed more than once",
            FailureCategory::MixinFailure => "A mod failed to apply its mixins",
            FailureCategory::IncompatibleMods => "Installed mods are incompatible with each other",
            FailureCategory::MissingDependency => "A mod is missing a required dependency",
            FailureCategory::JavaVersion => "The selected Java runtime is too old for this version",
            FailureCategory::OutOfMemory => "The game ran out of memory",
            FailureCategory::LoaderError => "The mod loader reported a fatal error",
            FailureCategory::RuntimeException => "The game reported an unhandled exception",
        }
    }
}

pub struct FailureRule {
    pub id: &'static str,
    pub category: FailureCategory,
    pub pattern: Regex,
}

impl std::fmt::Debug for FailureRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureRule")
            .field("id", &self.id)
            .field("category", &self.category)
            .finish()
    }
}

fn rule(id: &'static str, category: FailureCategory, pattern: &str) -> Option<FailureRule> {
    match Regex::new(pattern) {
        Ok(pattern) => Some(FailureRule {
            id,
            category,
            pattern,
        }),
        Err(e) => {
            log::error!("[detector] Failure rule {} does not compile: {}", id, e);
            None
        }
    }
}

/// Compiled once per process
pub static FAILURE_RULES: Lazy<Vec<FailureRule>> = Lazy::new(|| {
    use FailureCategory::*;
    [
        rule("pixel_format", GpuDriver, r"Pixel format not accelerated"),
        rule("glfw_65542", GpuDriver, r"GLFW error 65542|WGL: The driver does not appear to support OpenGL"),
        rule(
            "opengl_unsupported",
            GpuDriver,
            r"(?i)OpenGL [0-9.]+ (?:is )?not supported|Could not create OpenGL context",
        ),
        rule(
            "driver_access_violation",
            GpuDriver,
            r"(?i)\[(?:atio6axx|atioglxx|ig[0-9a-z]+icd(?:32|64)|nvoglv(?:32|64))\.dll\+",
        ),
        rule(
            "duplicate_mods",
            DuplicateMods,
            r"(?i)duplicate mods? found|DuplicateModsFoundException|Mod ID '[^']+' is already used",
        ),
        rule(
            "mixin_apply",
            MixinFailure,
            r"Mixin apply(?:ing)? for mod \S+ failed|MixinApplyError|InvalidMixinException|Mixin transformation of \S+ failed",
        ),
        rule("incompatible_mods", IncompatibleMods, r"Incompatible mods? (?:found|set)!"),
        rule(
            "missing_dependency",
            MissingDependency,
            r"which is missing!|Missing or unsupported mandatory dependencies|MissingModsException",
        ),
        rule(
            "class_version",
            JavaVersion,
            r"UnsupportedClassVersionError|has been compiled by a more recent version of the Java Runtime",
        ),
        rule("out_of_memory", OutOfMemory, r"java\.lang\.OutOfMemoryError"),
        rule(
            "formatted_exception",
            LoaderError,
            r"net\.(?:fabricmc|quiltmc)\.loader\.impl\.FormattedException",
        ),
        rule("reported_exception", RuntimeException, r"Reported exception thrown!"),
    ]
    .into_iter()
    .flatten()
    .collect()
});

/// One recorded rule match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedFailure {
    pub rule_id: &'static str,
    pub category: FailureCategory,
    pub line: String,
}

/// Callback fired on the first match of a session
pub type FirstMatchTrigger = Box<dyn FnOnce(&DetectedFailure) + Send + 'static>;

#[derive(Debug, Default)]
struct DetectorState {
    had_error: AtomicBool,
    attached: AtomicBool,
    matches: Mutex<Vec<DetectedFailure>>,
}

/// Query handle. Results stay available after the detector detaches.
#[derive(Debug, Clone)]
pub struct ErrorDetectorHandle {
    state: Arc<DetectorState>,
    cancel: CancellationToken,
    detached: CancellationToken,
}

impl ErrorDetectorHandle {
    pub fn had_error(&self) -> bool {
        self.state.had_error.load(Ordering::SeqCst)
    }

    pub fn matched_rules(&self) -> Vec<DetectedFailure> {
        self.state
            .matches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_attached(&self) -> bool {
        self.state.attached.load(Ordering::SeqCst)
    }

    /// Detach early; the output stream is released once the task notices
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the detector has stopped reading
    pub async fn wait_detached(&self) {
        self.detached.cancelled().await;
    }
}

struct Matcher<'r> {
    rules: &'r [FailureRule],
    state: Arc<DetectorState>,
    trigger: Option<FirstMatchTrigger>,
}

impl Matcher<'_> {
    fn observe(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        for rule in self.rules {
            if !rule.pattern.is_match(line) {
                continue;
            }

            let failure = {
                let mut matches = self.state.matches.lock().unwrap_or_else(|e| e.into_inner());
                if matches.iter().any(|m| m.rule_id == rule.id) {
                    continue;
                }
                let failure = DetectedFailure {
                    rule_id: rule.id,
                    category: rule.category,
                    line: line.trim().to_string(),
                };
                matches.push(failure.clone());
                failure
            };

            self.state.had_error.store(true, Ordering::SeqCst);
            log::warn!(
                "[detector] {} ({}): {}",
                rule.id,
                rule.category.description(),
                failure.line
            );

            if let Some(trigger) = self.trigger.take() {
                trigger(&failure);
            }
        }
    }
}

/// Start a detector over `lines` using the built-in rule table.
pub fn spawn_detector(
    lines: mpsc::Receiver<String>,
    window: Duration,
    on_first_match: Option<FirstMatchTrigger>,
) -> ErrorDetectorHandle {
    spawn_detector_with_rules(&FAILURE_RULES, lines, window, on_first_match)
}

pub fn spawn_detector_with_rules(
    rules: &'static [FailureRule],
    mut lines: mpsc::Receiver<String>,
    window: Duration,
    on_first_match: Option<FirstMatchTrigger>,
) -> ErrorDetectorHandle {
    let state = Arc::new(DetectorState::default());
    state.attached.store(true, Ordering::SeqCst);
    let cancel = CancellationToken::new();
    let detached = CancellationToken::new();

    let handle = ErrorDetectorHandle {
        state: state.clone(),
        cancel: cancel.clone(),
        detached: detached.clone(),
    };

    tokio::spawn(async move {
        let deadline = tokio::time::Instant::now() + window;
        let mut matcher = Matcher {
            rules,
            state: state.clone(),
            trigger: on_first_match,
        };

        let reason = loop {
            tokio::select! {
                _ = cancel.cancelled() => break "cancelled",
                _ = tokio::time::sleep_until(deadline) => break "window elapsed",
                line = lines.recv() => match line {
                    Some(line) => matcher.observe(&line),
                    None => break "output closed",
                },
            }
        };

        // Closing the receiver tells the output pumps to stop forwarding
        lines.close();
        drop(lines);
        state.attached.store(false, Ordering::SeqCst);
        detached.cancel();
        log::debug!("[detector] Detached ({})", reason);
    });

    handle
}
