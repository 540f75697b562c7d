/// Exit classification: manual stop, clean exit, or crash
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// A crash report written this recently before exit belongs to this session
pub const CRASH_REPORT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionOutcome {
    ManuallyStopped,
    NormalExit,
    #[serde(rename_all = "camelCase")]
    Crashed {
        exit_code: Option<i32>,
        crash_report: Option<PathBuf>,
    },
}

impl SessionOutcome {
    pub fn is_crash(&self) -> bool {
        matches!(self, SessionOutcome::Crashed { .. })
    }
}

fn created_or_modified(meta: &fs::Metadata) -> Option<SystemTime> {
    meta.created().or_else(|_| meta.modified()).ok()
}

/// Newest `crash-*.txt` in a crash-reports directory.
/// `Err` when the directory exists but cannot be listed.
pub fn find_latest_crash_report(
    crash_reports_dir: &Path,
) -> std::io::Result<Option<(PathBuf, SystemTime)>> {
    let entries = match fs::read_dir(crash_reports_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut latest: Option<(PathBuf, SystemTime)> = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with("crash-") && name.ends_with(".txt")) {
            continue;
        }
        let Some(time) = entry.metadata().ok().as_ref().and_then(created_or_modified) else {
            continue;
        };
        if latest.as_ref().map_or(true, |(_, t)| time > *t) {
            latest = Some((entry.path(), time));
        }
    }
    Ok(latest)
}

/// JVM fatal error log (`hs_err_pid*.log`) written since the launch started
pub fn find_jvm_crash_log(game_dir: &Path, launch_started: SystemTime) -> Option<PathBuf> {
    let entries = fs::read_dir(game_dir).ok()?;
    entries.flatten().find_map(|entry| {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with("hs_err_pid") && name.ends_with(".log")) {
            return None;
        }
        let time = entry.metadata().ok().as_ref().and_then(created_or_modified)?;
        (time >= launch_started).then(|| entry.path())
    })
}

fn within_window(time: SystemTime, now: SystemTime) -> bool {
    match now.duration_since(time) {
        Ok(age) => age <= CRASH_REPORT_WINDOW,
        // Timestamp slightly ahead of our clock
        Err(_) => true,
    }
}

/// Classify an exit that was not user-initiated.
///
/// A non-zero (or missing) exit code is a crash. Exit code 0 is a crash only
/// when the game left crash evidence. `game_dir == None` means the profile
/// could not be read, and classification falls back to the exit code alone.
pub fn classify_exit(
    exit_code: Option<i32>,
    game_dir: Option<&Path>,
    launch_started: SystemTime,
) -> SessionOutcome {
    classify_exit_at(exit_code, game_dir, launch_started, SystemTime::now())
}

pub fn classify_exit_at(
    exit_code: Option<i32>,
    game_dir: Option<&Path>,
    launch_started: SystemTime,
    now: SystemTime,
) -> SessionOutcome {
    let report = game_dir.and_then(|dir| {
        match find_latest_crash_report(&dir.join("crash-reports")) {
            Ok(found) => found,
            Err(e) => {
                log::warn!(
                    "[crash] Cannot read crash reports in {:?} ({}); using exit code only",
                    dir,
                    e
                );
                None
            }
        }
    });
    let recent_report = report
        .filter(|(_, time)| within_window(*time, now))
        .map(|(path, _)| path);

    if exit_code != Some(0) {
        return SessionOutcome::Crashed {
            exit_code,
            crash_report: recent_report,
        };
    }

    if let Some(path) = recent_report {
        log::info!("[crash] Exit code 0 but crash report {:?} was written", path);
        return SessionOutcome::Crashed {
            exit_code,
            crash_report: Some(path),
        };
    }

    if let Some(hs_err) = game_dir.and_then(|dir| find_jvm_crash_log(dir, launch_started)) {
        log::info!("[crash] Exit code 0 but JVM fatal error log {:?} exists", hs_err);
        return SessionOutcome::Crashed {
            exit_code,
            crash_report: Some(hs_err),
        };
    }

    SessionOutcome::NormalExit
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn game_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("crash-reports")).unwrap();
        tmp
    }

    #[test]
    fn non_zero_exit_is_crash() {
        let tmp = game_dir();
        let outcome = classify_exit(Some(1), Some(tmp.path()), SystemTime::now());
        assert_eq!(
            outcome,
            SessionOutcome::Crashed {
                exit_code: Some(1),
                crash_report: None
            }
        );
        assert!(classify_exit(None, None, SystemTime::now()).is_crash());
    }

    #[test]
    fn clean_exit_without_report_is_normal() {
        let tmp = game_dir();
        let started = SystemTime::now();
        assert_eq!(
            classify_exit(Some(0), Some(tmp.path()), started),
            SessionOutcome::NormalExit
        );
    }

    #[test]
    fn clean_exit_with_fresh_report_is_crash() {
        let tmp = game_dir();
        let started = SystemTime::now() - Duration::from_secs(60);
        let report = tmp
            .path()
            .join("crash-reports")
            .join("crash-2024-01-01_00.00.00-client.txt");
        fs::write(&report, "---- Minecraft Crash Report ----").unwrap();

        let outcome = classify_exit(Some(0), Some(tmp.path()), started);
        assert_eq!(
            outcome,
            SessionOutcome::Crashed {
                exit_code: Some(0),
                crash_report: Some(report)
            }
        );
    }

    #[test]
    fn stale_report_is_ignored() {
        let tmp = game_dir();
        let report = tmp.path().join("crash-reports").join("crash-old.txt");
        fs::write(&report, "old").unwrap();
        let later = SystemTime::now() + Duration::from_secs(10 * 60);
        assert_eq!(
            classify_exit_at(Some(0), Some(tmp.path()), SystemTime::now(), later),
            SessionOutcome::NormalExit
        );
    }

    #[test]
    fn non_report_files_are_ignored() {
        let tmp = game_dir();
        fs::write(tmp.path().join("crash-reports").join("notes.md"), "x").unwrap();
        assert_eq!(
            classify_exit(Some(0), Some(tmp.path()), SystemTime::now()),
            SessionOutcome::NormalExit
        );
    }

    #[test]
    fn hs_err_since_launch_is_crash() {
        let tmp = game_dir();
        let started = SystemTime::now() - Duration::from_secs(5);
        fs::write(tmp.path().join("hs_err_pid4242.log"), "# A fatal error").unwrap();
        assert!(classify_exit(Some(0), Some(tmp.path()), started).is_crash());
    }

    #[test]
    fn missing_game_dir_falls_back_to_exit_code() {
        let missing = Path::new("/definitely/not/a/real/game/dir");
        assert_eq!(
            classify_exit(Some(0), Some(missing), SystemTime::now()),
            SessionOutcome::NormalExit
        );
        assert_eq!(
            classify_exit(Some(0), None, SystemTime::now()),
            SessionOutcome::NormalExit
        );
    }
}
