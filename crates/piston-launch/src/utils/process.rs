#[cfg(windows)]
use std::os::windows::process::CommandExt;

/// Extension trait for launcher-spawned commands.
pub trait PistonCommandExt {
    /// Hides the console window on Windows. No-op on other platforms.
    fn suppress_console(&mut self) -> &mut Self;
}

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

impl PistonCommandExt for tokio::process::Command {
    fn suppress_console(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            self.creation_flags(CREATE_NO_WINDOW);
        }
        self
    }
}

impl PistonCommandExt for std::process::Command {
    fn suppress_console(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            self.creation_flags(CREATE_NO_WINDOW);
        }
        self
    }
}

/// Ask a process to exit on its own: SIGTERM on Unix, WM_CLOSE to its
/// visible top-level window on Windows. Returns whether a request was delivered.
#[cfg(unix)]
pub fn request_graceful_exit(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("[process] SIGTERM to {} failed: {}", pid, e);
            false
        }
    }
}

#[cfg(windows)]
pub fn request_graceful_exit(pid: u32) -> bool {
    use windows_sys::Win32::UI::WindowsAndMessaging::{PostMessageW, WM_CLOSE};

    match find_main_window(pid) {
        Some(hwnd) => unsafe { PostMessageW(hwnd, WM_CLOSE, 0, 0) != 0 },
        None => {
            log::debug!("[process] No visible window for pid {}", pid);
            false
        }
    }
}

#[cfg(windows)]
fn find_main_window(pid: u32) -> Option<windows_sys::Win32::Foundation::HWND> {
    use windows_sys::Win32::Foundation::{HWND, LPARAM};
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowThreadProcessId, IsWindowVisible,
    };

    struct Search {
        pid: u32,
        found: Option<HWND>,
    }

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> i32 {
        let search = &mut *(lparam as *mut Search);
        let mut proc_id = 0u32;
        GetWindowThreadProcessId(hwnd, &mut proc_id);
        if proc_id == search.pid && IsWindowVisible(hwnd) != 0 {
            search.found = Some(hwnd);
            return 0;
        }
        1
    }

    let mut search = Search { pid, found: None };
    unsafe {
        EnumWindows(Some(enum_callback), &mut search as *mut Search as LPARAM);
    }
    search.found
}
