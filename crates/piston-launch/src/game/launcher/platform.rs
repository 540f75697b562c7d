/// Host platform description used for rule evaluation and path joining
use serde::{Deserialize, Serialize};

/// Operating system families as named by version manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Windows,
    #[serde(rename = "osx")]
    MacOS,
    Linux,
}

impl OsType {
    /// Detect the current OS
    pub fn current() -> Self {
        #[cfg(target_os = "windows")]
        return OsType::Windows;

        #[cfg(target_os = "macos")]
        return OsType::MacOS;

        #[cfg(target_os = "linux")]
        return OsType::Linux;

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        compile_error!("Unsupported operating system");
    }

    /// Get the OS name as a string (for rule matching)
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Windows => "windows",
            OsType::Linux => "linux",
            OsType::MacOS => "osx",
        }
    }

    /// Whether a manifest `os.name` value refers to this OS.
    /// Newer manifests and some loaders spell macOS as "macos".
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        match self {
            OsType::MacOS => name == "osx" || name == "macos",
            _ => name == self.as_str(),
        }
    }

    /// Get the classpath separator for this OS
    pub fn classpath_separator(&self) -> &'static str {
        match self {
            OsType::Windows => ";",
            _ => ":",
        }
    }
}

/// CPU architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86,
    X64,
    Arm32,
    Arm64,
}

impl Arch {
    /// Detect the current architecture
    pub fn current() -> Self {
        #[cfg(target_arch = "x86")]
        return Arch::X86;

        #[cfg(target_arch = "x86_64")]
        return Arch::X64;

        #[cfg(target_arch = "aarch64")]
        return Arch::Arm64;

        #[cfg(target_arch = "arm")]
        return Arch::Arm32;

        #[cfg(not(any(
            target_arch = "x86",
            target_arch = "x86_64",
            target_arch = "aarch64",
            target_arch = "arm"
        )))]
        compile_error!("Unsupported architecture");
    }

    /// Whether a manifest `os.arch` value refers to this architecture
    pub fn matches_name(&self, name: &str) -> bool {
        let normalized = match name.to_ascii_lowercase().as_str() {
            "x86" | "i386" | "i686" => Arch::X86,
            "x64" | "x86_64" | "amd64" => Arch::X64,
            "arm" | "arm32" => Arch::Arm32,
            "arm64" | "aarch64" => Arch::Arm64,
            _ => return false,
        };
        normalized == *self
    }
}

/// The runtime platform a library or argument rule is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: OsType,
    pub arch: Arch,
    /// Host OS version string matched against `os.version` regexes
    pub os_version: String,
}

impl Platform {
    pub fn new(os: OsType, arch: Arch, os_version: impl Into<String>) -> Self {
        Self {
            os,
            arch,
            os_version: os_version.into(),
        }
    }

    /// Probe the host
    pub fn current() -> Self {
        Self {
            os: OsType::current(),
            arch: Arch::current(),
            os_version: sysinfo::System::os_version().unwrap_or_default(),
        }
    }

    pub fn classpath_separator(&self) -> &'static str {
        self.os.classpath_separator()
    }
}
