/// Game launcher module: manifest resolution, command building, supervision
pub mod arguments;
pub mod classpath;
pub mod crash;
pub mod error;
pub mod error_detector;
pub mod platform;
pub mod process;
pub mod registry;
pub mod rules;
pub mod substitution;
pub mod traits;
pub mod types;
pub mod version_parser;

// Re-export commonly used types
pub use arguments::{build_launch_command, CommandOptions, LaunchCommand};
pub use classpath::{build_classpath, maven_to_path, Classpath};
pub use crash::{classify_exit, SessionOutcome};
pub use error::{AuthError, LaunchError, ManifestError, RegistryError};
pub use error_detector::{spawn_detector, DetectedFailure, ErrorDetectorHandle, FailureCategory};
pub use platform::{Arch, OsType, Platform};
pub use process::{verify_java, LaunchState, Launcher, LogCallback};
pub use registry::{ProcessRegistry, RunningStateEvent, SessionKey, SessionSnapshot};
pub use rules::{FeatureFlags, LibraryFilter, LoaderContext};
pub use traits::{AuthService, DiagnosticsCollector, ProfileStore, Settings};
pub use types::{AccountKind, Credential, GameProfile, LaunchResult, MemoryBounds, ModloaderType};
pub use version_parser::{
    parse_version_json, resolve_version_chain, Argument, Arguments, Library, VersionManifest,
};
