/// Argument builder for Minecraft launcher
///
/// Produces the launch command template: everything is resolved except the
/// credential and heap placeholders, which stay as `${...}` until spawn time.
use crate::game::launcher::classpath::{build_classpath, Classpath};
use crate::game::launcher::error::LaunchError;
use crate::game::launcher::platform::{OsType, Platform};
use crate::game::launcher::rules::{evaluate_rules, FeatureFlags, LibraryFilter, LoaderContext};
use crate::game::launcher::substitution::is_deferred;
use crate::game::launcher::types::{GameProfile, ModloaderType};
use crate::game::launcher::version_parser::{Argument, GameArgumentSource, VersionManifest};
use dunce::canonicalize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Launcher-level inputs that are not part of a game profile
#[derive(Debug, Clone)]
pub struct CommandOptions {
    pub platform: Platform,
    pub features: FeatureFlags,
    pub launcher_name: String,
    pub launcher_version: String,
    pub client_id: String,
    /// Overrides and additions to the built-in variable map
    pub variables: HashMap<String, String>,
}

impl CommandOptions {
    pub fn new(launcher_name: impl Into<String>, launcher_version: impl Into<String>) -> Self {
        Self {
            platform: Platform::current(),
            features: FeatureFlags::default(),
            launcher_name: launcher_name.into(),
            launcher_version: launcher_version.into(),
            client_id: String::new(),
            variables: HashMap::new(),
        }
    }
}

/// A built command with secrets still as placeholders; safe to log or persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// JVM arguments, main class and game arguments, in launch order
    pub args: Vec<String>,
    pub classpath: Classpath,
    pub main_class: String,
}

impl LaunchCommand {
    /// Shell-quoted rendering for logs
    pub fn render(&self) -> String {
        render_template(&self.args)
    }
}

/// Quote an argument template for logging. Only ever called on templates.
pub fn render_template(args: &[String]) -> String {
    shlex::try_join(args.iter().map(String::as_str)).unwrap_or_else(|_| args.join(" "))
}

fn canonical_string(path: &Path) -> String {
    canonicalize(path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

/// Build the launch command template for a profile.
///
/// Order: heap flags, platform startup flag, manifest JVM arguments, launcher
/// defaults the manifest left out, profile JVM arguments, main class,
/// manifest game arguments, profile game arguments.
pub fn build_launch_command(
    manifest: &VersionManifest,
    profile: &GameProfile,
    options: &CommandOptions,
) -> Result<LaunchCommand, LaunchError> {
    let client_jar = profile.client_jar_path();
    if !client_jar.is_file() {
        return Err(LaunchError::MissingClientJar(client_jar));
    }

    let main_class = profile
        .main_class
        .clone()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| manifest.main_class.clone())
        .ok_or_else(|| LaunchError::MissingMainClass(profile.id.clone()))?;

    let features = FeatureFlags {
        has_custom_resolution: profile.window_width.is_some() && profile.window_height.is_some(),
        ..options.features
    };

    let filter = LibraryFilter::new(
        options.platform.clone(),
        features,
        LoaderContext::with_loader(
            profile.version_id.clone(),
            profile.modloader.unwrap_or(ModloaderType::Vanilla),
            profile.modloader_version.clone(),
        ),
    );
    let classpath = build_classpath(
        &manifest.libraries,
        &profile.libraries_dir(),
        &client_jar,
        profile.extra_classpath.as_deref(),
        &filter,
    );

    let variables = build_variables(manifest, profile, options, &classpath);

    let mut args = build_jvm_arguments(manifest, profile, options, &features, &variables, &classpath);
    args.push(main_class.clone());
    args.extend(build_game_arguments(
        manifest,
        profile,
        &options.platform,
        &features,
        &variables,
    ));

    log::debug!(
        "[launch] Built {} arguments ({} classpath entries) for {}",
        args.len(),
        classpath.len(),
        profile.id
    );

    Ok(LaunchCommand {
        args,
        classpath,
        main_class,
    })
}

/// Build JVM arguments for launching the game
pub fn build_jvm_arguments(
    manifest: &VersionManifest,
    profile: &GameProfile,
    options: &CommandOptions,
    features: &FeatureFlags,
    variables: &HashMap<String, String>,
    classpath: &Classpath,
) -> Vec<String> {
    let mut args = vec!["-Xms${xms}".to_string(), "-Xmx${xmx}".to_string()];

    let mut manifest_args = Vec::new();
    for arg in manifest.jvm_arguments() {
        manifest_args.extend(process_argument(arg, variables, &options.platform, features, false));
    }

    if options.platform.os == OsType::MacOS
        && !manifest_args.iter().any(|a| a == "-XstartOnFirstThread")
    {
        args.push("-XstartOnFirstThread".to_string());
    }

    let has = |prefix: &str| manifest_args.iter().any(|a| a.starts_with(prefix));
    let has_natives_path = has("-Djava.library.path=");
    let has_brand = has("-Dminecraft.launcher.brand=");
    let has_version = has("-Dminecraft.launcher.version=");
    let has_classpath = manifest_args
        .iter()
        .any(|a| a == "-cp" || a == "-classpath" || a.starts_with("-cp="));
    let legacy = manifest_args.is_empty();

    args.extend(manifest_args);

    // Legacy manifests carry no JVM section; Forge/Fabric normally include these
    if !has_natives_path {
        args.push(format!(
            "-Djava.library.path={}",
            canonical_string(&profile.natives_dir())
        ));
    }
    if !has_brand {
        args.push(format!("-Dminecraft.launcher.brand={}", options.launcher_name));
    }
    if !has_version {
        args.push(format!(
            "-Dminecraft.launcher.version={}",
            options.launcher_version
        ));
    }
    if legacy && !has_classpath {
        args.push("-cp".to_string());
        args.push(classpath.joined());
    }

    let mut seen: HashSet<String> = args.iter().cloned().collect();
    for extra in &profile.jvm_args {
        let extra = extra.trim();
        if extra.is_empty() {
            continue;
        }
        if seen.insert(extra.to_string()) {
            args.push(extra.to_string());
        }
    }

    args
}

/// Build game arguments for launching the game
pub fn build_game_arguments(
    manifest: &VersionManifest,
    profile: &GameProfile,
    platform: &Platform,
    features: &FeatureFlags,
    variables: &HashMap<String, String>,
) -> Vec<String> {
    let mut args = Vec::new();

    match manifest.game_argument_source() {
        GameArgumentSource::Structured(entries) => {
            for arg in entries {
                args.extend(process_argument(arg, variables, platform, features, true));
            }
        }
        GameArgumentSource::Legacy(legacy) => {
            args.extend(process_legacy_arguments(legacy, variables));
        }
        GameArgumentSource::None => {
            log::warn!("[launch] Manifest {} has no game arguments", manifest.id);
        }
    }

    args.extend(
        profile
            .game_args
            .iter()
            .filter(|s| !s.trim().is_empty())
            .cloned(),
    );

    args
}

/// Render one manifest argument. Game arguments are split on whitespace
/// (respecting quotes); JVM arguments never are. A multi-value entry is
/// dropped as a whole if any part cannot be rendered.
fn process_argument(
    arg: &Argument,
    variables: &HashMap<String, String>,
    platform: &Platform,
    features: &FeatureFlags,
    split: bool,
) -> Vec<String> {
    let parts: &[String] = match arg {
        Argument::Simple(s) => std::slice::from_ref(s),
        Argument::Conditional { rules, value } => {
            if !evaluate_rules(rules, platform, features) {
                return Vec::new();
            }
            value.parts()
        }
    };

    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        if split {
            // Split the raw token so substituted paths with spaces stay whole
            for piece in split_preserving_quotes(part) {
                let Some(rendered) = render_token(&piece, variables) else {
                    return Vec::new();
                };
                out.push(rendered);
            }
        } else {
            let Some(rendered) = render_token(part, variables) else {
                return Vec::new();
            };
            if !rendered.trim().is_empty() {
                out.push(rendered);
            }
        }
    }
    out
}

/// Legacy `minecraftArguments`: flag/value pairs whose value cannot be
/// rendered are dropped together.
fn process_legacy_arguments(legacy: &str, variables: &HashMap<String, String>) -> Vec<String> {
    let tokens = split_preserving_quotes(legacy);
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        let takes_value = token.starts_with("--")
            && iter.peek().is_some_and(|next| !next.starts_with("--"));
        if takes_value {
            let value = iter.next().map(String::as_str).unwrap_or_default();
            if let (Some(flag), Some(value)) =
                (render_token(token, variables), render_token(value, variables))
            {
                out.push(flag);
                out.push(value);
            }
        } else if let Some(rendered) = render_token(token, variables) {
            out.push(rendered);
        }
    }
    out
}

/// Substitute known variables, keep deferred placeholders, and return `None`
/// if any placeholder is empty or unknown.
pub fn render_token(text: &str, variables: &HashMap<String, String>) -> Option<String> {
    if !text.contains("${") {
        return Some(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}')?;
        let key = &after[..end];

        if is_deferred(key) {
            out.push_str(&rest[start..start + 2 + end + 1]);
        } else {
            match variables.get(key) {
                Some(v) if !v.trim().is_empty() => out.push_str(v),
                _ => return None,
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// Splits a string into whitespace-separated tokens while respecting
/// single and double quotes. Quotes are removed from returned tokens.
pub(crate) fn split_preserving_quotes(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_double = false;
    let mut in_single = false;

    for c in s.chars() {
        match c {
            '"' if !in_single => in_double = !in_double,
            '\'' if !in_double => in_single = !in_single,
            c if c.is_whitespace() && !in_double && !in_single => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
            }
            c => buf.push(c),
        }
    }

    if !buf.is_empty() {
        out.push(buf);
    }

    out
}

/// Variables resolved at build time. Secrets are deliberately absent.
fn build_variables(
    manifest: &VersionManifest,
    profile: &GameProfile,
    options: &CommandOptions,
    classpath: &Classpath,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    let mut set = |k: &str, v: String| {
        vars.insert(k.to_string(), v);
    };

    set("natives_directory", canonical_string(&profile.natives_dir()));
    set("launcher_name", options.launcher_name.clone());
    set("launcher_version", options.launcher_version.clone());
    set("classpath", classpath.joined());
    set("classpath_separator", classpath.separator().to_string());
    set("library_directory", canonical_string(&profile.libraries_dir()));

    set("version_name", manifest.id.clone());
    set(
        "version_type",
        manifest
            .version_type
            .clone()
            .unwrap_or_else(|| "release".to_string()),
    );

    set("game_directory", canonical_string(&profile.game_dir));
    let assets = canonical_string(&profile.assets_dir());
    set("assets_root", assets.clone());
    // Pre-1.6 versions use ${game_assets}
    set("game_assets", assets);
    if let Some(index) = manifest.assets_id() {
        set("assets_index_name", index);
    }

    if let (Some(w), Some(h)) = (profile.window_width, profile.window_height) {
        set("resolution_width", w.to_string());
        set("resolution_height", h.to_string());
    }

    set("user_properties", "{}".to_string());
    set("clientid", options.client_id.clone());

    for (k, v) in &options.variables {
        vars.insert(k.clone(), v.clone());
    }
    vars
}
