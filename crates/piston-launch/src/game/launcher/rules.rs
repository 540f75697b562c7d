/// Rule evaluation and library filtering
///
/// Manifest rules follow the vanilla launcher semantics: an empty rule list
/// allows, otherwise evaluation starts at "disallow" and the last matching rule
/// decides. Libraries additionally pass through a version-sensitive deny list
/// for coordinates that conflict with what a loader ships.
use crate::game::launcher::platform::Platform;
use crate::game::launcher::types::ModloaderType;
use crate::game::launcher::version_parser::{Library, MavenCoordinate, Rule, RuleAction};
use crate::utils::version::version_in_series;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;

/// Launcher feature gates referenced by `features` rules. Unknown names are false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub is_demo_user: bool,
    pub has_custom_resolution: bool,
    pub has_quick_plays_support: bool,
    pub is_quick_play_singleplayer: bool,
    pub is_quick_play_multiplayer: bool,
    pub is_quick_play_realms: bool,
}

impl FeatureFlags {
    pub fn get(&self, name: &str) -> bool {
        match name {
            "is_demo_user" => self.is_demo_user,
            "has_custom_resolution" => self.has_custom_resolution,
            "has_quick_plays_support" => self.has_quick_plays_support,
            "is_quick_play_singleplayer" => self.is_quick_play_singleplayer,
            "is_quick_play_multiplayer" => self.is_quick_play_multiplayer,
            "is_quick_play_realms" => self.is_quick_play_realms,
            _ => false,
        }
    }
}

// os.version patterns repeat across every library of a manifest
static VERSION_REGEX_CACHE: Lazy<Mutex<HashMap<String, Option<Regex>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn os_version_matches(pattern: &str, host_version: &str) -> bool {
    let mut cache = VERSION_REGEX_CACHE
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    let compiled = cache
        .entry(pattern.to_string())
        .or_insert_with(|| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                log::warn!("[rules] Ignoring invalid os.version pattern {:?}: {}", pattern, e);
                None
            }
        });
    compiled.as_ref().is_some_and(|re| re.is_match(host_version))
}

/// Whether every constraint of a single rule holds on this platform
pub fn rule_matches(rule: &Rule, platform: &Platform, features: &FeatureFlags) -> bool {
    if let Some(ref os) = rule.os {
        if let Some(ref name) = os.name {
            if !platform.os.matches_name(name) {
                return false;
            }
        }
        if let Some(ref arch) = os.arch {
            if !platform.arch.matches_name(arch) {
                return false;
            }
        }
        if let Some(ref version) = os.version {
            if !os_version_matches(version, &platform.os_version) {
                return false;
            }
        }
    }

    if let Some(ref required) = rule.features {
        if required
            .iter()
            .any(|(name, expected)| features.get(name) != *expected)
        {
            return false;
        }
    }

    true
}

/// Evaluate an allow/disallow rule list; the last matching rule wins
pub fn evaluate_rules(rules: &[Rule], platform: &Platform, features: &FeatureFlags) -> bool {
    if rules.is_empty() {
        return true;
    }

    rules
        .iter()
        .filter(|rule| rule_matches(rule, platform, features))
        .last()
        .is_some_and(|rule| rule.action == RuleAction::Allow)
}

/// Which game version and loader a library list is being filtered for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderContext {
    pub minecraft_version: String,
    pub loader: ModloaderType,
    pub loader_version: Option<String>,
}

impl LoaderContext {
    pub fn vanilla(minecraft_version: impl Into<String>) -> Self {
        Self {
            minecraft_version: minecraft_version.into(),
            loader: ModloaderType::Vanilla,
            loader_version: None,
        }
    }

    pub fn with_loader(
        minecraft_version: impl Into<String>,
        loader: ModloaderType,
        loader_version: Option<String>,
    ) -> Self {
        Self {
            minecraft_version: minecraft_version.into(),
            loader,
            loader_version,
        }
    }
}

/// A library coordinate that must not reach the classpath for a given
/// game series (and optionally only under one loader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeniedLibrary {
    pub group: String,
    pub artifact: String,
    /// Exact library version; `None` denies every version
    pub version: Option<String>,
    /// Game version series, e.g. "1.20" covers 1.20 and 1.20.x
    pub minecraft_series: String,
    pub loader: Option<ModloaderType>,
}

impl DeniedLibrary {
    fn new(group: &str, artifact: &str, version: Option<&str>, series: &str) -> Self {
        Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.map(str::to_string),
            minecraft_series: series.to_string(),
            loader: None,
        }
    }

    fn for_loader(mut self, loader: ModloaderType) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn applies(&self, coord: &MavenCoordinate, ctx: &LoaderContext) -> bool {
        if coord.group != self.group || coord.artifact != self.artifact {
            return false;
        }
        if let Some(ref v) = self.version {
            if coord.version != *v {
                return false;
            }
        }
        if let Some(loader) = self.loader {
            if loader != ctx.loader {
                return false;
            }
        }
        version_in_series(&ctx.minecraft_version, &self.minecraft_series)
    }
}

/// Known duplicates: vanilla pins an older LWJGL or ASM than the one a loader
/// installer ships, and both landing on the classpath breaks class loading.
pub static LIBRARY_DENY_LIST: Lazy<Vec<DeniedLibrary>> = Lazy::new(|| {
    vec![
        // 1.20 vanilla ships 3.3.1 while Forge/NeoForge 1.20.x bundles 3.3.2+
        DeniedLibrary::new("org.lwjgl", "lwjgl", Some("3.3.1"), "1.20")
            .for_loader(ModloaderType::Forge),
        DeniedLibrary::new("org.lwjgl", "lwjgl", Some("3.3.1"), "1.20")
            .for_loader(ModloaderType::NeoForge),
        // Fabric loader bundles its own ASM; the vanilla 9.3 copy clashes on 1.19
        DeniedLibrary::new("org.ow2.asm", "asm-all", None, "1.19")
            .for_loader(ModloaderType::Fabric),
        // Early 1.20 manifests listed lwjgl-freetype twice, old build first
        DeniedLibrary::new("org.lwjgl", "lwjgl-freetype", Some("3.3.1"), "1.20"),
    ]
});

/// The Library Filter: platform rules, both classpath flags, and the deny list
#[derive(Debug, Clone)]
pub struct LibraryFilter<'a> {
    pub platform: Platform,
    pub features: FeatureFlags,
    pub context: LoaderContext,
    deny_list: &'a [DeniedLibrary],
}

impl LibraryFilter<'static> {
    pub fn new(platform: Platform, features: FeatureFlags, context: LoaderContext) -> Self {
        Self {
            platform,
            features,
            context,
            deny_list: LIBRARY_DENY_LIST.as_slice(),
        }
    }
}

impl<'a> LibraryFilter<'a> {
    /// Swap the built-in deny list for another one
    pub fn with_deny_list<'b>(self, deny_list: &'b [DeniedLibrary]) -> LibraryFilter<'b> {
        LibraryFilter {
            platform: self.platform,
            features: self.features,
            context: self.context,
            deny_list,
        }
    }

    pub fn is_denied(&self, lib: &Library) -> bool {
        let Ok(coord) = MavenCoordinate::parse(&lib.name) else {
            return false;
        };
        self.deny_list
            .iter()
            .any(|entry| entry.applies(&coord, &self.context))
    }

    pub fn is_included(&self, lib: &Library) -> bool {
        if !lib.include_in_classpath || !lib.downloadable {
            return false;
        }

        if let Some(ref rules) = lib.rules {
            if !evaluate_rules(rules, &self.platform, &self.features) {
                return false;
            }
        }

        if self.is_denied(lib) {
            log::debug!(
                "[rules] {} excluded for {} ({})",
                lib.name,
                self.context.minecraft_version,
                self.context.loader
            );
            return false;
        }

        true
    }

    pub fn filter<'l>(&self, libraries: &'l [Library]) -> Vec<&'l Library> {
        libraries.iter().filter(|l| self.is_included(l)).collect()
    }
}
