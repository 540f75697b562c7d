/// Version.json parser with inheritance support
use crate::game::launcher::arguments::split_preserving_quotes;
use crate::game::launcher::error::ManifestError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Java runtime component assumed when a manifest predates `javaVersion`
pub const LEGACY_JAVA_COMPONENT: &str = "jre-legacy";
pub const LEGACY_JAVA_MAJOR: u32 = 8;

/// Complete version manifest from version.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    /// Version ID (e.g., "1.20.1" or "1.20.1-forge-47.2.0")
    pub id: String,

    /// Main class to execute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,

    /// Parent version to inherit from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,

    /// Game and JVM arguments. Corrupt sections degrade to empty lists.
    #[serde(
        default,
        deserialize_with = "lenient_arguments",
        skip_serializing_if = "Option::is_none"
    )]
    pub arguments: Option<Arguments>,

    /// Legacy arguments (pre-1.13)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,

    /// Libraries required for this version
    #[serde(default, deserialize_with = "lenient_libraries")]
    pub libraries: Vec<Library>,

    /// Asset index information
    #[serde(default, alias = "asset_index", skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndex>,

    /// Assets version (legacy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,

    /// Java version requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_version: Option<JavaVersion>,

    #[serde(default)]
    pub minimum_launcher_version: u32,

    /// Version type (release, snapshot, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub version_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// Game and JVM arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,

    #[serde(default)]
    pub jvm: Vec<Argument>,
}

impl Arguments {
    /// Decode each section independently so one corrupt section does not
    /// take the other (or the whole manifest) down with it.
    fn from_value_lenient(value: serde_json::Value) -> Self {
        let mut sections = match value {
            serde_json::Value::Object(map) => map,
            other => {
                log::warn!(
                    "[manifest] `arguments` is not an object ({}); using empty argument lists",
                    json_kind(&other)
                );
                return Arguments::default();
            }
        };

        let mut section = |name: &str| -> Vec<Argument> {
            match sections.remove(name) {
                None | Some(serde_json::Value::Null) => Vec::new(),
                Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
                    log::warn!(
                        "[manifest] Unsupported `arguments.{}` section ({}); using an empty list",
                        name,
                        e
                    );
                    Vec::new()
                }),
            }
        };

        let game = section("game");
        let jvm = section("jvm");
        Arguments { game, jvm }
    }
}

fn lenient_arguments<'de, D>(deserializer: D) -> Result<Option<Arguments>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.map(Arguments::from_value_lenient))
}

fn lenient_libraries<'de, D>(deserializer: D) -> Result<Vec<Library>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let mut libraries = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Library>(entry) {
            Ok(lib) => libraries.push(lib),
            Err(e) => log::warn!("[manifest] Skipping unreadable library entry #{}: {}", idx, e),
        }
    }
    Ok(libraries)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Argument that can be simple or conditional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    /// Simple string argument
    Simple(String),

    /// Conditional argument with rules
    Conditional {
        #[serde(default)]
        rules: Vec<Rule>,
        value: ArgumentValue,
    },
}

/// Argument value can be a single string or array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Single(String),
    Multiple(Vec<String>),
}

impl ArgumentValue {
    pub fn parts(&self) -> &[String] {
        match self {
            ArgumentValue::Single(s) => std::slice::from_ref(s),
            ArgumentValue::Multiple(v) => v,
        }
    }
}

/// Rule for conditional arguments/libraries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

impl Rule {
    pub fn allow() -> Self {
        Self {
            action: RuleAction::Allow,
            os: None,
            features: None,
        }
    }

    pub fn disallow() -> Self {
        Self {
            action: RuleAction::Disallow,
            os: None,
            features: None,
        }
    }

    pub fn with_os(mut self, name: &str) -> Self {
        self.os = Some(OsRule {
            name: Some(name.to_string()),
            version: None,
            arch: None,
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Regular expression matched against the host OS version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Library definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    /// Maven coordinates
    pub name: String,

    /// Download information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,

    /// Custom Maven repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Rules for conditional inclusion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,

    /// Native classifiers keyed by OS name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,

    /// Extract rules for natives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,

    /// Whether the artifact belongs on the classpath
    #[serde(default = "default_true")]
    pub include_in_classpath: bool,

    /// Whether the installer fetches the artifact (false for locally provided jars)
    #[serde(default = "default_true")]
    pub downloadable: bool,
}

impl Default for Library {
    fn default() -> Self {
        Self {
            name: String::new(),
            downloads: None,
            url: None,
            rules: None,
            natives: None,
            extract: None,
            include_in_classpath: true,
            downloadable: true,
        }
    }
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Only carries per-classifier native archives, nothing for the classpath
    pub fn is_native_only(&self) -> bool {
        let has_artifact = self
            .downloads
            .as_ref()
            .is_some_and(|d| d.artifact.is_some());
        let has_classifiers = self
            .downloads
            .as_ref()
            .is_some_and(|d| d.classifiers.is_some());
        !has_artifact && (has_classifiers || self.natives.is_some())
    }

    /// Relative path of the main artifact under the libraries directory.
    /// `None` for native-only libraries.
    pub fn artifact_path(&self) -> Result<Option<String>, ManifestError> {
        if self.is_native_only() {
            return Ok(None);
        }

        let explicit = self
            .downloads
            .as_ref()
            .and_then(|d| d.artifact.as_ref())
            .and_then(|a| a.path.clone())
            .filter(|p| !p.trim().is_empty());

        match explicit {
            Some(path) => Ok(Some(path)),
            None => Ok(Some(MavenCoordinate::parse(&self.name)?.to_path())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, Artifact>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Asset index information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndex {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Java version requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersion {
    pub component: String,
    pub major_version: u32,
}

impl Default for JavaVersion {
    fn default() -> Self {
        Self {
            component: LEGACY_JAVA_COMPONENT.to_string(),
            major_version: LEGACY_JAVA_MAJOR,
        }
    }
}

/// Which argument form a manifest's game arguments come from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameArgumentSource<'a> {
    Structured(&'a [Argument]),
    Legacy(&'a str),
    None,
}

impl VersionManifest {
    /// Parse a standalone or child manifest.
    ///
    /// `id` is always required. `mainClass` and `libraries` are required
    /// unless the manifest inherits from a parent that supplies them.
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ManifestError> {
        let has = |key: &str| value.get(key).is_some_and(|v| !v.is_null());

        if !has("id") {
            return Err(ManifestError::MissingField("id"));
        }
        if !has("inheritsFrom") {
            if !has("mainClass") {
                return Err(ManifestError::MissingField("mainClass"));
            }
            if !has("libraries") {
                return Err(ManifestError::MissingField("libraries"));
            }
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Resolved Java requirement; manifests without one run on Java 8
    pub fn java_version(&self) -> JavaVersion {
        self.java_version.clone().unwrap_or_default()
    }

    /// Asset index, derived from the legacy `assets` id when the object is absent
    pub fn asset_index(&self) -> Option<AssetIndex> {
        if let Some(ref index) = self.asset_index {
            return Some(index.clone());
        }
        self.assets.as_ref().map(|id| AssetIndex {
            id: id.clone(),
            ..Default::default()
        })
    }

    /// Get the assets ID (for legacy versions)
    pub fn assets_id(&self) -> Option<String> {
        self.asset_index().map(|i| i.id)
    }

    /// Structured arguments take precedence over the legacy string whenever present
    pub fn game_argument_source(&self) -> GameArgumentSource<'_> {
        if let Some(ref arguments) = self.arguments {
            return GameArgumentSource::Structured(&arguments.game);
        }
        match self.minecraft_arguments.as_deref() {
            Some(legacy) => GameArgumentSource::Legacy(legacy),
            None => GameArgumentSource::None,
        }
    }

    pub fn jvm_arguments(&self) -> &[Argument] {
        self.arguments
            .as_ref()
            .map(|a| a.jvm.as_slice())
            .unwrap_or_default()
    }

    /// Get the main class from a manifest
    pub fn main_class(&self) -> Result<&str, ManifestError> {
        self.main_class
            .as_deref()
            .ok_or(ManifestError::MissingField("mainClass"))
    }
}

/// Parsed maven coordinate: `group:artifact:version[:classifier][@extension]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MavenCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl MavenCoordinate {
    pub fn parse(coords: &str) -> Result<Self, ManifestError> {
        let invalid = || ManifestError::InvalidMavenCoordinate {
            coords: coords.to_string(),
        };

        let (body, extension) = match coords.rsplit_once('@') {
            Some((body, ext)) if !ext.is_empty() => (body, ext),
            _ => (coords, "jar"),
        };

        let parts: Vec<&str> = body.split(':').collect();
        if parts.len() < 3 || parts.iter().take(3).any(|p| p.trim().is_empty()) {
            return Err(invalid());
        }

        Ok(Self {
            group: parts[0].to_string(),
            artifact: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts.get(3).filter(|c| !c.is_empty()).map(|c| c.to_string()),
            extension: extension.to_string(),
        })
    }

    /// `group:artifact`, the identity shared by every version of a library
    pub fn key(&self) -> String {
        format!("{}:{}", self.group, self.artifact)
    }

    /// Example: "com.google.guava:guava:21.0" -> "com/google/guava/guava/21.0/guava-21.0.jar"
    pub fn to_path(&self) -> String {
        let filename = match self.classifier {
            Some(ref clf) => format!(
                "{}-{}-{}.{}",
                self.artifact, self.version, clf, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact, self.version, self.extension),
        };

        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            filename
        )
    }
}

/// Parse a version.json file
pub async fn parse_version_json(path: &Path) -> Result<VersionManifest, ManifestError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    VersionManifest::parse(&content)
}

/// Resolve the complete version chain by following inheritsFrom
pub async fn resolve_version_chain(
    version_id: &str,
    data_dir: &Path,
) -> Result<VersionManifest, ManifestError> {
    let mut chain = Vec::new();
    let mut next = Some(version_id.to_string());

    while let Some(id) = next.take() {
        if chain.iter().any(|m: &VersionManifest| m.id == id) {
            log::warn!("[manifest] inheritsFrom cycle at {}; stopping", id);
            break;
        }

        let version_path = data_dir
            .join("versions")
            .join(&id)
            .join(format!("{}.json", id));
        log::debug!("[manifest] Loading {} from {:?}", id, version_path);

        if !version_path.exists() {
            return Err(ManifestError::NotFound(version_path));
        }

        let manifest = parse_version_json(&version_path).await?;
        next = manifest.inherits_from.clone();
        chain.push(manifest);
    }

    // chain is [child, parent, grandparent, ...]; fold from the root down
    let mut resolved = chain.pop().ok_or(ManifestError::MissingField("id"))?;
    while let Some(child) = chain.pop() {
        resolved = merge_manifests(resolved, child);
    }

    if resolved.main_class.is_none() {
        return Err(ManifestError::MissingField("mainClass"));
    }

    Ok(resolved)
}

fn legacy_to_structured(legacy: &str) -> Vec<Argument> {
    split_preserving_quotes(legacy)
        .into_iter()
        .map(Argument::Simple)
        .collect()
}

/// Merge a child manifest with its parent
pub fn merge_manifests(mut parent: VersionManifest, mut child: VersionManifest) -> VersionManifest {
    // A child's legacy string is a full replacement for the parent's (old Forge does this)
    if child.minecraft_arguments.is_some() && child.arguments.is_none() {
        parent.minecraft_arguments = child.minecraft_arguments.take();
    }

    // Parent legacy + structured child: convert so the child's tokens can append
    if child.arguments.is_some() {
        if let Some(legacy) = parent.minecraft_arguments.take() {
            let converted = legacy_to_structured(&legacy);
            let parent_args = parent.arguments.get_or_insert_with(Arguments::default);
            let mut game = converted;
            game.append(&mut parent_args.game);
            parent_args.game = game;
        }
        if let Some(legacy) = child.minecraft_arguments.take() {
            if let Some(ref mut child_args) = child.arguments {
                child_args.game.extend(legacy_to_structured(&legacy));
            }
        }
    }

    // Child's ID takes precedence
    parent.id = child.id;

    if child.main_class.is_some() {
        parent.main_class = child.main_class;
    }

    if let Some(child_args) = child.arguments {
        match parent.arguments {
            Some(ref mut parent_args) => {
                parent_args.game.extend(child_args.game);
                parent_args.jvm.extend(child_args.jvm);
            }
            None => parent.arguments = Some(child_args),
        }
    }

    // Child libraries come after parent
    parent.libraries.extend(child.libraries);

    if child.asset_index.is_some() {
        parent.asset_index = child.asset_index;
    }
    if child.assets.is_some() {
        parent.assets = child.assets;
    }
    if child.java_version.is_some() {
        parent.java_version = child.java_version;
    }
    if child.version_type.is_some() {
        parent.version_type = child.version_type;
    }
    parent.minimum_launcher_version = parent
        .minimum_launcher_version
        .max(child.minimum_launcher_version);

    parent.inherits_from = None;
    parent
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> serde_json::Value {
        json!({
            "id": "1.20.1",
            "mainClass": "net.minecraft.client.main.Main",
            "libraries": []
        })
    }

    #[test]
    fn parse_simple_argument() {
        let arg: Argument = serde_json::from_str(r#""--username""#).unwrap();
        assert_eq!(arg, Argument::Simple("--username".to_string()));
    }

    #[test]
    fn missing_java_version_defaults_to_legacy_runtime() {
        let manifest = VersionManifest::from_value(minimal()).unwrap();
        let java = manifest.java_version();
        assert_eq!(java.component, "jre-legacy");
        assert_eq!(java.major_version, 8);
        assert_eq!(manifest.minimum_launcher_version, 0);
    }

    #[test]
    fn asset_index_falls_back_to_assets_key() {
        let mut value = minimal();
        value["assets"] = json!("1.7.10");
        let manifest = VersionManifest::from_value(value).unwrap();
        assert_eq!(manifest.assets_id().as_deref(), Some("1.7.10"));

        let mut value = minimal();
        value["asset_index"] = json!({ "id": "5" });
        let manifest = VersionManifest::from_value(value).unwrap();
        assert_eq!(manifest.assets_id().as_deref(), Some("5"));
    }

    #[test]
    fn required_fields_are_enforced() {
        let mut value = minimal();
        value.as_object_mut().unwrap().remove("mainClass");
        assert!(matches!(
            VersionManifest::from_value(value),
            Err(ManifestError::MissingField("mainClass"))
        ));

        let mut value = minimal();
        value.as_object_mut().unwrap().remove("libraries");
        assert!(matches!(
            VersionManifest::from_value(value),
            Err(ManifestError::MissingField("libraries"))
        ));

        // A child manifest may leave both to its parent
        let child = json!({ "id": "fabric-loader-0.15.0-1.20.1", "inheritsFrom": "1.20.1" });
        assert!(VersionManifest::from_value(child).is_ok());
    }

    #[test]
    fn corrupt_argument_section_degrades_to_empty() {
        let mut value = minimal();
        value["arguments"] = json!({
            "game": 42,
            "jvm": ["-Dfoo=bar", { "rules": [], "value": ["-Da", "-Db"] }]
        });
        let manifest = VersionManifest::from_value(value).unwrap();
        let args = manifest.arguments.unwrap();
        assert!(args.game.is_empty());
        assert_eq!(args.jvm.len(), 2);
    }

    #[test]
    fn structured_arguments_win_over_legacy() {
        let mut value = minimal();
        value["minecraftArguments"] = json!("--username ${auth_player_name}");
        value["arguments"] = json!({ "game": ["--demo"] });
        let manifest = VersionManifest::from_value(value).unwrap();
        assert!(matches!(
            manifest.game_argument_source(),
            GameArgumentSource::Structured(args) if args.len() == 1
        ));

        let mut value = minimal();
        value["minecraftArguments"] = json!("--username ${auth_player_name}");
        let manifest = VersionManifest::from_value(value).unwrap();
        assert!(matches!(
            manifest.game_argument_source(),
            GameArgumentSource::Legacy(s) if s.starts_with("--username")
        ));
    }

    #[test]
    fn unreadable_library_entries_are_skipped() {
        let mut value = minimal();
        value["libraries"] = json!([
            { "name": "com.google.guava:guava:21.0" },
            { "downloads": "nope" }
        ]);
        let manifest = VersionManifest::from_value(value).unwrap();
        assert_eq!(manifest.libraries.len(), 1);
    }

    #[test]
    fn native_only_library_has_no_artifact_path() {
        let lib: Library = serde_json::from_value(json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
            "natives": { "linux": "natives-linux" },
            "downloads": {
                "classifiers": {
                    "natives-linux": { "path": "org/lwjgl/lwjgl/lwjgl-platform/2.9.4/lwjgl-platform-2.9.4-natives-linux.jar" }
                }
            }
        }))
        .unwrap();
        assert!(lib.is_native_only());
        assert_eq!(lib.artifact_path().unwrap(), None);
        assert!(lib.include_in_classpath);
        assert!(lib.downloadable);
    }

    #[test]
    fn artifact_path_derived_from_coordinates() {
        let lib = Library::new("net.fabricmc:intermediary:1.20.1");
        assert_eq!(
            lib.artifact_path().unwrap().as_deref(),
            Some("net/fabricmc/intermediary/1.20.1/intermediary-1.20.1.jar")
        );
    }

    #[test]
    fn maven_coordinate_variants() {
        let c = MavenCoordinate::parse("org.lwjgl:lwjgl:3.3.1:natives-windows").unwrap();
        assert_eq!(c.to_path(), "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-windows.jar");
        assert_eq!(c.key(), "org.lwjgl:lwjgl");

        let c = MavenCoordinate::parse("de.oceanlabs.mcp:mcp_config:1.20.1-20230612.114412@zip")
            .unwrap();
        assert_eq!(
            c.to_path(),
            "de/oceanlabs/mcp/mcp_config/1.20.1-20230612.114412/mcp_config-1.20.1-20230612.114412.zip"
        );

        assert!(MavenCoordinate::parse("not-a-coordinate").is_err());
        assert!(MavenCoordinate::parse("a::1").is_err());
    }

    #[test]
    fn merge_appends_child_arguments_and_libraries() {
        let parent = VersionManifest {
            id: "1.20.1".to_string(),
            main_class: Some("net.minecraft.client.main.Main".to_string()),
            arguments: Some(Arguments {
                game: vec![Argument::Simple("--version".to_string())],
                jvm: vec![],
            }),
            libraries: vec![Library::new("a:b:1")],
            version_type: Some("release".to_string()),
            ..Default::default()
        };
        let child = VersionManifest {
            id: "1.20.1-forge-47.2.0".to_string(),
            main_class: Some("cpw.mods.bootstraplauncher.BootstrapLauncher".to_string()),
            inherits_from: Some("1.20.1".to_string()),
            arguments: Some(Arguments {
                game: vec![Argument::Simple("--fml.forgeVersion".to_string())],
                jvm: vec![],
            }),
            libraries: vec![Library::new("c:d:2")],
            ..Default::default()
        };

        let merged = merge_manifests(parent, child);
        assert_eq!(merged.id, "1.20.1-forge-47.2.0");
        assert_eq!(
            merged.main_class.as_deref(),
            Some("cpw.mods.bootstraplauncher.BootstrapLauncher")
        );
        assert!(merged.inherits_from.is_none());
        assert_eq!(merged.arguments.unwrap().game.len(), 2);
        let names: Vec<_> = merged.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["a:b:1", "c:d:2"]);
    }

    #[test]
    fn merge_legacy_parent_with_structured_child() {
        let parent = VersionManifest {
            id: "1.12.2".to_string(),
            main_class: Some("net.minecraft.launchwrapper.Launch".to_string()),
            minecraft_arguments: Some("--username ${auth_player_name} --tweakClass net.minecraftforge.fml.common.launcher.FMLTweaker".to_string()),
            ..Default::default()
        };
        let child = VersionManifest {
            id: "forge-loader-test".to_string(),
            inherits_from: Some("1.12.2".to_string()),
            arguments: Some(Arguments {
                game: vec![Argument::Simple("--fml.forgeVersion".to_string())],
                jvm: vec![],
            }),
            ..Default::default()
        };

        let merged = merge_manifests(parent, child);
        assert!(merged.minecraft_arguments.is_none());
        let strings: Vec<String> = merged
            .arguments
            .unwrap()
            .game
            .into_iter()
            .filter_map(|a| match a {
                Argument::Simple(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(strings.first().map(String::as_str), Some("--username"));
        assert!(strings.iter().any(|s| s == "--tweakClass"));
        assert_eq!(strings.last().map(String::as_str), Some("--fml.forgeVersion"));
    }

    #[test]
    fn child_legacy_string_replaces_parent() {
        let parent = VersionManifest {
            id: "1.7.10".to_string(),
            main_class: Some("net.minecraft.client.main.Main".to_string()),
            minecraft_arguments: Some("--username ${auth_player_name}".to_string()),
            ..Default::default()
        };
        let child = VersionManifest {
            id: "1.7.10-Forge".to_string(),
            minecraft_arguments: Some(
                "--username ${auth_player_name} --tweakClass cpw.mods.fml.common.launcher.FMLTweaker"
                    .to_string(),
            ),
            ..Default::default()
        };
        let merged = merge_manifests(parent, child);
        assert!(merged.arguments.is_none());
        assert_eq!(merged.minecraft_arguments.unwrap().matches("--username").count(), 1);
    }

    #[tokio::test]
    async fn resolve_chain_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let write = |id: &str, body: serde_json::Value| {
            let dir = tmp.path().join("versions").join(id);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(format!("{}.json", id)), body.to_string()).unwrap();
        };
        write("1.20.1", minimal());
        write(
            "fabric-loader-0.15.0-1.20.1",
            json!({
                "id": "fabric-loader-0.15.0-1.20.1",
                "inheritsFrom": "1.20.1",
                "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
                "libraries": [{ "name": "net.fabricmc:fabric-loader:0.15.0" }]
            }),
        );

        let resolved = resolve_version_chain("fabric-loader-0.15.0-1.20.1", tmp.path())
            .await
            .unwrap();
        assert_eq!(resolved.id, "fabric-loader-0.15.0-1.20.1");
        assert_eq!(
            resolved.main_class.as_deref(),
            Some("net.fabricmc.loader.impl.launch.knot.KnotClient")
        );
        assert_eq!(resolved.libraries.len(), 1);

        let missing = resolve_version_chain("nope", tmp.path()).await;
        assert!(matches!(missing, Err(ManifestError::NotFound(_))));
    }
}
