/// Spawn-time placeholder resolution for credential and memory values.
///
/// Templates keep `${auth_access_token}` and friends unresolved until the
/// moment the child process is created. Resolution is a single scan per
/// argument into a freshly allocated vector; both the values and the resolved
/// vector are zeroized when dropped.
use crate::game::launcher::types::Credential;
use std::fmt;
use zeroize::Zeroize;

/// Placeholders that the command builder leaves for spawn time
pub const DEFERRED_VARIABLES: &[&str] = &[
    "auth_player_name",
    "player_name",
    "auth_uuid",
    "uuid",
    "auth_access_token",
    "accessToken",
    "auth_session",
    "auth_xuid",
    "xuid",
    "user_type",
    "xms",
    "xmx",
];

pub fn is_deferred(key: &str) -> bool {
    DEFERRED_VARIABLES.contains(&key)
}

/// Values substituted at spawn time
pub struct SpawnValues {
    player_name: String,
    uuid: String,
    access_token: String,
    xuid: String,
    user_type: String,
    xms: String,
    xmx: String,
}

impl SpawnValues {
    pub fn new(credential: &Credential, min_mb: u32, max_mb: u32) -> Self {
        Self {
            player_name: credential.username.clone(),
            uuid: credential.uuid.clone(),
            access_token: credential.access_token.clone(),
            // Offline and legacy accounts have no Xbox user id
            xuid: credential
                .xuid
                .clone()
                .filter(|x| !x.is_empty())
                .unwrap_or_else(|| "0".to_string()),
            user_type: credential.user_type().to_string(),
            xms: format!("{}M", min_mb),
            xmx: format!("{}M", max_mb),
        }
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        let value = match key {
            "auth_player_name" | "player_name" => &self.player_name,
            "auth_uuid" | "uuid" => &self.uuid,
            "auth_access_token" | "accessToken" | "auth_session" => &self.access_token,
            "auth_xuid" | "xuid" => &self.xuid,
            "user_type" => &self.user_type,
            "xms" => &self.xms,
            "xmx" => &self.xmx,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Literal secret strings, for checking that a rendering leaks none of them
    pub fn secrets(&self) -> [&str; 1] {
        [self.access_token.as_str()]
    }
}

impl Drop for SpawnValues {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.player_name.zeroize();
        self.uuid.zeroize();
        self.xuid.zeroize();
    }
}

impl fmt::Debug for SpawnValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnValues")
            .field("player_name", &self.player_name)
            .field("access_token", &"<redacted>")
            .field("xms", &self.xms)
            .field("xmx", &self.xmx)
            .finish_non_exhaustive()
    }
}

/// Fully resolved argument vector. Zeroed on drop, never printable.
pub struct ResolvedArgs(Vec<String>);

impl ResolvedArgs {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Total characters as the OS will see them (arguments plus separators)
    pub fn command_line_len(&self) -> usize {
        self.0.iter().map(|a| a.len() + 1).sum()
    }
}

impl Drop for ResolvedArgs {
    fn drop(&mut self) {
        // Zeroes each buffer's full capacity, not just its length
        self.0.zeroize();
    }
}

impl fmt::Debug for ResolvedArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolvedArgs(<{} redacted arguments>)", self.0.len())
    }
}

fn resolve_one(arg: &str, values: &SpawnValues) -> String {
    if !arg.contains("${") {
        return arg.to_string();
    }

    let mut out = String::with_capacity(arg.len() + 64);
    let mut rest = arg;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match values.lookup(key) {
                    Some(v) => out.push_str(v),
                    None => {
                        out.push_str("${");
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve every deferred placeholder in `template`. Unknown placeholders are
/// left as-is.
pub fn resolve_placeholders(template: &[String], values: &SpawnValues) -> ResolvedArgs {
    let mut resolved = Vec::with_capacity(template.len());
    for arg in template {
        resolved.push(resolve_one(arg, values));
    }
    ResolvedArgs(resolved)
}
