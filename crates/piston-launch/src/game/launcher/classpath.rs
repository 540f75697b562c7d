/// Classpath construction for Minecraft launcher
use crate::game::launcher::rules::LibraryFilter;
use crate::game::launcher::version_parser::{Library, MavenCoordinate};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{ExtendedFileOptions, FileOptions};

/// Windows rejects command lines longer than 32767 UTF-16 units; stay clear of it
pub const WINDOWS_COMMAND_LINE_LIMIT: usize = 32_000;

/// Ordered, de-duplicated classpath entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classpath {
    entries: Vec<String>,
    separator: &'static str,
}

impl Classpath {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn separator(&self) -> &'static str {
        self.separator
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn joined(&self) -> String {
        self.entries.join(self.separator)
    }
}

impl fmt::Display for Classpath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

/// Directory two levels above an artifact: `<group path>/<artifact>`.
/// Two jars with the same base path are versions of the same library.
pub fn base_path(path: &Path) -> Option<PathBuf> {
    path.parent()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// Split a loader-supplied classpath string, dropping blank entries
pub fn parse_extra_classpath(extra: &str, separator: &str) -> Vec<String> {
    extra
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the launch classpath.
///
/// Order is `[manifest libraries] + [client jar] + [extra classpath]`. A
/// manifest library is dropped when an extra entry shares its base path, since
/// the loader's copy is the one it was built against. Classifier-only (native)
/// libraries never appear.
pub fn build_classpath(
    libraries: &[Library],
    libraries_dir: &Path,
    client_jar: &Path,
    extra_classpath: Option<&str>,
    filter: &LibraryFilter<'_>,
) -> Classpath {
    let separator = filter.platform.classpath_separator();
    let extra = extra_classpath
        .map(|s| parse_extra_classpath(s, separator))
        .unwrap_or_default();

    let extra_bases: HashSet<PathBuf> = extra
        .iter()
        .filter_map(|e| base_path(Path::new(e)))
        .collect();

    let mut candidates: Vec<String> = Vec::with_capacity(libraries.len() + 1 + extra.len());
    let mut missing = 0usize;
    let mut superseded = 0usize;

    for library in libraries.iter().filter(|l| filter.is_included(l)) {
        let relative = match library.artifact_path() {
            Ok(Some(rel)) => rel,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("[classpath] Skipping {}: {}", library.name, e);
                continue;
            }
        };

        let full_path = libraries_dir.join(&relative);
        if base_path(&full_path).is_some_and(|b| extra_bases.contains(&b)) {
            superseded += 1;
            log::debug!(
                "[classpath] {} superseded by loader classpath entry",
                library.name
            );
            continue;
        }

        if !full_path.exists() {
            missing += 1;
        }
        candidates.push(full_path.to_string_lossy().to_string());
    }

    candidates.push(client_jar.to_string_lossy().to_string());
    candidates.extend(extra);

    let mut seen = HashSet::with_capacity(candidates.len());
    let entries: Vec<String> = candidates
        .into_iter()
        .filter(|e| !e.trim().is_empty())
        .filter(|e| seen.insert(e.clone()))
        .collect();

    if missing > 0 {
        log::warn!("[classpath] {} classpath libraries are not on disk", missing);
    }
    log::debug!(
        "[classpath] {} entries ({} superseded by loader)",
        entries.len(),
        superseded
    );

    Classpath { entries, separator }
}

/// Convert Maven coordinates to file path
/// Format: group:artifact:version[:classifier][@extension]
/// Example: "com.google.guava:guava:21.0" -> "com/google/guava/guava/21.0/guava-21.0.jar"
pub fn maven_to_path(coords: &str) -> Result<String> {
    Ok(MavenCoordinate::parse(coords)?.to_path())
}

/// Manifest attribute lines are limited to 72 bytes; continuations start with a space
fn wrap_manifest_line(line: &str) -> String {
    const MAX: usize = 72;
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len() + line.len() / MAX * 3 + 2);
    let mut start = 0;
    let mut width = MAX;
    while start < bytes.len() {
        let mut end = (start + width).min(bytes.len());
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        if start > 0 {
            out.push_str("\r\n ");
        }
        out.push_str(&line[start..end]);
        start = end;
        width = MAX - 1;
    }
    out.push_str("\r\n");
    out
}

/// A generated classpath jar; the file is deleted when this is dropped
#[derive(Debug)]
pub struct ClasspathJar {
    path: PathBuf,
}

impl ClasspathJar {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ClasspathJar {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("[classpath] Removed {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("[classpath] Failed to remove {:?}: {}", self.path, e),
        }
    }
}

/// Create a temporary JAR file with a Class-Path manifest attribute
/// This is used to workaround command line length limits on Windows
pub fn create_classpath_jar(classpath: &Classpath, temp_dir: &Path) -> Result<ClasspathJar> {
    std::fs::create_dir_all(temp_dir)
        .with_context(|| format!("Failed to create {:?}", temp_dir))?;
    let jar_path = temp_dir.join(format!("classpath-{}.jar", uuid::Uuid::new_v4()));
    let file = File::create(&jar_path)
        .with_context(|| format!("Failed to create classpath jar {:?}", jar_path))?;
    // Owns the file from here on, so a failed write leaves nothing behind
    let jar = ClasspathJar { path: jar_path };
    let mut zip: zip::ZipWriter<File> = zip::ZipWriter::new(file);

    let options: FileOptions<'_, ExtendedFileOptions> = FileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);

    let mut urls = Vec::with_capacity(classpath.len());
    for entry in classpath.entries() {
        let url = url::Url::from_file_path(Path::new(entry))
            .map_err(|_| anyhow::anyhow!("Failed to convert path to URL: {:?}", entry))?;
        urls.push(url.to_string());
    }

    zip.start_file("META-INF/MANIFEST.MF", options)?;
    zip.write_all(b"Manifest-Version: 1.0\r\n")?;
    zip.write_all(wrap_manifest_line(&format!("Class-Path: {}", urls.join(" "))).as_bytes())?;
    zip.write_all(b"\r\n")?;
    zip.finish()?;

    log::debug!(
        "[classpath] Wrote {} entries to {:?}",
        classpath.len(),
        jar.path
    );
    Ok(jar)
}
