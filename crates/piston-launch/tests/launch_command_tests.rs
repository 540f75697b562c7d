mod common;

use piston_launch::game::launcher::classpath::build_classpath;
use piston_launch::game::launcher::rules::{DeniedLibrary, LibraryFilter, LoaderContext};
use piston_launch::game::launcher::substitution::{resolve_placeholders, SpawnValues};
use piston_launch::game::launcher::version_parser::{Artifact, Library, LibraryDownloads};
use piston_launch::game::launcher::{
    build_launch_command, resolve_version_chain, AccountKind, Arch, CommandOptions, Credential,
    FeatureFlags, ModloaderType, OsType, Platform, VersionManifest,
};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

fn linux() -> Platform {
    Platform::new(OsType::Linux, Arch::X64, "6.1")
}

fn options() -> CommandOptions {
    CommandOptions {
        platform: linux(),
        ..CommandOptions::new("VestaLauncher", "1.0.0")
    }
}

fn library(name: &str, path: &str) -> Library {
    Library {
        downloads: Some(LibraryDownloads {
            artifact: Some(Artifact {
                path: Some(path.to_string()),
                ..Default::default()
            }),
            classifiers: None,
        }),
        ..Library::new(name)
    }
}

fn vanilla_filter(version: &str) -> LibraryFilter<'static> {
    LibraryFilter::new(linux(), FeatureFlags::default(), LoaderContext::vanilla(version))
}

#[test]
fn client_id_variable_resolves_in_jvm_arguments() {
    common::init_logging();
    let tmp = TempDir::new().unwrap();
    let profile = common::game_profile(tmp.path(), "survival", "1.20.1");
    let manifest = VersionManifest::from_value(json!({
        "id": "1.20.1",
        "mainClass": "net.minecraft.client.main.Main",
        "libraries": [],
        "arguments": { "jvm": ["-Da=${clientid}"], "game": [] }
    }))
    .unwrap();

    let mut opts = options();
    opts.variables = HashMap::from([("clientid".to_string(), "X".to_string())]);

    let command = build_launch_command(&manifest, &profile, &opts).unwrap();
    assert!(command.args.contains(&"-Da=X".to_string()));
    assert!(!command.args.iter().any(|a| a.contains("${clientid}")));
}

#[test]
fn secrets_stay_placeholders_until_spawn() {
    let tmp = TempDir::new().unwrap();
    let profile = common::game_profile(tmp.path(), "survival", "1.20.1");
    let manifest = VersionManifest::from_value(json!({
        "id": "1.20.1",
        "mainClass": "net.minecraft.client.main.Main",
        "libraries": [],
        "arguments": {
            "jvm": ["-cp", "${classpath}"],
            "game": [
                "--username", "${auth_player_name}",
                "--uuid", "${auth_uuid}",
                "--accessToken", "${auth_access_token}",
                "--xuid", "${auth_xuid}",
                "--userType", "${user_type}"
            ]
        }
    }))
    .unwrap();

    let command = build_launch_command(&manifest, &profile, &options()).unwrap();
    let rendered = command.render();
    assert!(rendered.contains("${auth_access_token}"));

    let mut credential = Credential::offline("Alex", "0f1e2d3c");
    credential.kind = AccountKind::Msa;
    credential.access_token = "eyJ-secret-token".to_string();
    credential.xuid = Some("2535".to_string());
    assert!(!rendered.contains(&credential.access_token));

    let values = SpawnValues::new(&credential, 1024, 2048);
    let resolved = resolve_placeholders(&command.args, &values);
    let args = resolved.as_slice();

    assert_eq!(args[0], "-Xms1024M");
    assert_eq!(args[1], "-Xmx2048M");
    let after = |flag: &str| {
        let idx = args.iter().position(|a| a == flag).unwrap();
        args[idx + 1].clone()
    };
    assert_eq!(after("--username"), "Alex");
    assert_eq!(after("--uuid"), "0f1e2d3c");
    assert_eq!(after("--accessToken"), "eyJ-secret-token");
    assert_eq!(after("--xuid"), "2535");
    assert_eq!(after("--userType"), "msa");
    assert!(!format!("{:?}", resolved).contains("eyJ-secret-token"));
}

#[tokio::test]
async fn inherited_loader_manifest_builds_full_command() {
    let tmp = TempDir::new().unwrap();
    let mut profile = common::game_profile(tmp.path(), "modded", "1.20.1");
    profile.modloader = Some(ModloaderType::Fabric);
    profile.modloader_version = Some("0.15.11".to_string());

    common::write_manifest(
        &profile.data_dir,
        "1.20.1",
        &json!({
            "id": "1.20.1",
            "mainClass": "net.minecraft.client.main.Main",
            "assetIndex": { "id": "5" },
            "libraries": [
                { "name": "com.mojang:brigadier:1.1.8" }
            ],
            "arguments": {
                "game": ["--version", "${version_name}", "--assetIndex", "${assets_index_name}"],
                "jvm": ["-cp", "${classpath}"]
            }
        }),
    );
    let loader_id = profile.installed_version_id();
    common::write_manifest(
        &profile.data_dir,
        &loader_id,
        &json!({
            "id": loader_id,
            "inheritsFrom": "1.20.1",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "libraries": [
                { "name": "net.fabricmc:fabric-loader:0.15.11" }
            ],
            "arguments": { "jvm": ["-DFabricMcEmu= net.minecraft.client.main.Main "] }
        }),
    );

    let manifest = resolve_version_chain(&loader_id, &profile.data_dir)
        .await
        .unwrap();
    assert_eq!(manifest.main_class.as_deref(), Some("net.fabricmc.loader.impl.launch.knot.KnotClient"));
    assert_eq!(manifest.java_version().major_version, 8);

    let command = build_launch_command(&manifest, &profile, &options()).unwrap();
    let entries = command.classpath.entries();
    assert!(entries[0].ends_with("brigadier-1.1.8.jar"));
    assert!(entries[1].ends_with("fabric-loader-0.15.11.jar"));
    assert!(entries[2].ends_with("1.20.1.jar"));

    let main_idx = command
        .args
        .iter()
        .position(|a| a == &command.main_class)
        .unwrap();
    assert!(command.args[..main_idx]
        .contains(&"-DFabricMcEmu= net.minecraft.client.main.Main ".to_string()));
    assert_eq!(
        &command.args[main_idx + 1..],
        ["--version", loader_id.as_str(), "--assetIndex", "5"]
    );
}

#[test]
fn classifier_only_libraries_never_reach_classpath() {
    let tmp = TempDir::new().unwrap();
    let libs_dir = tmp.path().join("libraries");
    let native_only: Library = serde_json::from_value(json!({
        "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4-nightly-20150209",
        "natives": { "linux": "natives-linux", "windows": "natives-windows" },
        "downloads": {
            "classifiers": {
                "natives-linux": { "path": "org/lwjgl/lwjgl/lwjgl-platform/2.9.4/lwjgl-platform-2.9.4-natives-linux.jar" }
            }
        }
    }))
    .unwrap();
    let regular = library("com.google.guava:guava:31.1-jre", "com/google/guava/guava/31.1-jre/guava-31.1-jre.jar");

    let cp = build_classpath(
        &[native_only, regular],
        &libs_dir,
        Path::new("/game/client.jar"),
        None,
        &vanilla_filter("1.12.2"),
    );
    assert_eq!(cp.len(), 2);
    assert!(!cp.entries().iter().any(|e| e.contains("natives")));
}

#[test]
fn classpath_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let libs_dir = tmp.path().join("libraries");
    let libs = vec![
        library("a:one:1", "a/one/1/one-1.jar"),
        library("b:two:2", "b/two/2/two-2.jar"),
        library("a:one:1", "a/one/1/one-1.jar"),
    ];
    let filter = vanilla_filter("1.20.1");
    let client = tmp.path().join("client.jar");

    let first = build_classpath(&libs, &libs_dir, &client, Some("/x/extra.jar"), &filter);
    let second = build_classpath(&libs, &libs_dir, &client, Some("/x/extra.jar"), &filter);
    assert_eq!(first.joined(), second.joined());
    assert_eq!(first.len(), 4);
}

#[cfg(unix)]
#[test]
fn extra_entry_supersedes_library_with_same_base_path() {
    let tmp = TempDir::new().unwrap();
    let libs_dir = tmp.path().join("libraries");
    let libs = vec![
        library("org.ow2.asm:asm:9.5", "org/ow2/asm/asm/9.5/asm-9.5.jar"),
        library("com.google.guava:guava:31.1-jre", "com/google/guava/guava/31.1-jre/guava-31.1-jre.jar"),
    ];
    let loader_asm = libs_dir
        .join("org/ow2/asm/asm/9.6/asm-9.6.jar")
        .to_string_lossy()
        .to_string();
    let extra = format!("{0}:{0}", loader_asm);

    let cp = build_classpath(
        &libs,
        &libs_dir,
        &tmp.path().join("client.jar"),
        Some(&extra),
        &vanilla_filter("1.20.1"),
    );
    assert!(!cp.entries().iter().any(|e| e.ends_with("asm-9.5.jar")));
    assert_eq!(cp.entries().iter().filter(|e| **e == loader_asm).count(), 1);
    assert!(cp.entries().iter().any(|e| e.ends_with("guava-31.1-jre.jar")));
}

#[test]
fn deny_list_applies_only_to_its_series() {
    let deny = [DeniedLibrary {
        group: "org.lwjgl".to_string(),
        artifact: "lwjgl".to_string(),
        version: Some("3.3.1".to_string()),
        minecraft_series: "1.20".to_string(),
        loader: None,
    }];
    let libs = vec![
        Library::new("org.lwjgl:lwjgl:3.3.1"),
        Library::new("org.lwjgl:lwjgl:3.3.3"),
    ];

    let for_120 = vanilla_filter("1.20").with_deny_list(&deny);
    let kept: Vec<_> = for_120.filter(&libs).iter().map(|l| l.name.clone()).collect();
    assert_eq!(kept, ["org.lwjgl:lwjgl:3.3.3"]);

    let for_121 = vanilla_filter("1.21").with_deny_list(&deny);
    assert_eq!(for_121.filter(&libs).len(), 2);
}

#[test]
fn builtin_deny_list_is_loader_specific() {
    let libs = vec![Library::new("org.lwjgl:lwjgl:3.3.1")];
    let forge = LibraryFilter::new(
        linux(),
        FeatureFlags::default(),
        LoaderContext::with_loader("1.20.1", ModloaderType::Forge, Some("47.2.0".to_string())),
    );
    assert!(forge.filter(&libs).is_empty());

    let fabric = LibraryFilter::new(
        linux(),
        FeatureFlags::default(),
        LoaderContext::with_loader("1.20.1", ModloaderType::Fabric, Some("0.15.0".to_string())),
    );
    assert_eq!(fabric.filter(&libs).len(), 1);
}

#[test]
fn missing_client_jar_fails_the_build() {
    let tmp = TempDir::new().unwrap();
    let mut profile = common::game_profile(tmp.path(), "survival", "1.20.1");
    profile.version_id = "1.19.4".to_string();
    let manifest = VersionManifest::from_value(json!({
        "id": "1.19.4",
        "mainClass": "net.minecraft.client.main.Main",
        "libraries": []
    }))
    .unwrap();
    let err = build_launch_command(&manifest, &profile, &options()).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn game_directory_with_spaces_is_one_argument() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("John Smith");
    let profile = common::game_profile(&root, "survival", "1.20.1");
    let manifest = VersionManifest::from_value(json!({
        "id": "1.20.1",
        "mainClass": "net.minecraft.client.main.Main",
        "libraries": [],
        "arguments": {
            "jvm": [],
            "game": ["--gameDir", "${game_directory}", "--assetsDir ${assets_root}"]
        }
    }))
    .unwrap();

    let command = build_launch_command(&manifest, &profile, &options()).unwrap();
    let idx = command.args.iter().position(|a| a == "--gameDir").unwrap();
    let game_dir = dunce::canonicalize(&profile.game_dir).unwrap();
    assert_eq!(command.args[idx + 1], game_dir.to_string_lossy());

    let idx = command.args.iter().position(|a| a == "--assetsDir").unwrap();
    assert!(command.args[idx + 1].contains("John Smith"));
    assert_eq!(command.args.len(), idx + 2);
}
