//! Configuration loading and precedence tests

use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uppb_config::{ConfigError, ConfigLoader};

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join("config.toml");
    fs::write(&config_path, content).unwrap();
    config_path
}

fn clean_env<F: FnOnce()>(f: F) {
    temp_env::with_vars(
        [
            ("UPPB_REPO_ROOT", None::<&str>),
            ("UPPB_BOOTSTRAP_MAKEFILE", None),
            ("UPP_BM", None),
            ("UPP_BUILD_MODEL", None),
        ],
        f,
    );
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
#[serial]
fn test_defaults_when_no_config_exists() {
    let temp_dir = TempDir::new().unwrap();
    clean_env(|| {
        let loader = ConfigLoader::new().with_global_config_path(temp_dir.path().join("missing.toml"));
        let settings = loader.load(Some(temp_dir.path()), temp_dir.path()).unwrap();

        assert_eq!(settings.repo_root, temp_dir.path());
        assert_eq!(settings.output_dir, PathBuf::from("bin"));
        assert_eq!(settings.sidecar_extensions, vec!["eon".to_string()]);
        assert!(settings.bootstrap_makefile.is_none());
        assert!(settings.method_override.is_none());
    });
}

#[test]
#[serial]
fn test_repo_root_discovered_from_subdirectory() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("uppsrc/ide/Builders");
    fs::create_dir_all(&nested).unwrap();

    clean_env(|| {
        let loader = ConfigLoader::new().with_global_config_path(temp_dir.path().join("missing.toml"));
        let settings = loader.load(None, &nested).unwrap();
        assert_eq!(settings.repo_root, temp_dir.path());
    });
}

#[test]
#[serial]
fn test_repo_root_env_beats_discovery() {
    let temp_dir = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("uppsrc")).unwrap();

    clean_env(|| {
        temp_env::with_var("UPPB_REPO_ROOT", Some(other.path()), || {
            let loader =
                ConfigLoader::new().with_global_config_path(temp_dir.path().join("missing.toml"));
            let settings = loader.load(None, temp_dir.path()).unwrap();
            assert_eq!(settings.repo_root, other.path());
        });
    });
}

#[test]
#[serial]
fn test_global_config_applied() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_config_file(
        temp_dir.path(),
        r#"
[build]
driver_roots = ["./uppsrc"]
output_dir = "out"
sidecar_extensions = [".eon", "cfg"]

[methods]
default = "GCC"

[bootstrap]
makefile = "/opt/umk/Makefile"
out_dir = "_boot"
"#,
    );

    clean_env(|| {
        let loader = ConfigLoader::new().with_global_config_path(&config_path);
        let settings = loader.load(Some(temp_dir.path()), temp_dir.path()).unwrap();

        assert_eq!(settings.driver_roots, vec!["./uppsrc".to_string()]);
        assert_eq!(settings.output_path(), temp_dir.path().join("out"));
        assert_eq!(settings.sidecar_extensions, vec!["eon".to_string(), "cfg".to_string()]);
        assert_eq!(settings.default_method.as_deref(), Some("GCC"));
        assert_eq!(settings.bootstrap_makefile, Some(PathBuf::from("/opt/umk/Makefile")));
        assert_eq!(settings.bootstrap_out_path(), temp_dir.path().join("_boot"));
    });
}

#[test]
#[serial]
fn test_env_makefile_overrides_global() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_config_file(
        temp_dir.path(),
        r#"
[bootstrap]
makefile = "/opt/umk/Makefile"
"#,
    );

    clean_env(|| {
        temp_env::with_var("UPPB_BOOTSTRAP_MAKEFILE", Some("/srv/umk/Makefile"), || {
            let loader = ConfigLoader::new().with_global_config_path(&config_path);
            let settings = loader.load(Some(temp_dir.path()), temp_dir.path()).unwrap();
            assert_eq!(settings.bootstrap_makefile, Some(PathBuf::from("/srv/umk/Makefile")));
        });
    });
}

// ============================================================================
// Invalid Config Tests
// ============================================================================

#[test]
#[serial]
fn test_invalid_toml_syntax() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_config_file(temp_dir.path(), "[build\noutput_dir = ");

    clean_env(|| {
        let loader = ConfigLoader::new().with_global_config_path(&config_path);
        let err = loader.load(Some(temp_dir.path()), temp_dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError { .. }));
    });
}

#[test]
#[serial]
fn test_invalid_value_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_config_file(
        temp_dir.path(),
        r#"
[methods]
default = "  "
"#,
    );

    clean_env(|| {
        let loader = ConfigLoader::new().with_global_config_path(&config_path);
        let err = loader.load(Some(temp_dir.path()), temp_dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    });
}
