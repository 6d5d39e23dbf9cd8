use clap::Parser;
use lazygrid::config::{AppConfig, ConfigManager};
use lazygrid::{Args, GridOptions, ScanOptions};
use std::fs;
use tempfile::TempDir;

// Helper to create a temporary config directory for testing
fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.version, "0.1");
    assert_eq!(config.grid.chunk_size, 200);
    assert_eq!(config.grid.value_options_max_unique, 500);
    assert_eq!(config.grid.eager_row_limit, 50_000);
    assert!(!config.grid.show_id_field);
    assert_eq!(config.grid.table_name, "df");
    assert!(config.performance.polars_streaming);
    assert!(config.file_loading.delimiter.is_none());
    assert!(config.debug.log_level.is_none());
}

#[test]
fn test_write_default_config_respects_force() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let path = config_manager.write_default_config(false).unwrap();
    assert!(path.exists());
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("# lazygrid configuration file"));
    assert!(content.contains("# [grid]"));
    assert!(content.contains("Grid Session Defaults"));

    assert!(config_manager.write_default_config(false).is_err());
    fs::write(&path, "garbage").unwrap();
    config_manager.write_default_config(true).unwrap();
    assert_ne!(fs::read_to_string(&path).unwrap(), "garbage");
}

#[test]
fn test_load_user_file_and_merge() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager.ensure_config_dir().unwrap();
    let path = config_manager.config_path("config.toml");
    fs::write(
        &path,
        r#"
[grid]
chunk_size = 50
table_name = "variants"

[file_loading]
delimiter = 59

[debug]
log_level = "debug"
"#,
    )
    .unwrap();

    let user = AppConfig::load_from_path(&path).unwrap();
    let mut config = AppConfig::default();
    config.merge(user);
    config.validate().unwrap();

    assert_eq!(config.grid.chunk_size, 50);
    assert_eq!(config.grid.table_name, "variants");
    assert_eq!(config.grid.eager_row_limit, 50_000);
    assert_eq!(config.file_loading.delimiter, Some(b';'));
    assert_eq!(config.debug.log_level.as_deref(), Some("debug"));
}

#[test]
fn test_invalid_config_file() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager.ensure_config_dir().unwrap();
    let path = config_manager.config_path("config.toml");
    fs::write(&path, "[grid\nchunk_size = ").unwrap();
    assert!(AppConfig::load_from_path(&path).is_err());

    let missing = config_manager.config_path("absent.toml");
    assert_eq!(
        AppConfig::load_from_path(&missing).unwrap().grid.chunk_size,
        200
    );
}

#[test]
fn test_cli_overrides_config() {
    let mut config = AppConfig::default();
    config.grid.chunk_size = 50;
    config.grid.table_name = "variants".to_string();
    config.file_loading.delimiter = Some(b';');
    config.file_loading.has_header = Some(true);

    let args = Args::try_parse_from([
        "lazygrid",
        "data.csv",
        "--chunk-size",
        "25",
        "--no-header",
        "true",
        "--polars-streaming",
        "false",
    ])
    .unwrap();

    let grid = GridOptions::from_args_and_config(&args, &config);
    assert_eq!(grid.chunk_size, 25);
    assert_eq!(grid.table_name, "variants");
    assert!(!grid.polars_streaming);

    let scan = ScanOptions::from_args_and_config(&args, &config);
    assert_eq!(scan.delimiter, Some(b';'));
    assert_eq!(scan.has_header, Some(false));
    assert!(!scan.ignore_errors);
}

#[test]
fn test_generate_config_flag_parses_without_path() {
    let args = Args::try_parse_from(["lazygrid", "--generate-config", "--force"]).unwrap();
    assert!(args.generate_config);
    assert!(args.force);
    assert!(args.path.is_none());
}
