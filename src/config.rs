use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Log levels accepted by `debug.log_level` and `--log-level`.
pub const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Default configuration as a commented TOML template.
    /// Every field is commented out so defaults apply until the user uncomments it.
    pub fn generate_default_config(&self) -> String {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config)
            .unwrap_or_else(|e| panic!("Failed to serialize default config: {}", e));

        let comments = Self::collect_all_comments();
        Self::comment_all_fields(toml_str, comments)
    }

    fn collect_all_comments() -> HashMap<String, String> {
        let mut comments = HashMap::new();

        for (field, comment) in APP_COMMENTS {
            comments.insert(field.to_string(), comment.to_string());
        }
        let sections: [(&str, &[(&str, &str)]); 4] = [
            ("grid", GRID_COMMENTS),
            ("file_loading", FILE_LOADING_COMMENTS),
            ("performance", PERFORMANCE_COMMENTS),
            ("debug", DEBUG_COMMENTS),
        ];
        for (section, fields) in sections {
            for (field, comment) in fields {
                comments.insert(format!("{}.{}", section, field), comment.to_string());
            }
        }

        comments
    }

    fn comment_all_fields(toml: String, comments: HashMap<String, String>) -> String {
        let mut result = String::new();
        result.push_str("# lazygrid configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        let mut seen_fields: HashSet<String> = HashSet::new();

        for line in toml.lines() {
            if let Some(section) = Self::extract_section_name(line) {
                if let Some(header) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push_str(header.1);
                    result.push('\n');
                }
                current_section = section;
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                continue;
            }

            if let Some(field_path) = Self::extract_field_path_simple(line, &current_section) {
                if let Some(comment) = comments.get(&field_path) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                seen_fields.insert(field_path);
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        Self::add_missing_option_fields(result, &comments, &seen_fields)
    }

    /// Option fields are skipped by the serializer when None; list them anyway.
    fn add_missing_option_fields(
        mut result: String,
        comments: &HashMap<String, String>,
        seen_fields: &HashSet<String>,
    ) -> String {
        let option_fields = [
            "file_loading.delimiter",
            "file_loading.has_header",
            "file_loading.infer_schema_length",
            "file_loading.ignore_errors",
            "debug.log_level",
        ];

        let mut missing_by_section: Vec<(String, Vec<&str>)> = Vec::new();
        for field_path in option_fields {
            if seen_fields.contains(field_path) || !comments.contains_key(field_path) {
                continue;
            }
            let Some((section, _)) = field_path.split_once('.') else {
                continue;
            };
            match missing_by_section.iter_mut().find(|(s, _)| s == section) {
                Some((_, fields)) => fields.push(field_path),
                None => missing_by_section.push((section.to_string(), vec![field_path])),
            }
        }

        for (section, fields) in &missing_by_section {
            let section_header = format!("[{}]", section);
            let Some(section_pos) = result.find(&section_header) else {
                continue;
            };
            let after_header_start = section_pos + section_header.len();
            let newline_pos = result[after_header_start..].find('\n').unwrap_or(0);
            let insert_pos = after_header_start + newline_pos + 1;

            let mut new_content = String::new();
            for field_path in fields {
                if let Some(comment) = comments.get(*field_path) {
                    for comment_line in comment.lines() {
                        new_content.push_str("# ");
                        new_content.push_str(comment_line);
                        new_content.push('\n');
                    }
                }
                let field_name = field_path.rsplit('.').next().unwrap_or(field_path);
                new_content.push_str(&format!("# {} = null\n", field_name));
                new_content.push('\n');
            }
            result.insert_str(insert_pos, &new_content);
        }

        result
    }

    /// Section name from a TOML line like "[grid]"
    fn extract_section_name(line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            Some(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            None
        }
    }

    fn extract_field_path_simple(line: &str, current_section: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }
        let (field_name, _) = trimmed.split_once('=')?;
        let field_name = field_name.trim();
        if current_section.is_empty() {
            Some(field_name.to_string())
        } else {
            Some(format!("{}.{}", current_section, field_name))
        }
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config())?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub grid: GridConfig,
    pub file_loading: FileLoadingConfig,
    pub performance: PerformanceConfig,
    pub debug: DebugConfig,
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "grid",
        "# ============================================================================\n# Grid Session Defaults\n# ============================================================================",
    ),
    (
        "file_loading",
        "# ============================================================================\n# File Loading Defaults\n# ============================================================================",
    ),
    (
        "performance",
        "# ============================================================================\n# Performance Settings\n# ============================================================================",
    ),
    (
        "debug",
        "# ============================================================================\n# Debug Settings\n# ============================================================================",
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub chunk_size: usize,
    pub value_options_max_unique: usize,
    pub eager_row_limit: usize,
    pub show_id_field: bool,
    pub table_name: String,
}

const GRID_COMMENTS: &[(&str, &str)] = &[
    ("chunk_size", "Rows fetched per page / scroll chunk"),
    (
        "value_options_max_unique",
        "Columns with more distinct values than this get a free-text filter instead of a dropdown",
    ),
    (
        "eager_row_limit",
        "Datasets with at most this many rows get dropdown choices computed up front.\nLarger datasets compute them on first use of a column's filter",
    ),
    (
        "show_id_field",
        "Include the row id column in the column definitions",
    ),
    ("table_name", "Table name used in generated SQL"),
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileLoadingConfig {
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub infer_schema_length: Option<usize>,
    pub ignore_errors: Option<bool>,
}

const FILE_LOADING_COMMENTS: &[(&str, &str)] = &[
    (
        "delimiter",
        "Default delimiter for CSV files (as ASCII value, e.g., 44 for comma)\nIf not specified, the delimiter implied by the extension is used",
    ),
    (
        "has_header",
        "Whether files have headers by default\nnull = reader default (header), true = has header, false = no header",
    ),
    (
        "infer_schema_length",
        "Number of rows used to infer CSV column types",
    ),
    (
        "ignore_errors",
        "When true, CSV parse errors are skipped instead of failing the scan",
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Use the Polars streaming engine for collect when the `streaming` feature is built in.
    pub polars_streaming: bool,
}

const PERFORMANCE_COMMENTS: &[(&str, &str)] = &[(
    "polars_streaming",
    "Use the Polars streaming engine when collecting pages and counts (requires the streaming build feature)",
)];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: Option<String>,
}

const DEBUG_COMMENTS: &[(&str, &str)] = &[(
    "log_level",
    "Log level written to stderr: off, error, warn, info, debug or trace\nOverridden by LAZYGRID_LOG and --log-level",
)];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            grid: GridConfig::default(),
            file_loading: FileLoadingConfig::default(),
            performance: PerformanceConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            value_options_max_unique: 500,
            eager_row_limit: 50_000,
            show_id_field: false,
            table_name: "df".to_string(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            polars_streaming: true,
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let mut config = AppConfig::default();

        if let Ok(user_config) = Self::load_user_config(app_name) {
            config.merge(user_config);
        }

        config.validate()?;

        Ok(config)
    }

    /// Load user configuration from ~/.config/lazygrid/config.toml
    fn load_user_config(app_name: &str) -> Result<AppConfig> {
        let config_manager = ConfigManager::new(app_name)?;
        Self::load_from_path(&config_manager.config_path("config.toml"))
    }

    /// Parse a config file. A missing file yields the defaults.
    pub fn load_from_path(config_path: &Path) -> Result<AppConfig> {
        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.grid.merge(other.grid);
        self.file_loading.merge(other.file_loading);
        self.performance.merge(other.performance);
        self.debug.merge(other.debug);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.grid.chunk_size == 0 {
            return Err(eyre!("chunk_size must be greater than 0"));
        }

        if let Some(level) = &self.debug.log_level {
            if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(eyre!(
                    "Invalid log_level: {}. Must be one of {}",
                    level,
                    LOG_LEVELS.join(", ")
                ));
            }
        }

        Ok(())
    }
}

impl GridConfig {
    pub fn merge(&mut self, other: Self) {
        let default = GridConfig::default();
        if other.chunk_size != default.chunk_size {
            self.chunk_size = other.chunk_size;
        }
        if other.value_options_max_unique != default.value_options_max_unique {
            self.value_options_max_unique = other.value_options_max_unique;
        }
        if other.eager_row_limit != default.eager_row_limit {
            self.eager_row_limit = other.eager_row_limit;
        }
        if other.show_id_field != default.show_id_field {
            self.show_id_field = other.show_id_field;
        }
        if other.table_name != default.table_name {
            self.table_name = other.table_name;
        }
    }
}

impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.has_header.is_some() {
            self.has_header = other.has_header;
        }
        if other.infer_schema_length.is_some() {
            self.infer_schema_length = other.infer_schema_length;
        }
        if other.ignore_errors.is_some() {
            self.ignore_errors = other.ignore_errors;
        }
    }
}

impl PerformanceConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PerformanceConfig::default();
        if other.polars_streaming != default.polars_streaming {
            self.polars_streaming = other.polars_streaming;
        }
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_is_fully_commented() {
        let manager = ConfigManager::with_dir(PathBuf::from("/unused"));
        let template = manager.generate_default_config();
        assert!(template.contains("# [grid]"));
        assert!(template.contains("# chunk_size = 200"));
        assert!(template.contains("# delimiter = null"));
        assert!(template.contains("# log_level = null"));
        for line in template.lines() {
            let trimmed = line.trim();
            assert!(
                trimmed.is_empty() || trimmed.starts_with('#'),
                "uncommented line: {}",
                line
            );
        }
        // Commented template parses to the defaults.
        let parsed: AppConfig = toml::from_str(&template).unwrap();
        assert_eq!(parsed.grid, GridConfig::default());
    }

    #[test]
    fn test_merge_only_overrides_set_values() {
        let mut base = AppConfig::default();
        base.file_loading.delimiter = Some(b';');
        let other: AppConfig = toml::from_str(
            "[grid]\nchunk_size = 50\n[file_loading]\nhas_header = false\n",
        )
        .unwrap();
        base.merge(other);
        assert_eq!(base.grid.chunk_size, 50);
        assert_eq!(base.grid.table_name, "df");
        assert_eq!(base.file_loading.delimiter, Some(b';'));
        assert_eq!(base.file_loading.has_header, Some(false));
        assert!(base.performance.polars_streaming);
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().validate().is_ok());

        let mut config = AppConfig::default();
        config.grid.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.debug.log_level = Some("loud".into());
        assert!(config.validate().is_err());
        config.debug.log_level = Some("DEBUG".into());
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.version = "2.0".into();
        assert!(config.validate().is_err());
    }
}
