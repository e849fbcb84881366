// Configuration loading and parsing (tournament.toml, settings.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub tournament: TournamentConfig,
    pub sources: SourceUrls,
    pub roles: RoleSheet,
    pub harvest: HarvestConfig,
    pub auction: AuctionConfig,
    pub db_path: String,
    pub catalog_path: String,
}

// ---------------------------------------------------------------------------
// tournament.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire tournament.toml file.
#[derive(Debug, Clone, Deserialize)]
struct TournamentFile {
    tournament: TournamentConfig,
    sources: SourceUrls,
    roles: RoleSheet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TournamentConfig {
    pub name: String,
    pub season: String,
}

/// One records-table URL per stat category.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceUrls {
    pub runs: String,
    pub wickets: String,
    pub dismissals: String,
    pub catches: String,
}

/// Captain and vice-captain designations, versioned so that scored totals
/// can be traced back to the sheet they were computed under.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleSheet {
    pub version: String,
    #[serde(default)]
    pub captains: Vec<String>,
    #[serde(default)]
    pub vice_captains: Vec<String>,
}

// ---------------------------------------------------------------------------
// settings.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire settings.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    database: DatabaseSection,
    harvest: HarvestConfig,
    catalog: CatalogSection,
    auction: AuctionConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    pub interval_secs: u64,
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuctionConfig {
    #[serde(default)]
    pub bidders: Vec<String>,
    pub opening_balance: i64,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/tournament.toml` and
/// `config/settings.toml`, both relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- tournament.toml (required) ---
    let tournament_path = config_dir.join("tournament.toml");
    let tournament_text = read_file(&tournament_path)?;
    let tournament_file: TournamentFile =
        toml::from_str(&tournament_text).map_err(|e| ConfigError::ParseError {
            path: tournament_path.clone(),
            source: e,
        })?;

    // --- settings.toml (required) ---
    let settings_path = config_dir.join("settings.toml");
    let settings_text = read_file(&settings_path)?;
    let settings_file: SettingsFile =
        toml::from_str(&settings_text).map_err(|e| ConfigError::ParseError {
            path: settings_path.clone(),
            source: e,
        })?;

    let config = Config {
        tournament: tournament_file.tournament,
        sources: tournament_file.sources,
        roles: tournament_file.roles,
        harvest: settings_file.harvest,
        auction: settings_file.auction,
        db_path: settings_file.database.path,
        catalog_path: settings_file.catalog.path,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        // If config/ also doesn't exist, the app will fail to load config.
        // Return an error with a clear message about the missing defaults directory.
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        // Skip non-files and entries without a file name
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        // Skip .example template files
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // File already exists in config/, skip it
            }
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    // Tournament validations
    if config.tournament.name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "tournament.name".into(),
            message: "must not be empty".into(),
        });
    }

    // Every category needs a fetchable URL
    let s = &config.sources;
    let source_fields: &[(&str, &str)] = &[
        ("sources.runs", &s.runs),
        ("sources.wickets", &s.wickets),
        ("sources.dismissals", &s.dismissals),
        ("sources.catches", &s.catches),
    ];
    for (name, url) in source_fields {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be an http(s) URL, got `{url}`"),
            });
        }
    }

    // Role sheet validations
    if config.roles.version.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "roles.version".into(),
            message: "must not be empty".into(),
        });
    }
    for captain in &config.roles.captains {
        if config.roles.vice_captains.contains(captain) {
            return Err(ConfigError::ValidationError {
                field: "roles.vice_captains".into(),
                message: format!("`{captain}` is listed as both captain and vice-captain"),
            });
        }
    }

    // Harvest validations
    if config.harvest.interval_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "harvest.interval_secs".into(),
            message: "must be greater than 0".into(),
        });
    }
    if config.harvest.fetch_timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "harvest.fetch_timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    // Auction validations
    if config.auction.opening_balance <= 0 {
        return Err(ConfigError::ValidationError {
            field: "auction.opening_balance".into(),
            message: format!(
                "must be greater than 0, got {}",
                config.auction.opening_balance
            ),
        });
    }
    for (i, bidder) in config.auction.bidders.iter().enumerate() {
        if bidder.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: "auction.bidders".into(),
                message: format!("bidder at index {i} is empty"),
            });
        }
        if config.auction.bidders[..i].contains(bidder) {
            return Err(ConfigError::ValidationError {
                field: "auction.bidders".into(),
                message: format!("duplicate bidder `{bidder}`"),
            });
        }
    }

    // Paths
    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }
    if config.catalog_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "catalog.path".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    /// Helper: returns the path to the project root (where defaults/ lives).
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Helper: sets up a temp dir whose config/ holds copies of the default
    /// tournament.toml and settings.toml, optionally rewritten.
    fn temp_config(
        name: &str,
        mutate_tournament: impl Fn(String) -> String,
        mutate_settings: impl Fn(String) -> String,
    ) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();

        let root = project_root();
        let tournament = fs::read_to_string(root.join("defaults/tournament.toml")).unwrap();
        let settings = fs::read_to_string(root.join("defaults/settings.toml")).unwrap();
        fs::write(
            config_dir.join("tournament.toml"),
            mutate_tournament(tournament),
        )
        .unwrap();
        fs::write(config_dir.join("settings.toml"), mutate_settings(settings)).unwrap();

        tmp
    }

    #[test]
    fn load_valid_config_from_project_files() {
        let root = project_root();
        ensure_config_files(&root).expect("should copy default configs");
        let config = load_config_from(&root).expect("should load valid config");

        // Tournament assertions
        assert_eq!(config.tournament.name, "ICC Champions Trophy 2024-25");
        assert_eq!(config.tournament.season, "2024-25");
        assert!(config.sources.runs.contains("batting-most-runs-career"));
        assert!(config.sources.wickets.contains("bowling-most-wickets-career"));
        assert!(config
            .sources
            .dismissals
            .contains("keeping-most-dismissals-career"));
        assert!(config
            .sources
            .catches
            .contains("fielding-most-catches-career"));

        // Role sheet assertions
        assert_eq!(config.roles.version, "ct25-v1");
        assert_eq!(config.roles.captains.len(), 5);
        assert_eq!(config.roles.vice_captains.len(), 5);
        assert!(config.roles.captains.contains(&"V Kohli (IND)".to_string()));
        assert!(config
            .roles
            .vice_captains
            .contains(&"RG Sharma (IND)".to_string()));

        // Settings assertions
        assert_eq!(config.harvest.interval_secs, 300);
        assert_eq!(config.harvest.fetch_timeout_secs, 30);
        assert_eq!(config.db_path, "auction-desk.db");
        assert_eq!(config.catalog_path, "data/players.csv");
        assert_eq!(config.auction.bidders.len(), 6);
        assert_eq!(config.auction.opening_balance, 1000);
    }

    #[test]
    fn rejects_non_http_source_url() {
        let tmp = temp_config(
            "auction_config_test_bad_url",
            |t| {
                t.replace(
                    "https://www.espncricinfo.com/records/tournament/bowling-most-wickets-career/icc-champions-trophy-2024-25-16814",
                    "not-a-url",
                )
            },
            |s| s,
        );

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "sources.wickets");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_roles_version() {
        let tmp = temp_config(
            "auction_config_test_empty_version",
            |t| t.replace("version = \"ct25-v1\"", "version = \"\""),
            |s| s,
        );

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "roles.version");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_player_in_both_role_lists() {
        let tmp = temp_config(
            "auction_config_test_role_overlap",
            |t| t.replace("\"JC Buttler (ENG)\"", "\"V Kohli (IND)\""),
            |s| s,
        );

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, message } => {
                assert_eq!(field, "roles.vice_captains");
                assert!(message.contains("V Kohli (IND)"));
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_harvest_interval() {
        let tmp = temp_config(
            "auction_config_test_zero_interval",
            |t| t,
            |s| s.replace("interval_secs = 300", "interval_secs = 0"),
        );

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "harvest.interval_secs");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_fetch_timeout() {
        let tmp = temp_config(
            "auction_config_test_zero_timeout",
            |t| t,
            |s| s.replace("fetch_timeout_secs = 30", "fetch_timeout_secs = 0"),
        );

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "harvest.fetch_timeout_secs");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_opening_balance() {
        let tmp = temp_config(
            "auction_config_test_zero_balance",
            |t| t,
            |s| s.replace("opening_balance = 1000", "opening_balance = 0"),
        );

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "auction.opening_balance");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_duplicate_bidders() {
        let tmp = temp_config(
            "auction_config_test_dup_bidders",
            |t| t,
            |s| s.replace("\"Dev\"", "\"Arjun\""),
        );

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, message } => {
                assert_eq!(field, "auction.bidders");
                assert!(message.contains("Arjun"));
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_tournament_toml() {
        let tmp = std::env::temp_dir().join("auction_config_test_missing_tournament");
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();

        // No tournament.toml written
        let root = project_root();
        fs::copy(
            root.join("defaults/settings.toml"),
            config_dir.join("settings.toml"),
        )
        .unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::FileNotFound { path } => {
                assert!(path.ends_with("tournament.toml"));
            }
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_settings_toml() {
        let tmp = std::env::temp_dir().join("auction_config_test_missing_settings");
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();

        let root = project_root();
        fs::copy(
            root.join("defaults/tournament.toml"),
            config_dir.join("tournament.toml"),
        )
        .unwrap();
        // No settings.toml written

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::FileNotFound { path } => {
                assert!(path.ends_with("settings.toml"));
            }
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = std::env::temp_dir().join("auction_config_test_invalid_toml");
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();

        fs::write(
            config_dir.join("tournament.toml"),
            "this is not valid [[[ toml",
        )
        .unwrap();

        let root = project_root();
        fs::copy(
            root.join("defaults/settings.toml"),
            config_dir.join("settings.toml"),
        )
        .unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ParseError { path, .. } => {
                assert!(path.ends_with("tournament.toml"));
            }
            other => panic!("expected ParseError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_files() {
        let tmp = std::env::temp_dir().join("auction_config_test_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);

        // Create defaults/ with tournament.toml and settings.toml
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();

        let root = project_root();
        fs::copy(
            root.join("defaults/tournament.toml"),
            defaults_dir.join("tournament.toml"),
        )
        .unwrap();
        fs::copy(
            root.join("defaults/settings.toml"),
            defaults_dir.join("settings.toml"),
        )
        .unwrap();
        // Add an example file that should NOT be copied
        fs::write(
            defaults_dir.join("settings.toml.example"),
            "# template\n",
        )
        .unwrap();

        // No config/ dir exists yet
        assert!(!tmp.join("config").exists());

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 2);

        // config/ should now exist with both files
        assert!(tmp.join("config/tournament.toml").exists());
        assert!(tmp.join("config/settings.toml").exists());
        // example file should NOT have been copied
        assert!(!tmp.join("config/settings.toml.example").exists());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_skips_existing() {
        let tmp = std::env::temp_dir().join("auction_config_test_ensure_skips");
        let _ = fs::remove_dir_all(&tmp);

        let defaults_dir = tmp.join("defaults");
        let config_dir = tmp.join("config");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::create_dir_all(&config_dir).unwrap();

        let root = project_root();
        fs::copy(
            root.join("defaults/tournament.toml"),
            defaults_dir.join("tournament.toml"),
        )
        .unwrap();
        fs::copy(
            root.join("defaults/settings.toml"),
            defaults_dir.join("settings.toml"),
        )
        .unwrap();

        // Pre-create tournament.toml in config/ with custom content
        fs::write(config_dir.join("tournament.toml"), "# custom\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        // Only settings.toml should be copied (tournament.toml already exists)
        assert_eq!(copied.len(), 1);
        assert!(copied[0].ends_with("settings.toml"));

        // Original custom content should be preserved
        let content = fs::read_to_string(config_dir.join("tournament.toml")).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_no_defaults_dir_is_ok() {
        let tmp = std::env::temp_dir().join("auction_config_test_no_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        // Create config/ so it's not an error (just no defaults to copy)
        fs::create_dir_all(tmp.join("config")).unwrap();

        // No defaults/ directory, but config/ exists - should succeed
        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert!(copied.is_empty());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("auction_config_test_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        // Neither defaults/ nor config/ exist
        let err = ensure_config_files(&tmp).unwrap_err();
        match &err {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("neither defaults/ nor config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }
}
