use crate::models::{BonusWeights, RankingPolicy};
use crate::services::SeedPlan;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub seed: SeedSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

fn default_backend() -> StoreBackend { StoreBackend::Postgres }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Redis L2 for course names; L1-only when unset
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_catalog_url")]
    pub base_url: String,
    /// Saved OData feed, preferred over the network when present
    pub course_file: Option<String>,
    #[serde(default = "default_import_limit")]
    pub import_limit: usize,
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub fetch_remote: bool,
    /// Restrict remote imports to one subject abbreviation (e.g. "CS")
    pub subject: Option<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            course_file: None,
            import_limit: default_import_limit(),
            timeout_secs: default_catalog_timeout(),
            fetch_remote: false,
            subject: None,
        }
    }
}

fn default_catalog_url() -> String { "https://api.purdue.io/odata".to_string() }
fn default_import_limit() -> usize { 50 }
fn default_catalog_timeout() -> u64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    /// Fixed seed for backup-tier scores; random per request when unset
    pub random_seed: Option<u64>,
    #[serde(default)]
    pub bonuses: BonusConfig,
    #[serde(default = "default_primary_limit")]
    pub primary_limit: usize,
    #[serde(default = "default_major_threshold")]
    pub major_threshold: usize,
    #[serde(default = "default_major_target")]
    pub major_target: usize,
    #[serde(default = "default_campus_threshold")]
    pub campus_threshold: usize,
    #[serde(default = "default_campus_target")]
    pub campus_target: usize,
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default = "default_max_common_courses")]
    pub max_common_courses: usize,
    #[serde(default = "default_major_score_range")]
    pub major_score_range: (u32, u32),
    #[serde(default = "default_campus_score_range")]
    pub campus_score_range: (u32, u32),
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            random_seed: None,
            bonuses: BonusConfig::default(),
            primary_limit: default_primary_limit(),
            major_threshold: default_major_threshold(),
            major_target: default_major_target(),
            campus_threshold: default_campus_threshold(),
            campus_target: default_campus_target(),
            result_limit: default_result_limit(),
            max_common_courses: default_max_common_courses(),
            major_score_range: default_major_score_range(),
            campus_score_range: default_campus_score_range(),
        }
    }
}

fn default_primary_limit() -> usize { 15 }
fn default_major_threshold() -> usize { 8 }
fn default_major_target() -> usize { 12 }
fn default_campus_threshold() -> usize { 6 }
fn default_campus_target() -> usize { 10 }
fn default_result_limit() -> usize { 8 }
fn default_max_common_courses() -> usize { 3 }
fn default_major_score_range() -> (u32, u32) { (65, 85) }
fn default_campus_score_range() -> (u32, u32) { (45, 75) }

impl MatchingSettings {
    pub fn policy(&self) -> RankingPolicy {
        RankingPolicy {
            bonuses: BonusWeights {
                same_major: self.bonuses.same_major,
                same_dining: self.bonuses.same_dining,
                same_study_location: self.bonuses.same_study_location,
            },
            primary_limit: self.primary_limit,
            major_threshold: self.major_threshold,
            major_target: self.major_target,
            campus_threshold: self.campus_threshold,
            campus_target: self.campus_target,
            result_limit: self.result_limit,
            max_common_courses: self.max_common_courses,
            major_score_range: self.major_score_range,
            campus_score_range: self.campus_score_range,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BonusConfig {
    #[serde(default = "default_major_bonus")]
    pub same_major: f64,
    #[serde(default = "default_dining_bonus")]
    pub same_dining: f64,
    #[serde(default = "default_location_bonus")]
    pub same_study_location: f64,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            same_major: default_major_bonus(),
            same_dining: default_dining_bonus(),
            same_study_location: default_location_bonus(),
        }
    }
}

fn default_major_bonus() -> f64 { 20.0 }
fn default_dining_bonus() -> f64 { 10.0 }
fn default_location_bonus() -> f64 { 15.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSettings {
    #[serde(default)]
    pub enabled: bool,
    pub random_seed: Option<u64>,
    #[serde(default = "default_demo_users")]
    pub demo_users: usize,
    #[serde(default = "default_campus_count")]
    pub campus_count: i64,
    #[serde(default = "default_major_count")]
    pub major_count: i64,
    #[serde(default = "default_dining_hall_count")]
    pub dining_hall_count: i64,
    #[serde(default = "default_study_location_count")]
    pub study_location_count: i64,
}

impl Default for SeedSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            random_seed: None,
            demo_users: default_demo_users(),
            campus_count: default_campus_count(),
            major_count: default_major_count(),
            dining_hall_count: default_dining_hall_count(),
            study_location_count: default_study_location_count(),
        }
    }
}

fn default_demo_users() -> usize { 20 }
fn default_campus_count() -> i64 { 1 }
fn default_major_count() -> i64 { 8 }
fn default_dining_hall_count() -> i64 { 5 }
fn default_study_location_count() -> i64 { 6 }

impl SeedSettings {
    pub fn plan(&self) -> SeedPlan {
        SeedPlan {
            demo_users: self.demo_users,
            campus_ids: (1..=self.campus_count).collect(),
            major_ids: (1..=self.major_count).collect(),
            dining_hall_ids: (1..=self.dining_hall_count).collect(),
            study_location_ids: (1..=self.study_location_count).collect(),
            ..SeedPlan::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    /// Unrecognised names fall back to JSON
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" | "text" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

impl LoggingSettings {
    /// Effective level and format: `LOG_LEVEL` / `LOG_FORMAT` win over the file
    pub fn resolve(&self, level_env: Option<String>, format_env: Option<String>) -> (String, LogFormat) {
        let level = level_env.unwrap_or_else(|| self.level.clone());
        let format = format_env.unwrap_or_else(|| self.format.clone());
        (level, LogFormat::parse(&format))
    }
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with CAMPUS_)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., CAMPUS__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("CAMPUS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        apply_env_overrides(settings)?.try_deserialize()
    }
}

/// Honour the conventional `DATABASE_URL` and `REDIS_URL` variables
fn apply_env_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }
    if let Ok(redis_url) = env::var("REDIS_URL") {
        builder = builder.set_override("cache.redis_url", redis_url)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_default_policy_matches_ranking_defaults() {
        assert_eq!(MatchingSettings::default().policy(), RankingPolicy::default());
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }

    #[test]
    fn test_minimal_toml_fills_defaults() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                host = "127.0.0.1"
                port = 8080

                [database]
                backend = "memory"
                url = ""

                [matching]
                random_seed = 7
                bonuses = { same_major = 25.0 }
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.database.backend, StoreBackend::Memory);
        assert_eq!(settings.matching.random_seed, Some(7));
        assert_eq!(settings.matching.policy().bonuses.same_major, 25.0);
        assert_eq!(settings.matching.policy().bonuses.same_dining, 10.0);
        assert_eq!(settings.matching.primary_limit, 15);
        assert!(!settings.seed.enabled);
        assert!(settings.cache.redis_url.is_none());
    }

    #[test]
    fn test_logging_section_and_env_precedence() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                host = "127.0.0.1"
                port = 8080

                [database]
                url = ""

                [catalog]
                subject = "CS"

                [logging]
                level = "debug"
                format = "pretty"
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.catalog.subject.as_deref(), Some("CS"));
        assert_eq!(
            settings.logging.resolve(None, None),
            ("debug".to_string(), LogFormat::Pretty)
        );
        assert_eq!(
            settings.logging.resolve(Some("warn".to_string()), Some("json".to_string())),
            ("warn".to_string(), LogFormat::Json)
        );
    }

    #[test]
    fn test_log_format_names() {
        assert_eq!(LogFormat::parse(&default_log_format()), LogFormat::Json);
        assert_eq!(LogFormat::parse("Pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Json);
    }

    #[test]
    fn test_seed_plan_from_settings() {
        let plan = SeedSettings {
            campus_count: 2,
            ..SeedSettings::default()
        }
        .plan();

        assert_eq!(plan.campus_ids, vec![1, 2]);
        assert_eq!(plan.major_ids.len(), 8);
        assert_eq!(plan.demo_users, 20);
    }
}
