use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub database: Database,
    pub telegram: Telegram,
    #[serde(default)]
    pub categories: Categories,
}

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Database location; in-memory when no path is configured.
#[derive(Debug, Default, Deserialize)]
pub struct Database {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
    #[serde(default)]
    pub allowed_users: Vec<u64>,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct Categories {
    #[serde(default = "default_categories_file")]
    pub file: String,
}

impl Default for Categories {
    fn default() -> Self {
        Self {
            file: default_categories_file(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_export_dir() -> String {
    "exports".to_string()
}

fn default_categories_file() -> String {
    "data/categories.json".to_string()
}

impl Settings {
    /// Reads `config/kopilka.toml` (when present) and `KOPILKA_*` overrides.
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/kopilka").required(false))
            .add_source(Environment::with_prefix("KOPILKA").separator("__"))
            .build()?
            .try_deserialize()
    }
}
