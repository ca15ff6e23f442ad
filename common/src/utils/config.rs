use std::{fmt, path::Path};

use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    S3,
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::S3
}

/// Process-wide settings, loaded once at startup and passed by reference afterwards.
///
/// Every field tolerates a missing source: unset variables fall back to an empty
/// string (credentials, bucket) or a fixed default, and loading never fails on absence.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub open_ai_key: String,
    #[serde(default)]
    pub aws_access_key: String,
    #[serde(default)]
    pub aws_secret_key: String,
    #[serde(default)]
    pub aws_bucket_name: String,
    #[serde(default = "default_vector_db_path")]
    pub vector_db_path: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_region")]
    pub aws_region: String,
    #[serde(default)]
    pub aws_endpoint: Option<String>,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

pub const DEFAULT_VECTOR_DB_PATH: &str = "vector_db";

fn default_vector_db_path() -> String {
    DEFAULT_VECTOR_DB_PATH.to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            open_ai_key: String::new(),
            aws_access_key: String::new(),
            aws_secret_key: String::new(),
            aws_bucket_name: String::new(),
            vector_db_path: default_vector_db_path(),
            openai_base_url: default_base_url(),
            aws_region: default_region(),
            aws_endpoint: None,
            storage: default_storage_kind(),
            data_dir: default_data_dir(),
        }
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("open_ai_key", &redact(&self.open_ai_key))
            .field("aws_access_key", &redact(&self.aws_access_key))
            .field("aws_secret_key", &redact(&self.aws_secret_key))
            .field("aws_bucket_name", &self.aws_bucket_name)
            .field("vector_db_path", &self.vector_db_path)
            .field("openai_base_url", &self.openai_base_url)
            .field("aws_region", &self.aws_region)
            .field("aws_endpoint", &self.aws_endpoint)
            .field("storage", &self.storage)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

/// Load configuration from an optional `config` file and the process environment.
///
/// Variables from a `.env` file in the working directory are merged underneath the
/// process environment, which wins on conflicts.
pub fn get_config() -> Result<AppConfig, ConfigError> {
    let process = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
    let vars = collect_vars(Path::new(".env"), process);

    load_config(Environment::default().source(Some(vars)))
}

fn collect_vars(
    dotenv_path: &Path,
    process: impl IntoIterator<Item = (String, String)>,
) -> Map<String, String> {
    let mut vars = Map::new();

    match dotenvy::from_path_iter(dotenv_path) {
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Ok((key, value)) => {
                        vars.insert(key, value);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Ignoring malformed .env entry");
                    }
                }
            }
        }
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "Ignoring unreadable .env file"),
    }

    vars.extend(process);
    vars
}

fn load_config(environment: Environment) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(environment)
        .build()?;

    config.try_deserialize()
}
