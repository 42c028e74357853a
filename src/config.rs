use clap::Parser;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres URL, `duckdb://<path>`, or a bare DuckDB file path
    pub url: Option<String>,
    pub pool_size: u32,
    pub connect_timeout_secs: u64,
    pub query_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "groq", "remote", or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        Self::load(args, |key| std::env::var(key).ok())
    }

    /// Layers defaults, the config file, environment variables (read through
    /// `env`) and finally command line args.
    pub fn load<F>(args: &CliArgs, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank variables count as unset
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let mut config_builder = Config::builder()
            .set_default("web.host", "0.0.0.0")?
            .set_default("web.port", 8000)?
            .set_default(
                "web.allowed_origins",
                vec!["http://localhost:3000", "http://localhost:5000"],
            )?
            .set_default("database.pool_size", 5)?
            .set_default("database.connect_timeout_secs", 10)?
            .set_default("database.query_timeout_secs", 30)?
            .set_default("llm.backend", "groq")?
            .set_default("llm.model", "llama-3.1-70b-versatile")?
            .set_default("llm.max_tokens", 500)?
            .set_default("llm.temperature", 0.1)?
            .set_default("llm.timeout_secs", 60)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-analytics/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        config_builder = config_builder
            .set_override_option("web.host", lookup("HOST"))?
            .set_override_option("web.port", lookup("PORT"))?
            .set_override_option("database.url", lookup("DATABASE_URL"))?
            .set_override_option("llm.backend", lookup("LLM_BACKEND"))?
            .set_override_option("llm.api_url", lookup("LLM_API_URL"))?
            .set_override_option("llm.api_key", lookup("GROQ_API_KEY"))?
            .set_override_option("llm.model", lookup("GROQ_MODEL"))?;

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            config.web.allowed_origins = parse_origins(&origins);
        }

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }

        Ok(config)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: None,
                pool_size: 5,
                connect_timeout_secs: 10,
                query_timeout_secs: 30,
            },
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                allowed_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5000".to_string(),
                ],
            },
            llm: LlmConfig {
                backend: "groq".to_string(),
                model: "llama-3.1-70b-versatile".to_string(),
                api_key: None,
                api_url: None,
                max_tokens: 500,
                temperature: 0.1,
                timeout_secs: 60,
            },
        }
    }
}
