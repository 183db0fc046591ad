use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "hijab-gallery", about = "Hijab style catalog with reviews")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub reviews: ReviewConfig,
    pub catalog: CatalogConfig,
    pub cors: CorsConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub session_hours: u64,
    pub bcrypt_cost: u32,
    pub max_login_attempts: u32,
    pub lockout_minutes: u64,
    pub verification_token_hours: u64,
    pub reset_token_minutes: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ReviewConfig {
    /// Distinct reports that move a review to Flagged
    pub flag_threshold: usize,
    pub edit_history_limit: usize,
    /// Points awarded to the author of a new review
    pub review_points: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub featured_min_likes: u32,
    pub featured_limit: u32,
    pub page_size: u32,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Front-end origin allowed to call the API; any origin when unset
    pub allowed_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_hours: 24 * 7,
            bcrypt_cost: 12,
            max_login_attempts: 5,
            lockout_minutes: 120,
            verification_token_hours: 24,
            reset_token_minutes: 10,
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            flag_threshold: 3,
            edit_history_limit: 50,
            review_points: 10,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            featured_min_likes: 50,
            featured_limit: 6,
            page_size: 12,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("hijab-gallery.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match &cli.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".hijab-gallery"))
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory")),
        }
    }

    /// Database file; `load` always resolves it, the fallback only matters for
    /// hand-built configs.
    pub fn db_path(&self) -> &Path {
        self.database
            .path
            .as_deref()
            .unwrap_or_else(|| Path::new("hijab-gallery.db"))
    }
}
