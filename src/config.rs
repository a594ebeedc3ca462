use std::net::{IpAddr, SocketAddr};
use std::{env, fmt::Display, str::FromStr};

use anyhow::{anyhow, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub max_upload_images: usize,
    /// Wipe the store and load sample documents at startup.
    pub seed_sample_data: bool,
    pub seed_image_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: 5000,
            database_url: None,
            database_max_connections: 5,
            max_upload_images: 10,
            seed_sample_data: false,
            seed_image_dir: "faceImages".to_string(),
        }
    }
}

impl Config {
    /// Reads `.env` (if any) and then the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if database_url.is_none() {
            log::warn!("DATABASE_URL not set, documents will only live in memory");
        }

        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            port: parse_or(&lookup, "PORT", defaults.port)?,
            database_url,
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            max_upload_images: parse_or(&lookup, "MAX_UPLOAD_IMAGES", defaults.max_upload_images)?,
            seed_sample_data: parse_or(&lookup, "SEED_SAMPLE_DATA", defaults.seed_sample_data)?,
            seed_image_dir: parse_or(&lookup, "SEED_IMAGE_DIR", defaults.seed_image_dir)?,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {}: {}", key, e)),
        None => {
            log::info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}
