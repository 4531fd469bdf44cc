use anyhow::Context;

/// Runtime configuration, read from the environment (a `.env` file is loaded
/// first when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_service_url: String,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = dotenv::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let bind_addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
        let session_service_url =
            dotenv::var("SESSION_SERVICE_URL").context("SESSION_SERVICE_URL is not set")?;
        let cors_origins = dotenv::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_owned())
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database_url,
            bind_addr,
            session_service_url,
            cors_origins,
        })
    }
}
