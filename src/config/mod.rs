use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub allowed_content_types: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations_on_start = v.parse().unwrap_or(self.database.run_migrations_on_start);
        }

        // API overrides
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_UPLOAD_DIR") {
            self.storage.upload_dir = v;
        }
        if let Ok(v) = env::var("STORAGE_MAX_UPLOAD_BYTES") {
            self.storage.max_upload_bytes = v.parse().unwrap_or(self.storage.max_upload_bytes);
        }
        if let Ok(v) = env::var("STORAGE_ALLOWED_CONTENT_TYPES") {
            self.storage.allowed_content_types = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                run_migrations_on_start: true,
            },
            api: ApiConfig {
                default_page_size: 50,
                max_page_size: 500,
                enable_rate_limiting: false,
                rate_limit_requests: 1000,
                rate_limit_window_secs: 60,
                max_request_size_bytes: 1024 * 1024, // 1MB JSON bodies
            },
            security: SecurityConfig {
                // Development fallback only; set JWT_SECRET everywhere else
                jwt_secret: "dev-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                enable_cors: true,
                cors_origins: vec!["*".to_string()],
            },
            storage: StorageConfig {
                upload_dir: "./uploads".to_string(),
                max_upload_bytes: 10 * 1024 * 1024, // 10MB
                allowed_content_types: Self::default_content_types(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                run_migrations_on_start: true,
            },
            api: ApiConfig {
                default_page_size: 50,
                max_page_size: 200,
                enable_rate_limiting: true,
                rate_limit_requests: 100,
                rate_limit_window_secs: 60,
                max_request_size_bytes: 512 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            storage: StorageConfig {
                upload_dir: "/var/lib/workforce/uploads".to_string(),
                max_upload_bytes: 10 * 1024 * 1024,
                allowed_content_types: Self::default_content_types(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                run_migrations_on_start: false,
            },
            api: ApiConfig {
                default_page_size: 25,
                max_page_size: 100,
                enable_rate_limiting: true,
                rate_limit_requests: 60,
                rate_limit_window_secs: 60,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            storage: StorageConfig {
                upload_dir: "/var/lib/workforce/uploads".to_string(),
                max_upload_bytes: 5 * 1024 * 1024,
                allowed_content_types: Self::default_content_types(),
            },
        }
    }

    fn default_content_types() -> Vec<String> {
        [
            "application/pdf",
            "image/png",
            "image/jpeg",
            "text/csv",
            "text/plain",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.api.default_page_size, 50);
        assert!(!config.api.enable_rate_limiting);
        assert!(!config.security.jwt_secret.is_empty());
        assert!(config.database.run_migrations_on_start);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.api.max_page_size, 100);
        assert!(config.api.enable_rate_limiting);
        // Production refuses to guess a signing key
        assert!(config.security.jwt_secret.is_empty());
        assert!(!config.database.run_migrations_on_start);
    }

    #[test]
    fn test_content_type_allow_list() {
        let config = AppConfig::development();
        assert!(config
            .storage
            .allowed_content_types
            .iter()
            .any(|t| t == "application/pdf"));
    }
}
