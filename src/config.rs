use anyhow::{bail, Result};

/// Runtime configuration, loaded once at startup and passed down to the
/// server. The token secret is checked eagerly so a malformed deployment
/// fails before the listener binds.
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub mongo_uri: String,
    pub mongo_db: String,
    pub upload_dir: String,
    pub max_file_size: u64,
    pub token_secret: Vec<u8>,
    pub image_host_url: Option<String>,
}

impl AppConfig {
    /// Loads configuration from environment variables (a .env file, if any,
    /// is read by the caller before this runs).
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port: u16 = get("PORT", "5000")
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a number"))?;

        let max_file_size: u64 = get("MAX_FILE_SIZE", "10485760")
            .parse()
            .unwrap_or(10 * 1024 * 1024);

        let secret = lookup("TOKEN_SECRET_KEY").unwrap_or_default();
        if secret.len() != 32 {
            bail!("TOKEN_SECRET_KEY must be exactly 32 bytes");
        }

        Ok(AppConfig {
            port,
            mongo_uri: get("MONGO_URI", "mongodb://localhost:27017/shopadmin"),
            mongo_db: get("MONGO_DB", "shopadmin"),
            upload_dir: get("UPLOAD_DIR", "static/uploads"),
            max_file_size,
            token_secret: secret.into_bytes(),
            image_host_url: lookup("IMAGE_HOST_URL").filter(|v| !v.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn lookup_with_secret(key: &str) -> Option<String> {
        (key == "TOKEN_SECRET_KEY").then(|| SECRET.to_string())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::from_lookup(lookup_with_secret).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.mongo_db, "shopadmin");
        assert_eq!(cfg.upload_dir, "static/uploads");
        assert_eq!(cfg.max_file_size, 10 * 1024 * 1024);
        assert!(cfg.image_host_url.is_none());
    }

    #[test]
    fn missing_secret_fails() {
        assert!(AppConfig::from_lookup(|_| None).is_err());
    }

    #[test]
    fn short_secret_fails() {
        let res = AppConfig::from_lookup(|key| {
            (key == "TOKEN_SECRET_KEY").then(|| "too-short".to_string())
        });
        assert!(res.is_err());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg = AppConfig::from_lookup(|key| match key {
            "TOKEN_SECRET_KEY" => Some(SECRET.to_string()),
            "PORT" => Some("8080".to_string()),
            "MONGO_DB" => Some("shop_test".to_string()),
            "IMAGE_HOST_URL" => Some("https://img.example.com/upload".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.mongo_db, "shop_test");
        assert_eq!(
            cfg.image_host_url.as_deref(),
            Some("https://img.example.com/upload")
        );
    }
}
