use crate::config::EngineConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads engine configuration by merging TOML with `KALSHI_`-prefixed environment
    /// variables, the latter taking precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read/parsed or required fields
    /// are missing from both sources.
    pub fn load() -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Toml::file("config/Config.toml"))
            .merge(Env::prefixed("KALSHI_"))
            .extract()?;

        Ok(config)
    }

    /// Loads configuration layering an environment-specific TOML file on top of the
    /// base file before environment variables are applied.
    ///
    /// # Errors
    ///
    /// Returns an error if any config file cannot be read/parsed or required fields
    /// are missing.
    pub fn load_with_profile(profile: &str) -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Toml::file("config/Config.toml"))
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed("KALSHI_"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_toml_file() {
        let dir = tempdir();
        std::fs::create_dir_all(dir.join("config")).unwrap();
        let mut f = std::fs::File::create(dir.join("config/Config.toml")).unwrap();
        writeln!(
            f,
            r#"
            api_key_id = "abc123"
            private_key_path = "key.pem"
            environment = "development"
            "#
        )
        .unwrap();

        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(&dir).unwrap();
        let result = ConfigLoader::load();
        std::env::set_current_dir(cwd).unwrap();

        let config = result.unwrap();
        assert_eq!(config.api_key_id, "abc123");
        assert_eq!(config.min_profit_cents, 2);
    }

    fn tempdir() -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "kalshi-arb-test-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        path
    }
}
