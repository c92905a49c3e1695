use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproducción
    pub idle_grace_ms: u64,
    pub resolve_timeout_secs: u64,
    pub max_concurrent_lookups: usize,

    // Binarios externos
    pub ytdlp_path: String,
    pub ffmpeg_path: String,

    // Paths
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no definido")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID no definido")?
                .parse()
                .context("APPLICATION_ID inválido")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Reproducción
            idle_grace_ms: env_or("IDLE_GRACE_MS", defaults.idle_grace_ms)?,
            resolve_timeout_secs: env_or("RESOLVE_TIMEOUT_SECS", defaults.resolve_timeout_secs)?,
            max_concurrent_lookups: env_or("MAX_CONCURRENT_LOOKUPS", defaults.max_concurrent_lookups)?,

            // Binarios
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
        };

        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("No se pudo crear {}", config.data_dir.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks that catch common mistakes before the bot connects.
    pub fn validate(&self) -> Result<()> {
        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.max_concurrent_lookups == 0 {
            anyhow::bail!("Max concurrent lookups must be greater than 0");
        }

        if self.ytdlp_path.trim().is_empty() || self.ffmpeg_path.trim().is_empty() {
            anyhow::bail!("yt-dlp and ffmpeg paths cannot be empty");
        }

        Ok(())
    }

    pub fn idle_grace(&self) -> Duration {
        Duration::from_millis(self.idle_grace_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Playback: grace {}, resolve timeout {}, {} concurrent lookups\n  \
            Binaries: {} / {}\n  \
            Data: {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            humantime::format_duration(self.idle_grace()),
            humantime::format_duration(self.resolve_timeout()),
            self.max_concurrent_lookups,
            self.ytdlp_path,
            self.ffmpeg_path,
            self.data_dir.display()
        )
    }
}

/// Lee una variable de entorno numérica, con valor por defecto si falta
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .with_context(|| format!("{key} inválido: {val}")),
        _ => Ok(default),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults, deben venir del entorno)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            idle_grace_ms: 3000,
            resolve_timeout_secs: 30,
            max_concurrent_lookups: 3,

            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),

            data_dir: "/app/data".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.idle_grace(), Duration::from_secs(3));
        assert_eq!(config.resolve_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_lookups_rejected() {
        let config = Config {
            max_concurrent_lookups: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config {
            discord_token: "super-secreto".into(),
            application_id: 42,
            ..Config::default()
        };
        let summary = config.summary();
        assert!(summary.contains("App ID 42"));
        assert!(summary.contains("global"));
        assert!(summary.contains("3s"));
        assert!(!summary.contains("super-secreto"));
    }

    #[test]
    fn test_env_or_parses_and_falls_back() {
        std::env::set_var("JUKEBOX_TEST_GRACE", "1500");
        assert_eq!(env_or("JUKEBOX_TEST_GRACE", 3000u64).unwrap(), 1500);
        assert_eq!(env_or("JUKEBOX_TEST_MISSING", 7usize).unwrap(), 7);

        std::env::set_var("JUKEBOX_TEST_BAD", "mucho");
        assert!(env_or("JUKEBOX_TEST_BAD", 1u64).is_err());
    }
}
