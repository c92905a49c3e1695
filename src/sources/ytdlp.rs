use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::time::Duration;
use tokio::{sync::Semaphore, time::timeout};
use tracing::{debug, info, warn};

use super::{is_url, is_youtube_url, TrackResolver};
use crate::{audio::track::Track, error::MusicError};

/// Cliente de yt-dlp: búsqueda de pistas y obtención de URLs de stream
pub struct YtDlpClient {
    binary: String,
    timeout: Duration,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (`--dump-json`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    webpage_url: Option<String>,
    url: Option<String>,
}

impl YtDlpClient {
    pub fn new(binary: impl Into<String>, timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            rate_limiter: Semaphore::new(max_concurrent.max(1)),
        }
    }

    /// Ejecuta yt-dlp y devuelve su stdout
    async fn run(&self, args: &[&str]) -> Result<String, MusicError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| MusicError::Resolution(e.to_string()))?;

        let output = timeout(
            self.timeout,
            Command::new(&self.binary).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| MusicError::Resolution(format!("yt-dlp no respondió en {:?}", self.timeout)))?
        .map_err(|e| MusicError::Resolution(format!("Error al ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MusicError::Resolution(format!("yt-dlp error: {}", stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Obtiene la URL de streaming de audio. Las URLs de YouTube caducan, por
    /// eso se piden justo antes de reproducir.
    pub async fn stream_url(&self, locator: &str) -> Result<String, MusicError> {
        if !is_youtube_url(locator) {
            return Ok(locator.to_string());
        }

        debug!("🎵 Obteniendo URL de stream para: {}", locator);
        let stdout = self
            .run(&["--no-playlist", "-f", "bestaudio/best", "--get-url", "--no-warnings", locator])
            .await?;

        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| MusicError::Resolution("No se pudo obtener URL de stream".into()))
    }

    /// Verifica que yt-dlp esté disponible
    pub async fn version(&self) -> Result<String, MusicError> {
        self.run(&["--version"]).await.map(|v| v.trim().to_string())
    }
}

#[async_trait]
impl TrackResolver for YtDlpClient {
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Track, MusicError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::NotFound(String::new()));
        }

        let target = if is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        };
        info!("🔍 Resolviendo: {}", target);

        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--skip-download", "--no-warnings", &target])
            .await?;

        match parse_first_track(&stdout, requested_by)? {
            Some(track) => Ok(track),
            None => {
                warn!("Sin resultados para: {}", query);
                Err(MusicError::NotFound(query.to_string()))
            }
        }
    }
}

/// Toma el primer resultado de la salida de yt-dlp (un JSON por línea)
fn parse_first_track(stdout: &str, requested_by: UserId) -> Result<Option<Track>, MusicError> {
    let Some(line) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Ok(None);
    };

    let info: YtDlpInfo = serde_json::from_str(line)
        .map_err(|e| MusicError::Resolution(format!("Error al parsear respuesta de yt-dlp: {e}")))?;

    let Some(locator) = info.webpage_url.or(info.url) else {
        return Err(MusicError::Resolution("Resultado sin URL".into()));
    };
    let title = info.title.unwrap_or_else(|| locator.clone());

    let mut track = Track::new(title, locator, requested_by);
    if let Some(seconds) = info.duration.filter(|d| d.is_finite() && *d > 0.0) {
        track = track.with_duration(Duration::from_secs_f64(seconds));
    }
    Ok(Some(track))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_first_result() {
        let stdout = concat!(
            r#"{"id":"a","title":"Primera","duration":212.0,"webpage_url":"https://www.youtube.com/watch?v=a"}"#,
            "\n",
            r#"{"id":"b","title":"Segunda","webpage_url":"https://www.youtube.com/watch?v=b"}"#,
            "\n"
        );

        let track = parse_first_track(stdout, UserId::new(5)).unwrap().unwrap();
        assert_eq!(track.title(), "Primera");
        assert_eq!(track.stream_locator(), "https://www.youtube.com/watch?v=a");
        assert_eq!(track.duration(), Some(Duration::from_secs(212)));
        assert_eq!(track.requested_by(), UserId::new(5));
    }

    #[test]
    fn test_parse_falls_back_to_url_and_title() {
        let stdout = r#"{"url":"https://cdn.example.com/a.mp3","duration":null}"#;
        let track = parse_first_track(stdout, UserId::new(5)).unwrap().unwrap();
        assert_eq!(track.title(), "https://cdn.example.com/a.mp3");
        assert_eq!(track.duration(), None);
    }

    #[test]
    fn test_empty_output_is_not_found() {
        assert_eq!(parse_first_track("\n  \n", UserId::new(5)), Ok(None));
    }

    #[test]
    fn test_garbage_output_is_resolution_error() {
        let result = parse_first_track("ERROR: something", UserId::new(5));
        assert!(matches!(result, Err(MusicError::Resolution(_))));
    }

    #[tokio::test]
    async fn test_direct_urls_skip_stream_lookup() {
        let client = YtDlpClient::new("yt-dlp-does-not-exist", Duration::from_secs(1), 1);
        assert_eq!(
            client.stream_url("https://cdn.example.com/a.mp3").await,
            Ok("https://cdn.example.com/a.mp3".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_resolution_error() {
        let client = YtDlpClient::new("yt-dlp-does-not-exist", Duration::from_secs(5), 1);
        let result = client.resolve("some song", UserId::new(5)).await;
        assert!(matches!(result, Err(MusicError::Resolution(_))));
    }

    #[tokio::test]
    async fn test_blank_query_is_not_found() {
        let client = YtDlpClient::new("yt-dlp-does-not-exist", Duration::from_secs(1), 1);
        let result = client.resolve("   ", UserId::new(5)).await;
        assert!(matches!(result, Err(MusicError::NotFound(_))));
    }
}
