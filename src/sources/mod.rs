pub mod ytdlp;

use async_trait::async_trait;
use serenity::model::id::UserId;

pub use ytdlp::YtDlpClient;

use crate::{audio::track::Track, error::MusicError};

/// Convierte lo que escribe el usuario en una pista reproducible.
///
/// Una URL se busca directamente; cualquier otro texto es una búsqueda y se
/// toma el primer resultado.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Track, MusicError>;
}

/// Verifica si el texto es una URL http(s)
pub fn is_url(query: &str) -> bool {
    url::Url::parse(query)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Verifica si la URL apunta a YouTube
pub fn is_youtube_url(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    matches!(
        parsed.host_str(),
        Some("www.youtube.com" | "youtube.com" | "youtu.be" | "m.youtube.com" | "music.youtube.com")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_detection() {
        assert!(is_url("https://example.com/song.mp3"));
        assert!(is_url("http://example.com"));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("ftp://example.com/file"));
    }

    #[test]
    fn test_youtube_url_detection() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://music.youtube.com/watch?v=test"));
        assert!(!is_youtube_url("https://example.com/video"));
        assert!(!is_youtube_url("youtube"));
    }
}
