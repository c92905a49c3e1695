use serenity::model::id::UserId;
use std::time::Duration;

/// Pista lista para encolar.
///
/// `stream_locator` es opaco: puede ser la página del video (que se
/// convierte en URL de stream recién al reproducir, porque esas URLs
/// caducan) o una URL de audio directa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    stream_locator: String,
    requested_by: UserId,
    duration: Option<Duration>,
}

impl Track {
    pub fn new(title: impl Into<String>, stream_locator: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            title: title.into(),
            stream_locator: stream_locator.into(),
            requested_by,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn stream_locator(&self) -> &str {
        &self.stream_locator
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
}
