use thiserror::Error;

/// Errores del subsistema de música.
///
/// Todos son recuperables: como mucho una guild termina inactiva y
/// desconectada. El texto de cada variante se muestra tal cual al usuario.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MusicError {
    /// La búsqueda no devolvió resultados
    #[error("No se encontraron resultados para `{0}`")]
    NotFound(String),

    /// Fallo de red, de proceso o de parseo al resolver la pista
    #[error("No se pudo resolver la pista: {0}")]
    Resolution(String),

    /// El stream no se pudo abrir o decodificar
    #[error("No se pudo reproducir **{title}**: {reason}")]
    PlaybackStart { title: String, reason: String },

    /// Fallo al conectar o mover la conexión de voz
    #[error("Error al conectar al canal de voz: {0}")]
    Connection(String),

    /// La tarea del reproductor de la guild ya no existe
    #[error("El reproductor de esta guild no está disponible")]
    Unavailable,
}

impl MusicError {
    /// Título corto para embeds de error
    pub fn headline(&self) -> &'static str {
        match self {
            MusicError::NotFound(_) => "Sin resultados",
            MusicError::Resolution(_) => "Error de búsqueda",
            MusicError::PlaybackStart { .. } => "Error de reproducción",
            MusicError::Connection(_) => "Error de conexión",
            MusicError::Unavailable => "Reproductor no disponible",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        let err = MusicError::PlaybackStart {
            title: "Song".into(),
            reason: "ffmpeg exited".into(),
        };
        assert_eq!(err.to_string(), "No se pudo reproducir **Song**: ffmpeg exited");
        assert_eq!(err.headline(), "Error de reproducción");
        assert_eq!(
            MusicError::NotFound("abc".into()).to_string(),
            "No se encontraron resultados para `abc`"
        );
    }
}
