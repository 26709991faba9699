use thiserror::Error;

/// Falla al convertir una búsqueda del usuario en un [`Track`](crate::audio::track::Track).
///
/// Se reporta al usuario que pidió la canción y la petición se descarta;
/// la cola no se toca.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Couldn't find anything that matches `{0}`")]
    NotFound(String),

    #[error("Couldn't fetch `{query}`: {cause}")]
    Extractor { query: String, cause: String },

    #[error("Timed out while resolving `{0}`")]
    TimedOut(String),
}

/// Error reportado por el player durante la reproducción de un track.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("the player failed: {0}")]
    Player(String),

    #[error("the player dropped the completion signal without reporting")]
    Abandoned,

    #[error("no voice connection is available")]
    NotConnected,
}

/// Error de la conexión de voz (connect / move / release).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("couldn't connect to the voice channel: {0}")]
    Connect(String),

    #[error("couldn't move to the voice channel: {0}")]
    Move(String),

    #[error("couldn't release the voice connection: {0}")]
    Release(String),
}

/// Errores de las operaciones de sesión visibles para el usuario.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid index {index}: the queue has {len} tracks")]
    InvalidIndex { index: usize, len: usize },

    #[error("The queue is full (max {0} tracks)")]
    QueueFull(usize),

    #[error("Volume must be between 0 and 100, got {0}")]
    InvalidVolume(i64),

    #[error("Nothing being played at the moment.")]
    NotPlaying,

    #[error("The player is not paused.")]
    NotPaused,

    #[error("Not connected to any voice channel.")]
    NotConnected,

    #[error("This session has been stopped.")]
    Stopped,
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
