use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use songbird::{
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::{audio::track::Track, error::PlaybackError};

/// Identificador de cada llamada a [`Player::play`] dentro de una sesión.
pub type PlayId = u64;

/// Señal de fin de reproducción enviada al loop de la sesión.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub play_id: PlayId,
    pub outcome: Result<(), PlaybackError>,
}

/// Single-shot completion handed to the player with every `play` call.
///
/// Consuming [`complete`](Self::complete) makes a second signal impossible.
/// If the player drops the notifier without calling it, the session still
/// receives [`PlaybackError::Abandoned`] so the playback loop never hangs.
#[derive(Debug)]
pub struct CompletionNotifier {
    play_id: PlayId,
    tx: Option<mpsc::UnboundedSender<Completion>>,
}

impl CompletionNotifier {
    pub(crate) fn new(play_id: PlayId, tx: mpsc::UnboundedSender<Completion>) -> Self {
        Self {
            play_id,
            tx: Some(tx),
        }
    }

    pub fn play_id(&self) -> PlayId {
        self.play_id
    }

    pub fn complete(mut self, outcome: Result<(), PlaybackError>) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: Result<(), PlaybackError>) {
        if let Some(tx) = self.tx.take() {
            // El loop puede haber terminado ya; no es un error
            let _ = tx.send(Completion {
                play_id: self.play_id,
                outcome,
            });
        }
    }
}

impl Drop for CompletionNotifier {
    fn drop(&mut self) {
        self.send(Err(PlaybackError::Abandoned));
    }
}

/// Capacidad de reproducción que la sesión usa sobre una conexión de voz.
#[async_trait]
pub trait Player: Send + Sync {
    /// Starts `track` and reports its end through `completion` exactly once.
    async fn play(
        &self,
        track: Arc<Track>,
        volume: f32,
        completion: CompletionNotifier,
    ) -> Result<(), PlaybackError>;

    /// Detiene el track actual (dispara su completion)
    async fn stop(&self);

    async fn pause(&self) -> Result<(), PlaybackError>;

    async fn resume(&self) -> Result<(), PlaybackError>;

    async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError>;
}

/// [`Player`] sobre una `Call` de songbird.
pub struct SongbirdPlayer {
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    current: SyncMutex<Option<TrackHandle>>,
}

impl SongbirdPlayer {
    pub fn new(call: Arc<Mutex<Call>>, http: reqwest::Client) -> Self {
        Self {
            call,
            http,
            current: SyncMutex::new(None),
        }
    }

    fn current_handle(&self) -> Result<TrackHandle, PlaybackError> {
        self.current
            .lock()
            .clone()
            .ok_or_else(|| PlaybackError::Player("no track loaded".to_string()))
    }
}

#[async_trait]
impl Player for SongbirdPlayer {
    async fn play(
        &self,
        track: Arc<Track>,
        volume: f32,
        completion: CompletionNotifier,
    ) -> Result<(), PlaybackError> {
        info!("🎵 Reproduciendo: {}", track.title());

        let input = HttpRequest::new(self.http.clone(), track.stream_url().to_string());

        let handle = {
            let mut call = self.call.lock().await;
            // Un solo track por llamada; el anterior dispara su propio End
            call.stop();
            call.play_input(input.into())
        };

        handle
            .set_volume(volume)
            .map_err(|e| PlaybackError::Player(e.to_string()))?;

        // End y Error comparten el mismo notifier; el primero que llega gana
        let slot = Arc::new(SyncMutex::new(Some(completion)));
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackCompletionHandler { slot: slot.clone() },
                )
                .map_err(|e| PlaybackError::Player(format!("couldn't register track event: {e}")))?;
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(handle) = self.current.lock().take() {
            if let Err(e) = handle.stop() {
                debug!("El track ya había terminado: {:?}", e);
            }
        }
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
        self.current_handle()?
            .pause()
            .map_err(|e| PlaybackError::Player(e.to_string()))?;
        info!("⏸️ Reproducción pausada");
        Ok(())
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        self.current_handle()?
            .play()
            .map_err(|e| PlaybackError::Player(e.to_string()))?;
        info!("▶️ Reproducción reanudada");
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        if let Some(handle) = self.current.lock().as_ref() {
            handle
                .set_volume(volume)
                .map_err(|e| PlaybackError::Player(e.to_string()))?;
        }
        Ok(())
    }
}

/// Handler para cuando termina (o falla) un track
struct TrackCompletionHandler {
    slot: Arc<SyncMutex<Option<CompletionNotifier>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackCompletionHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let outcome = match ctx {
            EventContext::Track(tracks) => tracks
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(Err(PlaybackError::Player(format!("{e:?}")))),
                    _ => None,
                })
                .unwrap_or(Ok(())),
            _ => Ok(()),
        };

        if let Some(notifier) = self.slot.lock().take() {
            if let Err(e) = &outcome {
                warn!("❌ Error en track: {}", e);
            }
            notifier.complete(outcome);
        }

        Some(Event::Cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dropped_notifier_reports_abandoned() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(CompletionNotifier::new(3, tx));

        assert_eq!(
            rx.try_recv().unwrap(),
            Completion {
                play_id: 3,
                outcome: Err(PlaybackError::Abandoned),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn complete_sends_exactly_one_signal() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = CompletionNotifier::new(9, tx);
        assert_eq!(notifier.play_id(), 9);
        notifier.complete(Ok(()));

        assert_eq!(rx.try_recv().unwrap(), Completion { play_id: 9, outcome: Ok(()) });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_loop_is_not_an_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        CompletionNotifier::new(1, tx).complete(Err(PlaybackError::Player("gone".into())));
    }
}
