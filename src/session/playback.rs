use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{report::Report, Session};
use crate::{
    audio::{
        player::{Completion, CompletionNotifier, PlayId},
        track::Track,
    },
    error::PlaybackError,
};

/// Loop de reproducción de una sesión.
///
/// Pulls the next track (or repeats the current one in loop mode), hands it
/// to the player and waits for its completion. An empty queue for longer
/// than the idle timeout shuts the session down from inside the loop.
pub(super) async fn run(session: Arc<Session>, mut completions: mpsc::UnboundedReceiver<Completion>) {
    let guild_id = session.guild_id();
    debug!("▶️ Loop de reproducción iniciado para guild {}", guild_id);

    loop {
        let track = match session.take_repeat() {
            Some(track) => {
                info!("🔂 [guild {}] Repitiendo track: {}", guild_id, track.title());
                track
            }
            None => {
                let next = tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => break,
                    next = session.queue.dequeue_blocking(session.settings.idle_timeout) => next,
                };

                match next {
                    Some(track) => track,
                    None => {
                        info!("⏰ [guild {}] Cola vacía demasiado tiempo, desconectando", guild_id);
                        session.report_status(Report::IdleTimeout);
                        session.shutdown().await;
                        break;
                    }
                }
            }
        };

        if !play_track(&session, track, &mut completions).await {
            break;
        }
    }

    debug!("⏹️ Loop de reproducción terminado para guild {}", guild_id);
}

/// Reproduce un track hasta su completion. Devuelve `false` si la sesión terminó.
///
/// A play invalidated by a reconnect is not finished: the loop keeps the
/// same track and re-issues it once the new connection is up.
async fn play_track(
    session: &Session,
    track: Arc<Track>,
    completions: &mut mpsc::UnboundedReceiver<Completion>,
) -> bool {
    let mut fresh = true;

    loop {
        let (play_id, player, volume) = match session.begin_play(&track, fresh) {
            Ok(play) => play,
            Err(_) => return false,
        };

        let outcome = match player {
            None => Err(PlaybackError::NotConnected),
            Some(player) => {
                let notifier = CompletionNotifier::new(play_id, session.completions.clone());
                match player.play(track.clone(), volume, notifier).await {
                    Err(e) => Err(e),
                    Ok(()) => {
                        if fresh {
                            session.report_track(&track, Report::NowPlaying(track.clone()));
                        }

                        tokio::select! {
                            biased;
                            _ = session.cancel.cancelled() => return false,
                            _ = session.replay.notified() => {
                                debug!("🔄 [guild {}] Reenviando play tras reconexión", session.guild_id());
                                fresh = false;
                                continue;
                            }
                            outcome = wait_for(completions, play_id) => outcome,
                        }
                    }
                }
            }
        };

        if session.finish_play(play_id, outcome) {
            return true;
        }

        // Play invalidado por una reconexión (o la sesión se detuvo)
        tokio::select! {
            biased;
            _ = session.cancel.cancelled() => return false,
            _ = session.replay.notified() => {
                debug!("🔄 [guild {}] Reenviando play tras reconexión", session.guild_id());
                fresh = false;
            }
        }
    }
}

/// Espera la completion de `play_id`, descartando señales obsoletas
async fn wait_for(
    completions: &mut mpsc::UnboundedReceiver<Completion>,
    play_id: PlayId,
) -> Result<(), PlaybackError> {
    while let Some(completion) = completions.recv().await {
        if completion.play_id == play_id {
            return completion.outcome;
        }
        debug!(
            "🔕 Ignorando completion obsoleta (play {}, esperado {})",
            completion.play_id, play_id
        );
    }
    Err(PlaybackError::Abandoned)
}
