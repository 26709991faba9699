//! # Session Module
//!
//! One independent playback context per guild.
//!
//! A [`Session`] owns its [`TrackQueue`], the current-track slot, loop mode,
//! volume and skip votes, plus exactly one background playback loop
//! ([`playback`]). Command handlers mutate the session from their own tasks
//! through a short internal lock that is never held across an `.await`; the
//! loop re-checks the in-flight play id after every suspension point, so a
//! late or duplicated player signal can't move the state machine.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──spawn──▶ WaitingForTrack ──track──▶ Playing
//!                   ▲      │                    │
//!                   └──────┼─── completion ◀────┘
//!                          ▼
//!                       Stopped  (idle timeout, stop, failed reconnect)
//! ```
//!
//! Every path into `Stopped` goes through [`Session::shutdown`], which is
//! idempotent: only the first caller clears the queue, stops the player and
//! releases the voice connection.

pub mod playback;
pub mod registry;
pub mod report;
pub mod votes;

use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, Notify},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        player::{Completion, PlayId, Player},
        queue::TrackQueue,
        track::Track,
        transport::Transport,
    },
    error::{PlaybackError, SessionError, SessionResult},
};
use registry::Evictor;
use report::{Report, Reporter};
use votes::{SkipVotes, Vote};

/// Parámetros de cada sesión (derivados de la configuración)
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub idle_timeout: Duration,
    pub skip_threshold: usize,
    pub default_volume: f32,
    pub max_queue_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(180),
            skip_threshold: 3,
            default_volume: 0.5,
            max_queue_size: 1000,
        }
    }
}

/// Colaboradores compartidos por todas las sesiones
#[derive(Clone)]
pub struct SessionDeps {
    pub transport: Arc<dyn Transport>,
    pub reporter: Arc<dyn Reporter>,
    pub settings: SessionSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    WaitingForTrack,
    Playing,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Joined,
    Moved,
    AlreadyConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    /// Quien pidió el track lo saltó directamente
    RequesterSkipped,
    VoteAdded { votes: usize, required: usize },
    AlreadyVoted { votes: usize, required: usize },
    /// El voto alcanzó el umbral y el track se saltó
    Skipped { votes: usize, required: usize },
}

/// Eventos de la conexión de voz entregados por el gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Disconnected { involuntary: bool },
    Moved { channel_id: ChannelId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Reconexión exitosa; el track actual sigue sonando
    Resumed,
    Moved,
    Stopped,
    Ignored,
}

struct Connection {
    channel_id: ChannelId,
    player: Arc<dyn Player>,
}

struct SessionInner {
    state: SessionState,
    current: Option<Arc<Track>>,
    in_flight: Option<PlayId>,
    next_play_id: PlayId,
    loop_mode: bool,
    volume: f32,
    paused: bool,
    skip_votes: SkipVotes,
    skip_requested: bool,
    connection: Option<Connection>,
    /// Reconexión en curso; el play anterior ya no cuenta
    reconnecting: bool,
    last_channel: Option<ChannelId>,
    text_channel: Option<ChannelId>,
}

/// Estado de reproducción de un guild.
pub struct Session {
    guild_id: GuildId,
    queue: TrackQueue,
    inner: Mutex<SessionInner>,
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn Reporter>,
    settings: SessionSettings,
    cancel: CancellationToken,
    completions: mpsc::UnboundedSender<Completion>,
    replay: Notify,
    evictor: Option<Evictor>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Creates the session and starts its playback loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(guild_id: GuildId, deps: SessionDeps, evictor: Option<Evictor>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let SessionDeps {
            transport,
            reporter,
            settings,
        } = deps;

        let session = Arc::new(Self {
            guild_id,
            queue: TrackQueue::new(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                current: None,
                in_flight: None,
                next_play_id: 0,
                loop_mode: false,
                volume: settings.default_volume.clamp(0.0, 1.0),
                paused: false,
                skip_votes: SkipVotes::new(settings.skip_threshold),
                skip_requested: false,
                connection: None,
                reconnecting: false,
                last_channel: None,
                text_channel: None,
            }),
            transport,
            reporter,
            settings,
            cancel: CancellationToken::new(),
            completions: tx,
            replay: Notify::new(),
            evictor,
            loop_task: Mutex::new(None),
        });

        let handle = tokio::spawn(playback::run(session.clone(), rx));
        *session.loop_task.lock() = Some(handle);

        info!("🎛️ Sesión creada para guild {}", guild_id);
        session
    }

    // Getters

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn queue(&self) -> &TrackQueue {
        &self.queue
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == SessionState::Stopped
    }

    pub fn is_playing(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == SessionState::Playing && inner.current.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    pub fn current(&self) -> Option<Arc<Track>> {
        self.inner.lock().current.clone()
    }

    pub fn loop_mode(&self) -> bool {
        self.inner.lock().loop_mode
    }

    pub fn volume(&self) -> f32 {
        self.inner.lock().volume
    }

    pub fn skip_votes(&self) -> usize {
        self.inner.lock().skip_votes.len()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connection.is_some()
    }

    pub fn voice_channel(&self) -> Option<ChannelId> {
        self.inner.lock().connection.as_ref().map(|c| c.channel_id)
    }

    /// Canal de texto para los avisos que no pertenecen a un track
    pub fn bind_text_channel(&self, channel_id: ChannelId) {
        self.inner.lock().text_channel = Some(channel_id);
    }

    // Conexión de voz

    /// Conecta (o mueve) la sesión al canal de voz indicado
    pub async fn connect(&self, channel_id: ChannelId) -> SessionResult<ConnectOutcome> {
        let existing = {
            let inner = self.inner.lock();
            if inner.state == SessionState::Stopped {
                return Err(SessionError::Stopped);
            }
            inner.connection.as_ref().map(|c| c.channel_id)
        };

        match existing {
            Some(current) if current == channel_id => Ok(ConnectOutcome::AlreadyConnected),
            Some(_) => {
                self.transport.move_to(self.guild_id, channel_id).await?;
                let mut inner = self.inner.lock();
                if let Some(connection) = inner.connection.as_mut() {
                    connection.channel_id = channel_id;
                }
                inner.last_channel = Some(channel_id);
                Ok(ConnectOutcome::Moved)
            }
            None => {
                let player = self.transport.connect(self.guild_id, channel_id).await?;

                let stopped = {
                    let mut inner = self.inner.lock();
                    if inner.state == SessionState::Stopped {
                        true
                    } else {
                        inner.connection = Some(Connection { channel_id, player });
                        inner.last_channel = Some(channel_id);
                        false
                    }
                };

                if stopped {
                    // La sesión se detuvo mientras conectábamos
                    if let Err(e) = self.transport.release(self.guild_id).await {
                        warn!("⚠️ No se pudo liberar la conexión tardía en guild {}: {}", self.guild_id, e);
                    }
                    return Err(SessionError::Stopped);
                }

                Ok(ConnectOutcome::Joined)
            }
        }
    }

    // Cola

    /// Agrega un track; devuelve su posición en la cola (base 1)
    pub fn enqueue(&self, track: Arc<Track>) -> SessionResult<usize> {
        if self.is_stopped() {
            return Err(SessionError::Stopped);
        }
        let title = track.title().to_string();
        let position = self.queue.try_enqueue(track, self.settings.max_queue_size)?;
        info!("➕ [guild {}] Agregado a la cola: {}", self.guild_id, title);
        Ok(position)
    }

    /// Elimina el track en `index` (base 0)
    pub fn remove(&self, index: usize) -> SessionResult<Arc<Track>> {
        let removed = self.queue.remove_at(index)?;
        info!("❌ [guild {}] Eliminado de la cola: {}", self.guild_id, removed.title());
        Ok(removed)
    }

    pub fn shuffle(&self) {
        self.queue.shuffle();
    }

    // Controles de reproducción

    pub fn set_loop_mode(&self, enabled: bool) {
        self.inner.lock().loop_mode = enabled;
        if enabled {
            info!("🔂 [guild {}] Repetir canción activado", self.guild_id);
        } else {
            info!("➡️ [guild {}] Repetición desactivada", self.guild_id);
        }
    }

    /// Invierte el modo loop; requiere un track actual
    pub fn toggle_loop(&self) -> SessionResult<bool> {
        let enabled = {
            let mut inner = self.inner.lock();
            if inner.current.is_none() {
                return Err(SessionError::NotPlaying);
            }
            inner.loop_mode = !inner.loop_mode;
            inner.loop_mode
        };
        debug!("[guild {}] loop = {}", self.guild_id, enabled);
        Ok(enabled)
    }

    /// Ajusta el volumen a partir de un porcentaje 0..=100
    pub async fn set_volume(&self, percent: i64) -> SessionResult<f32> {
        if !(0..=100).contains(&percent) {
            return Err(SessionError::InvalidVolume(percent));
        }
        let volume = percent as f32 / 100.0;

        let player = {
            let mut inner = self.inner.lock();
            inner.volume = volume;
            inner
                .in_flight
                .and(inner.connection.as_ref().map(|c| c.player.clone()))
        };

        if let Some(player) = player {
            player.set_volume(volume).await?;
        }
        info!("🔊 [guild {}] Volumen ajustado a {}%", self.guild_id, percent);
        Ok(volume)
    }

    /// Pausa solo si algo está sonando realmente
    pub async fn pause(&self) -> SessionResult<()> {
        let player = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Playing || inner.paused {
                return Err(SessionError::NotPlaying);
            }
            if inner.reconnecting {
                return Err(SessionError::NotConnected);
            }
            let player = inner
                .connection
                .as_ref()
                .map(|c| c.player.clone())
                .ok_or(SessionError::NotConnected)?;
            inner.paused = true;
            player
        };

        if let Err(e) = player.pause().await {
            self.inner.lock().paused = false;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn resume(&self) -> SessionResult<()> {
        let player = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Playing || !inner.paused {
                return Err(SessionError::NotPaused);
            }
            if inner.reconnecting {
                return Err(SessionError::NotConnected);
            }
            let player = inner
                .connection
                .as_ref()
                .map(|c| c.player.clone())
                .ok_or(SessionError::NotConnected)?;
            inner.paused = false;
            player
        };

        if let Err(e) = player.resume().await {
            self.inner.lock().paused = true;
            return Err(e.into());
        }
        Ok(())
    }

    /// Salta el track actual sin votación
    pub async fn skip(&self) -> SessionResult<Arc<Track>> {
        let (play_id, track) = {
            let inner = self.inner.lock();
            match (inner.state, inner.in_flight, inner.current.clone()) {
                (SessionState::Playing, Some(play_id), Some(track)) => (play_id, track),
                _ => return Err(SessionError::NotPlaying),
            }
        };

        self.skip_play(play_id).await;
        Ok(track)
    }

    /// Registra el voto de `voter` para saltar el track actual.
    ///
    /// The requester of the current track always skips immediately; anybody
    /// else adds one vote, and the vote that reaches the threshold skips.
    pub async fn vote_skip(&self, voter: UserId) -> SessionResult<SkipOutcome> {
        let (outcome, play_id) = {
            let mut inner = self.inner.lock();
            let (play_id, requester) = match (inner.state, inner.in_flight, inner.current.as_ref()) {
                (SessionState::Playing, Some(play_id), Some(track)) => (play_id, track.requested_by()),
                _ => return Err(SessionError::NotPlaying),
            };

            let required = inner.skip_votes.threshold();
            let outcome = if voter == requester {
                SkipOutcome::RequesterSkipped
            } else {
                match inner.skip_votes.add(voter) {
                    Vote::Counted(votes) => SkipOutcome::VoteAdded { votes, required },
                    Vote::Duplicate(votes) => SkipOutcome::AlreadyVoted { votes, required },
                    Vote::ThresholdReached(votes) => SkipOutcome::Skipped { votes, required },
                }
            };
            (outcome, play_id)
        };

        if matches!(outcome, SkipOutcome::RequesterSkipped | SkipOutcome::Skipped { .. }) {
            self.skip_play(play_id).await;
        }
        Ok(outcome)
    }

    /// Detiene `play_id` si sigue siendo el track en curso
    async fn skip_play(&self, play_id: PlayId) -> bool {
        let player = {
            let mut inner = self.inner.lock();
            if inner.in_flight != Some(play_id) {
                debug!("[guild {}] skip obsoleto para play {}", self.guild_id, play_id);
                return false;
            }
            inner.skip_requested = true;
            inner.skip_votes.clear();
            inner.connection.as_ref().map(|c| c.player.clone())
        };

        info!("⏭️ [guild {}] Saltando track actual", self.guild_id);
        match player {
            Some(player) => player.stop().await,
            // Sin player no llegará completion; la enviamos nosotros
            None => {
                let _ = self.completions.send(Completion {
                    play_id,
                    outcome: Ok(()),
                });
            }
        }
        true
    }

    // Ciclo de vida

    /// Detiene la sesión: cancela el loop, vacía la cola y libera la conexión.
    ///
    /// Idempotent. Returns `true` only for the call that performed the
    /// teardown; every other call (concurrent or later) is a no-op.
    pub async fn shutdown(&self) -> bool {
        let connection = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Stopped {
                return false;
            }
            inner.state = SessionState::Stopped;
            inner.current = None;
            inner.in_flight = None;
            inner.paused = false;
            inner.skip_requested = false;
            inner.skip_votes.clear();
            inner.reconnecting = false;
            inner.connection.take()
        };

        self.cancel.cancel();
        let cleared = self.queue.clear();
        info!(
            "⏹️ [guild {}] Sesión detenida ({} tracks descartados)",
            self.guild_id, cleared
        );

        if let Some(connection) = connection {
            connection.player.stop().await;
            if let Err(e) = self.transport.release(self.guild_id).await {
                warn!("⚠️ [guild {}] Error liberando la conexión: {}", self.guild_id, e);
                self.report_status(Report::ReleaseFailed(e));
            }
        }

        if let Some(evictor) = &self.evictor {
            evictor.evict(self);
        }

        if let Some(handle) = self.loop_task.lock().take() {
            handle.abort();
        }
        true
    }

    /// Aplica un evento de la conexión de voz
    pub async fn handle_connection_event(&self, event: ConnectionEvent) -> ConnectionOutcome {
        match event {
            ConnectionEvent::Moved { channel_id } => {
                let mut inner = self.inner.lock();
                match inner.connection.as_mut() {
                    Some(connection) => {
                        connection.channel_id = channel_id;
                        inner.last_channel = Some(channel_id);
                        ConnectionOutcome::Moved
                    }
                    None => ConnectionOutcome::Ignored,
                }
            }
            ConnectionEvent::Disconnected { involuntary } => self.on_disconnect(involuntary).await,
        }
    }

    async fn on_disconnect(&self, involuntary: bool) -> ConnectionOutcome {
        let channel = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Stopped || inner.reconnecting {
                return ConnectionOutcome::Ignored;
            }

            let playing = inner.state == SessionState::Playing && inner.current.is_some();
            match inner.last_channel {
                Some(channel) if involuntary && playing => {
                    // Las señales del player caído ya no avanzan la cola
                    inner.reconnecting = true;
                    inner.in_flight = None;
                    Some(channel)
                }
                _ => None,
            }
        };

        let Some(channel) = channel else {
            info!("🔌 [guild {}] Desconectado sin nada sonando, deteniendo", self.guild_id);
            self.shutdown().await;
            return ConnectionOutcome::Stopped;
        };

        warn!("🔌 [guild {}] Desconexión inesperada, reconectando a {}", self.guild_id, channel);
        match self.transport.connect(self.guild_id, channel).await {
            Ok(player) => {
                let resumed = {
                    let mut inner = self.inner.lock();
                    if inner.state == SessionState::Stopped {
                        false
                    } else {
                        inner.connection = Some(Connection {
                            channel_id: channel,
                            player,
                        });
                        inner.paused = false;
                        inner.reconnecting = false;
                        true
                    }
                };

                if !resumed {
                    // La sesión se detuvo mientras reconectábamos
                    if let Err(e) = self.transport.release(self.guild_id).await {
                        warn!("⚠️ No se pudo liberar la conexión tardía en guild {}: {}", self.guild_id, e);
                    }
                    return ConnectionOutcome::Stopped;
                }

                info!("🔄 [guild {}] Reconectado, reanudando el track actual", self.guild_id);
                // notify_one guarda el permiso aunque el loop no esté esperando aún
                self.replay.notify_one();
                self.report_status(Report::Reconnected);
                ConnectionOutcome::Resumed
            }
            Err(e) => {
                warn!("❌ [guild {}] Reconexión fallida: {}", self.guild_id, e);
                self.report_status(Report::ReconnectFailed(e));
                self.shutdown().await;
                ConnectionOutcome::Stopped
            }
        }
    }

    // Usado por el loop de reproducción

    /// Track a repetir en modo loop, si corresponde; si no, limpia el slot actual
    fn take_repeat(&self) -> Option<Arc<Track>> {
        let mut inner = self.inner.lock();
        let skipped = std::mem::take(&mut inner.skip_requested);

        if inner.loop_mode && !skipped {
            if let Some(current) = inner.current.clone() {
                return Some(current);
            }
        }

        inner.current = None;
        if inner.state != SessionState::Stopped {
            inner.state = SessionState::WaitingForTrack;
        }
        None
    }

    /// Marca `track` como el track en curso y reserva un nuevo play id.
    ///
    /// `fresh` is false when the same play is re-issued after a reconnect;
    /// the vote set only resets on a real track transition.
    fn begin_play(
        &self,
        track: &Arc<Track>,
        fresh: bool,
    ) -> SessionResult<(PlayId, Option<Arc<dyn Player>>, f32)> {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Stopped {
            return Err(SessionError::Stopped);
        }

        inner.next_play_id += 1;
        let play_id = inner.next_play_id;
        inner.state = SessionState::Playing;
        inner.current = Some(track.clone());
        inner.in_flight = Some(play_id);
        inner.paused = false;
        if fresh {
            inner.skip_votes.clear();
        }

        let player = inner.connection.as_ref().map(|c| c.player.clone());
        Ok((play_id, player, inner.volume))
    }

    /// Cierra `play_id`. Señales que no coinciden con el play en curso se ignoran.
    fn finish_play(&self, play_id: PlayId, outcome: Result<(), PlaybackError>) -> bool {
        let failed_track = {
            let mut inner = self.inner.lock();
            if inner.in_flight != Some(play_id) {
                return false;
            }
            inner.in_flight = None;
            inner.paused = false;
            if inner.state != SessionState::Stopped {
                inner.state = SessionState::WaitingForTrack;
            }

            match &outcome {
                // Un track que falla no se repite aunque el loop esté activo
                Err(_) => inner.current.take(),
                Ok(()) => None,
            }
        };

        if let (Err(error), Some(track)) = (outcome, failed_track) {
            warn!("❌ [guild {}] Error reproduciendo {}: {}", self.guild_id, track.title(), error);
            let channel = track.channel_id();
            self.reporter.report(
                self.guild_id,
                Some(channel),
                Report::PlaybackFailed { track, error },
            );
        }
        true
    }

    fn report_status(&self, report: Report) {
        let channel = self.inner.lock().text_channel;
        self.reporter.report(self.guild_id, channel, report);
    }

    fn report_track(&self, track: &Arc<Track>, report: Report) {
        self.reporter.report(self.guild_id, Some(track.channel_id()), report);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("guild_id", &self.guild_id)
            .field("state", &self.state())
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing;
