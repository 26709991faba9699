//! Fakes compartidos por los tests de sesión y registro.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;

use super::{
    report::{Report, Reporter},
    SessionDeps, SessionSettings,
};
use crate::{
    audio::{
        player::{CompletionNotifier, PlayId, Player},
        track::Track,
        transport::Transport,
    },
    error::{PlaybackError, TransportError},
};

pub(crate) const GUILD: GuildId = GuildId::new(42);
pub(crate) const VOICE: ChannelId = ChannelId::new(500);
pub(crate) const TEXT: ChannelId = ChannelId::new(600);

pub(crate) fn track(id: &str, requester: u64) -> Arc<Track> {
    Arc::new(
        Track::new(
            id,
            format!("Song {id}"),
            format!("https://cdn.example/{id}"),
            UserId::new(requester),
            TEXT,
        )
        .with_uploader("Uploader")
        .with_duration(Duration::from_secs(200)),
    )
}

pub(crate) fn settings() -> SessionSettings {
    SessionSettings {
        idle_timeout: Duration::from_secs(60),
        skip_threshold: 3,
        default_volume: 0.5,
        max_queue_size: 10,
    }
}

pub(crate) fn deps(transport: Arc<dyn Transport>, reporter: Arc<RecordingReporter>) -> SessionDeps {
    SessionDeps {
        transport,
        reporter,
        settings: settings(),
    }
}

/// Cede el control hasta que `condition` se cumpla (sin avanzar el reloj).
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Player que registra las llamadas y guarda el notifier pendiente.
#[derive(Default)]
pub(crate) struct FakePlayer {
    plays: Mutex<Vec<(Arc<Track>, f32)>>,
    pending: Mutex<Option<CompletionNotifier>>,
    volumes: Mutex<Vec<f32>>,
    stops: AtomicUsize,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    fail_next_play: AtomicBool,
}

impl FakePlayer {
    pub(crate) fn played_ids(&self) -> Vec<String> {
        self.plays.lock().iter().map(|(t, _)| t.id().to_string()).collect()
    }

    pub(crate) fn play_count(&self) -> usize {
        self.plays.lock().len()
    }

    pub(crate) fn last_volume(&self) -> Option<f32> {
        self.volumes.lock().last().copied()
    }

    pub(crate) fn pending_play(&self) -> Option<PlayId> {
        self.pending.lock().as_ref().map(|n| n.play_id())
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub(crate) fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_next_play(&self) {
        self.fail_next_play.store(true, Ordering::SeqCst);
    }

    /// Termina el track pendiente como lo haría el driver de voz
    pub(crate) fn finish(&self, outcome: Result<(), PlaybackError>) -> Option<PlayId> {
        let notifier = self.pending.lock().take()?;
        let play_id = notifier.play_id();
        notifier.complete(outcome);
        Some(play_id)
    }

    /// Descarta el notifier sin completarlo
    pub(crate) fn drop_pending(&self) {
        self.pending.lock().take();
    }

    /// Saca el notifier pendiente para completarlo más tarde
    pub(crate) fn take_pending(&self) -> Option<CompletionNotifier> {
        self.pending.lock().take()
    }
}

#[async_trait]
impl Player for FakePlayer {
    async fn play(
        &self,
        track: Arc<Track>,
        volume: f32,
        completion: CompletionNotifier,
    ) -> Result<(), PlaybackError> {
        if self.fail_next_play.swap(false, Ordering::SeqCst) {
            return Err(PlaybackError::Player("decoder exploded".to_string()));
        }
        self.plays.lock().push((track, volume));
        *self.pending.lock() = Some(completion);
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(notifier) = self.pending.lock().take() {
            notifier.complete(Ok(()));
        }
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        self.volumes.lock().push(volume);
        Ok(())
    }
}

/// Transport que crea un [`FakePlayer`] nuevo por cada conexión.
#[derive(Default)]
pub(crate) struct FakeTransport {
    players: Mutex<Vec<Arc<FakePlayer>>>,
    connects: AtomicUsize,
    moves: AtomicUsize,
    releases: AtomicUsize,
    fail_connect: AtomicBool,
    connect_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeTransport {
    pub(crate) fn player(&self, index: usize) -> Arc<FakePlayer> {
        self.players.lock()[index].clone()
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn moves(&self) -> usize {
        self.moves.load(Ordering::SeqCst)
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Retiene los próximos `connect` hasta que se notifique el gate devuelto
    pub(crate) fn hold_connects(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.connect_gate.lock() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(
        &self,
        _guild_id: GuildId,
        _channel_id: ChannelId,
    ) -> Result<Arc<dyn Player>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let gate = self.connect_gate.lock().clone();
        match gate {
            Some(gate) => gate.notified().await,
            None => tokio::task::yield_now().await,
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("channel is gone".to_string()));
        }
        let player = Arc::new(FakePlayer::default());
        self.players.lock().push(player.clone());
        Ok(player)
    }

    async fn move_to(&self, _guild_id: GuildId, _channel_id: ChannelId) -> Result<(), TransportError> {
        self.moves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self, _guild_id: GuildId) -> Result<(), TransportError> {
        // Cede para que una segunda llamada concurrente pueda intercalarse
        tokio::task::yield_now().await;
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Reporter que guarda todo lo reportado
#[derive(Default)]
pub(crate) struct RecordingReporter {
    reports: Mutex<Vec<(GuildId, Option<ChannelId>, Report)>>,
}

impl RecordingReporter {
    pub(crate) fn reports(&self) -> Vec<Report> {
        self.reports.lock().iter().map(|(_, _, r)| r.clone()).collect()
    }

    pub(crate) fn count(&self, matches: impl Fn(&Report) -> bool) -> usize {
        self.reports.lock().iter().filter(|(_, _, r)| matches(r)).count()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, guild_id: GuildId, channel_id: Option<ChannelId>, report: Report) {
        self.reports.lock().push((guild_id, channel_id, report));
    }
}
