use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::join_all;
use serenity::model::id::GuildId;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use super::{ConnectionEvent, ConnectionOutcome, Session};

type SessionMap = DashMap<GuildId, Arc<Session>>;

/// Sesiones activas por guild.
///
/// Injected into the command handlers and the voice-state router. Every
/// mutation goes through a single `DashMap` entry, so two concurrent
/// `get_or_create` calls for the same guild can never build two sessions.
#[derive(Debug, Default, Clone)]
pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
}

/// Permite que una sesión se quite del registro al detenerse.
///
/// Only removes the entry if it still points at the same session, so a
/// stale session can't evict its replacement.
#[derive(Debug, Clone)]
pub struct Evictor {
    guild_id: GuildId,
    sessions: Weak<SessionMap>,
}

impl Evictor {
    pub(crate) fn evict(&self, session: &Session) -> bool {
        let Some(sessions) = self.sessions.upgrade() else {
            return false;
        };

        let removed = sessions
            .remove_if(&self.guild_id, |_, entry| std::ptr::eq(Arc::as_ptr(entry), session))
            .is_some();
        if removed {
            debug!("🗑️ Sesión de guild {} eliminada del registro", self.guild_id);
        }
        removed
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        self.sessions.get(&guild_id).map(|entry| entry.value().clone())
    }

    /// Devuelve la sesión del guild, creándola con `factory` si no existe.
    ///
    /// A stopped session still in the map (its teardown is in progress) is
    /// replaced by a fresh one, which restarts playback for the guild.
    pub fn get_or_create<F>(&self, guild_id: GuildId, factory: F) -> Arc<Session>
    where
        F: FnOnce(Evictor) -> Arc<Session>,
    {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(entry) if !entry.get().is_stopped() => entry.get().clone(),
            Entry::Occupied(mut entry) => {
                info!("♻️ Reemplazando sesión detenida de guild {}", guild_id);
                let session = factory(self.evictor(guild_id));
                entry.insert(session.clone());
                session
            }
            Entry::Vacant(entry) => {
                let session = factory(self.evictor(guild_id));
                entry.insert(session.clone());
                session
            }
        }
    }

    /// Quita la sesión del registro; el llamador debe ejecutar `shutdown`
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        self.sessions.remove(&guild_id).map(|(_, session)| session)
    }

    /// Entrega un evento de conexión a la sesión del guild, si existe
    pub async fn route_connection_event(
        &self,
        guild_id: GuildId,
        event: ConnectionEvent,
    ) -> Option<ConnectionOutcome> {
        let session = self.get(guild_id)?;
        let outcome = session.handle_connection_event(event).await;

        if session.is_stopped() {
            self.evictor(guild_id).evict(&session);
        }
        Some(outcome)
    }

    /// Detiene todas las sesiones (cierre del proceso)
    pub async fn shutdown_all(&self) {
        let keys: Vec<GuildId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let sessions: Vec<Arc<Session>> = keys.into_iter().filter_map(|key| self.remove(key)).collect();

        info!("⏹️ Deteniendo {} sesiones", sessions.len());
        join_all(sessions.iter().map(|session| session.shutdown())).await;
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn evictor(&self, guild_id: GuildId) -> Evictor {
        Evictor {
            guild_id,
            sessions: Arc::downgrade(&self.sessions),
        }
    }
}
