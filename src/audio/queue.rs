use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::{sync::Notify, time::Instant};
use tracing::debug;

use crate::{
    audio::track::Track,
    error::{SessionError, SessionResult},
};

/// FIFO de tracks pendientes de una sesión.
///
/// Many producers (command handlers) may push concurrently; exactly one
/// consumer (the playback loop) pops with [`TrackQueue::dequeue_blocking`].
/// The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: Mutex<VecDeque<Arc<Track>>>,
    available: Notify,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final y despierta al consumidor
    pub fn enqueue(&self, track: Arc<Track>) {
        debug!("➕ Encolado: {}", track.title());
        self.items.lock().push_back(track);
        // notify_one guarda un permiso si nadie está esperando todavía
        self.available.notify_one();
    }

    /// Agrega un track si la cola tiene menos de `capacity` elementos.
    ///
    /// The length check and the push happen under one lock, so concurrent
    /// producers can't overshoot the limit. Returns the new length.
    pub fn try_enqueue(&self, track: Arc<Track>, capacity: usize) -> SessionResult<usize> {
        let len = {
            let mut items = self.items.lock();
            if items.len() >= capacity {
                return Err(SessionError::QueueFull(capacity));
            }
            items.push_back(track);
            items.len()
        };
        self.available.notify_one();
        Ok(len)
    }

    /// Espera hasta que haya un track o se agote `timeout`.
    ///
    /// Returns `None` when the timeout elapsed with the queue still empty.
    pub async fn dequeue_blocking(&self, timeout: Duration) -> Option<Arc<Track>> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(track) = self.items.lock().pop_front() {
                return Some(track);
            }

            if tokio::time::timeout_at(deadline, self.available.notified())
                .await
                .is_err()
            {
                // Última oportunidad: un enqueue justo en el límite
                return self.items.lock().pop_front();
            }
        }
    }

    /// Mezcla la cola
    pub fn shuffle(&self) {
        let mut items = self.items.lock();
        if items.len() < 2 {
            return;
        }
        items.make_contiguous().shuffle(&mut rand::thread_rng());
        debug!("🔀 Cola mezclada ({} tracks)", items.len());
    }

    /// Elimina el track en la posición `index` (base 0)
    pub fn remove_at(&self, index: usize) -> SessionResult<Arc<Track>> {
        let mut items = self.items.lock();
        let len = items.len();
        items
            .remove(index)
            .ok_or(SessionError::InvalidIndex { index, len })
    }

    /// Vacía la cola y devuelve cuántos tracks se descartaron
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let cleared = items.len();
        items.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Copia de los tracks en `[start, end)`, recortada a la longitud actual
    pub fn peek_range(&self, start: usize, end: usize) -> Vec<Arc<Track>> {
        let items = self.items.lock();
        let end = end.min(items.len());
        if start >= end {
            return Vec::new();
        }
        items.range(start..end).cloned().collect()
    }

    /// Obtiene una página de la cola (páginas base 1)
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let total_items = self.len();
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(items_per_page)
        };
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * items_per_page;

        QueuePage {
            items: self.peek_range(start, start + items_per_page),
            first_index: start,
            current_page,
            total_pages,
            total_items,
        }
    }

    /// Duración conocida de todo lo que queda en cola
    pub fn total_duration(&self) -> Duration {
        self.items.lock().iter().filter_map(|t| t.duration()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Arc<Track>>,
    /// Posición (base 0) del primer item de la página
    pub first_index: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::{ChannelId, UserId};

    fn track(id: &str) -> Arc<Track> {
        Arc::new(Track::new(
            id,
            format!("Song {id}"),
            format!("https://cdn.example/{id}"),
            UserId::new(1),
            ChannelId::new(10),
        ))
    }

    fn ids(tracks: &[Arc<Track>]) -> Vec<String> {
        tracks.iter().map(|t| t.id().to_string()).collect()
    }

    #[tokio::test]
    async fn dequeue_preserves_enqueue_order() {
        let queue = TrackQueue::new();
        for id in ["a", "b", "c", "a"] {
            queue.enqueue(track(id));
        }

        let mut seen = Vec::new();
        while let Some(t) = queue.dequeue_blocking(Duration::from_millis(1)).await {
            seen.push(t.id().to_string());
        }
        assert_eq!(seen, vec!["a", "b", "c", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dequeue_times_out_on_empty_queue() {
        let queue = TrackQueue::new();
        let started = Instant::now();
        assert!(queue.dequeue_blocking(Duration::from_secs(5)).await.is_none());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn dequeue_wakes_up_on_enqueue() {
        let queue = Arc::new(TrackQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue_blocking(Duration::from_secs(60)).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        queue.enqueue(track("late"));

        let got = consumer.await.unwrap().expect("track should arrive before timeout");
        assert_eq!(got.id(), "late");
    }

    #[test]
    fn remove_at_out_of_range_leaves_queue_untouched() {
        let queue = TrackQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(track(id));
        }

        let err = queue.remove_at(3).unwrap_err();
        assert_eq!(err, SessionError::InvalidIndex { index: 3, len: 3 });
        assert_eq!(ids(&queue.peek_range(0, 10)), vec!["a", "b", "c"]);

        let removed = queue.remove_at(1).unwrap();
        assert_eq!(removed.id(), "b");
        assert_eq!(ids(&queue.peek_range(0, 10)), vec!["a", "c"]);
    }

    #[test]
    fn try_enqueue_stops_at_capacity() {
        let queue = TrackQueue::new();
        assert_eq!(queue.try_enqueue(track("a"), 2).unwrap(), 1);
        assert_eq!(queue.try_enqueue(track("b"), 2).unwrap(), 2);
        assert_eq!(queue.try_enqueue(track("c"), 2).unwrap_err(), SessionError::QueueFull(2));
        assert_eq!(ids(&queue.peek_range(0, 10)), vec!["a", "b"]);
    }

    #[test]
    fn concurrent_producers_never_exceed_capacity() {
        let queue = Arc::new(TrackQueue::new());
        let producers: Vec<_> = (0..8)
            .map(|p| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|i| queue.try_enqueue(track(&format!("{p}-{i}")), 100).is_ok())
                        .count()
                })
            })
            .collect();

        let accepted: usize = producers.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 100);
        assert_eq!(queue.len(), 100);
    }

    #[test]
    fn remove_at_on_empty_queue_fails() {
        let queue = TrackQueue::new();
        assert_eq!(
            queue.remove_at(0).unwrap_err(),
            SessionError::InvalidIndex { index: 0, len: 0 }
        );
    }

    #[test]
    fn shuffle_keeps_the_same_tracks() {
        let queue = TrackQueue::new();
        let original: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        for id in &original {
            queue.enqueue(track(id));
        }

        let mut changed = false;
        for _ in 0..10 {
            queue.shuffle();
            let now = ids(&queue.peek_range(0, 20));
            changed |= now != original;

            let mut sorted = now.clone();
            sorted.sort();
            let mut expected = original.clone();
            expected.sort();
            assert_eq!(sorted, expected);
        }
        assert!(changed, "20 tracks shuffled 10 times never changed order");
    }

    #[test]
    fn shuffle_on_tiny_queue_is_a_noop() {
        let queue = TrackQueue::new();
        queue.shuffle();
        assert!(queue.is_empty());

        queue.enqueue(track("only"));
        queue.shuffle();
        assert_eq!(ids(&queue.peek_range(0, 5)), vec!["only"]);
    }

    #[test]
    fn clear_reports_discarded_count() {
        let queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn pages_are_clamped_and_one_based() {
        let queue = TrackQueue::new();
        for i in 0..25 {
            queue.enqueue(track(&i.to_string()));
        }

        let page = queue.page(3, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.first_index, 20);
        assert_eq!(page.items.len(), 5);

        let past_end = queue.page(9, 10);
        assert_eq!(past_end.current_page, 3);

        let empty = TrackQueue::new().page(1, 10);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }
}
