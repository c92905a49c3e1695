use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, info};

use super::track::Track;

/// Cola FIFO de pistas pendientes de una guild.
///
/// Varios comandos pueden agregar a la vez; solo el controlador de la guild
/// saca pistas. Cada operación toma el lock el tiempo justo de tocar el
/// `VecDeque` y nunca se mantiene a través de un `.await`.
#[derive(Debug)]
pub struct GuildQueue {
    guild_id: GuildId,
    items: Mutex<VecDeque<Track>>,
}

impl GuildQueue {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Agrega al final y devuelve la posición (1 = siguiente en sonar)
    pub fn enqueue(&self, track: Track) -> usize {
        let mut items = self.items.lock();
        info!("➕ Agregado a la cola de guild {}: {}", self.guild_id, track.title());
        items.push_back(track);
        items.len()
    }

    /// Saca el primer elemento (FIFO estricto)
    pub fn dequeue_front(&self) -> Option<Track> {
        let next = self.items.lock().pop_front();
        match &next {
            Some(track) => debug!("➡️ Siguiente en cola (guild {}): {}", self.guild_id, track.title()),
            None => debug!("📭 Cola vacía en guild {}", self.guild_id),
        }
        next
    }

    /// Limpia las pistas pendientes sin tocar la reproducción actual
    pub fn clear(&self) -> usize {
        let removed = {
            let mut items = self.items.lock();
            let removed = items.len();
            items.clear();
            removed
        };
        info!("🗑️ Cola limpiada en guild {} ({} pistas)", self.guild_id, removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Copia de las pistas pendientes, en orden
    pub fn snapshot(&self) -> Vec<Track> {
        self.items.lock().iter().cloned().collect()
    }
}

/// Mapa guild → cola. Las colas se crean al primer acceso y no se eliminan
/// nunca: una cola vacía equivale a no tener cola.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: DashMap<GuildId, Arc<GuildQueue>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: GuildId) -> Arc<GuildQueue> {
        self.queues
            .entry(guild_id)
            .or_insert_with(|| Arc::new(GuildQueue::new(guild_id)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::thread;

    fn track(title: &str) -> Track {
        Track::new(title, format!("https://example.com/{title}"), UserId::new(7))
    }

    #[test]
    fn test_fifo_order() {
        let queue = GuildQueue::new(GuildId::new(1));
        assert_eq!(queue.enqueue(track("a")), 1);
        assert_eq!(queue.enqueue(track("b")), 2);
        assert_eq!(queue.enqueue(track("c")), 3);

        assert_eq!(queue.dequeue_front().unwrap().title(), "a");
        assert_eq!(queue.dequeue_front().unwrap().title(), "b");
        assert_eq!(queue.dequeue_front().unwrap().title(), "c");
        assert!(queue.dequeue_front().is_none());
    }

    #[test]
    fn test_concurrent_enqueues_are_not_lost() {
        let queue = Arc::new(GuildQueue::new(GuildId::new(1)));
        let writers = 8;
        let per_writer = 250;

        let handles: Vec<_> = (0..writers)
            .map(|w| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..per_writer {
                        queue.enqueue(track(&format!("{w}-{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut drained = Vec::new();
        while let Some(t) = queue.dequeue_front() {
            drained.push(t.title().to_string());
        }
        assert_eq!(drained.len(), writers * per_writer);

        // Sin duplicados y con el orden de cada escritor preservado
        for w in 0..writers {
            let mine: Vec<usize> = drained
                .iter()
                .filter_map(|t| t.strip_prefix(&format!("{w}-")))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(mine, (0..per_writer).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_clear_keeps_queue_usable() {
        let queue = GuildQueue::new(GuildId::new(1));
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.enqueue(track("c")), 1);
        assert_eq!(queue.snapshot(), vec![track("c")]);
    }

    #[test]
    fn test_registry_isolates_guilds() {
        let registry = QueueRegistry::new();
        let a = registry.get(GuildId::new(1));
        let b = registry.get(GuildId::new(2));

        a.enqueue(track("a1"));
        b.enqueue(track("b1"));
        a.clear();

        assert!(Arc::ptr_eq(&a, &registry.get(GuildId::new(1))));
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(a.is_empty());
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_registry_concurrent_get_creates_single_queue() {
        let registry = Arc::new(QueueRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    registry.get(GuildId::new(42)).enqueue(track(&i.to_string()));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.get(GuildId::new(42)).len(), 8);
    }
}
