//! Raw chunk storage keyed by the exact request window.
//!
//! Keys match exactly: a request is a hit only if a chunk was stored for the
//! same scene, kind, start time and step count. Overlapping windows with a
//! different start or length are misses, so callers should keep requesting
//! on stable window boundaries.

use shared::{Chunk, DataKind, SceneId};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub scene_id: SceneId,
    pub kind: DataKind,
    pub start_time: i64,
    pub step_count: usize,
}

impl ChunkKey {
    pub fn new(scene_id: SceneId, kind: DataKind, start_time: i64, step_count: usize) -> Self {
        Self {
            scene_id,
            kind,
            start_time,
            step_count,
        }
    }

    pub fn for_chunk(scene_id: SceneId, chunk: &Chunk) -> Self {
        Self::new(scene_id, chunk.kind, chunk.start_time, chunk.step_count)
    }
}

#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: HashMap<ChunkKey, Arc<Chunk>>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &ChunkKey) -> bool {
        self.chunks.contains_key(key)
    }

    pub fn get(&self, key: &ChunkKey) -> Option<Arc<Chunk>> {
        self.chunks.get(key).cloned()
    }

    /// Store a chunk once. Returns `false` and keeps the original when the key is taken.
    pub fn put(&mut self, scene_id: SceneId, chunk: Chunk) -> bool {
        let key = ChunkKey::for_chunk(scene_id, &chunk);
        if self.chunks.contains_key(&key) {
            return false;
        }
        self.chunks.insert(key, Arc::new(chunk));
        true
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Per-session cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStatistics {
    pub chunk_hits: u64,
    pub chunk_misses: u64,
    pub chunks_stored: u64,
    pub fetch_failures: u64,
    pub empty_results: u64,
}

impl CacheStatistics {
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.chunk_hits + self.chunk_misses;
        if lookups == 0 {
            0.0
        } else {
            self.chunk_hits as f64 / lookups as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::FlowRecord;

    fn chunk(kind: DataKind, start_time: i64, step_count: usize) -> Chunk {
        Chunk {
            start_time,
            step_count,
            kind,
            records: vec![(
                "L1".to_string(),
                FlowRecord {
                    record_id: 1,
                    time: start_time,
                    velocity: 30.0,
                },
            )],
        }
    }

    #[test]
    fn test_exact_key_hit() {
        let mut store = ChunkStore::new();
        assert!(store.put(1, chunk(DataKind::Measurement, 0, 12)));

        let key = ChunkKey::new(1, DataKind::Measurement, 0, 12);
        assert!(store.has(&key));
        assert_eq!(store.get(&key).unwrap().start_time, 0);
    }

    #[test]
    fn test_overlapping_windows_are_misses() {
        let mut store = ChunkStore::new();
        store.put(1, chunk(DataKind::Measurement, 0, 12));

        assert!(!store.has(&ChunkKey::new(1, DataKind::Measurement, 0, 6)));
        assert!(!store.has(&ChunkKey::new(1, DataKind::Measurement, 60, 12)));
        assert!(!store.has(&ChunkKey::new(2, DataKind::Measurement, 0, 12)));
        assert!(!store.has(&ChunkKey::new(1, DataKind::Prediction, 0, 12)));
    }

    #[test]
    fn test_put_keeps_first_chunk() {
        let mut store = ChunkStore::new();
        store.put(1, chunk(DataKind::Prediction, 0, 30));

        let mut later = chunk(DataKind::Prediction, 0, 30);
        later.records.clear();
        assert!(!store.put(1, later));

        let key = ChunkKey::new(1, DataKind::Prediction, 0, 30);
        assert_eq!(store.get(&key).unwrap().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_hit_ratio() {
        let stats = CacheStatistics {
            chunk_hits: 3,
            chunk_misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStatistics::default().hit_ratio(), 0.0);
    }
}
