//! Storage, generator and sink doubles shared by the world tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::chunk::column::Chunk;
use crate::chunk::generator::{ChunkGenerator, FlatGenerator};
use crate::chunk::persist::PersistedChunk;
use crate::connection::PacketSink;
use crate::err::{ChunkError, ProtError, StorageError};
use crate::packets::client::ClientPackets;
use crate::storage::memory::MemoryStorage;
use crate::storage::{DimensionConfig, StorageProvider};
use crate::world::window::ChunkPos;

#[derive(Default)]
pub(crate) struct CountingStorage {
    inner: MemoryStorage,
    loads: AtomicUsize,
    saves: AtomicUsize,
    failing_saves: AtomicBool,
    load_delay: Option<Duration>,
    per_key: Mutex<HashMap<ChunkPos, usize>>,
}

impl CountingStorage {
    pub(crate) fn with_load_delay(delay: Duration) -> Self {
        Self {
            load_delay: Some(delay),
            ..Default::default()
        }
    }

    pub(crate) fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_saves(&self, fail: bool) {
        self.failing_saves.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn max_loads_per_key(&self) -> usize {
        self.per_key.lock().unwrap().values().copied().max().unwrap_or(0)
    }
}

#[async_trait]
impl StorageProvider for CountingStorage {
    async fn load_dimensions(&self, world: &str) -> Result<Vec<DimensionConfig>, StorageError> {
        self.inner.load_dimensions(world).await
    }

    async fn save_dimensions(
        &self,
        world: &str,
        dimensions: &[DimensionConfig],
    ) -> Result<(), StorageError> {
        self.inner.save_dimensions(world, dimensions).await
    }

    async fn load_chunk(
        &self,
        dimension: Uuid,
        x: i32,
        z: i32,
    ) -> Result<Option<Chunk>, StorageError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        *self.per_key.lock().unwrap().entry(ChunkPos::new(x, z)).or_default() += 1;
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.load_chunk(dimension, x, z).await
    }

    async fn save_chunk(
        &self,
        dimension: Uuid,
        x: i32,
        z: i32,
        chunk: PersistedChunk,
    ) -> Result<(), StorageError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.failing_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk full".into()));
        }
        self.inner.save_chunk(dimension, x, z, chunk).await
    }

    async fn exists_chunk(&self, dimension: Uuid, x: i32, z: i32) -> Result<bool, StorageError> {
        self.inner.exists_chunk(dimension, x, z).await
    }
}

#[derive(Default)]
pub(crate) struct CountingGenerator {
    inner: FlatGenerator,
    calls: AtomicUsize,
}

impl CountingGenerator {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChunkGenerator for CountingGenerator {
    fn generate(&self, chunk_x: i32, chunk_z: i32) -> Result<Chunk, ChunkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate(chunk_x, chunk_z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sent {
    Center(ChunkPos),
    Chunk(ChunkPos),
    Unload(ChunkPos),
    KeepAlive,
}

/// Records what a player would have received.
#[derive(Default)]
pub(crate) struct RecordingSink {
    sent: Mutex<Vec<Sent>>,
    attempts: AtomicUsize,
    closed: AtomicBool,
}

impl RecordingSink {
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub(crate) fn chunks(&self) -> Vec<ChunkPos> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Chunk(pos) => Some(pos),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn unloads(&self) -> Vec<ChunkPos> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Unload(pos) => Some(pos),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl PacketSink for RecordingSink {
    async fn send_packet(&self, packet: ClientPackets) -> Result<(), ProtError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProtError::Disconnected);
        }
        let sent = match packet {
            ClientPackets::SetCenterChunk(p) => {
                Sent::Center(ChunkPos::new(p.chunk_x.value, p.chunk_z.value))
            }
            ClientPackets::ChunkDataAndUpdateLight(p) => Sent::Chunk(ChunkPos::new(p.chunk_x, p.chunk_z)),
            ClientPackets::UnloadChunk(p) => Sent::Unload(ChunkPos::new(p.chunk_x, p.chunk_z)),
            ClientPackets::PlayKeepAlive(_) => Sent::KeepAlive,
        };
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

/// A connection that never takes another packet, like a client that stopped reading.
pub(crate) struct StalledSink;

#[async_trait]
impl PacketSink for StalledSink {
    async fn send_packet(&self, _packet: ClientPackets) -> Result<(), ProtError> {
        std::future::pending().await
    }
}
