use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::join_all;
use log::{debug, error, warn};
use tokio::sync::{OnceCell, RwLock};
use tokio::time;
use uuid::Uuid;

use crate::chunk::column::Chunk;
use crate::chunk::generator::ChunkGenerator;
use crate::chunk::persist::PersistedChunk;
use crate::connection::PacketSink;
use crate::err::{ChunkError, StorageError};
use crate::packets::client::{ChunkDataAndUpdateLight, ClientPackets, SetCenterChunk, UnloadChunk};
use crate::protocol_types::primitives::VarInt;
use crate::storage::StorageProvider;
use crate::world::window::{diff, square_around, ChunkPos};

/// A resident column. The registry owns it; windows only hold keys.
pub(crate) type SharedChunk = Arc<RwLock<Chunk>>;

#[derive(Debug, Clone)]
pub(crate) struct VisibilityConfig {
    pub(crate) view_radius: i32,
    /// Extra attempts after a failed eviction save.
    pub(crate) save_retries: u32,
    pub(crate) save_retry_delay: Duration,
    /// How long one packet may wait on a player's connection before they are treated as gone.
    pub(crate) send_timeout: Duration,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            view_radius: 5,
            save_retries: 3,
            save_retry_delay: Duration::from_millis(100),
            send_timeout: Duration::from_secs(5),
        }
    }
}

struct PlayerWindow {
    center: ChunkPos,
    keys: HashSet<ChunkPos>,
}

#[derive(Default)]
struct ViewState {
    loaded: HashMap<ChunkPos, SharedChunk>,
    windows: HashMap<Uuid, PlayerWindow>,
    pending: HashMap<ChunkPos, Arc<OnceCell<SharedChunk>>>,
    pending_evictions: HashSet<ChunkPos>,
}

impl ViewState {
    fn referenced(&self, key: ChunkPos) -> bool {
        self.windows.values().any(|w| w.keys.contains(&key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EvictOutcome {
    Evicted,
    /// Another window still shows the column.
    Retained,
    NotResident,
    /// Every save attempt failed; the column stays resident and is retried on the next tick.
    SaveFailed,
}

/// What one window update did.
#[derive(Debug, Default)]
pub(crate) struct WindowReport {
    pub(crate) center: Option<ChunkPos>,
    pub(crate) loaded: Vec<(ChunkPos, SharedChunk)>,
    pub(crate) unloaded: Vec<ChunkPos>,
    pub(crate) evicted: Vec<ChunkPos>,
    /// Chunk data packets delivered.
    pub(crate) sent: usize,
    pub(crate) disconnected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WindowSummary {
    pub(crate) player: Uuid,
    pub(crate) center: ChunkPos,
    pub(crate) visible: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VisibilityStats {
    pub(crate) loaded_chunks: usize,
    pub(crate) windows: Vec<WindowSummary>,
    pub(crate) pending_evictions: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SaveSummary {
    pub(crate) saved: usize,
    pub(crate) failed: usize,
}

// Stops talking to a player after the first failed or stalled send.
struct Delivery<'a> {
    sink: &'a dyn PacketSink,
    player: Uuid,
    timeout: Duration,
    alive: bool,
}

impl Delivery<'_> {
    async fn send(&mut self, packet: ClientPackets) -> bool {
        if !self.alive {
            return false;
        }
        match time::timeout(self.timeout, self.sink.send_packet(packet)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("No longer sending chunks to {}: {e}", self.player);
                self.alive = false;
                false
            }
            Err(_) => {
                warn!(
                    "{} did not take a packet within {:?}, dropping them",
                    self.player, self.timeout
                );
                self.alive = false;
                false
            }
        }
    }
}

/// Registry of the resident columns of one dimension and of every player's view window.
///
/// The state lock is never held across an await. Loads of the same key share one in-flight
/// future; evictions remove a column only after its save succeeded and only if no window
/// references it any more.
pub(crate) struct ChunkVisibilityManager {
    dimension: Uuid,
    config: VisibilityConfig,
    storage: Arc<dyn StorageProvider>,
    generator: Arc<dyn ChunkGenerator>,
    state: Mutex<ViewState>,
}

impl ChunkVisibilityManager {
    pub(crate) fn new(
        dimension: Uuid,
        config: VisibilityConfig,
        storage: Arc<dyn StorageProvider>,
        generator: Arc<dyn ChunkGenerator>,
    ) -> Self {
        Self {
            dimension,
            config,
            storage,
            generator,
            state: Mutex::new(ViewState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn dimension(&self) -> Uuid {
        self.dimension
    }

    #[cfg(test)]
    pub(crate) fn is_loaded(&self, key: ChunkPos) -> bool {
        self.state().loaded.contains_key(&key)
    }

    #[cfg(test)]
    pub(crate) fn loaded_count(&self) -> usize {
        self.state().loaded.len()
    }

    #[cfg(test)]
    pub(crate) fn pending_evictions(&self) -> usize {
        self.state().pending_evictions.len()
    }

    fn in_window(&self, player: Uuid, key: ChunkPos) -> bool {
        self.state()
            .windows
            .get(&player)
            .is_some_and(|w| w.keys.contains(&key))
    }

    pub(crate) fn stats(&self) -> VisibilityStats {
        let state = self.state();
        let mut windows: Vec<WindowSummary> = state
            .windows
            .iter()
            .map(|(player, window)| WindowSummary {
                player: *player,
                center: window.center,
                visible: window.keys.len(),
            })
            .collect();
        windows.sort_by_key(|w| w.player);
        VisibilityStats {
            loaded_chunks: state.loaded.len(),
            windows,
            pending_evictions: state.pending_evictions.len(),
        }
    }

    /// Moves `player`'s window to the square around world position (`x`, `z`), unloading and
    /// evicting what left it and loading and sending what entered it.
    pub(crate) async fn update_window(
        &self,
        player: Uuid,
        sink: &dyn PacketSink,
        x: f64,
        z: f64,
    ) -> WindowReport {
        let center = ChunkPos::containing(x, z);
        let window = square_around(center, self.config.view_radius);
        let diff = {
            let mut state = self.state();
            let old = state.windows.get(&player);
            if old.is_some_and(|w| w.center == center) {
                return WindowReport::default();
            }
            let diff = diff(old.map(|w| &w.keys), &window, center);
            state.windows.insert(player, PlayerWindow { center, keys: window });
            diff
        };

        let mut report = WindowReport {
            center: Some(center),
            ..Default::default()
        };
        let mut delivery = Delivery {
            sink,
            player,
            timeout: self.config.send_timeout,
            alive: true,
        };
        let packet = SetCenterChunk::new(VarInt::from(center.x), VarInt::from(center.z));
        delivery.send(ClientPackets::SetCenterChunk(packet)).await;

        for key in diff.to_unload {
            delivery
                .send(ClientPackets::UnloadChunk(UnloadChunk::new(key.x, key.z)))
                .await;
            if self.evict(key).await == EvictOutcome::Evicted {
                report.evicted.push(key);
            }
            report.unloaded.push(key);
        }

        let started = Instant::now();
        for key in &diff.to_load {
            let chunk = match self.acquire(*key).await {
                Ok(chunk) => chunk,
                Err(e) => {
                    error!("Could not provide chunk {key}: {e}");
                    continue;
                }
            };
            if delivery.alive && self.in_window(player, *key) {
                let packet = {
                    let guard = chunk.read().await;
                    ChunkDataAndUpdateLight::from_chunk(*key, &guard).await
                };
                match packet {
                    Ok(packet) => {
                        if delivery
                            .send(ClientPackets::ChunkDataAndUpdateLight(packet))
                            .await
                        {
                            debug!("Sent chunk {key} to {player}");
                            report.sent += 1;
                        }
                    }
                    Err(e) => error!("Could not encode chunk {key}: {e}"),
                }
            }
            report.loaded.push((*key, chunk));
        }
        let elapsed = started.elapsed();
        if !diff.to_load.is_empty() && elapsed > Duration::from_millis(diff.to_load.len() as u64) {
            warn!("Loaded {} chunks in {elapsed:?}", diff.to_load.len());
        }

        report.disconnected = !delivery.alive;
        report
    }

    /// Forgets `player`'s window and evicts whatever only it was showing.
    pub(crate) async fn remove_player(&self, player: Uuid) -> Vec<ChunkPos> {
        let window = self.state().windows.remove(&player);
        let Some(window) = window else {
            return vec![];
        };
        let mut keys: Vec<ChunkPos> = window.keys.into_iter().collect();
        keys.sort();
        let mut evicted = vec![];
        for key in keys {
            if self.evict(key).await == EvictOutcome::Evicted {
                evicted.push(key);
            }
        }
        evicted
    }

    /// Resident column for `key`, joining an in-flight load if there is one.
    async fn acquire(&self, key: ChunkPos) -> Result<SharedChunk, ChunkError> {
        let cell = {
            let mut state = self.state();
            if let Some(chunk) = state.loaded.get(&key) {
                return Ok(chunk.clone());
            }
            state.pending.entry(key).or_default().clone()
        };
        let result = cell
            .get_or_try_init(|| self.load_or_generate(key))
            .await
            .cloned();

        let mut state = self.state();
        if state.pending.get(&key).is_some_and(|p| Arc::ptr_eq(p, &cell)) {
            state.pending.remove(&key);
        }
        let chunk = result?;
        // the requesting window may have moved on while the load was in flight
        if state.referenced(key) {
            return Ok(state.loaded.entry(key).or_insert(chunk).clone());
        }
        Ok(chunk)
    }

    async fn load_or_generate(&self, key: ChunkPos) -> Result<SharedChunk, ChunkError> {
        let chunk = match self.storage.load_chunk(self.dimension, key.x, key.z).await {
            Ok(Some(chunk)) => {
                debug!("Loaded chunk {key} from storage");
                chunk
            }
            Ok(None) => {
                debug!("Generating chunk {key}");
                self.generator.generate(key.x, key.z)?
            }
            Err(e) => {
                warn!("Could not load chunk {key}, generating it instead: {e}");
                self.generator.generate(key.x, key.z)?
            }
        };
        Ok(Arc::new(RwLock::new(chunk)))
    }

    /// Saves and drops `key` unless a window still references it.
    pub(crate) async fn evict(&self, key: ChunkPos) -> EvictOutcome {
        let chunk = {
            let mut state = self.state();
            if state.referenced(key) {
                state.pending_evictions.remove(&key);
                return EvictOutcome::Retained;
            }
            match state.loaded.get(&key) {
                Some(chunk) => chunk.clone(),
                None => {
                    state.pending_evictions.remove(&key);
                    return EvictOutcome::NotResident;
                }
            }
        };

        let persisted = chunk.read().await.to_persisted();
        if let Err(e) = self.save_with_retries(key, persisted).await {
            error!(
                "Keeping chunk {key} resident after {} failed saves: {e}",
                self.config.save_retries + 1
            );
            self.state().pending_evictions.insert(key);
            return EvictOutcome::SaveFailed;
        }

        let mut state = self.state();
        state.pending_evictions.remove(&key);
        if state.referenced(key) {
            return EvictOutcome::Retained;
        }
        if state.loaded.get(&key).is_some_and(|c| Arc::ptr_eq(c, &chunk)) {
            state.loaded.remove(&key);
        }
        debug!("Evicted chunk {key}");
        EvictOutcome::Evicted
    }

    /// Retries evictions whose saves failed earlier. Returns the keys evicted this time.
    pub(crate) async fn retry_pending_evictions(&self) -> Vec<ChunkPos> {
        let mut keys: Vec<ChunkPos> = self.state().pending_evictions.iter().copied().collect();
        keys.sort();
        let mut evicted = vec![];
        for key in keys {
            if self.evict(key).await == EvictOutcome::Evicted {
                evicted.push(key);
            }
        }
        evicted
    }

    /// Writes every resident column to storage without evicting anything.
    pub(crate) async fn save_all(&self) -> SaveSummary {
        let chunks: Vec<(ChunkPos, SharedChunk)> = self
            .state()
            .loaded
            .iter()
            .map(|(key, chunk)| (*key, chunk.clone()))
            .collect();
        let results = join_all(chunks.iter().map(|(key, chunk)| async move {
            let persisted = chunk.read().await.to_persisted();
            (*key, self.save_with_retries(*key, persisted).await)
        }))
        .await;

        let mut summary = SaveSummary::default();
        for (key, result) in results {
            match result {
                Ok(()) => summary.saved += 1,
                Err(e) => {
                    error!("Could not save chunk {key}: {e}");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    async fn save_with_retries(
        &self,
        key: ChunkPos,
        persisted: PersistedChunk,
    ) -> Result<(), StorageError> {
        let mut attempt = 0;
        loop {
            match self
                .storage
                .save_chunk(self.dimension, key.x, key.z, persisted.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.config.save_retries => {
                    attempt += 1;
                    warn!("Saving chunk {key} failed (attempt {attempt}): {e}");
                    tokio::time::sleep(self.config.save_retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
