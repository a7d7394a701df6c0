use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::oneshot;
use uuid::Uuid;
use voxelcraft_lib::web::dto;

use crate::connection::PacketSink;
use crate::err::ProtError;
use crate::storage::DimensionConfig;
use crate::world::visibility::{ChunkVisibilityManager, SaveSummary};

pub(crate) enum DimensionMessage {
    PlayerJoined {
        player: Uuid,
        sink: Arc<dyn PacketSink>,
        x: f64,
        z: f64,
    },
    PlayerMoved {
        player: Uuid,
        x: f64,
        z: f64,
    },
    PlayerLeft {
        player: Uuid,
    },
    Tick,
    Autosave,
    Stats(oneshot::Sender<dto::DimensionStats>),
    Shutdown(oneshot::Sender<SaveSummary>),
}

/**
 * Owns one dimension's visibility manager and serialises everything that touches it.
 * Movement is coalesced per player and applied on the next tick; the updates of one tick run
 * concurrently so overlapping windows share their pending loads.
 */
struct DimensionActor {
    config: DimensionConfig,
    manager: ChunkVisibilityManager,
    receiver: Receiver<DimensionMessage>,
    sinks: HashMap<Uuid, Arc<dyn PacketSink>>,
    moves: HashMap<Uuid, (f64, f64)>,
}

impl DimensionActor {
    async fn run(&mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                DimensionMessage::PlayerJoined { player, sink, x, z } => {
                    info!("Player {player} joined dimension {}", self.config.name);
                    self.sinks.insert(player, sink);
                    self.moves.insert(player, (x, z));
                }
                DimensionMessage::PlayerMoved { player, x, z } => {
                    if self.sinks.contains_key(&player) {
                        self.moves.insert(player, (x, z));
                    }
                }
                DimensionMessage::PlayerLeft { player } => self.remove_player(player).await,
                DimensionMessage::Tick => self.flush().await,
                DimensionMessage::Autosave => {
                    let summary = self.manager.save_all().await;
                    info!(
                        "Autosaved {} chunks of dimension {} ({} failed)",
                        summary.saved, self.config.name, summary.failed
                    );
                }
                DimensionMessage::Stats(reply) => {
                    if reply.send(self.stats()).is_err() {
                        debug!("Stats requester for {} went away", self.config.name);
                    }
                }
                DimensionMessage::Shutdown(reply) => {
                    let summary = self.manager.save_all().await;
                    info!(
                        "Dimension {} stopped, saved {} chunks ({} failed)",
                        self.config.name, summary.saved, summary.failed
                    );
                    let _ = reply.send(summary);
                    break;
                }
            }
        }
    }

    async fn remove_player(&mut self, player: Uuid) {
        self.sinks.remove(&player);
        self.moves.remove(&player);
        let evicted = self.manager.remove_player(player).await;
        info!(
            "Player {player} left dimension {}, evicted {} chunks",
            self.config.name,
            evicted.len()
        );
    }

    async fn flush(&mut self) {
        let moves: Vec<(Uuid, (f64, f64))> = self.moves.drain().collect();
        let manager = &self.manager;
        let sinks = &self.sinks;
        let updates = moves.into_iter().filter_map(|(player, (x, z))| {
            let sink = sinks.get(&player)?.clone();
            Some(async move { (player, manager.update_window(player, sink.as_ref(), x, z).await) })
        });
        let reports = join_all(updates).await;

        for (player, report) in reports {
            if let Some(center) = report.center {
                debug!(
                    "{player} now centred on {center}: {} loaded, {} sent, {} unloaded, {} evicted",
                    report.loaded.len(),
                    report.sent,
                    report.unloaded.len(),
                    report.evicted.len()
                );
            }
            if report.disconnected {
                warn!("Lost connection to {player} while sending chunks");
                self.remove_player(player).await;
            }
        }
        let evicted = self.manager.retry_pending_evictions().await;
        if !evicted.is_empty() {
            info!("Evicted {} chunks after retrying their saves", evicted.len());
        }
    }

    fn stats(&self) -> dto::DimensionStats {
        let stats = self.manager.stats();
        dto::DimensionStats {
            name: self.config.name.clone(),
            uuid: self.config.uuid.to_string(),
            seed: self.config.seed,
            loaded_chunks: stats.loaded_chunks,
            players: stats
                .windows
                .into_iter()
                .map(|w| dto::PlayerWindow {
                    uuid: w.player.to_string(),
                    center_x: w.center.x,
                    center_z: w.center.z,
                    visible_chunks: w.visible,
                })
                .collect(),
            pending_evictions: stats.pending_evictions,
        }
    }
}

#[derive(Clone)]
pub(crate) struct DimensionHandle {
    sender: Sender<DimensionMessage>,
    name: String,
    uuid: Uuid,
}

impl DimensionHandle {
    pub(crate) fn spawn(config: DimensionConfig, manager: ChunkVisibilityManager) -> Self {
        let (sender, receiver) = mpsc::channel(256);
        let handle = Self {
            sender,
            name: config.name.clone(),
            uuid: config.uuid,
        };
        let mut actor = DimensionActor {
            config,
            manager,
            receiver,
            sinks: HashMap::new(),
            moves: HashMap::new(),
        };
        tokio::spawn(async move { actor.run().await });
        handle
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn send(&self, msg: DimensionMessage) -> Result<(), ProtError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| ProtError::DimensionGone(self.name.clone()))
    }

    pub(crate) async fn player_joined(
        &self,
        player: Uuid,
        sink: Arc<dyn PacketSink>,
        x: f64,
        z: f64,
    ) -> Result<(), ProtError> {
        self.send(DimensionMessage::PlayerJoined { player, sink, x, z }).await
    }

    pub(crate) async fn player_moved(&self, player: Uuid, x: f64, z: f64) -> Result<(), ProtError> {
        self.send(DimensionMessage::PlayerMoved { player, x, z }).await
    }

    pub(crate) async fn player_left(&self, player: Uuid) -> Result<(), ProtError> {
        self.send(DimensionMessage::PlayerLeft { player }).await
    }

    pub(crate) async fn tick(&self) -> Result<(), ProtError> {
        self.send(DimensionMessage::Tick).await
    }

    pub(crate) async fn autosave(&self) -> Result<(), ProtError> {
        self.send(DimensionMessage::Autosave).await
    }

    pub(crate) async fn stats(&self) -> Result<dto::DimensionStats, ProtError> {
        let (reply, response) = oneshot::channel();
        self.send(DimensionMessage::Stats(reply)).await?;
        response
            .await
            .map_err(|_| ProtError::DimensionGone(self.name.clone()))
    }

    /// Saves every resident chunk and stops the actor.
    pub(crate) async fn shutdown(&self) -> Result<SaveSummary, ProtError> {
        let (reply, response) = oneshot::channel();
        self.send(DimensionMessage::Shutdown(reply)).await?;
        response
            .await
            .map_err(|_| ProtError::DimensionGone(self.name.clone()))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::world::test_support::{
        CountingGenerator, CountingStorage, RecordingSink, Sent, StalledSink,
    };
    use crate::world::visibility::VisibilityConfig;
    use crate::world::window::ChunkPos;

    fn spawn(storage: Arc<CountingStorage>) -> DimensionHandle {
        let config = DimensionConfig::generate("overworld");
        let manager = ChunkVisibilityManager::new(
            config.uuid,
            VisibilityConfig {
                view_radius: 5,
                save_retries: 1,
                save_retry_delay: Duration::from_millis(1),
                send_timeout: Duration::from_millis(20),
            },
            storage,
            Arc::new(CountingGenerator::default()),
        );
        DimensionHandle::spawn(config, manager)
    }

    #[tokio::test]
    async fn join_is_applied_on_tick() -> Result<(), ProtError> {
        let storage = Arc::new(CountingStorage::default());
        let dimension = spawn(storage.clone());
        let sink = Arc::new(RecordingSink::default());
        let player = Uuid::new_v4();

        dimension.player_joined(player, sink.clone(), 8.0, 8.0).await?;
        assert_eq!(dimension.stats().await?.loaded_chunks, 0);

        dimension.tick().await?;
        let stats = dimension.stats().await?;
        assert_eq!(stats.loaded_chunks, 121);
        assert_eq!(stats.players.len(), 1);
        assert_eq!(stats.players[0].uuid, player.to_string());
        assert_eq!(stats.players[0].visible_chunks, 121);
        assert_eq!(sink.chunks().len(), 121);
        Ok(())
    }

    #[tokio::test]
    async fn moves_between_ticks_are_coalesced() -> Result<(), ProtError> {
        let storage = Arc::new(CountingStorage::default());
        let dimension = spawn(storage.clone());
        let sink = Arc::new(RecordingSink::default());
        let player = Uuid::new_v4();
        dimension.player_joined(player, sink.clone(), 0.0, 0.0).await?;
        dimension.tick().await?;

        for x in [16.0, 32.0, 48.0] {
            dimension.player_moved(player, x, 0.0).await?;
        }
        dimension.tick().await?;
        let stats = dimension.stats().await?;
        assert_eq!(stats.players[0].center_x, 3);
        assert_eq!(storage.loads(), 121 + 33);

        let centers: Vec<Sent> = sink
            .sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Center(_)))
            .collect();
        assert_eq!(
            centers,
            vec![Sent::Center(ChunkPos::new(0, 0)), Sent::Center(ChunkPos::new(3, 0))]
        );
        Ok(())
    }

    #[tokio::test]
    async fn leaving_evicts_the_window() -> Result<(), ProtError> {
        let storage = Arc::new(CountingStorage::default());
        let dimension = spawn(storage.clone());
        let player = Uuid::new_v4();
        dimension
            .player_joined(player, Arc::new(RecordingSink::default()), 0.0, 0.0)
            .await?;
        dimension.tick().await?;
        dimension.player_left(player).await?;

        let stats = dimension.stats().await?;
        assert_eq!(stats.loaded_chunks, 0);
        assert!(stats.players.is_empty());
        assert_eq!(storage.saves(), 121);
        Ok(())
    }

    #[tokio::test]
    async fn disconnected_players_are_dropped_on_tick() -> Result<(), ProtError> {
        let storage = Arc::new(CountingStorage::default());
        let dimension = spawn(storage.clone());
        let sink = Arc::new(RecordingSink::default());
        sink.close();
        dimension
            .player_joined(Uuid::new_v4(), sink, 0.0, 0.0)
            .await?;
        dimension.tick().await?;

        let stats = dimension.stats().await?;
        assert!(stats.players.is_empty());
        assert_eq!(stats.loaded_chunks, 0);
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_saves_everything() -> Result<(), ProtError> {
        let storage = Arc::new(CountingStorage::default());
        let dimension = spawn(storage.clone());
        dimension
            .player_joined(Uuid::new_v4(), Arc::new(RecordingSink::default()), 0.0, 0.0)
            .await?;
        dimension.tick().await?;

        let summary = dimension.shutdown().await?;
        assert_eq!(summary, SaveSummary { saved: 121, failed: 0 });
        assert_eq!(storage.inner().chunk_count(), 121);
        Ok(())
    }

    #[tokio::test]
    async fn stalled_player_does_not_block_the_dimension() -> Result<(), ProtError> {
        let storage = Arc::new(CountingStorage::default());
        let dimension = spawn(storage.clone());
        let stalled = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        let sink = Arc::new(RecordingSink::default());
        dimension
            .player_joined(stalled, Arc::new(StalledSink), 0.0, 0.0)
            .await?;
        dimension.player_joined(healthy, sink.clone(), 0.0, 0.0).await?;
        dimension.tick().await?;

        let stats = tokio::time::timeout(Duration::from_secs(5), dimension.stats())
            .await
            .expect("dimension stopped answering")?;
        assert_eq!(sink.chunks().len(), 121);
        assert_eq!(stats.players.len(), 1);
        assert_eq!(stats.players[0].uuid, healthy.to_string());
        assert_eq!(stats.loaded_chunks, 121);
        Ok(())
    }
}
