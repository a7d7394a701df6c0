use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::{ServerConfig, StorageKind};
use crate::connection::{ConnectionInfo, PacketSink, PlayerSession};
use crate::err::{ProtError, ServerError};
use crate::packets::client::{ClientPackets, PlayKeepAlive};
use crate::packets::parse;
use crate::protocol_types::traits::WriteProtPacket;
use crate::serve::ConnectionActorMessage::SendPacket;
use crate::storage::fs::FsWorldStorage;
use crate::storage::memory::MemoryStorage;
use crate::storage::StorageProvider;
use crate::web;
use crate::world::dimension::DimensionHandle;
use crate::world::World;

const HEARTBEAT: Duration = Duration::from_secs(10);

async fn accept_packet(
    read: &mut OwnedReadHalf,
    session: &PlayerSession,
    sender: &Sender<ConnectionActorMessage>,
    log_packets: bool,
) -> Result<(), ProtError> {
    let packet = parse::parse_packet(read).await?;
    if log_packets {
        debug!("{} Inbound packet: {packet:?}", session.uuid());
    }
    for reply in packet.handle(session).await? {
        sender
            .send(SendPacket(reply))
            .await
            .map_err(|_| ProtError::Disconnected)?;
    }
    Ok(())
}

/**
 * The connection actor owns one player's TCP connection. It runs three tasks:
 * - The message handler, which exclusively owns the write half and sends whatever arrives over the internal channel.
 * - The packet handler, which reads, parses and handles server-bound packets.
 * - The heartbeat, which sends keepalive packets over the internal channel.
 * The player's dimension pushes chunk packets into the same channel through [`PacketSink`].
 */
struct ConnectionActor {
    receiver: Receiver<ConnectionActorMessage>,
    info: Arc<RwLock<ConnectionInfo>>,
}

impl ConnectionActor {
    async fn run(
        &mut self,
        read: OwnedReadHalf,
        write: OwnedWriteHalf,
        handle: ConnectionActorHandle,
        dimension: DimensionHandle,
        log_packets: bool,
    ) {
        let session = PlayerSession {
            info: self.info.clone(),
            dimension: dimension.clone(),
        };
        let uuid = session.uuid();
        let sender = handle.sender.clone();
        if let Err(e) = dimension.player_joined(uuid, Arc::new(handle), 0.0, 0.0).await {
            error!("Couldn't place {uuid} into {}: {e}", dimension.name());
            return;
        }
        let heartbeat_sender = sender.clone();
        tokio::spawn(async move { run_packet_handler(session, read, sender, log_packets).await });
        let info = self.info.clone();
        tokio::spawn(async move { run_heartbeat(info, heartbeat_sender).await });
        self.run_msg_handler(write).await;
    }

    async fn run_msg_handler(&mut self, mut write: OwnedWriteHalf) {
        while let Some(msg) = self.receiver.recv().await {
            if let Err(e) = self.handle(msg, &mut write).await {
                if e.is_fatal() {
                    debug!("Stopped writing: {e}");
                    self.info.write().unwrap_or_else(PoisonError::into_inner).close();
                    break;
                }
            }
        }
    }

    async fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        write: &mut OwnedWriteHalf,
    ) -> Result<(), ProtError> {
        match msg {
            SendPacket(packet) => {
                packet.write(write).await.map_err(|err| {
                    debug!("Couldn't write {packet}: {err}");
                    ProtError::Disconnected
                })?;
            }
        }
        Ok(())
    }
}

/**
 * Reads packets until the peer goes away or a fatal error occurs, then tells the dimension
 * the player left.
 */
async fn run_packet_handler(
    session: PlayerSession,
    mut read: OwnedReadHalf,
    sender: Sender<ConnectionActorMessage>,
    log_packets: bool,
) {
    let address = read
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".into());
    loop {
        if session.info.read().unwrap_or_else(PoisonError::into_inner).closed() {
            break;
        }
        match read.peek(&mut [0]).await {
            Ok(0) => {
                info!("Connection {address} closed.");
                break;
            }
            Err(e) => {
                error!("Error: {:?}", e);
                break;
            }
            _ => {}
        }
        if let Err(e) = accept_packet(&mut read, &session, &sender, log_packets).await {
            if e.is_fatal() {
                error!("Closing connection {address}: {e}");
                break;
            }
            warn!("Couldn't handle packet from {address}: {e}");
        }
    }
    session.info.write().unwrap_or_else(PoisonError::into_inner).close();
    if let Err(e) = session.dimension.player_left(session.uuid()).await {
        warn!("{e}");
    }
}

async fn run_heartbeat(info: Arc<RwLock<ConnectionInfo>>, sender: Sender<ConnectionActorMessage>) {
    loop {
        tokio::time::sleep(HEARTBEAT).await;
        let keep_alive_id = rand::random::<i64>();
        {
            let mut info = info.write().unwrap_or_else(PoisonError::into_inner);
            if info.closed() {
                break;
            }
            info.keep_alive_id = keep_alive_id;
        }
        let packet = PlayKeepAlive::new(keep_alive_id);
        if sender
            .send(SendPacket(ClientPackets::PlayKeepAlive(packet)))
            .await
            .is_err()
        {
            break;
        }
    }
}

#[derive(Clone)]
pub(crate) struct ConnectionActorHandle {
    sender: Sender<ConnectionActorMessage>,
}

impl ConnectionActorHandle {
    /// Takes over a connection that is already in play state and places the player into
    /// `dimension`.
    pub(crate) fn new(
        stream: TcpStream,
        address: SocketAddr,
        dimension: DimensionHandle,
        log_packets: bool,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(256);
        let (read, write) = stream.into_split();
        let info = ConnectionInfo::new(Uuid::new_v4(), format!("player-{}", address.port()));
        let mut actor = ConnectionActor {
            receiver,
            info: Arc::new(RwLock::new(info)),
        };
        let handle = Self { sender };
        let actor_handle = handle.clone();
        tokio::spawn(async move {
            actor
                .run(read, write, actor_handle, dimension, log_packets)
                .await;
        });
        handle
    }
}

#[async_trait]
impl PacketSink for ConnectionActorHandle {
    async fn send_packet(&self, packet: ClientPackets) -> Result<(), ProtError> {
        self.sender
            .send(SendPacket(packet))
            .await
            .map_err(|_| ProtError::Disconnected)
    }
}

pub(crate) enum ConnectionActorMessage {
    SendPacket(ClientPackets),
}

fn open_storage(config: &ServerConfig) -> Arc<dyn StorageProvider> {
    match config.storage {
        StorageKind::Fs => Arc::new(FsWorldStorage::new(&config.world_path)),
        StorageKind::Memory => {
            warn!("Using in-memory storage, nothing survives a restart");
            Arc::new(MemoryStorage::new())
        }
    }
}

pub(crate) async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    let world = World::init(config.world_name.clone(), open_storage(&config), config.visibility()).await?;
    let world = Arc::new(world);
    info!("World {} ready", world.name());

    let web_world = world.clone();
    let web_port = config.web_port;
    tokio::spawn(async move {
        if let Err(e) = web::serve::init(web_world, web_port).await {
            error!("Web server stopped: {e}");
        }
    });

    let tick_world = world.clone();
    let tick = config.tick;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            tick_world.tick().await;
        }
    });

    let autosave_world = world.clone();
    let autosave = config.autosave_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + autosave, autosave);
        loop {
            interval.tick().await;
            autosave_world.autosave().await;
        }
    });

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], config.port))).await?;
    info!("Listening on port {}", config.port);
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, address)) => match world.default_dimension() {
                    Some(dimension) => {
                        info!("New connection: {address}");
                        ConnectionActorHandle::new(stream, address, dimension.clone(), config.log_packets);
                    }
                    None => error!("No dimension to place {address} into"),
                },
                Err(e) => warn!("Couldn't accept connection: {e}"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }
    world.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod test {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::chunk::generator::FlatGenerator;
    use crate::protocol_types::primitives::VarInt;
    use crate::protocol_types::traits::ReadProt;
    use crate::storage::DimensionConfig;
    use crate::world::visibility::{ChunkVisibilityManager, VisibilityConfig};

    fn dimension() -> DimensionHandle {
        let config = DimensionConfig::generate("overworld");
        let manager = ChunkVisibilityManager::new(
            config.uuid,
            VisibilityConfig {
                view_radius: 1,
                ..Default::default()
            },
            Arc::new(MemoryStorage::new()),
            Arc::new(FlatGenerator::default()),
        );
        DimensionHandle::spawn(config, manager)
    }

    async fn read_frame(stream: &mut TcpStream) -> (i32, Vec<u8>) {
        let length = VarInt::read(stream).await.unwrap();
        let mut frame = vec![0u8; length.value as usize];
        stream.read_exact(&mut frame).await.unwrap();
        let mut body = frame.as_slice();
        let id = VarInt::read(&mut body).await.unwrap();
        (id.value, body.to_vec())
    }

    async fn wait_for_players(dimension: &DimensionHandle, count: usize) {
        for _ in 0..200 {
            if dimension.stats().await.unwrap().players.len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} players");
    }

    #[tokio::test]
    async fn closed_channel_is_a_disconnect() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let handle = ConnectionActorHandle { sender };
        let err = handle
            .send_packet(ClientPackets::PlayKeepAlive(PlayKeepAlive::new(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtError::Disconnected));
    }

    #[tokio::test]
    async fn player_receives_chunks_and_moves() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(address).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        let dimension = dimension();
        ConnectionActorHandle::new(stream, peer, dimension.clone(), true);

        for _ in 0..200 {
            dimension.tick().await.unwrap();
            if dimension.stats().await.unwrap().players.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let (id, body) = read_frame(&mut client).await;
        assert_eq!(id, 0x49);
        assert_eq!(body, vec![0, 0]);
        for _ in 0..9 {
            assert_eq!(read_frame(&mut client).await.0, 0x22);
        }

        let mut position = vec![];
        for v in [20.0f64, 64.0, 0.0] {
            position.extend_from_slice(&v.to_be_bytes());
        }
        position.push(1);
        client.write_all(&[position.len() as u8 + 1, 0x16]).await.unwrap();
        client.write_all(&position).await.unwrap();

        for _ in 0..200 {
            dimension.tick().await.unwrap();
            let stats = dimension.stats().await.unwrap();
            if stats.players.first().is_some_and(|p| p.center_x == 1) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(read_frame(&mut client).await, (0x49, vec![1, 0]));

        drop(client);
        wait_for_players(&dimension, 0).await;
        assert_eq!(dimension.stats().await.unwrap().loaded_chunks, 0);
    }
}
