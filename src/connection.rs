use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::err::ProtError;
use crate::packets::client::ClientPackets;
use crate::world::dimension::DimensionHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct PlayerPosition {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) z: f64,
    pub(crate) yaw: f32,
    pub(crate) pitch: f32,
    pub(crate) on_ground: bool,
}

impl Display for PlayerPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.1}, {:.1}, {:.1}) yaw {:.0} pitch {:.0}{}",
            self.x,
            self.y,
            self.z,
            self.yaw,
            self.pitch,
            if self.on_ground { " on ground" } else { "" }
        )
    }
}

/// Mutable per-connection state, shared between the connection's tasks.
#[derive(Debug)]
pub(crate) struct ConnectionInfo {
    pub(crate) uuid: Uuid,
    pub(crate) username: String,
    pub(crate) position: PlayerPosition,
    pub(crate) keep_alive_id: i64,
    closed: bool,
}

impl ConnectionInfo {
    pub(crate) fn new(uuid: Uuid, username: String) -> Self {
        Self {
            uuid,
            username,
            position: PlayerPosition::default(),
            keep_alive_id: 0,
            closed: false,
        }
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    pub(crate) fn closed(&self) -> bool {
        self.closed
    }
}

/// What a server-bound packet handler gets to work with.
pub(crate) struct PlayerSession {
    pub(crate) info: Arc<RwLock<ConnectionInfo>>,
    pub(crate) dimension: DimensionHandle,
}

impl PlayerSession {
    pub(crate) fn uuid(&self) -> Uuid {
        self.info.read().map(|info| info.uuid).unwrap_or_else(|e| e.get_ref().uuid)
    }
}

/// Destination for packets addressed to one player.
#[async_trait]
pub(crate) trait PacketSink: Send + Sync {
    /// Fails with [`ProtError::Disconnected`] once the player is gone.
    async fn send_packet(&self, packet: ClientPackets) -> Result<(), ProtError>;
}
