use core::fmt::Display;
use std::sync::PoisonError;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncRead;

use crate::connection::PlayerSession;
use crate::err::ProtError;
use crate::err::ProtError::KeepAliveIdMismatch;
use crate::packets::client::ClientPackets;
use crate::protocol_types::primitives::VarInt;
use crate::protocol_types::traits::{ReadProt, ServerPacket, SizedProt};
use crate::{packet, packet_base};

packet!(
    PlayKeepAlive 0x14 {
        id: i64,
    },
    handler |this, session| {
        let keep_alive_id = session.info.read().unwrap_or_else(PoisonError::into_inner).keep_alive_id;
        if this.id != keep_alive_id {
            Err(KeepAliveIdMismatch(keep_alive_id, this.id))
        } else {
            Ok(vec![])
        }
    }
);

packet!(
    SetPlayerPosition 0x16 {
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    },
    handler |this, session| {
        let uuid = {
            let mut info = session.info.write().unwrap_or_else(PoisonError::into_inner);
            info.position.x = this.x;
            info.position.y = this.y;
            info.position.z = this.z;
            info.position.on_ground = this.on_ground;
            debug!("{} moved to {}", info.username, info.position);
            info.uuid
        };
        session.dimension.player_moved(uuid, this.x, this.z).await?;
        Ok(vec![])
    }
);

packet!(
    SetPlayerPositionAndRotation 0x17 {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    handler |this, session| {
        let uuid = {
            let mut info = session.info.write().unwrap_or_else(PoisonError::into_inner);
            info.position.x = this.x;
            info.position.y = this.y;
            info.position.z = this.z;
            info.position.yaw = this.yaw;
            info.position.pitch = this.pitch;
            info.position.on_ground = this.on_ground;
            debug!("{} moved to {}", info.username, info.position);
            info.uuid
        };
        session.dimension.player_moved(uuid, this.x, this.z).await?;
        Ok(vec![])
    }
);
