use std::fmt::{Debug, Display};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::PlayerSession;
use crate::err::ProtError;
use crate::packets::client::ClientPackets;

#[async_trait]
pub(crate) trait ServerPacket: SizedProt + Debug + Display + Sync + Send {
    fn id() -> u8
    where
        Self: Sized;

    async fn handle(&self, session: &PlayerSession) -> Result<Vec<ClientPackets>, ProtError>;
}

pub(crate) trait ClientPacket: SizedProt + WriteProt + Debug + Display {
    fn id() -> u8
    where
        Self: Sized;

    fn packet_id(&self) -> u8
    where
        Self: Sized,
    {
        Self::id()
    }
}

#[async_trait]
pub(crate) trait ReadProt {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String>
    where
        Self: Sized;
}

#[async_trait]
pub(crate) trait WriteProt {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String>;
}

#[async_trait]
pub(crate) trait WriteProtPacket {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String>;

    fn packet_id(&self) -> u8;
}

pub(crate) trait SizedProt {
    fn prot_size(&self) -> usize;
}
