use tokio::io::{AsyncRead, AsyncReadExt};

use crate::err::ProtError;
use crate::packets::server;
use crate::protocol_types::primitives::VarInt;
use crate::protocol_types::traits::{ReadProt, ServerPacket};

/// Largest frame a three byte length prefix can announce.
const MAX_PACKET_SIZE: i32 = 2_097_151;

/// Reads one length-prefixed frame and decodes it. The whole frame is consumed even when its
/// id is unknown, so the stream stays aligned on the next packet.
pub(crate) async fn parse_packet(
    stream: &mut (impl AsyncRead + Unpin + Send),
) -> Result<Box<dyn ServerPacket>, ProtError> {
    let length = VarInt::read(stream).await.map_err(ProtError::BadFrame)?;
    if length.value <= 0 || length.value > MAX_PACKET_SIZE {
        return Err(ProtError::BadFrame(format!("invalid packet length {length}")));
    }
    let mut frame = vec![0u8; length.value as usize];
    stream.read_exact(&mut frame).await.map_err(|err| {
        ProtError::BadFrame(format!("trying to read packet with size {length}: {err}"))
    })?;

    let mut body = frame.as_slice();
    let id = VarInt::read(&mut body).await.map_err(ProtError::BadFrame)?;
    let packet: Box<dyn ServerPacket> = match id.value {
        0x14 => Box::new(server::PlayKeepAlive::read(&mut body).await?),
        0x16 => Box::new(server::SetPlayerPosition::read(&mut body).await?),
        0x17 => Box::new(server::SetPlayerPositionAndRotation::read(&mut body).await?),
        _ => {
            return Err(ProtError::Any(format!(
                "Unrecognized packet with id 0x{:x}",
                id.value
            )))
        }
    };
    Ok(packet)
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame(id: u8, body: &[u8]) -> Vec<u8> {
        let mut buf = vec![(body.len() + 1) as u8, id];
        buf.extend_from_slice(body);
        buf
    }

    fn position_body(x: f64, y: f64, z: f64) -> Vec<u8> {
        let mut body = vec![];
        body.extend_from_slice(&x.to_be_bytes());
        body.extend_from_slice(&y.to_be_bytes());
        body.extend_from_slice(&z.to_be_bytes());
        body.push(1);
        body
    }

    #[tokio::test]
    async fn keep_alive() {
        let bytes = frame(0x14, &42i64.to_be_bytes());
        let packet = parse_packet(&mut bytes.as_slice()).await.unwrap();
        assert_eq!(packet.to_string(), "PlayKeepAlive");
        assert_eq!(packet.prot_size(), 9);
    }

    #[tokio::test]
    async fn position() {
        let bytes = frame(0x16, &position_body(1.5, 64.0, -20.25));
        let packet = parse_packet(&mut bytes.as_slice()).await.unwrap();
        assert_eq!(packet.to_string(), "SetPlayerPosition");
        assert_eq!(format!("{packet:?}"), "SetPlayerPosition { x: 1.5, y: 64.0, z: -20.25, on_ground: true }");
    }

    #[tokio::test]
    async fn unknown_id_keeps_stream_aligned() {
        let mut bytes = frame(0x50, &[1, 2, 3, 4]);
        bytes.extend(frame(0x14, &7i64.to_be_bytes()));
        let mut stream = bytes.as_slice();

        let err = parse_packet(&mut stream).await.unwrap_err();
        assert!(!err.is_fatal());
        let next = parse_packet(&mut stream).await.unwrap();
        assert_eq!(next.to_string(), "PlayKeepAlive");
        assert!(stream.is_empty());
    }

    #[tokio::test]
    async fn bad_lengths_are_fatal() {
        let err = parse_packet(&mut [0u8].as_slice()).await.unwrap_err();
        assert!(matches!(err, ProtError::BadFrame(_)));

        let truncated = [10u8, 0x14, 0, 0];
        let err = parse_packet(&mut truncated.as_slice()).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
