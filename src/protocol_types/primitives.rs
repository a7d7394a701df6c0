use std::fmt::{Debug, Display, Formatter};

use crate::protocol_types::traits::{ReadProt, SizedProt, WriteProt};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const SEGMENT_BITS: u8 = 0x7f;
const CONTINUE_BIT: u8 = 0x80;

#[derive(Ord, PartialOrd, Eq, PartialEq, Clone, Copy, Hash)]
pub(crate) struct VarInt {
    pub(crate) value: i32,
}

impl From<usize> for VarInt {
    fn from(value: usize) -> Self {
        Self {
            value: value as i32,
        }
    }
}

impl From<i32> for VarInt {
    fn from(value: i32) -> Self {
        Self { value }
    }
}

impl From<u32> for VarInt {
    fn from(value: u32) -> Self {
        Self {
            value: value as i32,
        }
    }
}

impl Display for VarInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Debug for VarInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[async_trait]
impl ReadProt for VarInt {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String> {
        let mut value: i32 = 0;
        let mut pos: u32 = 0;
        loop {
            let current_byte = stream
                .read_u8()
                .await
                .map_err(|x| format!("IO error: {:?}", x))?;
            value |= ((current_byte & SEGMENT_BITS) as i32) << pos;
            if current_byte & CONTINUE_BIT == 0 {
                return Ok(Self { value });
            }
            pos += 7;
            if pos >= 32 {
                return Err("VarInt is too big".into());
            }
        }
    }
}

impl SizedProt for VarInt {
    fn prot_size(&self) -> usize {
        let mut x = self.value as u32;
        let mut count = 0;
        loop {
            x >>= 7;
            count += 1;

            if x == 0 {
                break count;
            }
        }
    }
}

#[async_trait]
impl WriteProt for VarInt {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        let mut x = self.value as u32;
        loop {
            let mut temp = (x & 0b0111_1111) as u8;
            x >>= 7;
            if x != 0 {
                temp |= 0b1000_0000;
            }

            stream
                .write_all(&[temp])
                .await
                .map_err(|x| format!("IO error: {:?}", x))?;

            if x == 0 {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReadProt for i32 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String>
    where
        Self: Sized,
    {
        stream
            .read_i32()
            .await
            .map_err(|x| format!("IO error: {:?}", x))
    }
}

#[async_trait]
impl WriteProt for i32 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        stream
            .write_all(&self.to_be_bytes())
            .await
            .map_err(|x| format!("IO error: {:?}", x))
    }
}

impl SizedProt for i32 {
    fn prot_size(&self) -> usize {
        4
    }
}

#[async_trait]
impl WriteProt for i16 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        stream
            .write_i16(*self)
            .await
            .map_err(|x| format!("IO error: {:?}", x))
    }
}

impl SizedProt for i16 {
    fn prot_size(&self) -> usize {
        2
    }
}

#[async_trait]
impl ReadProt for u8 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String>
    where
        Self: Sized,
    {
        stream
            .read_u8()
            .await
            .map_err(|x| format!("IO error: {:?}", x))
    }
}

#[async_trait]
impl WriteProt for u8 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        stream
            .write_all(&[*self])
            .await
            .map_err(|x| format!("IO error: {:?}", x))
    }
}

impl SizedProt for u8 {
    fn prot_size(&self) -> usize {
        1
    }
}

#[async_trait]
impl ReadProt for bool {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String>
    where
        Self: Sized,
    {
        Ok(u8::read(stream).await? == 0x01)
    }
}

#[async_trait]
impl WriteProt for bool {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        u8::write(&if *self { 0x01 } else { 0x00 }, stream).await
    }
}

impl SizedProt for bool {
    fn prot_size(&self) -> usize {
        1
    }
}

#[async_trait]
impl ReadProt for i64 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String>
    where
        Self: Sized,
    {
        stream
            .read_i64()
            .await
            .map_err(|x| format!("IO error: {:?}", x))
    }
}

#[async_trait]
impl WriteProt for i64 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        stream
            .write_all(&self.to_be_bytes())
            .await
            .map_err(|x| format!("IO error: {:?}", x))
    }
}

impl SizedProt for i64 {
    fn prot_size(&self) -> usize {
        8
    }
}

#[async_trait]
impl WriteProt for u64 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        stream
            .write_all(&self.to_be_bytes())
            .await
            .map_err(|x| format!("IO error: {:?}", x))
    }
}

impl SizedProt for u64 {
    fn prot_size(&self) -> usize {
        8
    }
}

#[async_trait]
impl ReadProt for f32 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String>
    where
        Self: Sized,
    {
        stream
            .read_f32()
            .await
            .map_err(|x| format!("IO error: {:?}", x))
    }
}

impl SizedProt for f32 {
    fn prot_size(&self) -> usize {
        4
    }
}

#[async_trait]
impl ReadProt for f64 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String>
    where
        Self: Sized,
    {
        stream
            .read_f64()
            .await
            .map_err(|x| format!("IO error: {:?}", x))
    }
}

impl SizedProt for f64 {
    fn prot_size(&self) -> usize {
        8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SizedVec<T>
where
    T: Send + Sync,
{
    pub(crate) vec: Vec<T>,
}

impl<T> From<Vec<T>> for SizedVec<T>
where
    T: Send + Sync,
{
    fn from(value: Vec<T>) -> Self {
        Self { vec: value }
    }
}

#[async_trait]
impl<T> WriteProt for SizedVec<T>
where
    T: WriteProt + Sync + Send,
{
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        VarInt::from(self.vec.len()).write(stream).await?;
        for item in &self.vec {
            item.write(stream).await?;
        }
        Ok(())
    }
}

impl<T> SizedProt for SizedVec<T>
where
    T: SizedProt + Send + Sync,
{
    fn prot_size(&self) -> usize {
        VarInt::from(self.vec.len()).prot_size()
            + self.vec.iter().map(|x| x.prot_size()).sum::<usize>()
    }
}
