use async_nbt::io::Flavor;
use async_nbt::NbtCompound;
use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::protocol_types::primitives::SizedVec;
use crate::protocol_types::traits::{SizedProt, WriteProt};

// Network NBT in this protocol version still carries an (empty) root name.
const ROOT_NAME: &str = "";

#[async_trait]
impl WriteProt for NbtCompound {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        async_nbt::io::write_nbt(stream, Some(ROOT_NAME), self, Flavor::Uncompressed)
            .await
            .map_err(|x| format!("NBT error: {:?}", x))?;
        Ok(())
    }
}

impl SizedProt for NbtCompound {
    fn prot_size(&self) -> usize {
        async_nbt::io::size(self, Flavor::Uncompressed, Some(ROOT_NAME)).unwrap_or(0)
    }
}

/// A length-prefixed array of longs, used for the light masks of a chunk.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BitSet(pub(crate) SizedVec<i64>);

impl BitSet {
    pub(crate) fn from_words(words: &[u64]) -> Self {
        BitSet(words.iter().map(|w| *w as i64).collect::<Vec<_>>().into())
    }

    pub(crate) fn is_set(&self, bit: usize) -> bool {
        self.0
            .vec
            .get(bit / 64)
            .is_some_and(|word| (*word as u64 >> (bit % 64)) & 1 == 1)
    }
}

#[async_trait]
impl WriteProt for BitSet {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        self.0.write(stream).await
    }
}

impl SizedProt for BitSet {
    fn prot_size(&self) -> usize {
        self.0.prot_size()
    }
}

#[cfg(test)]
mod test {
    use super::BitSet;
    use crate::protocol_types::traits::{SizedProt, WriteProt};

    #[tokio::test]
    async fn bitset_writes_big_endian_longs() -> Result<(), String> {
        let set = BitSet::from_words(&[0b101]);
        assert!(set.is_set(0));
        assert!(!set.is_set(1));
        assert!(set.is_set(2));
        assert!(!set.is_set(64));
        let mut buf = vec![];
        set.write(&mut buf).await?;
        assert_eq!(buf, vec![1, 0, 0, 0, 0, 0, 0, 0, 5]);
        assert_eq!(set.prot_size(), 9);
        Ok(())
    }
}
