pub(crate) mod column;
pub(crate) mod generator;
pub(crate) mod light;
pub(crate) mod packed_array;
pub(crate) mod palette;
pub(crate) mod persist;
pub(crate) mod section;

pub(crate) type BlockState = u32;

pub(crate) const AIR: BlockState = 0;
pub(crate) const STONE: BlockState = 1;
pub(crate) const BEDROCK: BlockState = 7;
pub(crate) const DEFAULT_BIOME: u32 = 0;

/// Global palette width for block states.
pub(crate) const BLOCK_BITS: u8 = 15;
pub(crate) const BIOME_BITS: u8 = 6;
pub(crate) const LIGHT_BITS: u8 = 4;
pub(crate) const MAX_LIGHT: u8 = 15;

pub(crate) const SECTION_EDGE: i32 = 16;
pub(crate) const BIOME_EDGE: i32 = 4;
pub(crate) const SECTION_BLOCKS: usize = 4096;
pub(crate) const SECTION_BIOMES: usize = 64;

pub(crate) const DEFAULT_MIN_Y: i32 = -64;
pub(crate) const DEFAULT_WORLD_HEIGHT: i32 = 384;

/// A block position. Inside a [`column::Chunk`] x and z are column-local (0..16) and y is
/// absolute; inside a section container all three are container-local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Position {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) z: i32,
}

impl Position {
    pub(crate) fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub(crate) fn neighbors(&self) -> [Position; 6] {
        [
            Position::new(self.x + 1, self.y, self.z),
            Position::new(self.x - 1, self.y, self.z),
            Position::new(self.x, self.y + 1, self.z),
            Position::new(self.x, self.y - 1, self.z),
            Position::new(self.x, self.y, self.z + 1),
            Position::new(self.x, self.y, self.z - 1),
        ]
    }
}
