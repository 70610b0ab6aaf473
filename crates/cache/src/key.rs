//! Keys for cached render resources.
//!
//! A key encodes to a one-byte kind tag followed by its fields in
//! little-endian order, so keys of different kinds never collide.

use smallvec::SmallVec;

/// Encoded key bytes. Every key fits inline.
pub type KeyBytes = SmallVec<[u8; 24]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    /// A rasterized glyph.
    Glyph { font_id: u32, code_point: u32, size: u16 },
    /// A texture derived from the pixels of a draw buffer.
    Texture { buffer_id: usize },
    /// A rounded-rectangle coverage mask.
    Mask { width: i32, height: i32, radius: i32 },
    /// A blurred rounded-rectangle shadow mask.
    Shadow { width: i32, height: i32, radius: i32, blur: i32 },
}

impl ResourceKey {
    pub fn kind_tag(&self) -> u8 {
        match self {
            ResourceKey::Glyph { .. } => 1,
            ResourceKey::Texture { .. } => 2,
            ResourceKey::Mask { .. } => 3,
            ResourceKey::Shadow { .. } => 4,
        }
    }

    pub fn to_bytes(&self) -> KeyBytes {
        let mut out = KeyBytes::new();
        out.push(self.kind_tag());

        match *self {
            ResourceKey::Glyph { font_id, code_point, size } => {
                out.extend_from_slice(&font_id.to_le_bytes());
                out.extend_from_slice(&code_point.to_le_bytes());
                out.extend_from_slice(&size.to_le_bytes());
            }
            ResourceKey::Texture { buffer_id } => {
                out.extend_from_slice(&(buffer_id as u64).to_le_bytes());
            }
            ResourceKey::Mask { width, height, radius } => {
                for v in [width, height, radius] {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            ResourceKey::Shadow { width, height, radius, blur } => {
                for v in [width, height, radius, blur] {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
        }

        out
    }
}
