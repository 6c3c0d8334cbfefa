use crate::error::{CodecError, Result};
use crate::partition::Shape3D;
use crate::plane::Volume;

/// Sequential cursor over an immutable byte buffer.
///
/// Both decoders consume their code and metadata streams through this; a
/// read past the end means the file was truncated mid-block.
pub struct ByteCursor {
    data: Vec<u8>,
    position: usize,
}

impl ByteCursor {
    pub fn new(data: Vec<u8>) -> ByteCursor {
        ByteCursor { data, position: 0 }
    }

    /// Next byte, advancing by one.
    pub fn get(&mut self) -> Result<u8> {
        let byte = *self.data.get(self.position).ok_or(CodecError::TruncatedInput)?;
        self.position += 1;
        Ok(byte)
    }

    /// Next `shape.count()` bytes reshaped to `shape`, advancing past them.
    ///
    /// The reshape is row-major over (rows, cols, frames), the same layout
    /// the encoder used to flatten the kept samples.
    pub fn get_many(&mut self, shape: Shape3D) -> Result<Volume> {
        let count = shape.count();
        if self.position + count > self.data.len() {
            return Err(CodecError::TruncatedInput);
        }
        let bytes = self.data[self.position..self.position + count].to_vec();
        self.position += count;
        Ok(Volume::from_vec(bytes, shape))
    }

    /// Whether the cursor is strictly before the end of the buffer.
    pub fn has_next(&self) -> bool {
        self.position < self.data.len()
    }
}
