//! In-memory representation of emitted machine code.

/// Offset in bytes from the beginning of the code.
pub type CodeOffset = u32;

/// A growable buffer of little-endian machine code.
#[derive(Debug, Default, Clone)]
pub struct CodeBuffer {
    data: Vec<u8>,
}

impl CodeBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset from start of buffer.
    pub fn cur_offset(&self) -> CodeOffset {
        self.data.len() as CodeOffset
    }

    /// Add 4 bytes.
    pub fn put4(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Consumes the buffer, returning the code.
    pub fn finish(self) -> Vec<u8> {
        self.data
    }

    /// Renders the code as upper-case hex, byte by byte.
    pub fn stringify_code_bytes(&self) -> String {
        use std::fmt::Write;
        let mut s = String::with_capacity(self.data.len() * 2);
        for b in &self.data {
            let _ = write!(&mut s, "{b:02X}");
        }
        s
    }
}
