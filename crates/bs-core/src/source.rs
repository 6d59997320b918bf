//! Read-only view of the loaded file.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::bit_width::BitWidth;

/// The loaded file as raw bytes, readable as 8-bit or 16-bit words.
///
/// 16-bit words are little-endian byte pairs; a trailing odd byte has no
/// 16-bit word. Cloning shares the underlying buffer.
#[derive(Clone, Debug, Default)]
pub struct ByteSource {
    bytes: Arc<[u8]>,
}

impl ByteSource {
    /// Wrap raw file contents.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Build a source from 16-bit words (little-endian on the way in).
    pub fn from_words(words: &[u16]) -> Self {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        Self::new(bytes)
    }

    /// A source with no data. Never playable.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether there is anything to play.
    pub fn is_loaded(&self) -> bool {
        !self.bytes.is_empty()
    }

    /// Number of words in the given view.
    pub fn len(&self, width: BitWidth) -> usize {
        self.bytes.len() / width.bytes()
    }

    /// Read one word, or `None` past the end of the view.
    pub fn word(&self, index: usize, width: BitWidth) -> Option<u16> {
        match width {
            BitWidth::Eight => self.bytes.get(index).map(|&b| b as u16),
            BitWidth::Sixteen => {
                let at = index.checked_mul(2)?;
                let pair = self.bytes.get(at..at + 2)?;
                Some(u16::from_le_bytes([pair[0], pair[1]]))
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}
