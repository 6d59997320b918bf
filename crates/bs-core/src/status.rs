//! Playback status published to observers.

/// Inclusive range of word indices planned together.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockRange {
    pub start: usize,
    pub end: usize,
}

impl BlockRange {
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Where playback is. Mutated only by the playback controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub playing: bool,
    /// The block currently planned.
    pub block: BlockRange,
    /// Commands of `block` already played.
    pub offset_in_block: usize,
    pub block_id: u64,
    /// Completed passes over the fragment while looping.
    pub iteration: u64,
}

impl PlaybackStatus {
    /// Absolute index of the next word to play.
    pub fn position(&self) -> usize {
        self.block.start + self.offset_in_block
    }
}
