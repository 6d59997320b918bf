//! Splitting the fragment into look-ahead blocks.
//!
//! Host timers degrade with very large numbers of outstanding events, so
//! only one block's worth of commands is scheduled at a time.

use bs_core::BitWidth;

/// Largest block any bit width uses.
pub const MAX_BLOCK_SIZE: usize = 500;

/// Error type for block planning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanError {
    /// The block would start after the last word of the fragment.
    PastFragmentEnd { start: usize, fragment_to: usize },
}

impl core::fmt::Display for PlanError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PlanError::PastFragmentEnd { start, fragment_to } => write!(
                f,
                "block start {} is past fragment end {}",
                start, fragment_to
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PlanError {}

/// Words per block for a bit width.
pub const fn block_size(width: BitWidth) -> usize {
    match width {
        BitWidth::Eight => MAX_BLOCK_SIZE,
        BitWidth::Sixteen => MAX_BLOCK_SIZE / 2,
    }
}

/// Last index of the block starting at `start`, truncated at `fragment_to`.
///
/// Callers check for the end of the fragment first; a start past it is an error.
pub fn next_block_end(start: usize, fragment_to: usize, width: BitWidth) -> Result<usize, PlanError> {
    if start > fragment_to {
        return Err(PlanError::PastFragmentEnd { start, fragment_to });
    }
    Ok(start.saturating_add(block_size(width) - 1).min(fragment_to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_sizes_per_width() {
        assert_eq!(block_size(BitWidth::Eight), 500);
        assert_eq!(block_size(BitWidth::Sixteen), 250);
    }

    #[test]
    fn full_block_when_room() {
        assert_eq!(next_block_end(0, 999, BitWidth::Eight), Ok(499));
        assert_eq!(next_block_end(500, 999, BitWidth::Eight), Ok(999));
        assert_eq!(next_block_end(10, 999, BitWidth::Sixteen), Ok(259));
    }

    #[test]
    fn truncated_at_fragment_end() {
        assert_eq!(next_block_end(900, 999, BitWidth::Eight), Ok(999));
        assert_eq!(next_block_end(999, 999, BitWidth::Eight), Ok(999));
    }

    #[test]
    fn never_exceeds_fragment_and_covers_block_size() {
        for width in [BitWidth::Eight, BitWidth::Sixteen] {
            for fragment_to in [0usize, 1, 249, 250, 499, 500, 1234] {
                let mut start = 0;
                while start <= fragment_to {
                    let end = next_block_end(start, fragment_to, width).unwrap();
                    assert!(end <= fragment_to);
                    if end < fragment_to {
                        assert_eq!(end - start + 1, block_size(width));
                    }
                    start = end + 1;
                }
            }
        }
    }

    #[test]
    fn start_past_end_is_error() {
        assert_eq!(
            next_block_end(1000, 999, BitWidth::Eight),
            Err(PlanError::PastFragmentEnd { start: 1000, fragment_to: 999 })
        );
    }
}
