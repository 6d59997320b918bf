//! Source word width.

/// Width of one source word. Each width has its own coefficient pair and
/// block size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitWidth {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "8"))]
    Eight,
    #[cfg_attr(feature = "serde", serde(rename = "16"))]
    Sixteen,
}

impl BitWidth {
    /// Largest raw word value for this width.
    pub const fn max_value(self) -> u32 {
        match self {
            BitWidth::Eight => u8::MAX as u32,
            BitWidth::Sixteen => u16::MAX as u32,
        }
    }

    /// Number of bytes per word.
    pub const fn bytes(self) -> usize {
        match self {
            BitWidth::Eight => 1,
            BitWidth::Sixteen => 2,
        }
    }

    pub const fn bits(self) -> u8 {
        match self {
            BitWidth::Eight => 8,
            BitWidth::Sixteen => 16,
        }
    }
}
