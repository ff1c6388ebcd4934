//! Color palettes and usage-frequency reordering.

use std::collections::HashMap;

use crate::color::{pack, PixelBuffer, Rgba};
use crate::error::{Error, Result};

/// Maximum palette entries for an 8-bit indexed PNG.
pub const MAX_PALETTE_LEN: usize = 256;

/// Ordered palette; the order is the index space of the encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<Rgba>,
}

impl Palette {
    /// Wrap palette entries. Must contain 1-256 colors.
    pub fn new(entries: Vec<Rgba>) -> Result<Self> {
        if entries.is_empty() || entries.len() > MAX_PALETTE_LEN {
            return Err(Error::InvalidPaletteLength { len: entries.len() });
        }
        Ok(Self { entries })
    }

    /// Palette entries in index order.
    #[inline]
    pub fn entries(&self) -> &[Rgba] {
        &self.entries
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; a palette holds at least one entry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any entry is not fully opaque.
    pub fn has_transparency(&self) -> bool {
        self.entries.iter().any(|c| c[3] < 255)
    }

    /// Map from packed color to the first index holding it.
    pub fn index_map(&self) -> HashMap<u32, u8> {
        let mut map = HashMap::with_capacity(self.entries.len());
        for (i, &c) in self.entries.iter().enumerate() {
            map.entry(pack(c)).or_insert(i as u8);
        }
        map
    }

    /// Reorder entries by descending pixel count in `image`.
    ///
    /// Ties (including unused entries) keep their original relative order.
    pub fn sorted_by_frequency(&self, image: &PixelBuffer) -> Palette {
        let mut counts: HashMap<u32, u64> = HashMap::with_capacity(self.entries.len());
        for p in image.pixels() {
            *counts.entry(pack(p)).or_insert(0) += 1;
        }

        let mut entries = self.entries.clone();
        // sort_by_key is stable.
        entries.sort_by_key(|c| std::cmp::Reverse(counts.get(&pack(*c)).copied().unwrap_or(0)));
        Palette { entries }
    }
}

/// Remove duplicate entries, keeping first occurrences.
pub(crate) fn dedup_entries(entries: &mut Vec<Rgba>) {
    let mut seen = std::collections::HashSet::with_capacity(entries.len());
    entries.retain(|c| seen.insert(pack(*c)));
}
