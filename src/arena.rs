//! Arena: the flat memory region shared by the engine and the compiled units.
//!
//! Units address the arena by byte offset. Storage is one `f32` per 4-byte
//! word; pointer slots keep their `u32` value in the word's bit pattern, so
//! sample channels are plain slices. All accessors are bounds checked.

use crate::error::ArenaError;

/// Size in bytes of one sample and of one pointer-table slot.
pub const WORD: usize = 4;

/// Round `bytes` up to the next multiple of [`WORD`].
pub const fn align_word(bytes: usize) -> usize {
    bytes.div_ceil(WORD) * WORD
}

#[derive(Debug, Clone)]
pub struct Arena {
    words: Box<[f32]>,
}

impl Arena {
    /// Allocate a zeroed arena of at least `bytes` bytes (rounded up to a word).
    pub fn new(bytes: usize) -> Self {
        Arena {
            words: vec![0.0f32; align_word(bytes) / WORD].into_boxed_slice(),
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.words.len() * WORD
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word range covering `count` words starting at byte `offset`.
    fn span(&self, offset: usize, count: usize) -> Result<std::ops::Range<usize>, ArenaError> {
        if offset % WORD != 0 {
            return Err(ArenaError::Misaligned { offset });
        }
        let start = offset / WORD;
        let end = start.checked_add(count).filter(|&end| end <= self.words.len());
        match end {
            Some(end) => Ok(start..end),
            None => Err(ArenaError::OutOfBounds {
                offset,
                len: count.saturating_mul(WORD),
                size: self.len(),
            }),
        }
    }

    pub fn get_u32(&self, offset: usize) -> Result<u32, ArenaError> {
        let r = self.span(offset, 1)?;
        Ok(self.words[r.start].to_bits())
    }

    pub fn set_u32(&mut self, offset: usize, value: u32) -> Result<(), ArenaError> {
        let r = self.span(offset, 1)?;
        self.words[r.start] = f32::from_bits(value);
        Ok(())
    }

    pub fn get_f32(&self, offset: usize) -> Result<f32, ArenaError> {
        let r = self.span(offset, 1)?;
        Ok(self.words[r.start])
    }

    pub fn set_f32(&mut self, offset: usize, value: f32) -> Result<(), ArenaError> {
        let r = self.span(offset, 1)?;
        self.words[r.start] = value;
        Ok(())
    }

    /// View `count` samples starting at byte `offset`.
    pub fn channel(&self, offset: usize, count: usize) -> Result<&[f32], ArenaError> {
        let r = self.span(offset, count)?;
        Ok(&self.words[r])
    }

    /// Mutable view of `count` samples starting at byte `offset`.
    pub fn channel_mut(&mut self, offset: usize, count: usize) -> Result<&mut [f32], ArenaError> {
        let r = self.span(offset, count)?;
        Ok(&mut self.words[r])
    }

    /// Fill `count` samples at `offset` with `value`.
    pub fn fill(&mut self, offset: usize, count: usize, value: f32) -> Result<(), ArenaError> {
        self.channel_mut(offset, count)?.fill(value);
        Ok(())
    }

    /// Zero `bytes` bytes (rounded up to a word) starting at `offset`.
    pub fn zero(&mut self, offset: usize, bytes: usize) -> Result<(), ArenaError> {
        let r = self.span(offset, align_word(bytes) / WORD)?;
        self.words[r].fill(0.0);
        Ok(())
    }

    /// Add `count` samples at `src` into the samples at `dst`.
    ///
    /// The two regions may not partially overlap; identical regions double
    /// the signal.
    pub fn accumulate(&mut self, src: usize, dst: usize, count: usize) -> Result<(), ArenaError> {
        let s = self.span(src, count)?;
        let d = self.span(dst, count)?;
        for (si, di) in s.zip(d) {
            self.words[di] += self.words[si];
        }
        Ok(())
    }
}
