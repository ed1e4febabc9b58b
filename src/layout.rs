//! Memory layout planner: where every instance, pointer table and sample
//! buffer lives inside the arena.
//!
//! Mono layout:
//!
//! ```text
//! [state][in ptrs][out ptrs][in samples][out samples]
//! ```
//!
//! Poly layout:
//!
//! ```text
//! [voice 0]..[voice N-1][effect][in ptrs][out ptrs][mix ptrs]
//!     [in samples][out samples][mix samples]
//! ```

use serde::Serialize;

use crate::arena::{Arena, WORD};
use crate::error::EngineError;

/// A pointer table plus the sample storage its slots point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelTable {
    /// Byte offset of the pointer table.
    pub table: usize,
    /// Byte offset of channel 0's samples; channels follow back to back.
    pub samples: usize,
    pub channels: usize,
}

impl ChannelTable {
    /// Byte offset of the pointer slot for `channel`.
    pub fn slot(&self, channel: usize) -> usize {
        self.table + channel * WORD
    }

    /// Byte offset of `channel`'s samples for blocks of `block_size`.
    pub fn channel(&self, channel: usize, block_size: usize) -> usize {
        self.samples + channel * block_size * WORD
    }
}

/// A named byte range, for inspection and overlap checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub name: String,
    pub start: usize,
    pub len: usize,
}

impl Region {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.len > 0 && other.len > 0 && self.start < other.end() && other.start < self.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryLayout {
    pub block_size: usize,
    /// Bytes per voice (or mono instance) state, word aligned.
    pub state_size: usize,
    /// Number of unit instances sharing `state_size` (1 for mono).
    pub voices: usize,
    /// Effect instance offset and word-aligned size.
    pub effect: Option<(usize, usize)>,
    pub inputs: ChannelTable,
    pub outputs: ChannelTable,
    /// Per-voice accumulation buffers (poly only).
    pub mixing: Option<ChannelTable>,
    /// Bytes the arena must provide.
    pub total_size: usize,
}

/// Running byte offset over one layout; every step fails instead of wrapping.
struct Cursor(usize);

impl Cursor {
    /// Reserve `count` items of `size` bytes; returns the start offset.
    fn take(&mut self, count: usize, size: usize) -> Result<usize, EngineError> {
        let start = self.0;
        self.0 = count
            .checked_mul(size)
            .and_then(|bytes| start.checked_add(bytes))
            .ok_or_else(overflow)?;
        Ok(start)
    }

    /// Final size; offsets must fit a 4-byte pointer slot.
    fn finish(self) -> Result<usize, EngineError> {
        if self.0 > u32::MAX as usize {
            return Err(EngineError::LayoutOverflow { required: self.0 });
        }
        Ok(self.0)
    }
}

fn overflow() -> EngineError {
    EngineError::LayoutOverflow { required: usize::MAX }
}

fn aligned(bytes: usize) -> Result<usize, EngineError> {
    bytes.checked_next_multiple_of(WORD).ok_or_else(overflow)
}

impl MemoryLayout {
    pub fn mono(
        state_size: usize,
        num_inputs: usize,
        num_outputs: usize,
        block_size: usize,
    ) -> Result<Self, EngineError> {
        let state_size = aligned(state_size)?;
        let block_bytes = block_size.checked_mul(WORD).ok_or_else(overflow)?;

        let mut at = Cursor(0);
        at.take(1, state_size)?;
        let in_table = at.take(num_inputs, WORD)?;
        let out_table = at.take(num_outputs, WORD)?;
        let in_samples = at.take(num_inputs, block_bytes)?;
        let out_samples = at.take(num_outputs, block_bytes)?;
        let total_size = at.finish()?;

        Ok(MemoryLayout {
            block_size,
            state_size,
            voices: 1,
            effect: None,
            inputs: ChannelTable { table: in_table, samples: in_samples, channels: num_inputs },
            outputs: ChannelTable { table: out_table, samples: out_samples, channels: num_outputs },
            mixing: None,
            total_size,
        })
    }

    pub fn poly(
        voice_state_size: usize,
        voices: usize,
        effect_state_size: Option<usize>,
        num_inputs: usize,
        num_outputs: usize,
        block_size: usize,
    ) -> Result<Self, EngineError> {
        let state_size = aligned(voice_state_size)?;
        let block_bytes = block_size.checked_mul(WORD).ok_or_else(overflow)?;

        let mut at = Cursor(0);
        at.take(voices, state_size)?;
        let effect = match effect_state_size {
            Some(size) => {
                let size = aligned(size)?;
                Some((at.take(1, size)?, size))
            }
            None => None,
        };

        let in_table = at.take(num_inputs, WORD)?;
        let out_table = at.take(num_outputs, WORD)?;
        let mix_table = at.take(num_outputs, WORD)?;
        let in_samples = at.take(num_inputs, block_bytes)?;
        let out_samples = at.take(num_outputs, block_bytes)?;
        let mix_samples = at.take(num_outputs, block_bytes)?;
        let total_size = at.finish()?;

        Ok(MemoryLayout {
            block_size,
            state_size,
            voices,
            effect,
            inputs: ChannelTable { table: in_table, samples: in_samples, channels: num_inputs },
            outputs: ChannelTable { table: out_table, samples: out_samples, channels: num_outputs },
            mixing: Some(ChannelTable {
                table: mix_table,
                samples: mix_samples,
                channels: num_outputs,
            }),
            total_size,
        })
    }

    /// State offset of voice `index` (the mono instance is voice 0).
    pub fn voice_offset(&self, index: usize) -> usize {
        self.state_size * index
    }

    pub fn effect_offset(&self) -> Option<usize> {
        self.effect.map(|(offset, _)| offset)
    }

    fn tables(&self) -> impl Iterator<Item = (&'static str, &ChannelTable)> {
        [("inputs", &self.inputs), ("outputs", &self.outputs)]
            .into_iter()
            .chain(self.mixing.as_ref().map(|m| ("mixing", m)))
    }

    /// Every region of the layout, in arena order within each kind.
    pub fn regions(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = (0..self.voices)
            .map(|v| Region {
                name: format!("voice {v}"),
                start: self.voice_offset(v),
                len: self.state_size,
            })
            .collect();
        if let Some((start, len)) = self.effect {
            regions.push(Region { name: "effect".to_string(), start, len });
        }
        for (name, table) in self.tables() {
            regions.push(Region {
                name: format!("{name} table"),
                start: table.table,
                len: table.channels * WORD,
            });
            regions.push(Region {
                name: format!("{name} samples"),
                start: table.samples,
                len: table.channels * self.block_size * WORD,
            });
        }
        regions
    }

    /// Check that `arena` can hold the layout and write every pointer slot.
    pub fn install(&self, arena: &mut Arena) -> Result<(), EngineError> {
        if self.total_size > u32::MAX as usize {
            return Err(EngineError::LayoutOverflow { required: self.total_size });
        }
        if arena.len() < self.total_size {
            return Err(EngineError::ArenaTooSmall {
                required: self.total_size,
                available: arena.len(),
            });
        }
        for (_, table) in self.tables() {
            for ch in 0..table.channels {
                arena.set_u32(table.slot(ch), table.channel(ch, self.block_size) as u32)?;
            }
        }
        self.log();
        Ok(())
    }

    fn log(&self) {
        log::debug!(
            "memory layout: block_size={} state_size={} voices={}",
            self.block_size,
            self.state_size,
            self.voices
        );
        for region in self.regions() {
            log::debug!("  {:<16} {:>8}..{:<8}", region.name, region.start, region.end());
        }
        log::debug!("  total {} bytes", self.total_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint(layout: &MemoryLayout) {
        let regions = layout.regions();
        for (i, a) in regions.iter().enumerate() {
            assert_eq!(a.start % WORD, 0, "{} misaligned", a.name);
            assert!(a.end() <= layout.total_size, "{} past end", a.name);
            for b in &regions[i + 1..] {
                assert!(!a.overlaps(b), "{} overlaps {}", a.name, b.name);
            }
        }
    }

    fn assert_slots(layout: &MemoryLayout, arena: &Arena, table: &ChannelTable) {
        for ch in 0..table.channels {
            assert_eq!(
                arena.get_u32(table.slot(ch)).unwrap() as usize,
                table.channel(ch, layout.block_size)
            );
        }
    }

    #[test]
    fn mono_offsets() {
        let l = MemoryLayout::mono(100, 2, 3, 64).unwrap();
        assert_eq!(l.inputs.table, 100);
        assert_eq!(l.outputs.table, 108);
        assert_eq!(l.inputs.samples, 120);
        assert_eq!(l.outputs.samples, 120 + 2 * 64 * 4);
        assert_eq!(l.total_size, 120 + 5 * 64 * 4);
        assert_disjoint(&l);
    }

    #[test]
    fn mono_rounds_state_to_word() {
        let l = MemoryLayout::mono(13, 1, 1, 8).unwrap();
        assert_eq!(l.state_size, 16);
        assert_eq!(l.inputs.table, 16);
        assert_disjoint(&l);
    }

    #[test]
    fn poly_offsets() {
        let l = MemoryLayout::poly(40, 4, Some(24), 1, 2, 32).unwrap();
        assert_eq!(l.voice_offset(3), 120);
        assert_eq!(l.effect_offset(), Some(160));
        assert_eq!(l.inputs.table, 184);
        assert_eq!(l.outputs.table, 188);
        let mixing = l.mixing.unwrap();
        assert_eq!(mixing.table, 196);
        assert_eq!(l.inputs.samples, 204);
        assert_eq!(l.outputs.samples, 204 + 32 * 4);
        assert_eq!(mixing.samples, 204 + 3 * 32 * 4);
        assert_eq!(l.total_size, 204 + 5 * 32 * 4);
        assert_disjoint(&l);
    }

    #[test]
    fn poly_without_effect_starts_audio_after_voices() {
        let l = MemoryLayout::poly(40, 2, None, 0, 1, 16).unwrap();
        assert_eq!(l.effect_offset(), None);
        assert_eq!(l.inputs.table, 80);
        assert_eq!(l.outputs.table, 80);
        assert_disjoint(&l);
    }

    #[test]
    fn install_writes_pointer_slots() {
        let l = MemoryLayout::poly(40, 3, Some(8), 2, 2, 16).unwrap();
        let mut arena = Arena::new(l.total_size);
        l.install(&mut arena).unwrap();
        assert_slots(&l, &arena, &l.inputs);
        assert_slots(&l, &arena, &l.outputs);
        assert_slots(&l, &arena, &l.mixing.unwrap());
    }

    #[test]
    fn install_rejects_small_arena() {
        let l = MemoryLayout::mono(64, 1, 1, 128).unwrap();
        let mut arena = Arena::new(l.total_size - 4);
        match l.install(&mut arena) {
            Err(EngineError::ArenaTooSmall { required, available }) => {
                assert_eq!(required, l.total_size);
                assert_eq!(available, l.total_size - 4);
            }
            other => panic!("expected ArenaTooSmall, got {other:?}"),
        }
    }

    #[test]
    fn huge_sizes_are_rejected_not_wrapped() {
        assert!(matches!(
            MemoryLayout::mono(16, 1, 1, usize::MAX / 2),
            Err(EngineError::LayoutOverflow { .. })
        ));
        assert!(matches!(
            MemoryLayout::poly(usize::MAX / 2, 4, None, 0, 1, 8),
            Err(EngineError::LayoutOverflow { .. })
        ));
        assert!(matches!(
            MemoryLayout::poly(16, 2, Some(usize::MAX), 0, 1, 8),
            Err(EngineError::LayoutOverflow { .. })
        ));
        assert!(matches!(
            MemoryLayout::mono(usize::MAX, 0, 1, 8),
            Err(EngineError::LayoutOverflow { .. })
        ));
    }

    #[test]
    fn layouts_past_the_pointer_range_are_rejected() {
        // 2 channels of 2^30 frames need 2^33 bytes of samples
        assert!(matches!(
            MemoryLayout::mono(16, 1, 1, 1 << 30),
            Err(EngineError::LayoutOverflow { .. })
        ));
    }
}
