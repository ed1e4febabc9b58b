//! Interfaces of the precompiled code the engines drive.
//!
//! A unit never owns audio memory: every call names the instance by the
//! byte offset of its state region and passes pointer tables by offset.

use crate::arena::{Arena, WORD};
use crate::error::ArenaError;

/// A compiled DSP unit. One unit value serves every instance laid out in
/// the arena (all voices of a poly engine share it).
pub trait DspUnit: Send {
    fn num_inputs(&self) -> usize;
    fn num_outputs(&self) -> usize;

    /// Initialize the instance at `dsp` for `sample_rate`.
    fn init(&mut self, arena: &mut Arena, dsp: usize, sample_rate: f32);

    /// Reset the instance's internal state (delay lines, envelopes) without
    /// touching its controls' declared defaults.
    fn instance_clear(&mut self, arena: &mut Arena, dsp: usize);

    /// Compute `count` frames. `inputs` and `outputs` are byte offsets of
    /// pointer tables; they may be the same table for in-place processing.
    fn compute(
        &mut self,
        arena: &mut Arena,
        dsp: usize,
        count: usize,
        inputs: usize,
        outputs: usize,
    );

    fn set_param_value(&mut self, arena: &mut Arena, dsp: usize, index: u32, value: f32);
    fn get_param_value(&self, arena: &Arena, dsp: usize, index: u32) -> f32;
}

/// Sums voice buffers into the shared output of a poly engine.
pub trait Mixer: Send {
    /// Zero `channels` output channels of `count` frames.
    fn clear_output(&mut self, arena: &mut Arena, count: usize, channels: usize, outputs: usize);

    /// Add the `mixing` channels into the `outputs` channels.
    fn mix_voice(
        &mut self,
        arena: &mut Arena,
        count: usize,
        channels: usize,
        mixing: usize,
        outputs: usize,
    );
}

/// Read the sample offset stored in slot `channel` of the pointer table at `table`.
pub fn channel_offset(arena: &Arena, table: usize, channel: usize) -> Result<usize, ArenaError> {
    arena.get_u32(table + channel * WORD).map(|ptr| ptr as usize)
}

/// Plain additive mixer, used when the host does not supply a compiled one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SumMixer;

impl SumMixer {
    fn try_clear(
        arena: &mut Arena,
        count: usize,
        channels: usize,
        outputs: usize,
    ) -> Result<(), ArenaError> {
        for ch in 0..channels {
            let dst = channel_offset(arena, outputs, ch)?;
            arena.fill(dst, count, 0.0)?;
        }
        Ok(())
    }

    fn try_mix(
        arena: &mut Arena,
        count: usize,
        channels: usize,
        mixing: usize,
        outputs: usize,
    ) -> Result<(), ArenaError> {
        for ch in 0..channels {
            let src = channel_offset(arena, mixing, ch)?;
            let dst = channel_offset(arena, outputs, ch)?;
            arena.accumulate(src, dst, count)?;
        }
        Ok(())
    }
}

impl Mixer for SumMixer {
    fn clear_output(&mut self, arena: &mut Arena, count: usize, channels: usize, outputs: usize) {
        if let Err(e) = Self::try_clear(arena, count, channels, outputs) {
            log::error!("mixer clear failed: {e}");
        }
    }

    fn mix_voice(
        &mut self,
        arena: &mut Arena,
        count: usize,
        channels: usize,
        mixing: usize,
        outputs: usize,
    ) {
        if let Err(e) = Self::try_mix(arena, count, channels, mixing, outputs) {
            log::error!("mixer accumulate failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::MemoryLayout;

    #[test]
    fn sum_mixer_clears_then_accumulates() {
        let layout = MemoryLayout::poly(8, 2, None, 0, 2, 4).unwrap();
        let mut arena = Arena::new(layout.total_size);
        layout.install(&mut arena).unwrap();
        let mixing = layout.mixing.unwrap();

        arena.fill(layout.outputs.channel(0, 4), 4, 9.0).unwrap();
        arena.fill(mixing.channel(0, 4), 4, 0.5).unwrap();
        arena.fill(mixing.channel(1, 4), 4, -0.25).unwrap();

        let mut mixer = SumMixer;
        mixer.clear_output(&mut arena, 4, 2, layout.outputs.table);
        mixer.mix_voice(&mut arena, 4, 2, mixing.table, layout.outputs.table);
        mixer.mix_voice(&mut arena, 4, 2, mixing.table, layout.outputs.table);

        assert_eq!(arena.channel(layout.outputs.channel(0, 4), 4).unwrap(), &[1.0; 4]);
        assert_eq!(arena.channel(layout.outputs.channel(1, 4), 4).unwrap(), &[-0.5; 4]);
    }
}
