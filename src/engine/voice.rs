//! Voice: one instance of the voice unit inside a poly engine.

use std::sync::Arc;

use crate::arena::Arena;
use crate::unit::DspUnit;
use crate::walker::ParamTables;

/// Reference pitch for MIDI note 69.
pub const TUNING_PITCH: f32 = 440.0;

/// Convert a MIDI note number to a frequency in Hz.
pub fn midi_to_freq(note: f32) -> f32 {
    TUNING_PITCH * 2f32.powf((note - 69.0) / 12.0)
}

/// Where a voice is in its note lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceNote {
    Free,
    /// Reserved by the pool, not yet keyed on.
    Allocated,
    Playing(u8),
    /// Gate is off; the unit may still be sounding its release.
    Releasing,
}

/// How a note number is written to `/freq` or `/key` controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchMap {
    Frequency,
    Key,
}

impl PitchMap {
    pub fn apply(self, pitch: u8) -> f32 {
        match self {
            PitchMap::Frequency => midi_to_freq(f32::from(pitch)),
            PitchMap::Key => f32::from(pitch),
        }
    }
}

/// How a note velocity is written to `/gain`, `/vel` or `/velocity` controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityMap {
    Normalized,
    Raw,
}

impl VelocityMap {
    pub fn apply(self, velocity: u8) -> f32 {
        match self {
            VelocityMap::Normalized => f32::from(velocity) / 127.0,
            VelocityMap::Raw => f32::from(velocity),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Voice {
    dsp: usize,
    note: VoiceNote,
    date: u64,
    freq: Vec<u32>,
    gate: Vec<u32>,
    gain: Vec<u32>,
    pitch_map: PitchMap,
    velocity_map: VelocityMap,
}

impl Voice {
    /// Create a voice whose state lives at `dsp`. Note controls are found by
    /// path suffix among `inputs`; the last matching suffix picks the map.
    pub fn new(dsp: usize, inputs: &[Arc<str>], tables: &ParamTables) -> Self {
        let mut voice = Voice {
            dsp,
            note: VoiceNote::Free,
            date: 0,
            freq: Vec::new(),
            gate: Vec::new(),
            gain: Vec::new(),
            pitch_map: PitchMap::Frequency,
            velocity_map: VelocityMap::Normalized,
        };
        for path in inputs {
            let Some(index) = tables.index_of(path) else {
                continue;
            };
            if path.ends_with("/gate") {
                voice.gate.push(index);
            } else if path.ends_with("/freq") {
                voice.freq.push(index);
                voice.pitch_map = PitchMap::Frequency;
            } else if path.ends_with("/key") {
                voice.freq.push(index);
                voice.pitch_map = PitchMap::Key;
            } else if path.ends_with("/gain") {
                voice.gain.push(index);
                voice.velocity_map = VelocityMap::Normalized;
            } else if path.ends_with("/vel") || path.ends_with("/velocity") {
                voice.gain.push(index);
                voice.velocity_map = VelocityMap::Raw;
            }
        }
        voice
    }

    pub fn dsp(&self) -> usize {
        self.dsp
    }

    pub fn note(&self) -> VoiceNote {
        self.note
    }

    /// Pool date of the last allocation.
    pub fn date(&self) -> u64 {
        self.date
    }

    pub fn pitch_map(&self) -> PitchMap {
        self.pitch_map
    }

    pub fn velocity_map(&self) -> VelocityMap {
        self.velocity_map
    }

    pub(crate) fn allocate(&mut self, date: u64) {
        self.date = date;
        self.note = VoiceNote::Allocated;
    }

    /// Clear the instance, then write pitch, gate and velocity.
    pub fn key_on(&mut self, unit: &mut dyn DspUnit, arena: &mut Arena, pitch: u8, velocity: u8) {
        unit.instance_clear(arena, self.dsp);
        let freq = self.pitch_map.apply(pitch);
        let gain = self.velocity_map.apply(velocity);
        for &index in &self.freq {
            unit.set_param_value(arena, self.dsp, index, freq);
        }
        for &index in &self.gate {
            unit.set_param_value(arena, self.dsp, index, 1.0);
        }
        for &index in &self.gain {
            unit.set_param_value(arena, self.dsp, index, gain);
        }
        self.note = VoiceNote::Playing(pitch);
    }

    /// Close every gate. A hard release frees the voice at once.
    pub fn key_off(&mut self, unit: &mut dyn DspUnit, arena: &mut Arena, hard: bool) {
        for &index in &self.gate {
            unit.set_param_value(arena, self.dsp, index, 0.0);
        }
        self.note = if hard { VoiceNote::Free } else { VoiceNote::Releasing };
    }

    pub fn compute(
        &self,
        unit: &mut dyn DspUnit,
        arena: &mut Arena,
        count: usize,
        inputs: usize,
        outputs: usize,
    ) {
        unit.compute(arena, self.dsp, count, inputs, outputs);
    }

    pub fn set_param_value(
        &self,
        unit: &mut dyn DspUnit,
        arena: &mut Arena,
        index: u32,
        value: f32,
    ) {
        unit.set_param_value(arena, self.dsp, index, value);
    }

    pub fn get_param_value(&self, unit: &dyn DspUnit, arena: &Arena, index: u32) -> f32 {
        unit.get_param_value(arena, self.dsp, index)
    }
}
