//! Small hand-written units standing in for compiled code in tests.

use crate::arena::Arena;
use crate::unit::{DspUnit, channel_offset};

/// A voice unit: emits `gate * gain * volume` on one output and publishes
/// the last sample on its `level` bargraph.
#[derive(Debug, Default)]
pub struct SynthUnit;

impl SynthUnit {
    pub const FREQ: u32 = 0;
    pub const GATE: u32 = 4;
    pub const GAIN: u32 = 8;
    pub const VOLUME: u32 = 12;
    pub const BEND: u32 = 16;
    pub const LEVEL: u32 = 20;
    /// Frames computed since the last clear; not exposed in the UI.
    pub const PHASE: u32 = 24;
    pub const SAMPLE_RATE: u32 = 28;
    pub const SIZE: usize = 32;
}

impl DspUnit for SynthUnit {
    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn init(&mut self, arena: &mut Arena, dsp: usize, sample_rate: f32) {
        arena.set_f32(dsp + Self::SAMPLE_RATE as usize, sample_rate).unwrap();
        let defaults = [
            (Self::FREQ, 440.0),
            (Self::GATE, 0.0),
            (Self::GAIN, 0.5),
            (Self::VOLUME, 1.0),
            (Self::BEND, 0.0),
        ];
        for (index, value) in defaults {
            arena.set_f32(dsp + index as usize, value).unwrap();
        }
        self.instance_clear(arena, dsp);
    }

    fn instance_clear(&mut self, arena: &mut Arena, dsp: usize) {
        arena.set_f32(dsp + Self::LEVEL as usize, 0.0).unwrap();
        arena.set_f32(dsp + Self::PHASE as usize, 0.0).unwrap();
    }

    fn compute(
        &mut self,
        arena: &mut Arena,
        dsp: usize,
        count: usize,
        _inputs: usize,
        outputs: usize,
    ) {
        let value = [Self::GATE, Self::GAIN, Self::VOLUME]
            .iter()
            .map(|&i| arena.get_f32(dsp + i as usize).unwrap())
            .product::<f32>();
        let out = channel_offset(arena, outputs, 0).unwrap();
        arena.fill(out, count, value).unwrap();
        arena.set_f32(dsp + Self::LEVEL as usize, value).unwrap();
        let phase = arena.get_f32(dsp + Self::PHASE as usize).unwrap();
        arena.set_f32(dsp + Self::PHASE as usize, phase + count as f32).unwrap();
    }

    fn set_param_value(&mut self, arena: &mut Arena, dsp: usize, index: u32, value: f32) {
        arena.set_f32(dsp + index as usize, value).unwrap();
    }

    fn get_param_value(&self, arena: &Arena, dsp: usize, index: u32) -> f32 {
        arena.get_f32(dsp + index as usize).unwrap()
    }
}

pub fn synth_descriptor() -> String {
    format!(
        r#"{{
        "name": "synth", "size": {size}, "inputs": 0, "outputs": 1,
        "ui": [{{ "type": "vgroup", "label": "synth", "items": [
            {{ "type": "hslider", "label": "freq", "address": "/synth/freq", "index": 0,
              "init": 440, "min": 20, "max": 2000, "step": 1 }},
            {{ "type": "button", "label": "gate", "address": "/synth/gate", "index": 4 }},
            {{ "type": "hslider", "label": "gain", "address": "/synth/gain", "index": 8,
              "init": 0.5, "min": 0, "max": 1, "step": 0.01 }},
            {{ "type": "hslider", "label": "volume", "address": "/synth/volume", "index": 12,
              "init": 1, "min": 0, "max": 1, "step": 0.01,
              "meta": [{{ "midi": "ctrl 7" }}] }},
            {{ "type": "hslider", "label": "bend", "address": "/synth/bend", "index": 16,
              "init": 0, "min": -2, "max": 2, "step": 0.01,
              "meta": [{{ "midi": "pitchwheel" }}] }},
            {{ "type": "vbargraph", "label": "level", "address": "/synth/level", "index": 20,
              "min": 0, "max": 1 }}
        ]}}]
    }}"#,
        size = SynthUnit::SIZE
    )
}

/// An effect/processor unit: every output is input `ch` (or silence) times
/// `gain`, with the peak of output 0 on its `meter` bargraph. Safe to run
/// in place.
#[derive(Debug)]
pub struct GainUnit {
    inputs: usize,
    outputs: usize,
}

impl GainUnit {
    pub const GAIN: u32 = 0;
    pub const METER: u32 = 4;
    pub const SIZE: usize = 8;

    pub fn new(inputs: usize, outputs: usize) -> Self {
        GainUnit { inputs, outputs }
    }
}

impl DspUnit for GainUnit {
    fn num_inputs(&self) -> usize {
        self.inputs
    }

    fn num_outputs(&self) -> usize {
        self.outputs
    }

    fn init(&mut self, arena: &mut Arena, dsp: usize, _sample_rate: f32) {
        arena.set_f32(dsp + Self::GAIN as usize, 1.0).unwrap();
        self.instance_clear(arena, dsp);
    }

    fn instance_clear(&mut self, arena: &mut Arena, dsp: usize) {
        arena.set_f32(dsp + Self::METER as usize, 0.0).unwrap();
    }

    fn compute(
        &mut self,
        arena: &mut Arena,
        dsp: usize,
        count: usize,
        inputs: usize,
        outputs: usize,
    ) {
        let gain = arena.get_f32(dsp + Self::GAIN as usize).unwrap();
        let mut peak = 0.0f32;
        for ch in 0..self.outputs {
            let dst = channel_offset(arena, outputs, ch).unwrap();
            let src = (ch < self.inputs).then(|| channel_offset(arena, inputs, ch).unwrap());
            for i in 0..count {
                let x = match src {
                    Some(src) => arena.get_f32(src + i * 4).unwrap(),
                    None => 0.0,
                };
                let y = x * gain;
                arena.set_f32(dst + i * 4, y).unwrap();
                if ch == 0 {
                    peak = peak.max(y.abs());
                }
            }
        }
        arena.set_f32(dsp + Self::METER as usize, peak).unwrap();
    }

    fn set_param_value(&mut self, arena: &mut Arena, dsp: usize, index: u32, value: f32) {
        arena.set_f32(dsp + index as usize, value).unwrap();
    }

    fn get_param_value(&self, arena: &Arena, dsp: usize, index: u32) -> f32 {
        arena.get_f32(dsp + index as usize).unwrap()
    }
}

/// Descriptor for a `GainUnit` whose controls live under `/<name>/`.
pub fn gain_descriptor(name: &str, inputs: usize, outputs: usize) -> String {
    format!(
        r#"{{
        "name": "{name}", "size": {size}, "inputs": {inputs}, "outputs": {outputs},
        "ui": [{{ "type": "vgroup", "label": "{name}", "items": [
            {{ "type": "hslider", "label": "gain", "address": "/{name}/gain", "index": 0,
              "init": 1, "min": 0, "max": 2, "step": 0.01,
              "meta": [{{ "midi": "ctrl 1" }}] }},
            {{ "type": "hbargraph", "label": "meter", "address": "/{name}/meter", "index": 4,
              "min": 0, "max": 2 }}
        ]}}]
    }}"#,
        size = GainUnit::SIZE
    )
}
