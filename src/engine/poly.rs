//! Poly engine: a pool of voice instances mixed into one output, with an
//! optional effect instance processing the mix in place.
//!
//! Per block:
//!
//! ```text
//! clear(out) ; for each voice { voice(in -> mix) ; out += mix } ; effect(out -> out)
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use crate::arena::Arena;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::layout::{ChannelTable, MemoryLayout};
use crate::midi::{self, ALL_NOTES_OFF, ALL_SOUND_OFF, MidiMessage};
use crate::ui::{DspDescriptor, UiItem};
use crate::unit::{DspUnit, Mixer, SumMixer};
use crate::walker::{ParamTables, contains_path};

use super::base::{BlockOutcome, DspEngine, EngineCore, copy_inputs, copy_outputs, poll_outputs};
use super::mono::warn_channel_mismatch;
use super::pool::VoicePool;
use super::voice::Voice;

/// The global effect and the control paths that belong to it.
struct EffectSlot {
    unit: Box<dyn DspUnit>,
    offset: usize,
    paths: HashSet<Arc<str>>,
}

pub struct PolyEngine {
    core: EngineCore,
    voice_unit: Box<dyn DspUnit>,
    effect: Option<EffectSlot>,
    mixer: Box<dyn Mixer>,
    arena: Arena,
    layout: MemoryLayout,
    mixing: ChannelTable,
    pool: VoicePool,
    ui: Vec<UiItem>,
    json: String,
}

impl PolyEngine {
    /// Lay out `voices` voice instances plus the effect in `arena` and
    /// initialize all of them. Without a `mixer` voices are summed.
    pub fn new(
        mut voice_unit: Box<dyn DspUnit>,
        voice: DspDescriptor,
        effect: Option<(Box<dyn DspUnit>, DspDescriptor)>,
        mixer: Option<Box<dyn Mixer>>,
        mut arena: Arena,
        voices: usize,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if voices == 0 {
            let reason = "a poly engine needs at least one voice".to_string();
            return Err(EngineError::InvalidConfig(reason));
        }
        warn_channel_mismatch(&voice, voice_unit.as_ref());
        let num_inputs = voice_unit.num_inputs();
        let num_outputs = voice_unit.num_outputs();

        if let Some((unit, descriptor)) = &effect {
            warn_channel_mismatch(descriptor, unit.as_ref());
            if unit.num_inputs() > num_outputs || unit.num_outputs() > num_outputs {
                return Err(EngineError::InvalidConfig(format!(
                    "effect '{}' is {}x{} but voices only produce {} channels",
                    descriptor.name,
                    unit.num_inputs(),
                    unit.num_outputs(),
                    num_outputs
                )));
            }
        }

        let mut tables = ParamTables::from_ui(&voice.ui);
        let voice_tables = tables.clone();
        if let Some((_, descriptor)) = &effect {
            tables.add_ui(&descriptor.ui);
        }
        let tables = Arc::new(tables);

        let layout = MemoryLayout::poly(
            voice.size,
            voices,
            effect.as_ref().map(|(_, d)| d.size),
            num_inputs,
            num_outputs,
            config.block_size,
        )?;
        layout.install(&mut arena)?;
        let mixing = layout.mixing.ok_or_else(|| {
            EngineError::InvalidConfig("poly layout has no mixing buffers".to_string())
        })?;

        let pool = VoicePool::new(
            (0..voices)
                .map(|i| Voice::new(layout.voice_offset(i), voice_tables.inputs(), &voice_tables))
                .collect(),
        );
        for v in pool.voices() {
            voice_unit.init(&mut arena, v.dsp(), config.sample_rate);
        }

        let (ui, effect) = match effect {
            Some((mut unit, descriptor)) => {
                let offset = layout.effect_offset().ok_or_else(|| {
                    EngineError::InvalidConfig("poly layout has no effect region".to_string())
                })?;
                unit.init(&mut arena, offset, config.sample_rate);
                let paths = tables
                    .inputs()
                    .iter()
                    .chain(tables.outputs())
                    .filter(|path| contains_path(&descriptor.ui, path))
                    .cloned()
                    .collect();
                let ui = vec![UiItem::tgroup(
                    "Sequencer",
                    vec![
                        UiItem::vgroup("Instrument", voice.ui.clone()),
                        UiItem::vgroup("Effect", descriptor.ui),
                    ],
                )];
                (ui, Some(EffectSlot { unit, offset, paths }))
            }
            None => {
                let voices = UiItem::vgroup("Voices", voice.ui.clone());
                let ui = vec![UiItem::tgroup("Polyphonic", vec![voices])];
                (ui, None)
            }
        };
        let json = DspDescriptor { ui: ui.clone(), ..voice }.to_json()?;

        log::debug!(
            "poly engine: {} voices, {}x{} channels, effect: {}, {} params",
            voices,
            num_inputs,
            num_outputs,
            effect.is_some(),
            tables.len()
        );

        Ok(PolyEngine {
            core: EngineCore::new(tables, &config),
            voice_unit,
            effect,
            mixer: mixer.unwrap_or_else(|| Box::new(SumMixer)),
            arena,
            layout,
            mixing,
            pool,
            ui,
            json,
        })
    }

    pub fn voices(&self) -> &[Voice] {
        self.pool.voices()
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Start a note on a free (or stolen) voice; returns its pool index.
    pub fn key_on(&mut self, _channel: u8, pitch: u8, velocity: u8) -> Option<usize> {
        if self.core.is_destroyed() {
            return None;
        }
        let index = self.pool.allocate()?;
        let voice = self.pool.get_mut(index)?;
        voice.key_on(self.voice_unit.as_mut(), &mut self.arena, pitch, velocity);
        Some(index)
    }

    /// Release the oldest voice playing `pitch`.
    pub fn key_off(&mut self, _channel: u8, pitch: u8, _velocity: u8) {
        if self.core.is_destroyed() {
            return;
        }
        match self.pool.playing_voice(pitch).and_then(|i| self.pool.get_mut(i)) {
            Some(voice) => voice.key_off(self.voice_unit.as_mut(), &mut self.arena, false),
            None => log::debug!("key off: pitch {pitch} not playing"),
        }
    }

    /// Close every voice's gate; `hard` frees them immediately.
    pub fn all_notes_off(&mut self, hard: bool) {
        if self.core.is_destroyed() {
            return;
        }
        self.core.record(EngineEvent::CtrlChange { channel: 0, ctrl: ALL_NOTES_OFF, value: 0 });
        for voice in self.pool.voices_mut() {
            voice.key_off(self.voice_unit.as_mut(), &mut self.arena, hard);
        }
    }

    fn effect_for(&self, path: &str) -> Option<&EffectSlot> {
        self.effect.as_ref().filter(|effect| effect.paths.contains(path))
    }
}

impl DspEngine for PolyEngine {
    fn core(&self) -> &EngineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EngineCore {
        &mut self.core
    }

    fn num_inputs(&self) -> usize {
        self.voice_unit.num_inputs()
    }

    fn num_outputs(&self) -> usize {
        self.voice_unit.num_outputs()
    }

    fn compute(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) -> BlockOutcome {
        let (num_inputs, num_outputs) = (self.num_inputs(), self.num_outputs());
        if let Some(outcome) = self.core.check_block(num_inputs, num_outputs, inputs, outputs) {
            return outcome;
        }
        let block_size = self.core.block_size();
        let channels = num_outputs;
        let in_table = self.layout.inputs.table;
        let out_table = self.layout.outputs.table;

        copy_inputs(&mut self.arena, &self.layout.inputs, block_size, inputs);
        self.core.run_compute_handler();

        self.mixer.clear_output(&mut self.arena, block_size, channels, out_table);
        let mix_table = self.mixing.table;
        for voice in self.pool.voices() {
            let unit = self.voice_unit.as_mut();
            voice.compute(unit, &mut self.arena, block_size, in_table, mix_table);
            self.mixer.mix_voice(&mut self.arena, block_size, channels, mix_table, out_table);
        }
        if let Some(effect) = self.effect.as_mut() {
            let offset = effect.offset;
            effect.unit.compute(&mut self.arena, offset, block_size, out_table, out_table);
        }
        copy_outputs(&self.arena, &self.layout.outputs, block_size, outputs);

        poll_outputs(self);
        self.core.finish_block(outputs);
        BlockOutcome::Processed
    }

    fn set_param_value(&mut self, path: &str, value: f32) {
        if self.core.is_destroyed() {
            return;
        }
        let Some(index) = self.core.tables().index_of(path) else {
            return;
        };
        self.core.record_param(path, value);
        match self.effect.as_mut().filter(|effect| effect.paths.contains(path)) {
            Some(effect) => {
                effect.unit.set_param_value(&mut self.arena, effect.offset, index, value);
            }
            None => {
                for voice in self.pool.voices() {
                    voice.set_param_value(self.voice_unit.as_mut(), &mut self.arena, index, value);
                }
            }
        }
    }

    fn get_param_value(&self, path: &str) -> f32 {
        if self.core.is_destroyed() {
            return 0.0;
        }
        let Some(index) = self.core.tables().index_of(path) else {
            return 0.0;
        };
        match self.effect_for(path) {
            Some(effect) => effect.unit.get_param_value(&self.arena, effect.offset, index),
            None => self.pool.voices().first().map_or(0.0, |voice| {
                voice.get_param_value(self.voice_unit.as_ref(), &self.arena, index)
            }),
        }
    }

    fn ui(&self) -> &[UiItem] {
        &self.ui
    }

    fn json(&self) -> &str {
        &self.json
    }

    fn midi_message(&mut self, data: &[u8]) {
        if self.core.is_destroyed() {
            return;
        }
        midi::record_midi(self, data);
        match MidiMessage::decode(data) {
            Some(MidiMessage::NoteOn { channel, key, velocity }) => {
                self.key_on(channel, key, velocity);
            }
            Some(MidiMessage::NoteOff { channel, key, velocity }) => {
                self.key_off(channel, key, velocity);
            }
            Some(msg) => midi::route_channel_message(self, msg),
            None => {}
        }
    }

    fn ctrl_change(&mut self, channel: u8, ctrl: u8, value: u8) {
        if ctrl == ALL_NOTES_OFF || ctrl == ALL_SOUND_OFF {
            self.all_notes_off(true);
        } else {
            midi::remap_controller(self, channel, ctrl, value);
        }
    }
}
