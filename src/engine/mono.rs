//! Mono engine: a single unit instance at the start of the arena.

use std::sync::Arc;

use crate::arena::Arena;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::layout::MemoryLayout;
use crate::ui::{DspDescriptor, UiItem};
use crate::unit::DspUnit;
use crate::walker::ParamTables;

use super::base::{BlockOutcome, DspEngine, EngineCore, copy_inputs, copy_outputs, poll_outputs};

pub struct MonoEngine {
    core: EngineCore,
    unit: Box<dyn DspUnit>,
    arena: Arena,
    layout: MemoryLayout,
    descriptor: DspDescriptor,
    json: String,
}

impl MonoEngine {
    /// Lay out `arena` for `unit`, write its pointer tables and initialize
    /// the instance. `json()` is the descriptor re-serialized.
    pub fn new(
        unit: Box<dyn DspUnit>,
        descriptor: DspDescriptor,
        arena: Arena,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let json = descriptor.to_json()?;
        Self::build(unit, descriptor, json, arena, config)
    }

    /// Like `new`, parsing the descriptor from `json`. The source text is
    /// kept as `json()`.
    pub fn from_json(
        unit: Box<dyn DspUnit>,
        json: &str,
        arena: Arena,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let descriptor = DspDescriptor::from_json(json)?;
        Self::build(unit, descriptor, json.to_string(), arena, config)
    }

    fn build(
        mut unit: Box<dyn DspUnit>,
        descriptor: DspDescriptor,
        json: String,
        mut arena: Arena,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        warn_channel_mismatch(&descriptor, unit.as_ref());

        let tables = Arc::new(ParamTables::from_ui(&descriptor.ui));
        let layout = MemoryLayout::mono(
            descriptor.size,
            unit.num_inputs(),
            unit.num_outputs(),
            config.block_size,
        )?;
        layout.install(&mut arena)?;
        unit.init(&mut arena, 0, config.sample_rate);

        log::debug!(
            "mono engine '{}': {} inputs, {} outputs, {} params",
            descriptor.name,
            unit.num_inputs(),
            unit.num_outputs(),
            tables.len()
        );

        Ok(MonoEngine {
            core: EngineCore::new(tables, &config),
            unit,
            arena,
            layout,
            descriptor,
            json,
        })
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn descriptor(&self) -> &DspDescriptor {
        &self.descriptor
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }
}

/// Log when the descriptor's declared channel counts disagree with the unit.
pub(crate) fn warn_channel_mismatch(descriptor: &DspDescriptor, unit: &dyn DspUnit) {
    if descriptor.inputs != unit.num_inputs() || descriptor.outputs != unit.num_outputs() {
        log::warn!(
            "'{}' declares {}x{} channels but the unit reports {}x{}; using the unit's",
            descriptor.name,
            descriptor.inputs,
            descriptor.outputs,
            unit.num_inputs(),
            unit.num_outputs()
        );
    }
}

impl DspEngine for MonoEngine {
    fn core(&self) -> &EngineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EngineCore {
        &mut self.core
    }

    fn num_inputs(&self) -> usize {
        self.unit.num_inputs()
    }

    fn num_outputs(&self) -> usize {
        self.unit.num_outputs()
    }

    fn compute(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) -> BlockOutcome {
        let (num_inputs, num_outputs) = (self.num_inputs(), self.num_outputs());
        if let Some(outcome) = self.core.check_block(num_inputs, num_outputs, inputs, outputs) {
            return outcome;
        }
        let block_size = self.core.block_size();

        copy_inputs(&mut self.arena, &self.layout.inputs, block_size, inputs);
        self.core.run_compute_handler();
        self.unit.compute(
            &mut self.arena,
            self.layout.voice_offset(0),
            block_size,
            self.layout.inputs.table,
            self.layout.outputs.table,
        );
        copy_outputs(&self.arena, &self.layout.outputs, block_size, outputs);

        poll_outputs(self);
        self.core.finish_block(outputs);
        BlockOutcome::Processed
    }

    fn set_param_value(&mut self, path: &str, value: f32) {
        if self.core.is_destroyed() {
            return;
        }
        if let Some(index) = self.core.tables().index_of(path) {
            self.core.record_param(path, value);
            let dsp = self.layout.voice_offset(0);
            self.unit.set_param_value(&mut self.arena, dsp, index, value);
        }
    }

    fn get_param_value(&self, path: &str) -> f32 {
        if self.core.is_destroyed() {
            return 0.0;
        }
        match self.core.tables().index_of(path) {
            Some(index) => {
                self.unit.get_param_value(&self.arena, self.layout.voice_offset(0), index)
            }
            None => 0.0,
        }
    }

    fn ui(&self) -> &[UiItem] {
        &self.descriptor.ui
    }

    fn json(&self) -> &str {
        &self.json
    }
}
