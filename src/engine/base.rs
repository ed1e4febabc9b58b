//! State and behavior shared by the mono and poly engines.

use std::sync::Arc;

use crate::arena::Arena;
use crate::config::EngineConfig;
use crate::events::{EngineEvent, EventQueue};
use crate::layout::ChannelTable;
use crate::midi;
use crate::ui::UiItem;
use crate::walker::ParamTables;

/// Called with `(path, value)` for polled bargraphs and MIDI-driven writes.
pub type OutputParamHandler = Box<dyn FnMut(&str, f32) + Send>;
/// Called with the block size just before each unit compute.
pub type ComputeHandler = Box<dyn FnMut(usize) + Send>;
/// Called after each block with the produced outputs, the block index, and
/// the events recorded since the previous block.
pub type PlotHandler = Box<dyn FnMut(&[&mut [f32]], u64, Option<&[EngineEvent]>) + Send>;

/// What a `compute` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Processed,
    /// The unit has inputs but no usable input buffer was supplied.
    MissingInputs,
    /// The unit has outputs but no usable output buffer was supplied.
    MissingOutputs,
    Destroyed,
}

impl BlockOutcome {
    pub fn is_processed(self) -> bool {
        self == BlockOutcome::Processed
    }
}

/// Handlers, tables, counters and the event queue every engine carries.
pub struct EngineCore {
    tables: Arc<ParamTables>,
    block_size: usize,
    poll_interval: u32,
    outputs_timer: u32,
    block_index: u64,
    events: EventQueue,
    output_handler: Option<OutputParamHandler>,
    compute_handler: Option<ComputeHandler>,
    plot_handler: Option<PlotHandler>,
    destroyed: bool,
}

impl EngineCore {
    pub fn new(tables: Arc<ParamTables>, config: &EngineConfig) -> Self {
        EngineCore {
            tables,
            block_size: config.block_size,
            poll_interval: config.output_poll_interval,
            outputs_timer: config.output_poll_interval,
            block_index: 0,
            events: EventQueue::with_capacity(config.event_capacity),
            output_handler: None,
            compute_handler: None,
            plot_handler: None,
            destroyed: false,
        }
    }

    pub fn tables(&self) -> &Arc<ParamTables> {
        &self.tables
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Index the next processed block will carry.
    pub fn block_index(&self) -> u64 {
        self.block_index
    }

    /// Queue an event for the next plot callback. Nothing is kept without a
    /// plot handler.
    pub fn record(&mut self, event: EngineEvent) {
        if self.plot_handler.is_some() {
            self.events.push(event);
        }
    }

    pub fn record_param(&mut self, path: &str, value: f32) {
        if self.plot_handler.is_none() {
            return;
        }
        if let Some(path) = self.tables.shared_path(path) {
            let path = path.clone();
            self.events.push(EngineEvent::Param { path, value });
        }
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Reject the block before anything is touched, or `None` to proceed.
    pub fn check_block(
        &self,
        num_inputs: usize,
        num_outputs: usize,
        inputs: &[&[f32]],
        outputs: &[&mut [f32]],
    ) -> Option<BlockOutcome> {
        if self.destroyed {
            return Some(BlockOutcome::Destroyed);
        }
        if num_inputs > 0 && inputs.first().is_none_or(|ch| ch.is_empty()) {
            return Some(BlockOutcome::MissingInputs);
        }
        if num_outputs > 0 && outputs.first().is_none_or(|ch| ch.is_empty()) {
            return Some(BlockOutcome::MissingOutputs);
        }
        None
    }

    pub fn run_compute_handler(&mut self) {
        if let Some(handler) = self.compute_handler.as_mut() {
            handler(self.block_size);
        }
    }

    /// Advance the poll decimation by one block; true when outputs are due.
    fn poll_due(&mut self) -> bool {
        self.outputs_timer -= 1;
        if self.outputs_timer == 0 {
            self.outputs_timer = self.poll_interval;
            true
        } else {
            false
        }
    }

    /// Deliver the plot callback and reset the event queue.
    pub fn finish_block(&mut self, outputs: &[&mut [f32]]) {
        if let Some(handler) = self.plot_handler.as_mut() {
            let events = (!self.events.is_empty()).then(|| self.events.as_slice());
            handler(outputs, self.block_index, events);
        }
        self.block_index += 1;
        self.events.clear();
    }

    pub fn set_output_param_handler(&mut self, handler: Option<OutputParamHandler>) {
        if !self.destroyed {
            self.output_handler = handler;
        }
    }

    pub fn set_compute_handler(&mut self, handler: Option<ComputeHandler>) {
        if !self.destroyed {
            self.compute_handler = handler;
        }
    }

    pub fn set_plot_handler(&mut self, handler: Option<PlotHandler>) {
        if !self.destroyed {
            self.plot_handler = handler;
            if self.plot_handler.is_none() {
                self.events.clear();
            }
        }
    }

    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.output_handler = None;
        self.compute_handler = None;
        self.plot_handler = None;
        self.events.clear();
    }
}

/// The control surface common to mono and poly engines.
pub trait DspEngine: Send {
    fn core(&self) -> &EngineCore;
    fn core_mut(&mut self) -> &mut EngineCore;

    fn num_inputs(&self) -> usize;
    fn num_outputs(&self) -> usize;

    /// Process one block. `inputs` and `outputs` hold one slice per channel,
    /// each `block_size` frames long.
    fn compute(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) -> BlockOutcome;

    /// Write a control by path. Unknown paths are ignored.
    fn set_param_value(&mut self, path: &str, value: f32);
    /// Read a control by path. Unknown paths read as 0.
    fn get_param_value(&self, path: &str) -> f32;

    /// The control tree this engine exposes.
    fn ui(&self) -> &[UiItem];
    /// The serialized descriptor this engine exposes.
    fn json(&self) -> &str;

    fn midi_message(&mut self, data: &[u8]) {
        midi::dispatch(self, data);
    }

    fn ctrl_change(&mut self, channel: u8, ctrl: u8, value: u8) {
        midi::remap_controller(self, channel, ctrl, value);
    }

    fn pitch_wheel(&mut self, channel: u8, wheel: u16) {
        midi::remap_pitch_wheel(self, channel, wheel);
    }

    /// Ordered input control paths.
    fn params(&self) -> &[Arc<str>] {
        self.core().tables().inputs()
    }

    /// Ordered output (bargraph) paths.
    fn outputs(&self) -> &[Arc<str>] {
        self.core().tables().outputs()
    }

    fn block_size(&self) -> usize {
        self.core().block_size()
    }

    fn set_output_param_handler(&mut self, handler: Option<OutputParamHandler>) {
        self.core_mut().set_output_param_handler(handler);
    }

    fn set_compute_handler(&mut self, handler: Option<ComputeHandler>) {
        self.core_mut().set_compute_handler(handler);
    }

    fn set_plot_handler(&mut self, handler: Option<PlotHandler>) {
        self.core_mut().set_plot_handler(handler);
    }

    /// Drop every handler; all later calls are no-ops.
    fn destroy(&mut self) {
        self.core_mut().destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.core().is_destroyed()
    }
}

/// Report the current value of `path` to the output handler, if any.
pub fn report_param<E: DspEngine + ?Sized>(engine: &mut E, path: &str) {
    let Some(mut handler) = engine.core_mut().output_handler.take() else {
        return;
    };
    handler(path, engine.get_param_value(path));
    engine.core_mut().output_handler = Some(handler);
}

/// Report every output path when the poll interval elapses.
pub(crate) fn poll_outputs<E: DspEngine + ?Sized>(engine: &mut E) {
    if !engine.core_mut().poll_due() {
        return;
    }
    let Some(mut handler) = engine.core_mut().output_handler.take() else {
        return;
    };
    let tables = engine.core().tables().clone();
    for path in tables.outputs() {
        handler(path, engine.get_param_value(path));
    }
    engine.core_mut().output_handler = Some(handler);
}

/// Copy caller input channels into the arena input region.
pub(crate) fn copy_inputs(
    arena: &mut Arena,
    table: &ChannelTable,
    block_size: usize,
    inputs: &[&[f32]],
) {
    for (ch, src) in inputs.iter().enumerate().take(table.channels) {
        let len = src.len().min(block_size);
        if let Ok(dst) = arena.channel_mut(table.channel(ch, block_size), len) {
            dst.copy_from_slice(&src[..len]);
        }
    }
}

/// Copy arena output channels into the caller's buffers.
pub(crate) fn copy_outputs(
    arena: &Arena,
    table: &ChannelTable,
    block_size: usize,
    outputs: &mut [&mut [f32]],
) {
    for (ch, dst) in outputs.iter_mut().enumerate().take(table.channels) {
        let len = dst.len().min(block_size);
        if let Ok(src) = arena.channel(table.channel(ch, block_size), len) {
            dst[..len].copy_from_slice(src);
        }
    }
}
