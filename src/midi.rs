//! MIDI decoding and the controller / pitch-wheel remapping shared by
//! every engine.

use crate::engine::{DspEngine, report_param};
use crate::events::EngineEvent;

/// Highest 14-bit pitch wheel value.
pub const PITCH_WHEEL_MAX: f32 = 16383.0;

/// Controller numbers that silence every voice of a poly engine.
pub const ALL_SOUND_OFF: u8 = 120;
pub const ALL_NOTES_OFF: u8 = 123;

/// A decoded 3-byte channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOff { channel: u8, key: u8, velocity: u8 },
    NoteOn { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchWheel { channel: u8, value: u16 },
    Other { command: u8, channel: u8, data1: u8, data2: u8 },
}

impl MidiMessage {
    /// Decode a raw message. Missing data bytes read as 0; a note-on with
    /// velocity 0 is a note-off.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;
        let command = status >> 4;
        let channel = status & 0x0f;
        let data1 = data.get(1).copied().unwrap_or(0);
        let data2 = data.get(2).copied().unwrap_or(0);
        let msg = match command {
            8 => MidiMessage::NoteOff { channel, key: data1, velocity: data2 },
            9 if data2 == 0 => MidiMessage::NoteOff { channel, key: data1, velocity: 0 },
            9 => MidiMessage::NoteOn { channel, key: data1, velocity: data2 },
            11 => MidiMessage::ControlChange { channel, controller: data1, value: data2 },
            14 => MidiMessage::PitchWheel {
                channel,
                value: u16::from(data2) * 128 + u16::from(data1),
            },
            _ => MidiMessage::Other { command, channel, data1, data2 },
        };
        Some(msg)
    }
}

/// Linear map of `v` from `[mn0, mx0]` onto `[mn1, mx1]`.
pub fn remap(v: f32, mn0: f32, mx0: f32, mn1: f32, mx1: f32) -> f32 {
    (v - mn0) / (mx0 - mn0) * (mx1 - mn1) + mn1
}

/// Record a raw message for the plot handler.
pub(crate) fn record_midi<E: DspEngine + ?Sized>(engine: &mut E, data: &[u8]) {
    let mut bytes = [0u8; 3];
    for (dst, src) in bytes.iter_mut().zip(data) {
        *dst = *src;
    }
    engine.core_mut().record(EngineEvent::Midi(bytes));
}

/// Default handling of a raw message: record it, then route controllers
/// and the pitch wheel. Notes only reach poly engines.
pub(crate) fn dispatch<E: DspEngine + ?Sized>(engine: &mut E, data: &[u8]) {
    if engine.is_destroyed() {
        return;
    }
    record_midi(engine, data);
    if let Some(msg) = MidiMessage::decode(data) {
        route_channel_message(engine, msg);
    }
}

pub(crate) fn route_channel_message<E: DspEngine + ?Sized>(engine: &mut E, msg: MidiMessage) {
    match msg {
        MidiMessage::ControlChange { channel, controller, value } => {
            engine.ctrl_change(channel, controller, value)
        }
        MidiMessage::PitchWheel { channel, value } => engine.pitch_wheel(channel, value),
        _ => {}
    }
}

/// Write `value` (0..=127) to every control mapped to `ctrl`.
pub(crate) fn remap_controller<E: DspEngine + ?Sized>(
    engine: &mut E,
    channel: u8,
    ctrl: u8,
    value: u8,
) {
    if engine.is_destroyed() {
        return;
    }
    engine.core_mut().record(EngineEvent::CtrlChange { channel, ctrl, value });
    let tables = engine.core().tables().clone();
    for mapping in tables.controller(ctrl) {
        let scaled = remap(f32::from(value), 0.0, 127.0, mapping.min, mapping.max);
        engine.set_param_value(&mapping.path, scaled);
        report_param(engine, &mapping.path);
    }
}

/// Write `wheel` (0..=16383) to every control mapped to the pitch wheel.
pub(crate) fn remap_pitch_wheel<E: DspEngine + ?Sized>(engine: &mut E, channel: u8, wheel: u16) {
    if engine.is_destroyed() {
        return;
    }
    engine.core_mut().record(EngineEvent::PitchWheel { channel, wheel });
    let tables = engine.core().tables().clone();
    for mapping in tables.pitch_wheel() {
        engine.set_param_value(
            &mapping.path,
            remap(f32::from(wheel), 0.0, PITCH_WHEEL_MAX, mapping.min, mapping.max),
        );
        report_param(engine, &mapping.path);
    }
}
