pub mod arena;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod layout;
pub mod midi;
pub mod ui;
pub mod unit;
pub mod walker;

#[cfg(test)]
mod testing;

use crate::error::EngineError;
use crate::layout::MemoryLayout;
use crate::ui::DspDescriptor;
use crate::walker::ParamTables;
use wasm_bindgen::prelude::*;

pub use crate::arena::Arena;
pub use crate::config::EngineConfig;
pub use crate::engine::{BlockOutcome, DspEngine, MonoEngine, PolyEngine};
pub use crate::unit::{DspUnit, Mixer, SumMixer};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the arena_dsp_core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Plan the arena for one instance of the unit described by `json`.
pub fn plan_mono(json: &str, block_size: usize) -> Result<MemoryLayout, EngineError> {
    if block_size == 0 {
        return Err(EngineError::InvalidConfig("block size must be at least 1".to_string()));
    }
    let d = DspDescriptor::from_json(json)?;
    MemoryLayout::mono(d.size, d.inputs, d.outputs, block_size)
}

/// Plan the arena for `voices` voice instances plus an optional effect.
pub fn plan_poly(
    voice_json: &str,
    effect_json: Option<&str>,
    voices: usize,
    block_size: usize,
) -> Result<MemoryLayout, EngineError> {
    if block_size == 0 || voices == 0 {
        return Err(EngineError::InvalidConfig(format!(
            "need at least one voice and one frame per block, \
             got {voices} voices of {block_size} frames"
        )));
    }
    let voice = DspDescriptor::from_json(voice_json)?;
    let effect = effect_json.map(DspDescriptor::from_json).transpose()?;
    MemoryLayout::poly(
        voice.size,
        voices,
        effect.map(|e| e.size),
        voice.inputs,
        voice.outputs,
        block_size,
    )
}

/// Render an error for JS; descriptor errors get a caret diagnostic over `source`.
fn js_error(e: EngineError, source: &str) -> JsValue {
    match e {
        EngineError::Descriptor(d) => JsValue::from_str(&d.report(source)),
        other => JsValue::from_str(&format!("{other}")),
    }
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: parse a unit descriptor and return its inputs, outputs,
/// path table and MIDI mappings.
#[wasm_bindgen]
pub fn describe_ui(json: &str) -> Result<JsValue, JsValue> {
    let d = DspDescriptor::from_json(json).map_err(|e| js_error(e.into(), json))?;
    to_js(&ParamTables::from_ui(&d.ui).summary())
}

/// WASM-exposed: the mono arena layout, so a loader can size linear memory.
#[wasm_bindgen]
pub fn mono_layout(json: &str, block_size: usize) -> Result<JsValue, JsValue> {
    let layout = plan_mono(json, block_size).map_err(|e| js_error(e, json))?;
    to_js(&layout)
}

/// WASM-exposed: the poly arena layout for `voices` voices and an optional effect.
#[wasm_bindgen]
pub fn poly_layout(
    voice_json: &str,
    effect_json: Option<String>,
    voices: usize,
    block_size: usize,
) -> Result<JsValue, JsValue> {
    let effect_json = effect_json.as_deref();
    let layout = plan_poly(voice_json, effect_json, voices, block_size).map_err(|e| match e {
        // Either document may be the bad one; report against the one that fails to parse.
        EngineError::Descriptor(_) if DspDescriptor::from_json(voice_json).is_ok() => {
            js_error(e, effect_json.unwrap_or(""))
        }
        e => js_error(e, voice_json),
    })?;
    to_js(&layout)
}
