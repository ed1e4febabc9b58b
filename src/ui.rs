//! UI descriptor types shipped alongside a compiled DSP unit.
//!
//! These map directly to the JSON document the DSP compiler emits next to
//! each unit: a header (name, state size, channel counts) plus a tree of
//! groups and controls.

use std::collections::BTreeMap;

use serde::de::{self, DeserializeOwned};
use serde::ser::{self, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::DescriptorError;

// ── Descriptor (top-level) ──────────────────────────────────

/// Top-level descriptor of one compiled unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DspDescriptor {
    /// Human-readable unit name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Size in bytes of one instance's state region.
    pub size: usize,
    /// Declared input channel count.
    #[serde(default)]
    pub inputs: usize,
    /// Declared output channel count.
    #[serde(default)]
    pub outputs: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<MetaEntry>,
    /// The control tree.
    pub ui: Vec<UiItem>,
    /// Fields the runtime does not interpret, kept for re-serialization.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One metadata entry. The compiler emits single-key objects such as
/// `{"midi": "ctrl 7"}` or `{"unit": "Hz"}`.
pub type MetaEntry = BTreeMap<String, Value>;

impl DspDescriptor {
    pub fn from_json(text: &str) -> Result<Self, DescriptorError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, DescriptorError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Control tree ────────────────────────────────────────────

/// A node of the control tree, keyed by its JSON `type` field.
#[derive(Debug, Clone, PartialEq)]
pub enum UiItem {
    Vgroup(UiGroup),
    Hgroup(UiGroup),
    Tgroup(UiGroup),
    Hslider(UiControl),
    Vslider(UiControl),
    Nentry(UiControl),
    Button(UiControl),
    Checkbox(UiControl),
    Hbargraph(UiControl),
    Vbargraph(UiControl),
    /// Any node kind the runtime does not consume (e.g. soundfiles), kept
    /// verbatim.
    Unknown(Value),
}

/// How the walker treats a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRole {
    Group,
    Input,
    Output,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiGroup {
    pub label: String,
    #[serde(default)]
    pub items: Vec<UiItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<MetaEntry>,
    /// Fields the runtime does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A leaf control (input or bargraph).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiControl {
    pub label: String,
    /// Hierarchical parameter path, e.g. `/synth/freq`.
    pub address: String,
    /// Index understood by the unit's get/set API.
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<MetaEntry>,
    /// Fields the runtime does not interpret (`shortname`, `url`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UiControl {
    /// Declared value range. Controls without one (buttons, checkboxes)
    /// span `[0, 1]`.
    pub fn range(&self) -> (f32, f32) {
        (self.min.unwrap_or(0.0), self.max.unwrap_or(1.0))
    }

    /// String values stored under `key` across all metadata entries.
    pub fn meta_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.meta
            .iter()
            .filter_map(move |entry| entry.get(key))
            .filter_map(|v| v.as_str())
    }
}

impl UiItem {
    pub fn role(&self) -> ItemRole {
        match self {
            UiItem::Vgroup(_) | UiItem::Hgroup(_) | UiItem::Tgroup(_) => ItemRole::Group,
            UiItem::Hslider(_)
            | UiItem::Vslider(_)
            | UiItem::Nentry(_)
            | UiItem::Button(_)
            | UiItem::Checkbox(_) => ItemRole::Input,
            UiItem::Hbargraph(_) | UiItem::Vbargraph(_) => ItemRole::Output,
            UiItem::Unknown(_) => ItemRole::Ignored,
        }
    }

    /// The JSON `type` tag of a known node kind.
    pub fn kind(&self) -> Option<&'static str> {
        let kind = match self {
            UiItem::Vgroup(_) => "vgroup",
            UiItem::Hgroup(_) => "hgroup",
            UiItem::Tgroup(_) => "tgroup",
            UiItem::Hslider(_) => "hslider",
            UiItem::Vslider(_) => "vslider",
            UiItem::Nentry(_) => "nentry",
            UiItem::Button(_) => "button",
            UiItem::Checkbox(_) => "checkbox",
            UiItem::Hbargraph(_) => "hbargraph",
            UiItem::Vbargraph(_) => "vbargraph",
            UiItem::Unknown(_) => return None,
        };
        Some(kind)
    }

    pub fn group(&self) -> Option<&UiGroup> {
        match self {
            UiItem::Vgroup(g) | UiItem::Hgroup(g) | UiItem::Tgroup(g) => Some(g),
            _ => None,
        }
    }

    pub fn control(&self) -> Option<&UiControl> {
        match self {
            UiItem::Hslider(c)
            | UiItem::Vslider(c)
            | UiItem::Nentry(c)
            | UiItem::Button(c)
            | UiItem::Checkbox(c)
            | UiItem::Hbargraph(c)
            | UiItem::Vbargraph(c) => Some(c),
            _ => None,
        }
    }

    pub fn vgroup(label: &str, items: Vec<UiItem>) -> Self {
        UiItem::Vgroup(UiGroup::new(label, items))
    }

    pub fn tgroup(label: &str, items: Vec<UiItem>) -> Self {
        UiItem::Tgroup(UiGroup::new(label, items))
    }
}

impl UiGroup {
    pub fn new(label: &str, items: Vec<UiItem>) -> Self {
        UiGroup { label: label.to_string(), items, meta: Vec::new(), extra: Map::new() }
    }
}

// ── Tagged (de)serialization ────────────────────────────────

/// Parse the body of a known node, without its `type` tag.
fn body<T: DeserializeOwned, E: de::Error>(mut fields: Map<String, Value>) -> Result<T, E> {
    fields.remove("type");
    serde_json::from_value(Value::Object(fields)).map_err(E::custom)
}

impl<'de> Deserialize<'de> for UiItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = match Value::deserialize(deserializer)? {
            Value::Object(fields) => fields,
            other => return Ok(UiItem::Unknown(other)),
        };
        let kind = fields.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
        let item = match kind.as_str() {
            "vgroup" => UiItem::Vgroup(body(fields)?),
            "hgroup" => UiItem::Hgroup(body(fields)?),
            "tgroup" => UiItem::Tgroup(body(fields)?),
            "hslider" => UiItem::Hslider(body(fields)?),
            "vslider" => UiItem::Vslider(body(fields)?),
            "nentry" => UiItem::Nentry(body(fields)?),
            "button" => UiItem::Button(body(fields)?),
            "checkbox" => UiItem::Checkbox(body(fields)?),
            "hbargraph" => UiItem::Hbargraph(body(fields)?),
            "vbargraph" => UiItem::Vbargraph(body(fields)?),
            _ => UiItem::Unknown(Value::Object(fields)),
        };
        Ok(item)
    }
}

/// Write `body`'s fields after a leading `type` tag.
fn tagged<S, T>(serializer: S, kind: &str, body: &T) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let fields = match serde_json::to_value(body).map_err(ser::Error::custom)? {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
    map.serialize_entry("type", kind)?;
    for (key, value) in &fields {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

impl Serialize for UiItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self.kind().unwrap_or_default();
        match self {
            UiItem::Unknown(value) => value.serialize(serializer),
            UiItem::Vgroup(group) | UiItem::Hgroup(group) | UiItem::Tgroup(group) => {
                tagged(serializer, kind, group)
            }
            UiItem::Hslider(control)
            | UiItem::Vslider(control)
            | UiItem::Nentry(control)
            | UiItem::Button(control)
            | UiItem::Checkbox(control)
            | UiItem::Hbargraph(control)
            | UiItem::Vbargraph(control) => tagged(serializer, kind, control),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYNTH_JSON: &str = r#"{
        "name": "synth",
        "size": 24,
        "inputs": 0,
        "outputs": 2,
        "compile_options": "-lang wasm",
        "meta": [{ "author": "nobody" }],
        "ui": [{
            "type": "vgroup",
            "label": "synth",
            "items": [
                { "type": "hslider", "label": "freq", "address": "/synth/freq", "index": 0,
                  "init": 440, "min": 20, "max": 2000, "step": 1 },
                { "type": "button", "label": "gate", "address": "/synth/gate", "index": 4 },
                { "type": "hslider", "label": "volume", "address": "/synth/volume", "index": 8,
                  "meta": [{ "midi": "ctrl 7" }], "min": 0, "max": 1, "init": 0.5, "step": 0.01 },
                { "type": "soundfile", "label": "sf", "url": "x.wav", "address": "/synth/sf",
                  "index": 12 },
                { "type": "hbargraph", "label": "level", "address": "/synth/level", "index": 16,
                  "min": 0, "max": 1 }
            ]
        }]
    }"#;

    #[test]
    fn parses_tree() {
        let d = DspDescriptor::from_json(SYNTH_JSON).unwrap();
        assert_eq!(d.name, "synth");
        assert_eq!(d.size, 24);
        assert_eq!(d.outputs, 2);
        let group = d.ui[0].group().unwrap();
        assert_eq!(group.items.len(), 5);
        assert_eq!(group.items[0].role(), ItemRole::Input);
        assert_eq!(group.items[3].role(), ItemRole::Ignored);
        assert_eq!(group.items[4].role(), ItemRole::Output);
        let volume = group.items[2].control().unwrap();
        assert_eq!(volume.meta_values("midi").collect::<Vec<_>>(), ["ctrl 7"]);
    }

    #[test]
    fn button_range_defaults_to_unit_interval() {
        let d = DspDescriptor::from_json(SYNTH_JSON).unwrap();
        let gate = d.ui[0].group().unwrap().items[1].control().unwrap();
        assert_eq!(gate.range(), (0.0, 1.0));
    }

    #[test]
    fn keeps_unknown_header_fields() {
        let d = DspDescriptor::from_json(SYNTH_JSON).unwrap();
        let text = d.to_json().unwrap();
        let again = DspDescriptor::from_json(&text).unwrap();
        assert_eq!(again.extra.get("compile_options").and_then(|v| v.as_str()), Some("-lang wasm"));
        assert_eq!(again.ui[0].group().unwrap().items[2], d.ui[0].group().unwrap().items[2]);
    }

    #[test]
    fn reserialized_json_keeps_every_source_field() {
        let source: Value = serde_json::from_str(SYNTH_JSON).unwrap();
        let d = DspDescriptor::from_json(SYNTH_JSON).unwrap();
        let written: Value = serde_json::from_str(&d.to_json().unwrap()).unwrap();

        let items = |doc: &Value| doc["ui"][0]["items"].as_array().unwrap().clone();
        let (before, after) = (items(&source), items(&written));
        assert_eq!(after.len(), before.len());
        // the soundfile node is carried through untouched
        assert_eq!(after[3], before[3]);
        for (a, b) in before.iter().zip(&after) {
            let keys = |v: &Value| v.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
            assert_eq!(keys(a), keys(b));
            assert_eq!(a["type"], b["type"]);
            assert_eq!(a["address"], b["address"]);
        }
        assert_eq!(written["compile_options"], source["compile_options"]);
    }

    #[test]
    fn unread_control_and_group_fields_survive() {
        let text = r#"{ "name": "s", "size": 8, "ui": [{ "type": "hgroup", "label": "s",
            "collapsed": true, "items": [
                { "type": "hslider", "label": "cut", "shortname": "cutoff",
                  "address": "/s/cut", "index": 0, "min": 0, "max": 1 }
            ]}]}"#;
        let d = DspDescriptor::from_json(text).unwrap();
        let group = d.ui[0].group().unwrap();
        assert_eq!(group.extra.get("collapsed"), Some(&Value::Bool(true)));
        let cut = group.items[0].control().unwrap();
        assert_eq!(cut.extra.get("shortname").and_then(Value::as_str), Some("cutoff"));

        let written: Value = serde_json::from_str(&d.to_json().unwrap()).unwrap();
        assert_eq!(written["ui"][0]["type"], "hgroup");
        assert_eq!(written["ui"][0]["collapsed"], true);
        assert_eq!(written["ui"][0]["items"][0]["shortname"], "cutoff");
        assert_eq!(written["ui"][0]["items"][0]["type"], "hslider");
    }

    #[test]
    fn malformed_json_reports_position() {
        let err = DspDescriptor::from_json("{\n  \"name\": }").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.column > 0);
    }
}
