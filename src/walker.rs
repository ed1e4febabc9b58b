//! UI walker: flattens control trees into the lookup tables engines run on.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::ui::{ItemRole, UiControl, UiItem};

/// Number of MIDI continuous controllers.
pub const MIDI_CONTROLLERS: usize = 128;

/// Depth-first traversal: groups recurse, every other node is visited.
pub fn walk<F: FnMut(&UiItem)>(items: &[UiItem], visit: &mut F) {
    for item in items {
        match item.group() {
            Some(group) => walk(&group.items, visit),
            None => visit(item),
        }
    }
}

/// Whether any leaf of the tree has exactly `path` as its address.
pub fn contains_path(items: &[UiItem], path: &str) -> bool {
    items.iter().any(|item| match item.group() {
        Some(group) => contains_path(&group.items, path),
        None => item.control().is_some_and(|c| c.address == path),
    })
}

/// What a `midi` metadata value binds a control to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiBinding {
    PitchWheel,
    Controller(u8),
}

/// Parse `pitchwheel` or `ctrl <N>` (trimmed, case-insensitive).
pub fn parse_midi_binding(text: &str) -> Option<MidiBinding> {
    let text = text.trim().to_ascii_lowercase();
    if text == "pitchwheel" {
        return Some(MidiBinding::PitchWheel);
    }
    let rest = text.strip_prefix("ctrl")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let number = rest.split_whitespace().next()?;
    match number.parse::<u8>() {
        Ok(n) if (n as usize) < MIDI_CONTROLLERS => Some(MidiBinding::Controller(n)),
        _ => None,
    }
}

/// A control driven by a MIDI controller or the pitch wheel.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiMapping {
    pub path: Arc<str>,
    pub min: f32,
    pub max: f32,
}

/// Path lists, path table, and MIDI mappings derived from one or more UI trees.
#[derive(Debug, Clone)]
pub struct ParamTables {
    inputs: Vec<Arc<str>>,
    outputs: Vec<Arc<str>>,
    paths: HashMap<Arc<str>, u32>,
    controllers: Vec<Vec<MidiMapping>>,
    pitch_wheel: Vec<MidiMapping>,
}

impl Default for ParamTables {
    fn default() -> Self {
        ParamTables {
            inputs: Vec::new(),
            outputs: Vec::new(),
            paths: HashMap::new(),
            controllers: vec![Vec::new(); MIDI_CONTROLLERS],
            pitch_wheel: Vec::new(),
        }
    }
}

impl ParamTables {
    /// Build tables from a single tree.
    pub fn from_ui(items: &[UiItem]) -> Self {
        let mut tables = ParamTables::default();
        tables.add_ui(items);
        tables
    }

    /// Append every leaf of `items`, in traversal order.
    pub fn add_ui(&mut self, items: &[UiItem]) {
        walk(items, &mut |item| {
            let Some(control) = item.control() else {
                return;
            };
            match item.role() {
                ItemRole::Input => self.add_input(control),
                ItemRole::Output => {
                    let path = self.insert_path(control);
                    self.outputs.push(path);
                }
                ItemRole::Group | ItemRole::Ignored => {}
            }
        });
    }

    fn add_input(&mut self, control: &UiControl) {
        let path = self.insert_path(control);
        self.inputs.push(path.clone());
        let (min, max) = control.range();
        for binding in control.meta_values("midi").filter_map(parse_midi_binding) {
            let mapping = MidiMapping { path: path.clone(), min, max };
            match binding {
                MidiBinding::PitchWheel => self.pitch_wheel.push(mapping),
                MidiBinding::Controller(n) => self.controllers[n as usize].push(mapping),
            }
        }
    }

    fn insert_path(&mut self, control: &UiControl) -> Arc<str> {
        let path: Arc<str> = Arc::from(control.address.as_str());
        if let Some(previous) = self.paths.insert(path.clone(), control.index) {
            log::warn!(
                "duplicate parameter path {} (index {} replaced by {})",
                path,
                previous,
                control.index
            );
        }
        path
    }

    /// Ordered input (control) paths.
    pub fn inputs(&self) -> &[Arc<str>] {
        &self.inputs
    }

    /// Ordered output (bargraph) paths.
    pub fn outputs(&self) -> &[Arc<str>] {
        &self.outputs
    }

    pub fn index_of(&self, path: &str) -> Option<u32> {
        self.paths.get(path).copied()
    }

    /// The table's shared copy of `path`, if known.
    pub fn shared_path(&self, path: &str) -> Option<&Arc<str>> {
        self.paths.get_key_value(path).map(|(k, _)| k)
    }

    /// Mappings registered under controller `ctrl`.
    pub fn controller(&self, ctrl: u8) -> &[MidiMapping] {
        self.controllers
            .get(ctrl as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn pitch_wheel(&self) -> &[MidiMapping] {
        &self.pitch_wheel
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Owned, serializable view for inspection from JS.
    pub fn summary(&self) -> ParamSummary {
        let summarize = |mappings: &[MidiMapping]| -> Vec<MappingSummary> {
            mappings
                .iter()
                .map(|m| MappingSummary { path: m.path.to_string(), min: m.min, max: m.max })
                .collect()
        };
        ParamSummary {
            inputs: self.inputs.iter().map(|p| p.to_string()).collect(),
            outputs: self.outputs.iter().map(|p| p.to_string()).collect(),
            paths: self.paths.iter().map(|(p, i)| (p.to_string(), *i)).collect(),
            controllers: self
                .controllers
                .iter()
                .enumerate()
                .filter(|(_, m)| !m.is_empty())
                .map(|(ctrl, m)| (ctrl as u8, summarize(m)))
                .collect(),
            pitch_wheel: summarize(&self.pitch_wheel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingSummary {
    pub path: String,
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSummary {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub paths: BTreeMap<String, u32>,
    /// Controller number to the controls it drives; unmapped controllers are omitted.
    pub controllers: BTreeMap<u8, Vec<MappingSummary>>,
    pub pitch_wheel: Vec<MappingSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::DspDescriptor;

    fn descriptor() -> DspDescriptor {
        DspDescriptor::from_json(
            r#"{
            "name": "organ", "size": 32, "outputs": 1,
            "ui": [{ "type": "vgroup", "label": "organ", "items": [
                { "type": "hslider", "label": "freq", "address": "/organ/freq", "index": 0,
                  "min": 20, "max": 2000 },
                { "type": "hgroup", "label": "mod", "items": [
                    { "type": "hslider", "label": "bend", "address": "/organ/mod/bend", "index": 4,
                      "min": -2, "max": 2, "meta": [{ "midi": " PitchWheel " }] },
                    { "type": "nentry", "label": "depth", "address": "/organ/mod/depth", "index": 8,
                      "min": 0, "max": 1, "meta": [{ "midi": "ctrl 1" }, { "unit": "%" }] },
                    { "type": "checkbox", "label": "hold", "address": "/organ/mod/hold",
                      "index": 12,
                      "meta": [{ "midi": "ctrl 1" }] }
                ]},
                { "type": "vbargraph", "label": "meter", "address": "/organ/meter", "index": 16,
                  "min": 0, "max": 1 },
                { "type": "button", "label": "bad", "address": "/organ/bad", "index": 20,
                  "meta": [{ "midi": "ctrl 300" }, { "midi": "ctrlx 3" }, { "midi": 7 }] }
            ]}]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn collects_inputs_and_outputs_in_order() {
        let t = ParamTables::from_ui(&descriptor().ui);
        let inputs: Vec<&str> = t.inputs().iter().map(|p| &**p).collect();
        assert_eq!(
            inputs,
            ["/organ/freq", "/organ/mod/bend", "/organ/mod/depth", "/organ/mod/hold", "/organ/bad"]
        );
        assert_eq!(&*t.outputs()[0], "/organ/meter");
        assert_eq!(t.len(), 6);
    }

    #[test]
    fn every_path_resolves_to_its_declared_index() {
        let d = descriptor();
        let t = ParamTables::from_ui(&d.ui);
        walk(&d.ui, &mut |item| {
            if let Some(c) = item.control() {
                assert_eq!(t.index_of(&c.address), Some(c.index));
            }
        });
        assert_eq!(t.index_of("/organ/missing"), None);
    }

    #[test]
    fn midi_metadata_is_collected() {
        let t = ParamTables::from_ui(&descriptor().ui);
        assert_eq!(
            t.pitch_wheel(),
            &[MidiMapping { path: Arc::from("/organ/mod/bend"), min: -2.0, max: 2.0 }]
        );
        let ctrl1 = t.controller(1);
        assert_eq!(ctrl1.len(), 2);
        assert_eq!(&*ctrl1[1].path, "/organ/mod/hold");
        assert_eq!((ctrl1[1].min, ctrl1[1].max), (0.0, 1.0));
        assert!(t.controller(3).is_empty());
        assert!(t.controller(200).is_empty());
    }

    #[test]
    fn parses_bindings() {
        assert_eq!(parse_midi_binding("pitchwheel"), Some(MidiBinding::PitchWheel));
        assert_eq!(parse_midi_binding(" CTRL 64 "), Some(MidiBinding::Controller(64)));
        assert_eq!(parse_midi_binding("ctrl 7 2"), Some(MidiBinding::Controller(7)));
        assert_eq!(parse_midi_binding("ctrl 128"), None);
        assert_eq!(parse_midi_binding("ctrl7"), None);
        assert_eq!(parse_midi_binding("keyon 60"), None);
    }

    #[test]
    fn summary_lists_only_mapped_controllers() {
        let s = ParamTables::from_ui(&descriptor().ui).summary();
        assert_eq!(s.controllers.keys().copied().collect::<Vec<u8>>(), [1]);
        assert_eq!(s.pitch_wheel[0].path, "/organ/mod/bend");
        assert_eq!(s.paths["/organ/meter"], 16);
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("pitchWheel").is_some());
    }

    #[test]
    fn membership_is_exact() {
        let d = descriptor();
        assert!(contains_path(&d.ui, "/organ/mod/depth"));
        assert!(contains_path(&d.ui, "/organ/meter"));
        assert!(!contains_path(&d.ui, "/organ/mod"));
        assert!(!contains_path(&d.ui, "/organ/mod/dep"));
    }
}
