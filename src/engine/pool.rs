//! Fixed voice pool with oldest-first stealing.

use super::voice::{Voice, VoiceNote};

#[derive(Debug, Clone, Default)]
pub struct VoicePool {
    voices: Vec<Voice>,
    clock: u64,
}

impl VoicePool {
    pub fn new(voices: Vec<Voice>) -> Self {
        VoicePool { voices, clock: 0 }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Voice> {
        self.voices.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Reserve a voice: the first free one, else the oldest releasing one,
    /// else the oldest of all.
    pub fn allocate(&mut self) -> Option<usize> {
        let index = match self.voices.iter().position(|v| v.note() == VoiceNote::Free) {
            Some(index) => index,
            None => {
                let index = self
                    .oldest(|v| v.note() == VoiceNote::Releasing)
                    .or_else(|| self.oldest(|_| true))?;
                let stolen = &self.voices[index];
                log::debug!("stealing voice {index} ({:?}, date {})", stolen.note(), stolen.date());
                index
            }
        };
        self.clock += 1;
        self.voices[index].allocate(self.clock);
        Some(index)
    }

    /// The oldest voice currently playing `pitch`.
    pub fn playing_voice(&self, pitch: u8) -> Option<usize> {
        self.oldest(|v| v.note() == VoiceNote::Playing(pitch))
    }

    fn oldest(&self, filter: impl Fn(&Voice) -> bool) -> Option<usize> {
        self.voices
            .iter()
            .enumerate()
            .filter(|&(_, v)| filter(v))
            .min_by_key(|(_, v)| v.date())
            .map(|(i, _)| i)
    }
}
