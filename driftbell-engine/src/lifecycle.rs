//! Bookkeeping for voices handed to a backend.
//!
//! The arena keeps one entry per accepted voice, tagged with its kind and
//! scheduled stop time, so the scheduler can fade every bell when CHORUS
//! begins and silence everything on stop. Entries live in generational slots:
//! a [`Slot`] taken before its entry was pruned never aliases a newer voice.
//!
//! Backend failures on individual handles are logged and swallowed. A voice
//! that already finished is not an error worth stopping the music for.

use tracing::warn;

use crate::backend::{AudioBackend, VoiceId, VoiceKind};

/// Stable reference to an arena entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    index: u32,
    generation: u32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrackedVoice {
    pub id: VoiceId,
    pub kind: VoiceKind,
    pub stop: f64,
}

#[derive(Debug, Default)]
struct Entry {
    generation: u32,
    voice: Option<TrackedVoice>,
}

#[derive(Debug, Default)]
pub struct VoiceArena {
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
}

impl VoiceArena {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline] pub fn len(&self) -> usize { self.live }
    #[inline] pub fn is_empty(&self) -> bool { self.live == 0 }

    pub fn insert(&mut self, voice: TrackedVoice) -> Slot {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let e = &mut self.entries[index as usize];
            e.voice = Some(voice);
            return Slot { index, generation: e.generation };
        }
        let index = self.entries.len() as u32;
        self.entries.push(Entry { generation: 0, voice: Some(voice) });
        Slot { index, generation: 0 }
    }

    pub fn remove(&mut self, slot: Slot) -> Option<TrackedVoice> {
        let e = self.entries.get_mut(slot.index as usize)?;
        if e.generation != slot.generation {
            return None;
        }
        let voice = e.voice.take()?;
        e.generation = e.generation.wrapping_add(1);
        self.free.push(slot.index);
        self.live -= 1;
        Some(voice)
    }

    fn slots(&self) -> impl Iterator<Item = (Slot, TrackedVoice)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            e.voice.map(|v| (Slot { index: i as u32, generation: e.generation }, v))
        })
    }

    /// Forget voices whose scheduled stop is at or before `now`.
    pub fn prune(&mut self, now: f64) -> usize {
        let done: Vec<Slot> = self.slots().filter(|(_, v)| v.stop <= now).map(|(s, _)| s).collect();
        for s in &done {
            self.remove(*s);
        }
        done.len()
    }

    /// Fade every tracked voice of `kind` from `at` over `over` seconds, and
    /// release it `release_after` seconds later. Faded voices leave the arena.
    pub fn fade_kind<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        kind: VoiceKind,
        at: f64,
        over: f64,
        release_after: f64,
    ) -> usize {
        let targets: Vec<Slot> = self
            .slots()
            .filter(|(_, v)| v.kind == kind && v.stop > at)
            .map(|(s, _)| s)
            .collect();
        for s in &targets {
            if let Some(v) = self.remove(*s) {
                fade_and_release(backend, v.id, at, over, release_after);
            }
        }
        targets.len()
    }

    pub fn fade_bells<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        at: f64,
        over: f64,
        release_after: f64,
    ) -> usize {
        self.fade_kind(backend, VoiceKind::Bell, at, over, release_after)
    }

    /// Fade everything still tracked and empty the arena.
    pub fn fade_all<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, at: f64, over: f64) {
        let all: Vec<Slot> = self.slots().map(|(s, _)| s).collect();
        for s in all {
            if let Some(v) = self.remove(s) {
                fade_and_release(backend, v.id, at, over, 0.0);
            }
        }
    }

    /// Stop everything immediately and empty the arena.
    pub fn release_all<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, at: f64) {
        let all: Vec<Slot> = self.slots().map(|(s, _)| s).collect();
        for s in all {
            if let Some(v) = self.remove(s) {
                if let Err(e) = backend.release(v.id, at) {
                    warn!(voice = ?v.id, error = %e, "release failed");
                }
            }
        }
    }
}

fn fade_and_release<B: AudioBackend + ?Sized>(
    backend: &mut B,
    id: VoiceId,
    at: f64,
    over: f64,
    release_after: f64,
) {
    if let Err(e) = backend.fade_out(id, at, over) {
        warn!(voice = ?id, error = %e, "fade failed");
        return;
    }
    if let Err(e) = backend.release(id, at + over + release_after) {
        warn!(voice = ?id, error = %e, "release failed");
    }
}
