//! Track player - plays a preloaded stereo buffer

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use super::PlaybackSource;
use crate::types::{PlayState, StereoBuffer, StereoSample};

/// Lock-free transport state for UI access
///
/// Written by the audio thread after each render, read by the UI with
/// relaxed loads (visibility only, nothing synchronizes on these).
#[derive(Debug, Default)]
pub struct PlayerAtomics {
    position: AtomicU64,
    playing: AtomicBool,
    loaded: AtomicBool,
}

impl PlayerAtomics {
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }
}

/// The default internal source of a channel
///
/// Track data is a `basedrop::Shared` so replacing or unloading it on the
/// audio thread never frees memory there.
pub struct TrackPlayer {
    track: Option<Shared<StereoBuffer>>,
    /// Playhead in frames
    position: usize,
    state: PlayState,
    atomics: Arc<PlayerAtomics>,
}

impl TrackPlayer {
    pub fn new() -> Self {
        Self {
            track: None,
            position: 0,
            state: PlayState::Stopped,
            atomics: Arc::new(PlayerAtomics::default()),
        }
    }

    /// Lock-free state the UI can clone once and poll
    pub fn atomics(&self) -> Arc<PlayerAtomics> {
        Arc::clone(&self.atomics)
    }

    /// Load a track, stopped at the start. The previous track (if any) is
    /// handed to the GC thread.
    pub fn load(&mut self, track: Shared<StereoBuffer>) {
        self.track = Some(track);
        self.position = 0;
        self.state = PlayState::Stopped;
        self.sync_atomics();
    }

    pub fn unload(&mut self) {
        self.track = None;
        self.position = 0;
        self.state = PlayState::Stopped;
        self.sync_atomics();
    }

    pub fn track_len(&self) -> usize {
        self.track.as_ref().map(|t| t.len()).unwrap_or(0)
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Start playback (no-op without a track)
    pub fn play(&mut self) {
        if self.track.is_some() {
            self.state = PlayState::Playing;
            self.sync_atomics();
        }
    }

    pub fn pause(&mut self) {
        self.state = PlayState::Stopped;
        self.sync_atomics();
    }

    pub fn toggle_play(&mut self) {
        match self.state {
            PlayState::Playing => self.pause(),
            PlayState::Stopped => self.play(),
        }
    }

    /// Move the playhead, clamped to the track
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.track_len());
        self.sync_atomics();
    }

    fn sync_atomics(&self) {
        self.atomics
            .position
            .store(self.position as u64, Ordering::Relaxed);
        self.atomics
            .playing
            .store(self.state == PlayState::Playing, Ordering::Relaxed);
        self.atomics
            .loaded
            .store(self.track.is_some(), Ordering::Relaxed);
    }
}

impl Default for TrackPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSource for TrackPlayer {
    fn render(&mut self, output: &mut StereoBuffer) {
        let Some(track) = &self.track else {
            output.fill_silence();
            return;
        };

        // Stopped outputs silence rather than repeating the last buffer
        if self.state == PlayState::Stopped {
            output.fill_silence();
            return;
        }

        let source = &track[..];
        let available = source.len().saturating_sub(self.position);
        let count = output.len().min(available);
        let out = &mut output[..];
        out[..count].copy_from_slice(&source[self.position..self.position + count]);
        out[count..].fill(StereoSample::silence());

        self.position += count;
        if self.position >= source.len() {
            self.state = PlayState::Stopped;
        }
        self.sync_atomics();
    }

    fn is_loaded(&self) -> bool {
        self.track.is_some()
    }
}
