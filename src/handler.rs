//! Observers notified while a file is being read.

use crate::{
    chunk::TrackChunk,
    event::TrackEvent,
    primitive::Timing,
    smf::MidiFile,
};
use bitflags::bitflags;

bitflags! {
    /// The groups of callbacks a [`ReadingHandler`](trait.ReadingHandler.html) receives.
    pub struct HandlerScope: u8 {
        /// File start, header and file end.
        const FILE = 1 << 0;
        /// Track chunk start, content start and end.
        const TRACK_CHUNK = 1 << 1;
        /// Every event stored in a track chunk.
        const EVENT = 1 << 2;
    }
}

/// Receives notifications while a MIDI file is read.
///
/// Only the callbacks within [`scope`](#tymethod.scope) are ever called. All callbacks do
/// nothing by default.
pub trait ReadingHandler {
    fn scope(&self) -> HandlerScope;

    fn on_start_file_reading(&mut self) {}

    /// Called with the timing and the declared track count of the first header chunk.
    fn on_finish_header_chunk_reading(&mut self, _timing: Timing, _track_count: u16) {}

    /// Called after the `MTrk` id was read.
    fn on_start_track_chunk_reading(&mut self) {}

    /// Called before the first event of a track chunk is read.
    fn on_start_track_chunk_content_reading(&mut self, _track: &TrackChunk) {}

    /// Called with each stored event and its absolute time in ticks.
    fn on_finish_event_reading(&mut self, _event: &TrackEvent, _absolute_time: u64) {}

    fn on_finish_track_chunk_reading(&mut self, _track: &TrackChunk) {}

    fn on_finish_file_reading(&mut self, _file: &MidiFile) {}
}

/// Dispatches notifications to the handlers whose scope covers them.
pub(crate) struct Handlers<'h, 'a> {
    handlers: &'h mut [&'a mut dyn ReadingHandler],
    scope: HandlerScope,
}
impl<'h, 'a> Handlers<'h, 'a> {
    pub(crate) fn new(handlers: &'h mut [&'a mut dyn ReadingHandler]) -> Handlers<'h, 'a> {
        let scope = handlers
            .iter()
            .fold(HandlerScope::empty(), |scope, h| scope | h.scope());
        Handlers { handlers, scope }
    }

    /// Whether any handler wants callbacks of this scope.
    #[inline]
    pub(crate) fn wants(&self, scope: HandlerScope) -> bool {
        self.scope.intersects(scope)
    }

    pub(crate) fn notify<F>(&mut self, scope: HandlerScope, mut f: F)
    where
        F: FnMut(&mut dyn ReadingHandler),
    {
        if !self.wants(scope) {
            return;
        }
        for handler in self.handlers.iter_mut() {
            if handler.scope().contains(scope) {
                f(&mut **handler);
            }
        }
    }
}
