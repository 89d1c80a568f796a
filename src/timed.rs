//! Absolute-time views over delta-timed tracks.
//!
//! Tracks store events with delta times. The functions here merge one or more tracks into a
//! single sequence of [`TimedEvent`]s ordered by absolute time, and commit edits made to that
//! sequence back into delta-timed tracks.
//!
//! Merged sequences are ordered by time, then by track index, then by the optional
//! same-time comparison, and finally by the original order within each track.

use crate::{
    chunk::TrackChunk,
    event::{TrackEvent, TrackEventKind},
    prelude::*,
    smf::MidiFile,
};
use std::{cmp::Reverse, collections::BinaryHeap};

/// An event together with its absolute time.
#[derive(Clone, PartialEq, Debug)]
pub struct TimedEvent {
    /// Ticks since the start of the track.
    pub time: u64,
    pub event: TrackEventKind,
    /// Index of the track the event comes from, among the tracks it was derived from.
    ///
    /// Changing it has no effect when the event is committed back.
    pub track_index: usize,
}
impl TimedEvent {
    #[inline]
    pub fn new(time: u64, event: TrackEventKind) -> TimedEvent {
        TimedEvent {
            time,
            event,
            track_index: 0,
        }
    }
}

/// What a timed event constructor gets to see.
#[derive(Copy, Clone, Debug)]
pub struct TimedEventData<'a> {
    pub event: &'a TrackEventKind,
    pub time: u64,
    pub track_index: usize,
    /// Index of the event within its track.
    pub event_index: usize,
}

/// Builds the timed event for a track event, or excludes the event by returning `None`.
pub type TimedEventConstructor =
    Arc<dyn Fn(TimedEventData<'_>) -> Option<TimedEvent> + Send + Sync>;

/// Orders events that share the same time and track.
pub type SameTimeComparison =
    Arc<dyn Fn(&TimedEvent, &TimedEvent) -> cmp::Ordering + Send + Sync>;

/// Controls how timed events are derived from tracks.
#[derive(Clone, Default)]
pub struct TimedEventDetectionSettings {
    /// Replaces the default construction, which wraps the event as is.
    ///
    /// Excluded events are not part of derived views. When processing they are deleted from
    /// their track; when removing they are never matched and stay in place.
    pub constructor: Option<TimedEventConstructor>,
    pub same_time_comparison: Option<SameTimeComparison>,
}
impl fmt::Debug for TimedEventDetectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimedEventDetectionSettings")
            .field("constructor", &self.constructor.is_some())
            .field("same_time_comparison", &self.same_time_comparison.is_some())
            .finish()
    }
}

/// Whether processing callbacks may change event times.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TimedEventProcessingHint {
    /// Times are not expected to change. Tracks keep their original order and delta times,
    /// even if a time was modified.
    None,
    /// Tracks where a time changed are re-sorted and get their delta times recomputed.
    TimeCanBeChanged,
}
impl Default for TimedEventProcessingHint {
    fn default() -> TimedEventProcessingHint {
        TimedEventProcessingHint::TimeCanBeChanged
    }
}

/// Position of a processed event in the visiting order.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct EventIndices {
    /// Index among all visited events.
    pub total: usize,
    /// Index among the events matched by the predicate.
    pub matched: usize,
}

/// Visit the events of several tracks in absolute time order.
///
/// Returns `(time, track index, event index)` triples. Ties in time go to the lower track
/// index, and events of the same track keep their relative order.
fn merged_order<'a>(tracks: impl Iterator<Item = &'a [TrackEvent]>) -> Vec<(u64, usize, usize)> {
    let tracks: Vec<&[TrackEvent]> = tracks.collect();
    let mut order = Vec::with_capacity(tracks.iter().map(|t| t.len()).sum());
    let mut cursors = vec![0; tracks.len()];
    let mut ev_heap = BinaryHeap::with_capacity(tracks.len());
    for (track_idx, track) in tracks.iter().enumerate() {
        if let Some(ev) = track.first() {
            ev_heap.push(Reverse((ev.delta, track_idx)));
        }
    }
    while let Some(Reverse((time, track_idx))) = ev_heap.pop() {
        let cur_idx = cursors[track_idx];
        order.push((time, track_idx, cur_idx));
        cursors[track_idx] += 1;
        if let Some(ev) = tracks[track_idx].get(cur_idx + 1) {
            ev_heap.push(Reverse((time.saturating_add(ev.delta), track_idx)));
        }
    }
    order
}

/// A derived event along with where it came from.
struct Entry {
    timed: TimedEvent,
    track: usize,
    index: usize,
    original_time: u64,
}

/// Apply the same-time comparison to runs of entries sharing their original time and track.
fn order_same_time(entries: &mut [Entry], settings: &TimedEventDetectionSettings) {
    let compare = match &settings.same_time_comparison {
        Some(compare) => compare,
        None => return,
    };
    let mut start = 0;
    while start < entries.len() {
        let key = (entries[start].original_time, entries[start].track);
        let len = entries[start..]
            .iter()
            .take_while(|e| (e.original_time, e.track) == key)
            .count();
        entries[start..start + len].sort_by(|a, b| compare(&a.timed, &b.timed));
        start += len;
    }
}

fn construct(
    settings: &TimedEventDetectionSettings,
    kind: &TrackEventKind,
    time: u64,
    track_index: usize,
    event_index: usize,
) -> Option<TimedEvent> {
    match &settings.constructor {
        Some(constructor) => constructor(TimedEventData {
            event: kind,
            time,
            track_index,
            event_index,
        })
        .map(|mut timed| {
            timed.track_index = track_index;
            timed
        }),
        None => Some(TimedEvent {
            time,
            event: kind.clone(),
            track_index,
        }),
    }
}

/// Derive the merged absolute-time view of the given tracks.
///
/// The returned events are copies; modifying them does not affect the tracks.
pub fn get_timed_events<'a, I>(tracks: I, settings: &TimedEventDetectionSettings) -> Vec<TimedEvent>
where
    I: IntoIterator<Item = &'a TrackChunk>,
{
    let tracks: Vec<&TrackChunk> = tracks.into_iter().collect();
    let mut entries: Vec<Entry> = merged_order(tracks.iter().map(|t| &t.events[..]))
        .into_iter()
        .filter_map(|(time, track, index)| {
            let kind = &tracks[track].events[index].kind;
            construct(settings, kind, time, track, index).map(|timed| Entry {
                timed,
                track,
                index,
                original_time: time,
            })
        })
        .collect();
    order_same_time(&mut entries, settings);
    entries.into_iter().map(|e| e.timed).collect()
}

/// Convert timed events into delta-timed events, sorting them by time.
///
/// The sort is stable, so events sharing a time keep their relative order.
pub fn to_track_events<I>(timed: I) -> Vec<TrackEvent>
where
    I: IntoIterator<Item = TimedEvent>,
{
    let mut timed: Vec<TimedEvent> = timed.into_iter().collect();
    timed.sort_by_key(|ev| ev.time);
    let mut last = 0;
    timed
        .into_iter()
        .map(|ev| {
            let delta = ev.time - last;
            last = ev.time;
            TrackEvent::new(delta, ev.event)
        })
        .collect()
}

/// Merge several tracks into a single track, preserving absolute times.
pub fn merge_tracks<'a, I>(tracks: I, settings: &TimedEventDetectionSettings) -> TrackChunk
where
    I: IntoIterator<Item = &'a TrackChunk>,
{
    TrackChunk::new(to_track_events(get_timed_events(tracks, settings)))
}

/// Run `action` on every event of the tracks, in merged order, and commit the results.
///
/// Returns the number of visited events.
pub fn process_timed_events<'a, I, F>(
    tracks: I,
    settings: &TimedEventDetectionSettings,
    hint: TimedEventProcessingHint,
    mut action: F,
) -> usize
where
    I: IntoIterator<Item = &'a mut TrackChunk>,
    F: FnMut(&mut TimedEvent),
{
    process_timed_events_indexed(tracks, settings, hint, |_| true, |ev, _| action(ev))
}

/// Run `action` on every event matching `predicate`, in merged order, and commit the results.
///
/// Returns the number of matched events.
pub fn process_timed_events_where<'a, I, P, F>(
    tracks: I,
    settings: &TimedEventDetectionSettings,
    hint: TimedEventProcessingHint,
    predicate: P,
    mut action: F,
) -> usize
where
    I: IntoIterator<Item = &'a mut TrackChunk>,
    P: FnMut(&TimedEvent) -> bool,
    F: FnMut(&mut TimedEvent),
{
    process_timed_events_indexed(tracks, settings, hint, predicate, |ev, _| action(ev))
}

/// Like [`process_timed_events_where`](fn.process_timed_events_where.html), also passing the
/// position of each matched event to `action`.
///
/// Events are moved out of their tracks while being processed, and moved back on commit.
/// When the hint allows time changes, every track where a time changed is stably sorted by
/// time and gets its delta times recomputed. Otherwise events go back in their original
/// order, keeping their original absolute times.
pub fn process_timed_events_indexed<'a, I, P, F>(
    tracks: I,
    settings: &TimedEventDetectionSettings,
    hint: TimedEventProcessingHint,
    mut predicate: P,
    mut action: F,
) -> usize
where
    I: IntoIterator<Item = &'a mut TrackChunk>,
    P: FnMut(&TimedEvent) -> bool,
    F: FnMut(&mut TimedEvent, EventIndices),
{
    let mut tracks: Vec<&mut TrackChunk> = tracks.into_iter().collect();
    let order = merged_order(tracks.iter().map(|t| &t.events[..]));
    let mut taken: Vec<Vec<Option<TrackEventKind>>> = tracks
        .iter_mut()
        .map(|t| {
            mem::take(&mut t.events)
                .into_iter()
                .map(|ev| Some(ev.kind))
                .collect()
        })
        .collect();

    let mut entries = Vec::with_capacity(order.len());
    for (time, track, index) in order {
        let kind = match taken[track][index].take() {
            Some(kind) => kind,
            None => continue,
        };
        let timed = match &settings.constructor {
            Some(_) => construct(settings, &kind, time, track, index),
            None => Some(TimedEvent {
                time,
                event: kind,
                track_index: track,
            }),
        };
        //Events excluded by the constructor are dropped from their track
        if let Some(timed) = timed {
            entries.push(Entry {
                timed,
                track,
                index,
                original_time: time,
            });
        }
    }
    order_same_time(&mut entries, settings);

    let mut matched = 0;
    let mut time_changed = vec![false; tracks.len()];
    for (total, entry) in entries.iter_mut().enumerate() {
        if !predicate(&entry.timed) {
            continue;
        }
        action(&mut entry.timed, EventIndices { total, matched });
        matched += 1;
        if entry.timed.time != entry.original_time {
            time_changed[entry.track] = true;
        }
    }

    //Commit
    let mut per_track: Vec<Vec<Entry>> = (0..tracks.len()).map(|_| Vec::new()).collect();
    for entry in entries {
        per_track[entry.track].push(entry);
    }
    for (track_idx, mut entries) in per_track.into_iter().enumerate() {
        let events = if hint == TimedEventProcessingHint::TimeCanBeChanged
            && time_changed[track_idx]
        {
            to_track_events(entries.into_iter().map(|e| e.timed))
        } else {
            entries.sort_by_key(|e| e.index);
            let mut last = 0;
            entries
                .into_iter()
                .map(|e| {
                    let delta = e.original_time - last;
                    last = e.original_time;
                    TrackEvent::new(delta, e.timed.event)
                })
                .collect()
        };
        tracks[track_idx].events = events;
    }
    matched
}

/// Remove every event of the tracks, returning how many there were.
pub fn remove_timed_events<'a, I>(tracks: I) -> usize
where
    I: IntoIterator<Item = &'a mut TrackChunk>,
{
    tracks
        .into_iter()
        .map(|t| mem::take(&mut t.events).len())
        .sum()
}

/// Remove the events matching `predicate`, returning how many were removed.
///
/// The remaining events keep their absolute times.
pub fn remove_timed_events_where<'a, I, P>(
    tracks: I,
    settings: &TimedEventDetectionSettings,
    mut predicate: P,
) -> usize
where
    I: IntoIterator<Item = &'a mut TrackChunk>,
    P: FnMut(&TimedEvent) -> bool,
{
    let mut tracks: Vec<&mut TrackChunk> = tracks.into_iter().collect();
    let order = merged_order(tracks.iter().map(|t| &t.events[..]));
    let mut times: Vec<Vec<u64>> = tracks.iter().map(|t| vec![0; t.events.len()]).collect();
    let mut remove: Vec<Vec<bool>> = tracks.iter().map(|t| vec![false; t.events.len()]).collect();
    let mut removed = 0;
    for (time, track, index) in order {
        times[track][index] = time;
        let event = &mut tracks[track].events[index];
        let matched = match &settings.constructor {
            Some(_) => match construct(settings, &event.kind, time, track, index) {
                Some(timed) => predicate(&timed),
                None => false,
            },
            None => {
                //Lend the event to the predicate without cloning it
                let placeholder = TrackEventKind::SysEx(Vec::new());
                let timed = TimedEvent {
                    time,
                    event: mem::replace(&mut event.kind, placeholder),
                    track_index: track,
                };
                let matched = predicate(&timed);
                event.kind = timed.event;
                matched
            }
        };
        if matched {
            remove[track][index] = true;
            removed += 1;
        }
    }
    if removed == 0 {
        return 0;
    }
    for (track_idx, track) in tracks.iter_mut().enumerate() {
        let mut last = 0;
        let events = mem::take(&mut track.events);
        track.events = events
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !remove[track_idx][*index])
            .map(|(index, mut ev)| {
                let time = times[track_idx][index];
                ev.delta = time - last;
                last = time;
                ev
            })
            .collect();
    }
    removed
}

impl TrackChunk {
    /// The events of this track with their absolute times.
    pub fn timed_events(&self) -> Vec<TimedEvent> {
        get_timed_events(std::iter::once(self), &TimedEventDetectionSettings::default())
    }

    /// Build a track out of timed events, sorting them by time.
    pub fn from_timed_events<I: IntoIterator<Item = TimedEvent>>(timed: I) -> TrackChunk {
        TrackChunk::new(to_track_events(timed))
    }

    /// Run `action` on every event of this track, committing any time changes.
    pub fn process_timed_events<F: FnMut(&mut TimedEvent)>(&mut self, action: F) -> usize {
        process_timed_events(
            std::iter::once(self),
            &TimedEventDetectionSettings::default(),
            TimedEventProcessingHint::default(),
            action,
        )
    }

    /// Remove all events, returning how many there were.
    pub fn remove_timed_events(&mut self) -> usize {
        remove_timed_events(std::iter::once(self))
    }

    /// Remove the events matching `predicate`, keeping the absolute times of the others.
    pub fn remove_timed_events_where<P: FnMut(&TimedEvent) -> bool>(
        &mut self,
        predicate: P,
    ) -> usize {
        remove_timed_events_where(
            std::iter::once(self),
            &TimedEventDetectionSettings::default(),
            predicate,
        )
    }
}

impl MidiFile {
    /// The events of all track chunks, merged in absolute time order.
    pub fn timed_events(&self) -> Vec<TimedEvent> {
        get_timed_events(self.tracks(), &TimedEventDetectionSettings::default())
    }

    /// Run `action` on every event of every track chunk, committing any time changes.
    pub fn process_timed_events<F: FnMut(&mut TimedEvent)>(&mut self, action: F) -> usize {
        process_timed_events(
            self.tracks_mut(),
            &TimedEventDetectionSettings::default(),
            TimedEventProcessingHint::default(),
            action,
        )
    }

    pub fn remove_timed_events(&mut self) -> usize {
        remove_timed_events(self.tracks_mut())
    }

    /// Remove the events matching `predicate` from every track chunk.
    pub fn remove_timed_events_where<P: FnMut(&TimedEvent) -> bool>(
        &mut self,
        predicate: P,
    ) -> usize {
        remove_timed_events_where(
            self.tracks_mut(),
            &TimedEventDetectionSettings::default(),
            predicate,
        )
    }

    /// All track chunks merged into a single one.
    pub fn merged_track(&self) -> TrackChunk {
        merge_tracks(self.tracks(), &TimedEventDetectionSettings::default())
    }
}
