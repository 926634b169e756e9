//! Tick scheduler shared by the decoders' timing scan and the players
//!
//! One scheduler walks every track of a song at once. Each step advances by
//! the smallest countdown among unfinished tracks and held notes, expires the
//! notes whose gate ran out, then processes every event due at the new tick.
//! What the events *do* is up to a [`ScheduleSink`]; the scheduler only keeps
//! the bookkeeping (cursors, held notes, tempo, loop point).

use log::trace;

use crate::song::{Control, Cue, Event, Track};

/// Receiver for the side effects of scheduled events
///
/// Every method defaults to doing nothing, so a timing scan can pass `&mut ()`.
pub(crate) trait ScheduleSink {
    /// A note started (or was retriggered)
    fn key_on(&mut self, _channel: usize, _key: i32, _velocity: f32) {}

    /// A note ended, by gate expiry or an explicit zero-velocity note
    fn key_off(&mut self, _channel: usize, _key: i32) {}

    /// A note event was read, before it takes effect
    fn key_observed(&mut self, _key: i32, _time: f64) {}

    /// A controller event was read (tempo already applied)
    fn control(&mut self, _control: &Control) {}

    /// A vendor exclusive payload was read
    fn ext_info(&mut self, _data: &[u8]) {}
}

impl ScheduleSink for () {}

/// Playback position inside one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrackCursor {
    /// Next event to process
    pub index: usize,
    /// Ticks until that event is due
    pub remaining: u64,
    pub finished: bool,
}

impl TrackCursor {
    fn start(track: &Track) -> Self {
        match track.events.first() {
            Some(first) => Self {
                index: 0,
                remaining: u64::from(first.delta),
                finished: false,
            },
            None => Self {
                index: 0,
                remaining: 0,
                finished: true,
            },
        }
    }
}

/// Note waiting for its automatic key-off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeldNote {
    pub channel: usize,
    pub key: i32,
    /// Ticks until key-off
    pub gate: u64,
}

#[derive(Debug, Clone)]
struct LoopPoint {
    cursors: Vec<TrackCursor>,
    tick: u64,
    time: f64,
    tick_rate: f64,
}

/// Outcome of one scheduling step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Time moved forward by this many ticks and the due events ran
    Advanced(u64),
    /// Time moved forward by this many ticks and a loop end was reached; the
    /// next step rewinds to the loop start
    Looped(u64),
    /// No track and no note is pending
    Finished,
}

/// Multi-track tick scheduler
#[derive(Debug, Clone)]
pub(crate) struct Scheduler {
    cursors: Vec<TrackCursor>,
    notes: Vec<HeldNote>,
    tick: u64,
    time: f64,
    tick_rate: f64,
    looping: bool,
    loop_point: Option<LoopPoint>,
    rewind_pending: bool,
}

impl Scheduler {
    /// Scheduler at the start of `tracks`
    ///
    /// `looping` enables cuepoint handling; without it cue events are skipped.
    pub fn new(tracks: &[Track], tick_rate: f64, looping: bool) -> Self {
        Self {
            cursors: tracks.iter().map(TrackCursor::start).collect(),
            notes: Vec::new(),
            tick: 0,
            time: 0.0,
            tick_rate,
            looping,
            loop_point: None,
            rewind_pending: false,
        }
    }

    /// Current tick
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Seconds elapsed at the current tick
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Ticks per second in effect
    pub fn tick_rate(&self) -> f64 {
        self.tick_rate
    }

    /// Notes still waiting for their key-off
    #[cfg(test)]
    pub fn held_notes(&self) -> &[HeldNote] {
        &self.notes
    }

    /// Tick and time of the recorded loop start
    pub fn loop_start(&self) -> Option<(u64, f64)> {
        self.loop_point.as_ref().map(|p| (p.tick, p.time))
    }

    /// True when no further step can produce anything
    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        !self.rewind_pending && self.notes.is_empty() && self.cursors.iter().all(|c| c.finished)
    }

    /// Advance to the next due event or note expiry
    pub fn step<S: ScheduleSink>(&mut self, tracks: &[Track], sink: &mut S) -> Step {
        let advanced = if self.rewind_pending {
            self.rewind();
            0
        } else {
            let track_min = self
                .cursors
                .iter()
                .filter(|c| !c.finished)
                .map(|c| c.remaining)
                .min();
            let note_min = self.notes.iter().map(|n| n.gate).min();
            let Some(ticks) = track_min.into_iter().chain(note_min).min() else {
                return Step::Finished;
            };

            for cursor in self.cursors.iter_mut().filter(|c| !c.finished) {
                cursor.remaining -= ticks;
            }
            for note in &mut self.notes {
                note.gate -= ticks;
            }
            self.tick += ticks;
            self.time += ticks as f64 / self.tick_rate;

            // Key-off goes out before the note leaves the table
            self.notes.retain(|note| {
                if note.gate == 0 {
                    sink.key_off(note.channel, note.key);
                    false
                } else {
                    true
                }
            });
            ticks
        };

        if self.process(tracks, sink) {
            Step::Looped(advanced)
        } else {
            Step::Advanced(advanced)
        }
    }

    fn rewind(&mut self) {
        self.rewind_pending = false;
        if let Some(point) = &self.loop_point {
            self.cursors.clone_from(&point.cursors);
            self.tick = point.tick;
            self.time = point.time;
            self.tick_rate = point.tick_rate;
        }
    }

    /// Run every event due now; returns true when a loop end was hit
    fn process<S: ScheduleSink>(&mut self, tracks: &[Track], sink: &mut S) -> bool {
        // Cursor state before this tick's events, used if a loop starts here
        let before = self.cursors.clone();

        for t in 0..self.cursors.len() {
            let Some(track) = tracks.get(t) else {
                self.cursors[t].finished = true;
                continue;
            };

            while !self.cursors[t].finished && self.cursors[t].remaining == 0 {
                let index = self.cursors[t].index;
                let Some(timed) = track.events.get(index) else {
                    self.cursors[t].finished = true;
                    break;
                };

                // Exactly one event per iteration, whatever the event does
                let cursor = &mut self.cursors[t];
                cursor.index += 1;
                match track.events.get(cursor.index) {
                    Some(next) => cursor.remaining = u64::from(next.delta),
                    None => cursor.finished = true,
                }

                match &timed.event {
                    Event::Note {
                        channel,
                        key,
                        gate,
                        velocity,
                    } => self.note(*channel, *key, u64::from(*gate), *velocity, sink),
                    Event::Control(control) => {
                        if let Some(rate) = control.tick_rate() {
                            self.tick_rate = rate;
                        }
                        sink.control(control);
                    }
                    Event::ExtInfo(data) => sink.ext_info(data),
                    Event::EndOfTrack => self.cursors[t].finished = true,
                    Event::Cuepoint(Cue::Start) if self.looping => {
                        let mut cursors = before.clone();
                        cursors[t] = self.cursors[t];
                        trace!("loop start at tick {} (track {t})", self.tick);
                        self.loop_point = Some(LoopPoint {
                            cursors,
                            tick: self.tick,
                            time: self.time,
                            tick_rate: self.tick_rate,
                        });
                    }
                    Event::Cuepoint(Cue::End) if self.looping => {
                        let armed = self
                            .loop_point
                            .as_ref()
                            .is_some_and(|point| self.tick > point.tick);
                        if armed {
                            trace!("loop end at tick {} (track {t})", self.tick);
                            self.rewind_pending = true;
                            return true;
                        }
                    }
                    Event::Cuepoint(_) | Event::Unknown { .. } => {}
                }
            }
        }
        false
    }

    fn note<S: ScheduleSink>(
        &mut self,
        channel: usize,
        key: i32,
        gate: u64,
        velocity: f32,
        sink: &mut S,
    ) {
        sink.key_observed(key, self.time);
        let held = self
            .notes
            .iter()
            .position(|n| n.channel == channel && n.key == key);

        if velocity <= 0.0 {
            if let Some(i) = held {
                self.notes.remove(i);
            }
            sink.key_off(channel, key);
            return;
        }

        sink.key_on(channel, key, velocity);
        match held {
            Some(i) => self.notes[i].gate = gate,
            None => self.notes.push(HeldNote { channel, key, gate }),
        }
    }
}

/// Length of a song as found by a dry run of the scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScanResult {
    pub total_ticks: u64,
    pub loop_tick: Option<u64>,
    pub loop_seconds: Option<f64>,
    pub duration_seconds: f64,
}

/// Run the scheduler without a sink until the song ends or first loops
///
/// Held notes count, so the total includes the gate tail of the last note.
pub(crate) fn scan(tracks: &[Track], tick_rate: f64, looping: bool) -> ScanResult {
    let mut scheduler = Scheduler::new(tracks, tick_rate, looping);
    loop {
        match scheduler.step(tracks, &mut ()) {
            Step::Advanced(_) => {}
            Step::Looped(_) => {
                let start = scheduler.loop_start();
                return ScanResult {
                    total_ticks: scheduler.tick(),
                    loop_tick: start.map(|(tick, _)| tick),
                    loop_seconds: start.map(|(_, time)| time),
                    duration_seconds: scheduler.time(),
                };
            }
            Step::Finished => {
                return ScanResult {
                    total_ticks: scheduler.tick(),
                    loop_tick: None,
                    loop_seconds: None,
                    duration_seconds: scheduler.time(),
                };
            }
        }
    }
}
