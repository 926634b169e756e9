//! Generic sequence player
//!
//! [`SequencePlayer`] turns the scheduler's ticks into output frames and feeds
//! the resulting control calls to a sampler instance. The format-specific part
//! (how controllers map onto the sampler, what happens on reset) lives in a
//! [`SequenceDriver`].

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, trace};
use ma3_sampler::{RenderOptions, SamplerBackend, SamplerError, SamplerFactory};

use super::{PlayerEvent, PlayerEventKind, SongPlayer};
use crate::scheduler::{ScheduleSink, Scheduler, Step};
use crate::song::{Control, Song};
use crate::Result;

/// Format-specific half of a player
pub trait SequenceDriver: Default + Send {
    /// Whether loop cuepoints jump back
    const LOOPS: bool;

    /// Prepare a freshly reset instance for the song
    fn setup<B: SamplerBackend>(&mut self, song: &Song, instance: &mut B);

    /// Apply a controller event (tempo is handled by the scheduler)
    fn control<B: SamplerBackend>(&mut self, control: &Control, instance: &mut B);
}

/// Routes scheduler side effects to the driver and instance
struct Dispatch<'a, D, B> {
    driver: &'a mut D,
    instance: &'a mut B,
    events: &'a mut Vec<PlayerEvent>,
    event_keys: &'a BTreeSet<i32>,
    notify: bool,
}

impl<D: SequenceDriver, B: SamplerBackend> ScheduleSink for Dispatch<'_, D, B> {
    fn key_on(&mut self, channel: usize, key: i32, velocity: f32) {
        self.instance.key_on(channel, key, velocity);
    }

    fn key_off(&mut self, channel: usize, key: i32) {
        self.instance.key_off(channel, key);
    }

    fn key_observed(&mut self, key: i32, time: f64) {
        if self.notify && self.event_keys.contains(&key) {
            self.events.push(PlayerEvent {
                time,
                kind: PlayerEventKind::Key,
                data: key,
            });
        }
    }

    fn control(&mut self, control: &Control) {
        trace!("control {control:?}");
        self.driver.control(control, &mut *self.instance);
    }

    fn ext_info(&mut self, data: &[u8]) {
        self.instance.sysex(data);
    }
}

/// Tick-accurate player for a decoded [`Song`]
///
/// # Rendering
///
/// Each processed tick adds `sample_rate / tick_rate` frames to a budget;
/// [`render`](Self::render) pays the budget out in sampler frames and only
/// advances the scheduler once less than one frame is owed. Notifications are
/// released once the frames before them have been rendered, and a released
/// notification stops rendering until [`take_events`](Self::take_events) is
/// called, so each event sits exactly at the end of the call that raised it.
///
/// A player and its instance must not be driven from two threads at once.
pub struct SequencePlayer<D: SequenceDriver, B: SamplerBackend> {
    song: Arc<Song>,
    driver: D,
    instance: B,
    scheduler: Scheduler,
    sample_rate: f64,
    /// Frames owed for ticks already processed
    budget: f64,
    finished: bool,
    loops: u32,
    /// Notifications waiting for the frames before them to be rendered
    queued: Vec<PlayerEvent>,
    events: Vec<PlayerEvent>,
    event_keys: BTreeSet<i32>,
    playback_events: bool,
}

impl<D: SequenceDriver, B: SamplerBackend> SequencePlayer<D, B> {
    /// Create a player with its own sampler instance
    ///
    /// # Errors
    ///
    /// Fails when the factory rejects the song's channel count or the sample rate.
    pub fn new<F>(song: Arc<Song>, factory: &F, sample_rate: f64) -> Result<Self>
    where
        F: SamplerFactory<Instance = B>,
    {
        let instance = factory.make_instance(song.channel_count.max(1), sample_rate)?;
        let scheduler = Scheduler::new(&song.tracks, song.initial_tick_rate, D::LOOPS);
        let mut player = Self {
            song,
            driver: D::default(),
            instance,
            scheduler,
            sample_rate,
            budget: 0.0,
            finished: false,
            loops: 0,
            queued: Vec::new(),
            events: Vec::new(),
            event_keys: BTreeSet::new(),
            playback_events: false,
        };
        player.reset();
        Ok(player)
    }

    /// The song being played
    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Output sample rate in Hz
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// The sampler instance
    pub fn instance(&self) -> &B {
        &self.instance
    }

    /// Mutable access to the sampler instance (extra SysEx, master volume)
    pub fn instance_mut(&mut self) -> &mut B {
        &mut self.instance
    }

    /// Number of loop-backs since the last reset
    pub fn loop_count(&self) -> u32 {
        self.loops
    }

    /// Current scheduler tick
    pub fn tick(&self) -> u64 {
        self.scheduler.tick()
    }

    /// Rewind to the start and restore the instance's initial state
    pub fn reset(&mut self) {
        self.instance.reset();
        self.driver.setup(&self.song, &mut self.instance);
        self.scheduler = Scheduler::new(&self.song.tracks, self.song.initial_tick_rate, D::LOOPS);
        self.budget = 0.0;
        self.finished = false;
        self.loops = 0;
        self.queued.clear();
        self.events.clear();
    }

    /// Playback position in seconds of rendered output
    pub fn time(&self) -> f64 {
        (self.scheduler.time() - self.budget / self.sample_rate).max(0.0)
    }

    /// True once the song has ended and every owed frame has been rendered
    pub fn is_finished(&self) -> bool {
        self.finished && self.budget < 1.0
    }

    /// Report `key` whenever a note event for it is read
    pub fn add_event_key(&mut self, key: i32) {
        self.event_keys.insert(key);
    }

    /// Stop reporting `key`
    pub fn remove_event_key(&mut self, key: i32) {
        self.event_keys.remove(&key);
    }

    /// Enable or disable End and Loop notifications
    pub fn set_playback_events_enabled(&mut self, enabled: bool) {
        self.playback_events = enabled;
    }

    /// Acknowledge and return pending notifications
    pub fn take_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Render interleaved stereo frames into `buffer[offset * 2..]`
    ///
    /// Returns `Some(frames)` with the number of frames written, which is less
    /// than `frames` when the song ended or a notification is waiting, and
    /// `None` once the song is finished and nothing was written.
    ///
    /// # Errors
    ///
    /// Invalid gains or a range outside the buffer.
    pub fn render(
        &mut self,
        buffer: &mut [f32],
        offset: usize,
        frames: usize,
        options: &RenderOptions,
    ) -> Result<Option<usize>> {
        options.validate()?;
        let in_bounds = offset
            .checked_add(frames)
            .is_some_and(|end| end.saturating_mul(2) <= buffer.len());
        if !in_bounds {
            return Err(SamplerError::InvalidRender(format!(
                "{frames} frames at offset {offset} exceed buffer of {} frames",
                buffer.len() / 2
            ))
            .into());
        }

        let mut produced = 0;
        while produced < frames {
            if self.budget >= 1.0 {
                let owed = self.budget.floor() as usize;
                let n = owed.min(frames - produced);
                self.instance.render(buffer, offset + produced, n, options)?;
                self.budget -= n as f64;
                produced += n;
                continue;
            }
            self.events.append(&mut self.queued);
            if !self.events.is_empty() || self.finished {
                break;
            }
            self.advance(true);
        }
        if self.budget < 1.0 {
            self.events.append(&mut self.queued);
        }

        if produced == 0 && self.finished {
            return Ok(None);
        }
        Ok(Some(produced))
    }

    /// Move the playback position to `seconds`
    ///
    /// Seeking backwards restarts from the top; both directions then
    /// fast-forward without synthesizing, applying every note and controller on
    /// the way. A target past the end of a looping song is folded into the
    /// loop. Returns true when the song ended before the target was reached.
    pub fn set_time(&mut self, seconds: f64) -> bool {
        let mut target = seconds.max(0.0);
        let info = &self.song.info;
        if let Some(loop_start) = info.loop_seconds.filter(|_| D::LOOPS) {
            let length = info.duration_seconds - loop_start;
            if length > 0.0 && target >= info.duration_seconds {
                target = loop_start + (target - loop_start) % length;
            }
        }

        if target < self.time() {
            self.reset();
        }
        // Seeking is silent; anything not yet released is skipped over
        self.queued.clear();
        debug!("seeking to {target:.3}s from {:.3}s", self.time());

        let mut loops_seen = 0;
        loop {
            let now = self.time();
            if now >= target {
                return false;
            }
            if self.budget >= 1.0 {
                let needed = ((target - now) * self.sample_rate).ceil().max(1.0);
                self.budget -= self.budget.floor().min(needed);
                continue;
            }
            if self.finished {
                return true;
            }
            if matches!(self.advance(false), Step::Looped(_)) {
                loops_seen += 1;
                if loops_seen > 1 {
                    return false;
                }
            }
        }
    }

    /// One scheduler step plus frame-budget bookkeeping
    fn advance(&mut self, notify: bool) -> Step {
        let rate = self.scheduler.tick_rate();
        let mut dispatch = Dispatch {
            driver: &mut self.driver,
            instance: &mut self.instance,
            events: &mut self.queued,
            event_keys: &self.event_keys,
            notify,
        };
        let step = self.scheduler.step(&self.song.tracks, &mut dispatch);

        match step {
            Step::Advanced(ticks) => self.pay_ticks(ticks, rate),
            Step::Looped(ticks) => {
                self.pay_ticks(ticks, rate);
                self.loops += 1;
                if notify && self.playback_events {
                    self.queued.push(PlayerEvent {
                        time: self.scheduler.time(),
                        kind: PlayerEventKind::Loop,
                        data: self.loops as i32,
                    });
                }
            }
            Step::Finished => {
                self.finished = true;
                if notify && self.playback_events {
                    self.queued.push(PlayerEvent {
                        time: self.scheduler.time(),
                        kind: PlayerEventKind::End,
                        data: 0,
                    });
                }
            }
        }
        step
    }

    /// Add the frames owed for `ticks` processed at `rate`
    fn pay_ticks(&mut self, ticks: u64, rate: f64) {
        self.budget += ticks as f64 * self.sample_rate / rate;
        let new_rate = self.scheduler.tick_rate();
        if new_rate != rate {
            // Only the unrendered fraction is stretched to the new tempo
            let whole = self.budget.floor();
            self.budget = whole + (self.budget - whole) * rate / new_rate;
            trace!("tempo change: {rate:.2} -> {new_rate:.2} ticks/s");
        }
    }
}

impl<D: SequenceDriver, B: SamplerBackend> SongPlayer for SequencePlayer<D, B> {
    fn render(
        &mut self,
        buffer: &mut [f32],
        offset: usize,
        frames: usize,
        options: &RenderOptions,
    ) -> Result<Option<usize>> {
        SequencePlayer::render(self, buffer, offset, frames, options)
    }

    fn set_time(&mut self, seconds: f64) -> bool {
        SequencePlayer::set_time(self, seconds)
    }

    fn time(&self) -> f64 {
        SequencePlayer::time(self)
    }

    fn is_finished(&self) -> bool {
        SequencePlayer::is_finished(self)
    }

    fn reset(&mut self) {
        SequencePlayer::reset(self);
    }

    fn add_event_key(&mut self, key: i32) {
        SequencePlayer::add_event_key(self, key);
    }

    fn remove_event_key(&mut self, key: i32) {
        SequencePlayer::remove_event_key(self, key);
    }

    fn set_playback_events_enabled(&mut self, enabled: bool) {
        SequencePlayer::set_playback_events_enabled(self, enabled);
    }

    fn take_events(&mut self) -> Vec<PlayerEvent> {
        SequencePlayer::take_events(self)
    }

    fn song(&self) -> &Song {
        SequencePlayer::song(self)
    }

    fn sample_rate(&self) -> f64 {
        SequencePlayer::sample_rate(self)
    }
}

impl<D: SequenceDriver + std::fmt::Debug, B: SamplerBackend> std::fmt::Debug
    for SequencePlayer<D, B>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequencePlayer")
            .field("format", &self.song.format)
            .field("driver", &self.driver)
            .field("tick", &self.scheduler.tick())
            .field("time", &self.time())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
