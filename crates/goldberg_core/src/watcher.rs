//! End-of-game detection
//!
//! The [`EndOfGameWatcher`] runs on the simulation tick. Every
//! [`WATCH_INTERVAL`] seconds of simulated time it samples the collectibles
//! and decides whether the run is won, lost, or still going. Verdicts are
//! sent over a channel tagged with the epoch of the run that produced them;
//! the owner drains the channel and ignores verdicts from cancelled runs.

use std::sync::mpsc::{channel, Receiver, Sender};

use goldberg_math::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds of simulated time between two polls
pub const WATCH_INTERVAL: f32 = 1.0;
/// Seconds after the run starts during which no verdict is given
pub const GRACE_PERIOD: f32 = 2.0;
/// Seconds after which a motionless run counts as lost
pub const STALL_TIMEOUT: f32 = 8.0;

/// Displacement below which a collectible is considered still
const MOVE_EPSILON: f32 = 1e-4;

/// Timings of the watcher
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WatchTimings {
    pub interval: f32,
    pub grace: f32,
    pub stall: f32,
}

impl Default for WatchTimings {
    fn default() -> Self {
        Self {
            interval: WATCH_INTERVAL,
            grace: GRACE_PERIOD,
            stall: STALL_TIMEOUT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
}

/// An outcome and the run it belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub epoch: u64,
    pub outcome: Outcome,
}

/// Sampled state of one collectible
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollectibleProbe {
    pub position: Vec2,
    /// A goal has absorbed it
    pub captured: bool,
    /// It can no longer move on its own
    pub immobile: bool,
}

/// What the watcher sees of the world at one poll
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WatchSnapshot {
    pub collectibles: Vec<CollectibleProbe>,
    /// Centers of every goal
    pub goals: Vec<Vec2>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WatchError {
    #[error("no collectible left to watch")]
    NoCollectibles,
    #[error("collectible position is not finite: {0:?}")]
    InvalidPosition(Vec2),
}

/// Decide the outcome of a run from one snapshot
///
/// `previous` holds the collectible positions of the last poll, in the same
/// order as the snapshot.
pub fn evaluate(
    snapshot: &WatchSnapshot,
    elapsed: f32,
    previous: Option<&[Vec2]>,
    timings: &WatchTimings,
) -> Result<Option<Outcome>, WatchError> {
    if snapshot.collectibles.is_empty() {
        return Err(WatchError::NoCollectibles);
    }
    if let Some(bad) = snapshot
        .collectibles
        .iter()
        .find(|c| !c.position.x.is_finite() || !c.position.y.is_finite())
    {
        return Err(WatchError::InvalidPosition(bad.position));
    }
    if elapsed < timings.grace {
        return Ok(None);
    }

    let matched = |probe: &CollectibleProbe| probe.captured || snapshot.goals.contains(&probe.position);
    if snapshot.collectibles.iter().all(matched) {
        return Ok(Some(Outcome::Won));
    }
    if snapshot.collectibles.iter().any(|c| !matched(c) && c.immobile) {
        return Ok(Some(Outcome::Lost));
    }

    if elapsed >= timings.stall {
        if let Some(previous) = previous {
            let still = previous.len() == snapshot.collectibles.len()
                && snapshot
                    .collectibles
                    .iter()
                    .zip(previous)
                    .all(|(c, &before)| c.position.distance(before) <= MOVE_EPSILON);
            if still {
                return Ok(Some(Outcome::Lost));
            }
        }
    }
    Ok(None)
}

/// Periodic win/loss evaluation of a running game
pub struct EndOfGameWatcher {
    sender: Sender<Verdict>,
    receiver: Receiver<Verdict>,
    timings: WatchTimings,
    epoch: u64,
    active: bool,
    elapsed: f32,
    next_poll: f32,
    last_positions: Option<Vec<Vec2>>,
}

impl Default for EndOfGameWatcher {
    fn default() -> Self {
        Self::new(WatchTimings::default())
    }
}

impl EndOfGameWatcher {
    pub fn new(timings: WatchTimings) -> Self {
        let (sender, receiver) = channel();
        Self {
            sender,
            receiver,
            timings,
            epoch: 0,
            active: false,
            elapsed: 0.0,
            next_poll: timings.interval,
            last_positions: None,
        }
    }

    pub fn timings(&self) -> &WatchTimings {
        &self.timings
    }

    /// Epoch of the current (or last) run
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Simulated seconds since the run started
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Begin watching a new run
    pub fn start(&mut self) {
        self.epoch += 1;
        self.active = true;
        self.elapsed = 0.0;
        self.next_poll = self.timings.interval.max(f32::EPSILON);
        self.last_positions = None;
        log::debug!("watcher started (epoch {})", self.epoch);
    }

    /// Watch the same run again after a pause
    ///
    /// The run clock and the last sampled positions are kept, so the grace
    /// period and the stall timeout still count from the start of the run.
    pub fn resume(&mut self) {
        if self.active {
            return;
        }
        self.epoch += 1;
        self.active = true;
        log::debug!("watcher resumed at {:.2}s (epoch {})", self.elapsed, self.epoch);
    }

    /// Stop watching; verdicts already queued become stale
    pub fn cancel(&mut self) {
        if self.active {
            log::debug!("watcher cancelled (epoch {})", self.epoch);
        }
        self.active = false;
        self.epoch += 1;
    }

    /// Advance by `dt` simulated seconds, polling `probe` when a poll is due
    pub fn advance(&mut self, dt: f32, mut probe: impl FnMut() -> WatchSnapshot) {
        if !self.active {
            return;
        }
        self.elapsed += dt;
        while self.active && self.elapsed >= self.next_poll {
            self.next_poll += self.timings.interval.max(f32::EPSILON);
            self.poll(probe());
        }
    }

    fn poll(&mut self, snapshot: WatchSnapshot) {
        match evaluate(&snapshot, self.elapsed, self.last_positions.as_deref(), &self.timings) {
            Ok(Some(outcome)) => {
                self.active = false;
                let verdict = Verdict {
                    epoch: self.epoch,
                    outcome,
                };
                // The receiver lives in `self`, so sending cannot fail
                let _ = self.sender.send(verdict);
            }
            Ok(None) => {
                self.last_positions = Some(snapshot.collectibles.iter().map(|c| c.position).collect());
            }
            Err(err) => {
                log::warn!("end-of-game check failed: {}", err);
                self.cancel();
            }
        }
    }

    /// Collect every queued verdict (non-blocking)
    pub fn poll_all(&self) -> Vec<Verdict> {
        let mut verdicts = Vec::new();
        while let Ok(verdict) = self.receiver.try_recv() {
            verdicts.push(verdict);
        }
        verdicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(x: f32, y: f32) -> CollectibleProbe {
        CollectibleProbe {
            position: Vec2::new(x, y),
            captured: false,
            immobile: false,
        }
    }

    fn snapshot(collectibles: Vec<CollectibleProbe>) -> WatchSnapshot {
        WatchSnapshot {
            collectibles,
            goals: vec![Vec2::new(10.0, 0.0)],
        }
    }

    #[test]
    fn test_nothing_during_grace() {
        let snap = snapshot(vec![probe(10.0, 0.0)]);
        let timings = WatchTimings::default();
        assert_eq!(evaluate(&snap, 1.0, None, &timings), Ok(None));
        assert_eq!(evaluate(&snap, 2.0, None, &timings), Ok(Some(Outcome::Won)));
    }

    #[test]
    fn test_captured_counts_as_matched() {
        let mut coin = probe(3.0, 3.0);
        coin.captured = true;
        let snap = snapshot(vec![coin]);
        assert_eq!(
            evaluate(&snap, 5.0, None, &WatchTimings::default()),
            Ok(Some(Outcome::Won))
        );
    }

    #[test]
    fn test_immobile_unmatched_loses() {
        let mut stuck = probe(3.0, 3.0);
        stuck.immobile = true;
        let snap = snapshot(vec![probe(10.0, 0.0), stuck]);
        assert_eq!(
            evaluate(&snap, 3.0, None, &WatchTimings::default()),
            Ok(Some(Outcome::Lost))
        );
    }

    #[test]
    fn test_stall_needs_timeout_and_no_motion() {
        let snap = snapshot(vec![probe(3.0, 3.0)]);
        let previous = [Vec2::new(3.0, 3.0)];
        let timings = WatchTimings::default();
        assert_eq!(evaluate(&snap, 7.0, Some(&previous), &timings), Ok(None));
        assert_eq!(evaluate(&snap, 8.0, Some(&previous), &timings), Ok(Some(Outcome::Lost)));

        let moved = [Vec2::new(2.0, 3.0)];
        assert_eq!(evaluate(&snap, 8.0, Some(&moved), &timings), Ok(None));
    }

    #[test]
    fn test_errors() {
        let timings = WatchTimings::default();
        assert_eq!(
            evaluate(&snapshot(vec![]), 3.0, None, &timings),
            Err(WatchError::NoCollectibles)
        );
        let bad = snapshot(vec![probe(f32::NAN, 0.0)]);
        assert!(matches!(
            evaluate(&bad, 3.0, None, &timings),
            Err(WatchError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_watcher_sends_one_verdict() {
        let mut watcher = EndOfGameWatcher::default();
        watcher.start();
        let epoch = watcher.epoch();
        for _ in 0..10 {
            watcher.advance(0.5, || snapshot(vec![probe(10.0, 0.0)]));
        }
        let verdicts = watcher.poll_all();
        assert_eq!(
            verdicts,
            vec![Verdict {
                epoch,
                outcome: Outcome::Won
            }]
        );
        assert!(!watcher.is_active());
    }

    #[test]
    fn test_stall_is_detected_across_polls() {
        let mut watcher = EndOfGameWatcher::default();
        watcher.start();
        for _ in 0..7 {
            watcher.advance(1.0, || snapshot(vec![probe(3.0, 3.0)]));
        }
        assert!(watcher.poll_all().is_empty());
        watcher.advance(1.0, || snapshot(vec![probe(3.0, 3.0)]));
        let verdicts = watcher.poll_all();
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].outcome, Outcome::Lost);
    }

    #[test]
    fn test_cancel_bumps_epoch() {
        let mut watcher = EndOfGameWatcher::default();
        watcher.start();
        let first = watcher.epoch();
        watcher.cancel();
        assert!(watcher.epoch() > first);
        watcher.advance(5.0, || snapshot(vec![probe(10.0, 0.0)]));
        assert!(watcher.poll_all().is_empty());
    }

    #[test]
    fn test_resume_keeps_the_run_clock() {
        let mut watcher = EndOfGameWatcher::default();
        watcher.start();
        for _ in 0..7 {
            watcher.advance(1.0, || snapshot(vec![probe(3.0, 3.0)]));
        }
        watcher.cancel();
        let paused_epoch = watcher.epoch();

        watcher.resume();
        assert!(watcher.epoch() > paused_epoch);
        assert_eq!(watcher.elapsed(), 7.0, "resume should not rewind the clock");
        watcher.advance(1.0, || snapshot(vec![probe(3.0, 3.0)]));
        let verdicts = watcher.poll_all();
        assert_eq!(verdicts.len(), 1, "stall timeout counts from the start of the run");
        assert_eq!(verdicts[0].outcome, Outcome::Lost);
        assert_eq!(verdicts[0].epoch, watcher.epoch());
    }

    #[test]
    fn test_failed_poll_cancels() {
        let mut watcher = EndOfGameWatcher::default();
        watcher.start();
        watcher.advance(1.0, WatchSnapshot::default);
        assert!(!watcher.is_active());
        assert!(watcher.poll_all().is_empty());
    }
}
