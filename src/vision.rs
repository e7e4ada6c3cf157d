// Vision subsystem: latest tag detection for closed-loop commands
//
// The camera and tag detector run outside this crate. They publish
// observations into a `TargetFeed`; the hardware facade samples the feed once
// per control cycle through `Vision::tick`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::DETECTION_MAX_AGE;
use crate::messages::TargetObservation;

/// A recognized target in one camera frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub frame_id: u64,
    /// Horizontal pixel centroid
    pub cx: f32,
}

/// Auxiliary subsystem that provides target detections
pub trait Vision {
    /// Pull one fresh sample. Called once per control cycle.
    fn tick(&mut self);

    /// Most recent detection, or `None` when no target is visible.
    /// Must not consume the sample.
    fn latest_detection(&self) -> Option<Detection>;
}

/// Vision stand-in for hardware without a camera
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVision;

impl Vision for NoVision {
    fn tick(&mut self) {}

    fn latest_detection(&self) -> Option<Detection> {
        None
    }
}

#[derive(Debug)]
struct Stamped {
    observation: TargetObservation,
    received_at: Instant,
}

/// Producer side of a `TargetFeed`
#[derive(Debug, Clone)]
pub struct TargetPublisher {
    slot: Arc<Mutex<Option<Stamped>>>,
}

impl TargetPublisher {
    /// Replace the latest observation
    pub fn publish(&self, observation: TargetObservation) {
        let stamped = Stamped {
            observation,
            received_at: Instant::now(),
        };
        // A poisoned slot only means a producer panicked mid-store;
        // the value is still a whole observation
        match self.slot.lock() {
            Ok(mut slot) => *slot = Some(stamped),
            Err(poisoned) => *poisoned.into_inner() = Some(stamped),
        }
    }
}

/// Latest-value detection slot shared with an external producer.
///
/// Observations older than `max_age` are reported as no detection.
#[derive(Debug)]
pub struct TargetFeed {
    slot: Arc<Mutex<Option<Stamped>>>,
    max_age: Duration,
    latest: Option<Detection>,
    last_frame: Option<u64>,
}

impl TargetFeed {
    pub fn new() -> (Self, TargetPublisher) {
        Self::with_max_age(DETECTION_MAX_AGE)
    }

    pub fn with_max_age(max_age: Duration) -> (Self, TargetPublisher) {
        let slot = Arc::new(Mutex::new(None));
        let feed = Self {
            slot: Arc::clone(&slot),
            max_age,
            latest: None,
            last_frame: None,
        };
        (feed, TargetPublisher { slot })
    }
}

impl Vision for TargetFeed {
    fn tick(&mut self) {
        let slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };

        self.latest = slot.as_ref().and_then(|s| {
            if s.received_at.elapsed() > self.max_age {
                return None;
            }
            s.observation.cx.map(|cx| Detection {
                frame_id: s.observation.frame_id,
                cx,
            })
        });

        let frame = slot.as_ref().map(|s| s.observation.frame_id);
        if frame != self.last_frame {
            debug!("Vision frame {:?}, detection {:?}", frame, self.latest);
            self.last_frame = frame;
        }
    }

    fn latest_detection(&self) -> Option<Detection> {
        self.latest
    }
}
