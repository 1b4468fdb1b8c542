//! Speed-scaled clocks.
//!
//! Drivers and the session schedule against [`Clock`]: virtual milliseconds
//! elapsed since the session started, scaled by playback speed. Timer
//! deadlines are expressed on this timeline and converted back to tokio
//! instants only when the session goes to sleep.

use std::time::Duration;

use tokio::time::Instant;

/// Longest wait a clock hands out. Absurd timestamps saturate here.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
    speed: f64,
}

impl Clock {
    pub fn new(speed: f64) -> Self {
        Self {
            origin: Instant::now(),
            speed: sanitize_speed(speed),
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Virtual milliseconds since the clock was created.
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0 * self.speed
    }

    /// Real duration of `ms` virtual milliseconds.
    pub fn real_duration(&self, ms: f64) -> Duration {
        Duration::try_from_secs_f64((ms.max(0.0) / self.speed) / 1000.0)
            .map_or(FAR_FUTURE, |d| d.min(FAR_FUTURE))
    }

    /// The instant at which [`Clock::now`] reaches `ms`.
    pub fn instant_at(&self, ms: f64) -> Instant {
        self.origin + self.real_duration(ms)
    }
}

/// Playback position for drivers that don't track one themselves.
///
/// Starts running when created, in seconds of recording time.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    start: Instant,
    speed: f64,
}

impl PlaybackClock {
    pub fn start(speed: f64) -> Self {
        Self {
            start: Instant::now(),
            speed: sanitize_speed(speed),
        }
    }

    pub fn time(&self) -> f64 {
        self.speed * self.start.elapsed().as_secs_f64()
    }

    pub fn set_time(&mut self, time: f64) {
        let back = Duration::from_secs_f64((time / self.speed).max(0.0));
        self.start = Instant::now().checked_sub(back).unwrap_or(self.start);
    }
}

fn sanitize_speed(speed: f64) -> f64 {
    if speed.is_finite() && speed > 0.0 {
        speed
    } else {
        1.0
    }
}
