//! Profiling timers and a frame rate logger.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use itertools::Itertools;

/// Weight of the newest sample in a timer's moving average.
const SMOOTHING: f32 = 0.3;

/// Measures how long a recurring operation takes.
///
/// Samples are combined into an exponential moving average. Formatting the timer with `{}` prints
/// the sample count and average since it was last formatted, then starts over.
pub struct Timer {
    name: &'static str,
    samples: Mutex<Samples>,
}

#[derive(Default)]
struct Samples {
    count: u32,
    avg_secs: f32,
}

impl Samples {
    fn add(&mut self, secs: f32) {
        self.avg_secs = match self.count {
            0 => secs,
            _ => SMOOTHING * secs + (1.0 - SMOOTHING) * self.avg_secs,
        };
        self.count += 1;
    }
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            samples: Mutex::new(Samples::default()),
        }
    }

    /// Calls `f` and records how long it took.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        f()
    }

    /// Starts a measurement that ends when the returned guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            timer: self,
            start: Instant::now(),
        }
    }

    fn record(&self, elapsed: Duration) {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(elapsed.as_secs_f32());
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut guard = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let samples = std::mem::take(&mut *guard);
        drop(guard);
        write!(
            f,
            "{}: {}x{:.01}ms",
            self.name,
            samples.count,
            samples.avg_secs * 1000.0
        )
    }
}

/// A clone starts without samples.
impl Clone for Timer {
    fn clone(&self) -> Self {
        Self::new(self.name)
    }
}

#[must_use = "the measurement ends as soon as the guard is dropped"]
pub struct TimerGuard<'a> {
    timer: &'a Timer,
    start: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Counts frames and logs the frame rate once per second.
pub struct FpsCounter {
    name: String,
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            since: Instant::now(),
        }
    }

    /// Counts a frame.
    pub fn tick(&mut self) {
        self.tick_with(std::iter::empty::<&Timer>());
    }

    /// Counts a frame. When a second has passed, logs the frame rate followed by `extra`.
    ///
    /// `extra` is only formatted when something is logged, which resets any [`Timer`]s in it.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.since.elapsed() < Duration::from_secs(1) {
            return;
        }

        let extra = extra.into_iter().join(", ");
        if extra.is_empty() {
            log::debug!("{}: {} FPS", self.name, self.frames);
        } else {
            log::debug!("{}: {} FPS ({extra})", self.name, self.frames);
        }
        self.frames = 0;
        self.since = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn formatting_resets_samples() {
        let timer = Timer::new("infer");
        assert_eq!(timer.to_string(), "infer: 0x0.0ms");

        let value = timer.time(|| {
            thread::sleep(Duration::from_millis(2));
            7
        });
        assert_eq!(value, 7);
        drop(timer.start());

        let shown = timer.to_string();
        assert!(shown.starts_with("infer: 2x"), "{shown}");
        assert_eq!(timer.to_string(), "infer: 0x0.0ms");
    }

    #[test]
    fn moving_average() {
        let mut samples = Samples::default();
        samples.add(1.0);
        assert_eq!(samples.avg_secs, 1.0);
        samples.add(2.0);
        assert!((samples.avg_secs - 1.3).abs() < 1e-6);
        assert_eq!(samples.count, 2);
    }

    #[test]
    fn fps_counter_resets_each_second() {
        let mut fps = FpsCounter::new("test");
        fps.tick();
        fps.tick_with([&Timer::new("t")]);
        assert_eq!(fps.frames, 2);

        fps.since -= Duration::from_secs(2);
        fps.tick();
        assert_eq!(fps.frames, 0);
    }
}
