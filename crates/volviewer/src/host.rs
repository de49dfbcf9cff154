//! # Viewer Frame Loop
//!
//! ```text
//! Frame N:
//! ┌──────────────────────────────────────────────────────┐
//! │ 1. DISPATCH                                          │
//! │    └─ Poll file watches (dispatch timeout)           │
//! │       └─ Callbacks reload changed shaders            │
//! │                                                      │
//! │ 2. STEP                                              │
//! │    └─ Advance the frame clock                        │
//! │                                                      │
//! │ 3. END FRAME                                         │
//! │    ├─ Record timing                                  │
//! │    └─ Sleep out the rest of the frame budget         │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The host is headless: nothing is drawn, the step only keeps time.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use volviewer_core::{Arena, Stream};
use volviewer_os::{FileWatchContext, NativePlatform, Platform};

use crate::assets::ShaderLibrary;
use crate::config::{ViewerConfig, WatchMode};
use crate::error::{HostError, HostResult};

/// Frame time above which a frame is reported.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(33);

/// Upper bound on the per-frame delta.
const MAX_DELTA_SECONDS: f32 = 0.1;

/// Timing of a single frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Time spent dispatching watch events, in microseconds.
    pub dispatch_us: u64,
    /// Time spent in the frame step, in microseconds.
    pub step_us: u64,
    /// Total frame time in microseconds, excluding the budget sleep.
    pub total_us: u64,
    /// Watch callbacks invoked this frame.
    pub callbacks: usize,
    /// Seconds since the previous frame, clamped.
    pub delta_time: f32,
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of total frame times.
    pub total_us_sum: u64,
    /// Sum of dispatch times.
    pub dispatch_us_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded the budget.
    pub frames_over_budget: u64,
    /// Watch callbacks invoked across all frames.
    pub callbacks: u64,
    /// Per-frame budget in microseconds.
    pub budget_us: u64,
}

impl FrameStatsAccumulator {
    /// Creates an accumulator for frames of `budget`.
    #[must_use]
    pub fn new(budget: Duration) -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            dispatch_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            callbacks: 0,
            budget_us: micros(budget),
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.dispatch_us_sum += stats.dispatch_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.callbacks += stats.callbacks as u64;

        if stats.total_us > self.budget_us {
            self.frames_over_budget += 1;
        }
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns average FPS.
    #[must_use]
    pub fn avg_fps(&self) -> f64 {
        let avg_ms = self.avg_frame_ms();
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }

    /// Writes a one-line summary.
    #[allow(clippy::cast_precision_loss)]
    pub fn write_summary(&self, out: &mut Stream<'_>) {
        let min_us = if self.frames_recorded == 0 {
            0
        } else {
            self.min_frame_us
        };
        out.append_u64(self.frames_recorded);
        out.append_str(" frames, avg ");
        out.append_f64(self.avg_frame_ms(), 1000);
        out.append_str(" ms (");
        out.append_f64(self.avg_fps(), 10);
        out.append_str(" fps), min ");
        out.append_f64(min_us as f64 / 1000.0, 1000);
        out.append_str(" ms, max ");
        out.append_f64(self.max_frame_us as f64 / 1000.0, 1000);
        out.append_str(" ms, ");
        out.append_u64(self.frames_over_budget);
        out.append_str(" over budget");
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// The headless viewer: one arena, one watch context, hot-reloaded shaders.
pub struct Viewer {
    config: ViewerConfig,
    arena: Arena,
    watch: FileWatchContext,
    shaders: ShaderLibrary,
    frame_count: u64,
    last_frame_time: Instant,
    stats: FrameStatsAccumulator,
}

impl Viewer {
    /// Reserves the arena, starts watching and loads every shader.
    ///
    /// # Errors
    ///
    /// - [`HostError::Config`] for out-of-range values
    /// - [`HostError::ArenaUnavailable`] if the arena cannot be reserved
    /// - [`HostError::Watch`] if a watch cannot be registered
    pub fn new(config: ViewerConfig) -> HostResult<Self> {
        config.validate()?;

        let platform = NativePlatform::default();
        let mut arena = platform.reserve_arena(config.arena_size);
        if arena.is_disabled() {
            return Err(HostError::ArenaUnavailable {
                size: config.arena_size,
            });
        }

        let mut watch = match config.watch.backend {
            WatchMode::Native => FileWatchContext::native()?,
            WatchMode::Poll => FileWatchContext::polling(config.watch.poll_interval())?,
        };

        let mut shaders = ShaderLibrary::new();
        for shader in &config.shaders {
            shaders.load(&platform, &mut arena, &mut watch, shader)?;
        }
        info!(
            shaders = shaders.len(),
            directories = watch.directory_count(),
            arena_used = arena.cursor(),
            "viewer ready"
        );

        let stats = FrameStatsAccumulator::new(config.frame_budget());
        Ok(Self {
            config,
            arena,
            watch,
            shaders,
            frame_count: 0,
            last_frame_time: Instant::now(),
            stats,
        })
    }

    /// Runs one frame: dispatch watch events, then step.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Watch`] if the watch backend died.
    pub fn frame(&mut self) -> HostResult<FrameStats> {
        let start = Instant::now();
        let callbacks = self
            .watch
            .poll(&mut self.arena, self.config.dispatch_timeout())?;
        let dispatched = Instant::now();

        let delta_time = self.step(dispatched);
        let end = Instant::now();

        let stats = FrameStats {
            frame: self.frame_count,
            dispatch_us: micros(dispatched - start),
            step_us: micros(end - dispatched),
            total_us: micros(end - start),
            callbacks,
            delta_time,
        };
        self.end_frame(stats);
        Ok(stats)
    }

    fn step(&mut self, now: Instant) -> f32 {
        let delta = now.duration_since(self.last_frame_time);
        self.last_frame_time = now;
        delta.as_secs_f32().min(MAX_DELTA_SECONDS)
    }

    fn end_frame(&mut self, stats: FrameStats) {
        self.frame_count += 1;
        self.stats.record(stats);

        if stats.total_us > micros(MAX_FRAME_TIME) {
            warn!(
                frame = stats.frame,
                total_us = stats.total_us,
                dispatch_us = stats.dispatch_us,
                "frame exceeded budget"
            );
        }
        if stats.callbacks > 0 {
            debug!(frame = stats.frame, callbacks = stats.callbacks, "dispatched file changes");
        }
    }

    /// Runs frames until the configured frame limit, pacing to the frame
    /// rate. Without a limit this never returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the first frame error.
    pub fn run(&mut self) -> HostResult<u64> {
        let budget = self.config.frame_budget();
        while self
            .config
            .frame_limit
            .map_or(true, |limit| self.frame_count < limit)
        {
            let start = Instant::now();
            self.frame()?;
            if let Some(rest) = budget.checked_sub(start.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        self.log_summary();
        Ok(self.frame_count)
    }

    /// Logs frame statistics and arena usage.
    pub fn log_summary(&self) {
        let mut buf = [0u8; 256];
        let mut line = Stream::new(&mut buf);
        self.stats.write_summary(&mut line);
        info!(
            summary = line.as_str(),
            callbacks = self.stats.callbacks,
            arena_peak = self.arena.peak(),
            arena_capacity = self.arena.capacity(),
            "viewer stopped"
        );
    }

    /// Frames run so far.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats
    }

    /// Hot-reloaded shaders, in configuration order.
    #[must_use]
    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    /// The process arena.
    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }
}
