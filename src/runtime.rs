//! Frame scheduling on the async runtime
//!
//! The scheduler wakes at the configured frame interval and redraws only when
//! the session was marked dirty since the last frame. Gestures keep updating
//! the session while a frame's tiles load. If the view changes again before
//! they settle, the wait is dropped and the newer view is planned instead;
//! the abandoned loads still finish into the cache.

use crate::core::config::FrameTimingConfig;
use crate::core::map::MapSession;
use crate::prelude::{Arc, Duration};
use crate::traits::FrameRenderer;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancels a running scheduler. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct DisposalToken {
    disposed: Arc<AtomicBool>,
}

impl DisposalToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Counters reported when a scheduler stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub rendered: u64,
    /// Ticks with nothing to redraw
    pub idle: u64,
    pub errors: u64,
}

pub struct FrameScheduler {
    session: MapSession,
    renderer: Arc<dyn FrameRenderer>,
    interval: Duration,
    token: DisposalToken,
}

impl FrameScheduler {
    pub fn new(session: MapSession, renderer: Arc<dyn FrameRenderer>, timing: &FrameTimingConfig) -> Self {
        Self {
            session,
            renderer,
            interval: timing.frame_interval(),
            token: DisposalToken::new(),
        }
    }

    pub fn token(&self) -> DisposalToken {
        self.token.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Render one frame if the session changed. Returns whether it drew.
    pub async fn tick(&self) -> Result<bool> {
        if !self.session.take_dirty() {
            return Ok(false);
        }
        let frame = self.session.frame().await;
        self.renderer.render(&frame)?;
        Ok(true)
    }

    /// Load the frame for the current view, replanning whenever the view
    /// changes before the load settles. `None` once the token is disposed.
    #[cfg(feature = "tokio-runtime")]
    async fn latest_frame(&self, ticker: &mut tokio::time::Interval) -> Option<crate::core::map::Frame> {
        loop {
            let load = self.session.frame();
            tokio::pin!(load);
            loop {
                tokio::select! {
                    frame = &mut load => return Some(frame),
                    _ = ticker.tick() => {
                        // Listeners run even while a slow frame is pending.
                        self.session.process_events();
                        if self.token.is_disposed() {
                            return None;
                        }
                        if self.session.take_dirty() {
                            break;
                        }
                    }
                }
            }
            log::debug!("view changed during frame load, replanning");
        }
    }

    /// Run until the token is disposed. Queued map events are dispatched to
    /// listeners on every tick.
    #[cfg(feature = "tokio-runtime")]
    pub async fn run(self) -> FrameStats {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats = FrameStats::default();

        log::info!("frame scheduler started at {:?} per frame", self.interval);
        while !self.token.is_disposed() {
            ticker.tick().await;
            self.session.process_events();
            if self.token.is_disposed() {
                break;
            }
            if !self.session.take_dirty() {
                stats.idle += 1;
                continue;
            }
            let Some(frame) = self.latest_frame(&mut ticker).await else {
                break;
            };
            match self.renderer.render(&frame) {
                Ok(()) => stats.rendered += 1,
                Err(e) => {
                    stats.errors += 1;
                    log::warn!("frame render failed: {}", e);
                }
            }
        }
        self.renderer.shutdown();
        log::info!("frame scheduler stopped: {:?}", stats);
        stats
    }

    /// Spawn [`FrameScheduler::run`] on the current tokio runtime.
    #[cfg(feature = "tokio-runtime")]
    pub fn spawn(self) -> (DisposalToken, tokio::task::JoinHandle<FrameStats>) {
        let token = self.token();
        (token, tokio::spawn(self.run()))
    }
}
