// THEORY:
// The `scheduler` module turns the frame-at-a-time controller into a running scan.
// A browser would call back once per repaint; here a `FrameScheduler` future
// stands in for that callback, and `run_scan_loop` is the loop that keeps
// requesting frames.
//
// Key architectural principles:
// 1.  **Host Owns the Pair**: `ScanHost` bundles the controller with a render
//     surface. Every effect the controller returns is applied to the surface, and
//     every camera change the surface reports is fed back to the controller as an
//     event. Nothing else touches either half.
// 2.  **One Frame Under One Lock**: The host is shared behind a `tokio::sync::Mutex`.
//     A frame locks it, ticks, applies the commands and unlocks before waiting for
//     the next frame, so user events interleave between frames and never within one.
// 3.  **Liveness by Session Id**: A loop is started for one `SessionId` and asks for
//     frames under that id only. Once a new rectangle or a reset has replaced it,
//     the controller answers `Stop(Superseded)` and the loop ends without painting.

use crate::coordinator::{FrameDecision, ScanSummary, SessionId, StopReason, TickReport};
use crate::core_modules::render_surface::{RenderCommand, RenderSurface, ViewChange};
use crate::session::{ControlEvent, Effect, ScanController};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Source of frame callbacks.
pub trait FrameScheduler: Send {
    /// Resolves when the next frame should run.
    fn next_frame(&mut self) -> BoxFuture<'_, ()>;
}

/// Fixed-rate frames driven by a tokio interval. Must be created inside a runtime.
pub struct IntervalScheduler {
    interval: Interval,
}

impl IntervalScheduler {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        // A slow frame delays the next one instead of triggering a burst.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl FrameScheduler for IntervalScheduler {
    fn next_frame(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.interval.tick().await;
        })
    }
}

/// Runs frames back to back, yielding to the runtime between them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl FrameScheduler for ImmediateScheduler {
    fn next_frame(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(tokio::task::yield_now())
    }
}

/// What a host did with one event.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dispatch {
    /// Set when the event started a scan that now needs a frame loop.
    pub started: Option<SessionId>,
    pub alerts: Vec<String>,
}

/// A controller wired to the surface that displays it.
pub struct ScanHost<S: RenderSurface> {
    controller: ScanController,
    surface: S,
}

impl<S: RenderSurface> ScanHost<S> {
    pub fn new(controller: ScanController, surface: S) -> Self {
        Self { controller, surface }
    }

    pub fn controller(&self) -> &ScanController {
        &self.controller
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Hands one event to the controller and carries out the resulting effects.
    pub fn dispatch(&mut self, event: ControlEvent) -> Dispatch {
        let mut dispatch = Dispatch::default();
        for effect in self.controller.handle(event) {
            match effect {
                Effect::Render(command) => self.render(&command),
                Effect::StartScan(session) => dispatch.started = Some(session),
                Effect::Alert(message) => {
                    info!(%message, "alert");
                    dispatch.alerts.push(message);
                }
            }
        }
        dispatch
    }

    /// Resizes the surface, then reallocates the overlay to the same size so the
    /// projection and the raster stay in step.
    pub fn resize(&mut self, width: u32, height: u32) {
        let change = self.surface.resize(width, height);
        self.feed_back(change);
    }

    /// Reports a camera change that happened outside the controller, such as a
    /// window resize or a user pan.
    pub fn view_changed(&mut self, change: ViewChange) {
        match change {
            ViewChange::Resized { width, height } => self.resize(width, height),
            ViewChange::Zoomed => self.feed_back(change),
        }
    }

    /// Runs one frame for `session` and applies what it produced.
    pub fn frame(&mut self, session: SessionId) -> TickReport {
        let report = self.controller.on_frame(session, self.surface.projector());
        for command in &report.commands {
            self.render(command);
        }
        report
    }

    fn render(&mut self, command: &RenderCommand) {
        for change in self.surface.apply(command) {
            self.feed_back(change);
        }
    }

    fn feed_back(&mut self, change: ViewChange) {
        let event = match change {
            ViewChange::Zoomed => ControlEvent::ZoomEnded,
            ViewChange::Resized { width, height } => ControlEvent::ViewResized { width, height },
        };
        // View events never produce effects of their own.
        let effects = self.controller.handle(event);
        if !effects.is_empty() {
            warn!(count = effects.len(), "view change produced unexpected effects");
        }
    }
}

/// How a frame loop ended.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub session: SessionId,
    pub reason: StopReason,
    /// Frames requested, including the one that stopped the loop
    pub frames: u64,
    /// Present when the loop ran its scan to completion.
    pub summary: Option<ScanSummary>,
}

/// Requests frames for `session` until the controller says stop.
pub async fn run_scan_loop<S, F>(host: Arc<Mutex<ScanHost<S>>>, mut scheduler: F, session: SessionId) -> LoopOutcome
where
    S: RenderSurface,
    F: FrameScheduler,
{
    debug!(%session, "frame loop started");
    let mut frames = 0u64;
    loop {
        scheduler.next_frame().await;
        frames += 1;

        let report = host.lock().await.frame(session);
        if let FrameDecision::Stop(reason) = report.decision {
            debug!(%session, ?reason, frames, "frame loop stopped");
            return LoopOutcome {
                session,
                reason,
                frames,
                summary: report.summary,
            };
        }
    }
}

/// Spawns `run_scan_loop` on the current runtime.
pub fn spawn_scan_loop<S, F>(host: Arc<Mutex<ScanHost<S>>>, scheduler: F, session: SessionId) -> JoinHandle<LoopOutcome>
where
    S: RenderSurface + Send + 'static,
    F: FrameScheduler + 'static,
{
    tokio::spawn(run_scan_loop(host, scheduler, session))
}
