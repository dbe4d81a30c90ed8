// THEORY:
// The `coordinator` module is the heart of the sweep engine. The `ScanCoordinator`
// owns the active `ScanSession` and its agents, advances every agent exactly once
// per frame, paints their coverage and decides when the scan is over.
//
// Key architectural principles:
// 1.  **Lockstep Ticks**: All agents move inside one synchronous `tick`. There is no
//     parallelism between agents, so the completion check after the loop sees a
//     consistent snapshot of every agent for that tick.
// 2.  **Barrier Completion**: The scan completes on the first tick where every agent
//     reports `finished`. Completion is a conjunction, never a race: one fast agent
//     cannot end the scan early, and the transition is never deferred to a later tick.
// 3.  **Side Effects as Data**: A tick returns `RenderCommand`s (marker moves, and
//     on completion the outline, view fit and summary message) instead of calling a
//     renderer. Only the coverage overlay is written directly, and only here.
// 4.  **Terminal State**: `Completed` is final for a session. Further ticks are
//     no-ops that tell the scheduler to stop.

use crate::config::ScanConfig;
use crate::core_modules::agent::{Agent, AgentId};
use crate::core_modules::coverage::{CoverageOverlay, ScreenRect, write_png};
use crate::core_modules::region::{BoundingRegion, partition};
use crate::core_modules::render_surface::{OverlayMessage, Outline, RenderCommand};
use crate::core_modules::viewport::Projector;
use crate::error::ScanError;
use image::{ImageError, Rgb, RgbaImage};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Identity of one scan. Increases every time a scan is started or reset, so a
/// stale frame loop can tell it has been replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan#{}", self.0)
    }
}

/// Lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
    Completed,
}

/// Why a frame loop should stop requesting frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every agent finished; the terminal transition has been emitted.
    Completed,
    /// The loop's session was replaced or reset.
    Superseded,
    /// There is no session to drive.
    Idle,
}

/// The continue/stop decision returned for every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    Continue,
    Stop(StopReason),
}

/// Per-agent line of the completion summary.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSummary {
    pub id: AgentId,
    pub color: Rgb<u8>,
    pub speed: f64,
    /// Strip area in square degrees
    pub area: f64,
    pub finished_at: u64,
}

/// Everything known about a scan at the moment it completed.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub session: SessionId,
    pub region: BoundingRegion,
    /// Tick on which the barrier was reached
    pub ticks: u64,
    pub agents: Vec<AgentSummary>,
    /// Pixels carrying coverage when the scan completed
    pub covered_pixels: usize,
    /// The coverage overlay as it looked on the completing tick
    pub coverage: RgbaImage,
}

impl ScanSummary {
    /// Writes the completion snapshot of the coverage overlay as a PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), ImageError> {
        write_png(&self.coverage, path)
    }
}

/// Outcome of one coordinator tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub commands: Vec<RenderCommand>,
    pub painted_pixels: u64,
    pub decision: FrameDecision,
    pub summary: Option<ScanSummary>,
}

impl TickReport {
    fn stopped(reason: StopReason) -> Self {
        Self {
            commands: Vec::new(),
            painted_pixels: 0,
            decision: FrameDecision::Stop(reason),
            summary: None,
        }
    }
}

/// The agents and progress of one scan.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub id: SessionId,
    pub region: BoundingRegion,
    pub agents: Vec<Agent>,
    pub all_finished: bool,
    /// Ticks run so far
    pub ticks: u64,
}

/// Owns the active scan and drives it one frame at a time.
pub struct ScanCoordinator {
    config: Arc<ScanConfig>,
    session: Option<ScanSession>,
    state: ScanState,
}

impl ScanCoordinator {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        Self {
            config,
            session: None,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn session(&self) -> Option<&ScanSession> {
        self.session.as_ref()
    }

    /// Partitions `region`, spawns one agent per strip and enters `Running`.
    ///
    /// Any previous session is discarded; markers it still shows are removed by
    /// the returned commands. On error the previous session is left untouched.
    pub fn start(
        &mut self,
        id: SessionId,
        region: BoundingRegion,
        agent_count: usize,
    ) -> Result<Vec<RenderCommand>, ScanError> {
        let strips = partition(&region, agent_count)?;
        let speeds = self.config.speed.speeds_for(&strips);

        let agents: Vec<Agent> = strips
            .into_iter()
            .zip(speeds)
            .map(|(strip, speed)| {
                Agent::new(strip.index, strip, speed, self.config.row_pitch, self.config.agent_color(strip.index))
            })
            .collect();

        let mut commands = self.remove_live_markers();
        commands.extend(agents.iter().map(|agent| RenderCommand::AddMarker(agent.marker())));

        info!(
            session = %id,
            agents = agents.len(),
            lat_min = region.lat_min(),
            lat_max = region.lat_max(),
            lng_min = region.lng_min(),
            lng_max = region.lng_max(),
            "starting scan"
        );

        self.session = Some(ScanSession {
            id,
            region,
            agents,
            all_finished: false,
            ticks: 0,
        });
        self.state = ScanState::Running;
        Ok(commands)
    }

    /// Discards the session and returns to `Idle`.
    pub fn reset(&mut self) -> Vec<RenderCommand> {
        let commands = self.remove_live_markers();
        if let Some(session) = self.session.take() {
            debug!(session = %session.id, ticks = session.ticks, "scan discarded");
        }
        self.state = ScanState::Idle;
        commands
    }

    /// Advances every unfinished agent once, paints their coverage and checks the
    /// completion barrier.
    pub fn tick(&mut self, projector: &dyn Projector, overlay: &mut CoverageOverlay) -> TickReport {
        match self.state {
            ScanState::Idle => return TickReport::stopped(StopReason::Idle),
            ScanState::Completed => return TickReport::stopped(StopReason::Completed),
            ScanState::Running => {}
        }
        let Some(session) = self.session.as_mut() else {
            self.state = ScanState::Idle;
            return TickReport::stopped(StopReason::Idle);
        };

        session.ticks += 1;
        let tick = session.ticks;
        let mut commands = Vec::with_capacity(session.agents.len());
        let mut painted_pixels = 0;

        // --- 1. Advance & Paint ---
        for agent in session.agents.iter_mut().filter(|a| !a.finished) {
            let position = agent.advance(tick);
            commands.push(RenderCommand::MoveMarker { id: agent.id, position });

            let anchor = projector.project(agent.anchor());
            let current = projector.project(position);
            painted_pixels += overlay.paint(
                ScreenRect::from_corners(anchor, current),
                self.config.coverage_color(agent.color),
            );

            if agent.finished {
                debug!(session = %session.id, agent = agent.id, tick, "agent finished");
            }
        }

        // --- 2. Barrier ---
        session.all_finished = session.agents.iter().all(|a| a.finished);
        if !session.all_finished {
            trace!(session = %session.id, tick, painted_pixels, "tick");
            return TickReport {
                commands,
                painted_pixels,
                decision: FrameDecision::Continue,
                summary: None,
            };
        }

        // --- 3. Terminal Transition ---
        self.state = ScanState::Completed;
        commands.extend(session.agents.iter().map(|a| RenderCommand::RemoveMarker { id: a.id }));
        commands.push(RenderCommand::DrawOutline(Outline {
            region: session.region,
            color: self.config.outline_color(),
            weight: self.config.completion.outline_weight,
        }));
        commands.push(RenderCommand::FitView {
            region: session.region,
            padding: self.config.completion.fit_padding,
        });
        commands.push(RenderCommand::ShowMessage(OverlayMessage {
            content: self.config.completion.message.clone(),
            anchor: session.region.center(),
            persistent: true,
        }));

        let summary = ScanSummary {
            session: session.id,
            region: session.region,
            ticks: tick,
            agents: session
                .agents
                .iter()
                .map(|a| AgentSummary {
                    id: a.id,
                    color: a.color,
                    speed: a.speed(),
                    area: a.sub_region.area(),
                    finished_at: a.finished_at.unwrap_or(tick),
                })
                .collect(),
            covered_pixels: overlay.covered_pixels(),
            coverage: overlay.image().clone(),
        };

        info!(
            session = %session.id,
            ticks = tick,
            covered_pixels = summary.covered_pixels,
            "scan completed"
        );

        TickReport {
            commands,
            painted_pixels,
            decision: FrameDecision::Stop(StopReason::Completed),
            summary: Some(summary),
        }
    }

    fn remove_live_markers(&self) -> Vec<RenderCommand> {
        match (&self.session, self.state) {
            (Some(session), ScanState::Running) => session
                .agents
                .iter()
                .map(|a| RenderCommand::RemoveMarker { id: a.id })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::region::LatLng;
    use crate::core_modules::trajectory::Trajectory;
    use crate::core_modules::viewport::Viewport;

    fn coordinator() -> ScanCoordinator {
        ScanCoordinator::new(Arc::new(ScanConfig::default()))
    }

    fn small_region() -> BoundingRegion {
        BoundingRegion::new(10.0, 10.003, 20.0, 20.012).unwrap()
    }

    fn view_for(region: &BoundingRegion) -> Viewport {
        let mut view = Viewport::new(region.center(), 2.0, 320, 240, 19.0);
        view.fit_bounds(region, 0.05);
        view
    }

    /// Finish tick of every strip computed from bare trajectories.
    fn expected_finish_ticks(region: &BoundingRegion, n: usize) -> Vec<u64> {
        let config = ScanConfig::default();
        let strips = partition(region, n).unwrap();
        let speeds = config.speed.speeds_for(&strips);
        strips
            .iter()
            .zip(speeds)
            .map(|(strip, speed)| {
                let mut t = Trajectory::new(strip.bounds, speed, config.row_pitch);
                let mut tick = 0;
                loop {
                    tick += 1;
                    if t.step().lat <= strip.bounds.lat_min() {
                        return tick;
                    }
                }
            })
            .collect()
    }

    #[test]
    fn test_start_spawns_agents_at_strip_corners() {
        let mut c = coordinator();
        let region = small_region();
        let commands = c.start(SessionId(1), region, 3).unwrap();
        assert_eq!(c.state(), ScanState::Running);
        assert_eq!(commands.len(), 3);

        let session = c.session().unwrap();
        for (i, agent) in session.agents.iter().enumerate() {
            assert_eq!(agent.id, i);
            assert_eq!(agent.position(), agent.sub_region.bounds.top_left());
            assert!(matches!(&commands[i], RenderCommand::AddMarker(m) if m.id == i));
        }
        assert_eq!(session.agents[0].position(), LatLng::new(10.003, 20.0));
    }

    #[test]
    fn test_barrier_completes_on_the_slowest_agents_tick() {
        let region = small_region();
        for n in 1..=5 {
            let mut c = coordinator();
            let view = view_for(&region);
            let mut overlay = CoverageOverlay::new(320, 240);
            c.start(SessionId(1), region, n).unwrap();

            let expected = *expected_finish_ticks(&region, n).iter().max().unwrap();
            let mut tick = 0;
            loop {
                tick += 1;
                let report = c.tick(&view, &mut overlay);
                let all_done = c.session().unwrap().agents.iter().all(|a| a.finished);
                match report.decision {
                    FrameDecision::Continue => {
                        assert!(!all_done);
                        assert_eq!(c.state(), ScanState::Running);
                    }
                    FrameDecision::Stop(StopReason::Completed) => {
                        assert!(all_done);
                        assert_eq!(tick, expected, "n={n}");
                        let summary = report.summary.expect("summary on completion");
                        assert_eq!(summary.ticks, expected);
                        assert_eq!(summary.agents.iter().map(|a| a.finished_at).max(), Some(expected));
                        break;
                    }
                    other => panic!("unexpected decision {other:?}"),
                }
                assert!(tick < 100_000);
            }
            assert_eq!(c.state(), ScanState::Completed);
        }
    }

    #[test]
    fn test_completion_emits_terminal_transition() {
        let mut c = coordinator();
        let region = small_region();
        let view = view_for(&region);
        let mut overlay = CoverageOverlay::new(320, 240);
        c.start(SessionId(4), region, 2).unwrap();

        let report = loop {
            let report = c.tick(&view, &mut overlay);
            if report.decision != FrameDecision::Continue {
                break report;
            }
        };

        let removed: Vec<AgentId> = report
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                RenderCommand::RemoveMarker { id } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![0, 1]);
        assert!(report.commands.iter().any(|cmd| matches!(
            cmd,
            RenderCommand::DrawOutline(o) if o.region == region && o.weight == 2 && o.color == Rgb([0, 128, 0])
        )));
        assert!(report.commands.iter().any(|cmd| matches!(
            cmd,
            RenderCommand::FitView { region: r, padding } if *r == region && *padding == 0.05
        )));
        assert!(report.commands.iter().any(|cmd| matches!(
            cmd,
            RenderCommand::ShowMessage(m) if m.persistent && m.content == "Scanning Completed: Zoomable Map"
        )));

        let summary = report.summary.unwrap();
        assert_eq!(summary.session, SessionId(4));
        assert!(summary.covered_pixels > 0);
        assert_eq!(summary.coverage.dimensions(), (320, 240));

        let path = std::env::temp_dir().join("swarm_sweep_summary_test.png");
        summary.save_png(&path).expect("Error Saving File.");
        let decoded = image::open(&path).expect("decode").to_rgba8();
        assert_eq!(decoded, summary.coverage);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_ticks_after_completion_are_noops() {
        let mut c = coordinator();
        let region = small_region();
        let view = view_for(&region);
        let mut overlay = CoverageOverlay::new(320, 240);
        c.start(SessionId(1), region, 1).unwrap();
        while c.tick(&view, &mut overlay).decision == FrameDecision::Continue {}

        let ticks = c.session().unwrap().ticks;
        let before = overlay.image().clone();
        let report = c.tick(&view, &mut overlay);
        assert_eq!(report.decision, FrameDecision::Stop(StopReason::Completed));
        assert!(report.commands.is_empty());
        assert_eq!(c.session().unwrap().ticks, ticks);
        assert_eq!(overlay.image(), &before);
    }

    #[test]
    fn test_coverage_only_grows() {
        let mut c = coordinator();
        let region = small_region();
        let view = view_for(&region);
        let mut overlay = CoverageOverlay::new(320, 240);
        c.start(SessionId(1), region, 2).unwrap();

        let mut previous = 0;
        for _ in 0..200 {
            c.tick(&view, &mut overlay);
            let covered = overlay.covered_pixels();
            assert!(covered >= previous);
            previous = covered;
        }
        assert!(previous > 0);
    }

    #[test]
    fn test_idle_tick_and_restart() {
        let mut c = coordinator();
        let view = Viewport::new(LatLng::default(), 2.0, 64, 64, 19.0);
        let mut overlay = CoverageOverlay::new(64, 64);
        assert_eq!(c.tick(&view, &mut overlay).decision, FrameDecision::Stop(StopReason::Idle));

        c.start(SessionId(1), small_region(), 2).unwrap();
        let commands = c.start(SessionId(2), small_region(), 1).unwrap();
        // Two stale markers removed, one new marker added.
        assert_eq!(commands.len(), 3);
        assert_eq!(c.session().unwrap().id, SessionId(2));

        assert_eq!(c.reset().len(), 1);
        assert_eq!(c.state(), ScanState::Idle);
        assert!(c.session().is_none());
    }

    #[test]
    fn test_failed_start_keeps_previous_session() {
        let mut c = coordinator();
        c.start(SessionId(1), small_region(), 2).unwrap();
        assert!(c.start(SessionId(2), small_region(), 0).is_err());
        assert_eq!(c.session().unwrap().id, SessionId(1));
        assert_eq!(c.state(), ScanState::Running);
    }
}
