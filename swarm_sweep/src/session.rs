// THEORY:
// The `session` module is the application state of the sweep engine. Where the
// original page kept click counters and scan handles in loose variables, the
// `ScanController` holds them in one struct and changes them only through
// `handle(event)`, which returns the side effects the host must carry out.
//
// Key architectural principles:
// 1.  **Events In, Effects Out**: Every user or view event is a `ControlEvent`. The
//     controller updates its own state and answers with `Effect`s (render commands,
//     "start a frame loop for this session", alerts). It never calls a renderer.
// 2.  **Two-Click Gesture**: A rectangle is closed by two clicks in any order. The
//     gesture is emptied after every pair, whether or not the pair was usable.
// 3.  **Session Identity**: Every started scan and every reset mints a new
//     `SessionId`. A frame loop asks `on_frame` with the id it was started for and
//     is told to stop as soon as that id is no longer the active one. This is what
//     keeps two loops from painting onto the same overlay.
// 4.  **Canonical Reset**: Reset from any state lands on the same idle state: empty
//     gesture, empty overlay, no session, default agent count.

use crate::config::{ConfigError, ScanConfig};
use crate::coordinator::{
    FrameDecision, ScanCoordinator, ScanState, ScanSummary, SessionId, StopReason, TickReport,
};
use crate::core_modules::coverage::CoverageOverlay;
use crate::core_modules::region::{BoundingRegion, LatLng};
use crate::core_modules::render_surface::{Outline, RenderCommand, SearchMarker};
use crate::core_modules::viewport::Projector;
use crate::error::ScanError;
use crate::lookup::Place;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything the outside world can tell the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// A point captured on the map.
    MapClicked(LatLng),
    /// The agent-count selector changed.
    AgentCountSelected(u32),
    Reset,
    /// The view was resized or panned; the overlay must match the new surface.
    ViewResized { width: u32, height: u32 },
    /// A zoom animation finished; projected coverage is no longer valid.
    ZoomEnded,
    /// A place-lookup result was chosen.
    PlaceSelected(Place),
}

/// A side effect requested by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Render(RenderCommand),
    /// Begin requesting frames for this session.
    StartScan(SessionId),
    /// A user-visible message; nothing in the scan state depends on it.
    Alert(String),
}

/// Two-point capture state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionGesture {
    captured: Vec<LatLng>,
}

impl SelectionGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn click_count(&self) -> usize {
        self.captured.len()
    }

    pub fn captured(&self) -> &[LatLng] {
        &self.captured
    }

    /// Records a click. Returns both corners once a pair is complete and starts
    /// over for the next pair.
    pub fn capture(&mut self, point: LatLng) -> Option<(LatLng, LatLng)> {
        self.captured.push(point);
        if self.captured.len() < 2 {
            return None;
        }
        let corners = (self.captured[0], self.captured[1]);
        self.captured.clear();
        Some(corners)
    }

    pub fn clear(&mut self) {
        self.captured.clear();
    }
}

/// The observable state that reset must make canonical.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub state: ScanState,
    pub captured_points: usize,
    pub agent_count: u32,
    pub overlay_empty: bool,
    pub has_session: bool,
}

/// Owns the selection gesture, the coordinator and the coverage overlay.
pub struct ScanController {
    config: Arc<ScanConfig>,
    gesture: SelectionGesture,
    agent_count: u32,
    coordinator: ScanCoordinator,
    overlay: CoverageOverlay,
    active: SessionId,
    last_summary: Option<ScanSummary>,
}

impl ScanController {
    /// Builds a controller from a configuration, rejecting invalid values.
    pub fn new(config: ScanConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            gesture: SelectionGesture::new(),
            agent_count: config.agents.default_count,
            coordinator: ScanCoordinator::new(config.clone()),
            overlay: CoverageOverlay::new(config.view.width, config.view.height),
            active: SessionId::default(),
            last_summary: None,
            config,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn state(&self) -> ScanState {
        self.coordinator.state()
    }

    pub fn coordinator(&self) -> &ScanCoordinator {
        &self.coordinator
    }

    pub fn gesture(&self) -> &SelectionGesture {
        &self.gesture
    }

    pub fn agent_count(&self) -> u32 {
        self.agent_count
    }

    pub fn overlay(&self) -> &CoverageOverlay {
        &self.overlay
    }

    /// The session a frame loop must belong to in order to keep running.
    pub fn active_session(&self) -> SessionId {
        self.active
    }

    /// Summary of the most recently completed scan, until the next reset.
    pub fn last_summary(&self) -> Option<&ScanSummary> {
        self.last_summary.as_ref()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.coordinator.state(),
            captured_points: self.gesture.click_count(),
            agent_count: self.agent_count,
            overlay_empty: self.overlay.is_empty(),
            has_session: self.coordinator.session().is_some(),
        }
    }

    /// Applies one event and returns the side effects it requires.
    pub fn handle(&mut self, event: ControlEvent) -> Vec<Effect> {
        match event {
            ControlEvent::MapClicked(point) => match self.gesture.capture(point) {
                Some((a, b)) => self.close_rectangle(a, b),
                None => Vec::new(),
            },
            ControlEvent::AgentCountSelected(count) => self.select_agent_count(count),
            ControlEvent::Reset => self.reset(),
            ControlEvent::ViewResized { width, height } => {
                self.overlay.resize(width, height);
                Vec::new()
            }
            ControlEvent::ZoomEnded => {
                self.overlay.clear();
                Vec::new()
            }
            ControlEvent::PlaceSelected(place) => {
                let position = LatLng::new(place.lat, place.lon);
                vec![
                    Effect::Render(RenderCommand::PlaceSearchMarker(SearchMarker {
                        position,
                        label: place.label,
                    })),
                    Effect::Render(RenderCommand::SetView {
                        center: position,
                        zoom: self.config.view.place_zoom,
                    }),
                ]
            }
        }
    }

    /// Runs one frame for `session`, or tells a stale loop to stop.
    pub fn on_frame(&mut self, session: SessionId, projector: &dyn Projector) -> TickReport {
        if session != self.active {
            debug!(stale = %session, active = %self.active, "stopping superseded frame loop");
            return TickReport {
                commands: Vec::new(),
                painted_pixels: 0,
                decision: FrameDecision::Stop(StopReason::Superseded),
                summary: None,
            };
        }

        let report = self.coordinator.tick(projector, &mut self.overlay);
        if let Some(summary) = &report.summary {
            self.last_summary = Some(summary.clone());
        }
        report
    }

    fn close_rectangle(&mut self, a: LatLng, b: LatLng) -> Vec<Effect> {
        let region = match BoundingRegion::from_corners(a, b) {
            Ok(region) => region,
            Err(err) => {
                warn!(error = %err, "selection rejected");
                return vec![Effect::Alert(err.to_string())];
            }
        };

        let next = SessionId(self.active.0 + 1);
        let commands = match self.coordinator.start(next, region, self.agent_count as usize) {
            Ok(commands) => commands,
            Err(err) => {
                warn!(error = %err, "scan could not start");
                return vec![Effect::Alert(err.to_string())];
            }
        };

        self.active = next;
        self.overlay.clear();

        let mut effects = Vec::with_capacity(commands.len() + 2);
        effects.push(Effect::Render(RenderCommand::DrawOutline(Outline {
            region,
            color: self.config.outline_color(),
            weight: self.config.completion.selection_weight,
        })));
        effects.extend(commands.into_iter().map(Effect::Render));
        effects.push(Effect::StartScan(next));
        effects
    }

    fn select_agent_count(&mut self, count: u32) -> Vec<Effect> {
        let (min, max) = (self.config.agents.min_count, self.config.agents.max_count);
        if !(min..=max).contains(&count) {
            let err = ScanError::InvalidAgentCount { requested: count, min, max };
            warn!(error = %err, "agent count rejected");
            return vec![Effect::Alert(err.to_string())];
        }
        self.agent_count = count;
        Vec::new()
    }

    fn reset(&mut self) -> Vec<Effect> {
        let removals = self.coordinator.reset();
        self.gesture.clear();
        self.overlay.clear();
        self.agent_count = self.config.agents.default_count;
        self.last_summary = None;
        self.active = SessionId(self.active.0 + 1);
        info!(session = %self.active, "reset");

        let mut effects: Vec<Effect> = removals.into_iter().map(Effect::Render).collect();
        effects.push(Effect::Render(RenderCommand::ClearLayers));
        effects.push(Effect::Render(RenderCommand::SetView {
            center: self.config.view.default_center,
            zoom: self.config.view.default_zoom,
        }));
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::viewport::Viewport;

    fn controller() -> ScanController {
        ScanController::new(ScanConfig::default()).expect("default config is valid")
    }

    fn view() -> Viewport {
        let region = BoundingRegion::new(1.0, 1.002, 1.0, 1.006).unwrap();
        let mut view = Viewport::new(region.center(), 2.0, 1280, 720, 19.0);
        view.fit_bounds(&region, 0.05);
        view
    }

    fn click_rectangle(c: &mut ScanController, a: LatLng, b: LatLng) -> Vec<Effect> {
        assert!(c.handle(ControlEvent::MapClicked(a)).is_empty());
        c.handle(ControlEvent::MapClicked(b))
    }

    fn started(effects: &[Effect]) -> Option<SessionId> {
        effects.iter().find_map(|e| match e {
            Effect::StartScan(id) => Some(*id),
            _ => None,
        })
    }

    #[test]
    fn test_reverse_order_clicks_normalize() {
        let mut forward = controller();
        let mut reverse = controller();
        click_rectangle(&mut forward, LatLng::new(1.0, 1.0), LatLng::new(5.0, 5.0));
        click_rectangle(&mut reverse, LatLng::new(5.0, 5.0), LatLng::new(1.0, 1.0));

        let region = reverse.coordinator().session().unwrap().region;
        assert_eq!(region, forward.coordinator().session().unwrap().region);
        assert_eq!(
            (region.lat_min(), region.lat_max(), region.lng_min(), region.lng_max()),
            (1.0, 5.0, 1.0, 5.0)
        );
    }

    #[test]
    fn test_closing_a_rectangle_starts_a_scan() {
        let mut c = controller();
        c.handle(ControlEvent::AgentCountSelected(3));
        let effects = click_rectangle(&mut c, LatLng::new(1.0, 1.0), LatLng::new(1.002, 1.006));

        assert!(matches!(
            &effects[0],
            Effect::Render(RenderCommand::DrawOutline(o)) if o.weight == 1
        ));
        let markers = effects
            .iter()
            .filter(|e| matches!(e, Effect::Render(RenderCommand::AddMarker(_))))
            .count();
        assert_eq!(markers, 3);
        assert_eq!(started(&effects), Some(c.active_session()));
        assert_eq!(c.state(), ScanState::Running);
        assert_eq!(c.gesture().click_count(), 0);
    }

    #[test]
    fn test_degenerate_rectangle_alerts_and_resets_gesture() {
        let mut c = controller();
        let effects = click_rectangle(&mut c, LatLng::new(1.0, 1.0), LatLng::new(1.0, 3.0));
        assert!(matches!(&effects[..], [Effect::Alert(msg)] if msg.contains("invalid region")));
        assert_eq!(c.gesture().click_count(), 0);
        assert_eq!(c.state(), ScanState::Idle);

        // The next click starts a fresh pair.
        assert!(c.handle(ControlEvent::MapClicked(LatLng::new(2.0, 2.0))).is_empty());
        assert_eq!(c.gesture().click_count(), 1);
    }

    #[test]
    fn test_agent_count_outside_range_is_rejected() {
        let mut c = controller();
        for bad in [0, 6, 42] {
            let effects = c.handle(ControlEvent::AgentCountSelected(bad));
            assert!(matches!(&effects[..], [Effect::Alert(_)]));
        }
        assert_eq!(c.agent_count(), 1);
        assert!(c.handle(ControlEvent::AgentCountSelected(5)).is_empty());
        assert_eq!(c.agent_count(), 5);
    }

    #[test]
    fn test_stale_session_frames_are_refused() {
        let mut c = controller();
        let view = view();
        let first = started(&click_rectangle(&mut c, LatLng::new(1.0, 1.0), LatLng::new(1.002, 1.006))).unwrap();
        assert_eq!(c.on_frame(first, &view).decision, FrameDecision::Continue);

        let second = started(&click_rectangle(&mut c, LatLng::new(1.0, 1.0), LatLng::new(1.002, 1.006))).unwrap();
        assert_ne!(first, second);
        assert_eq!(
            c.on_frame(first, &view).decision,
            FrameDecision::Stop(StopReason::Superseded)
        );
        assert_eq!(c.on_frame(second, &view).decision, FrameDecision::Continue);

        c.handle(ControlEvent::Reset);
        assert_eq!(
            c.on_frame(second, &view).decision,
            FrameDecision::Stop(StopReason::Superseded)
        );
    }

    #[test]
    fn test_reset_is_idempotent_from_every_state() {
        let canonical = {
            let mut c = controller();
            c.handle(ControlEvent::Reset);
            c.snapshot()
        };
        assert_eq!(
            canonical,
            ControllerSnapshot {
                state: ScanState::Idle,
                captured_points: 0,
                agent_count: 1,
                overlay_empty: true,
                has_session: false,
            }
        );

        // Idle with half a gesture and a changed agent count.
        let mut idle = controller();
        idle.handle(ControlEvent::AgentCountSelected(4));
        idle.handle(ControlEvent::MapClicked(LatLng::new(3.0, 3.0)));
        idle.handle(ControlEvent::Reset);
        assert_eq!(idle.snapshot(), canonical);

        // Running with painted coverage.
        let view = view();
        let mut running = controller();
        running.handle(ControlEvent::AgentCountSelected(2));
        let id = started(&click_rectangle(&mut running, LatLng::new(1.0, 1.0), LatLng::new(1.002, 1.006))).unwrap();
        for _ in 0..30 {
            running.on_frame(id, &view);
        }
        assert!(!running.overlay().is_empty());
        running.handle(ControlEvent::Reset);
        assert_eq!(running.snapshot(), canonical);

        // Completed.
        let mut completed = controller();
        let id = started(&click_rectangle(&mut completed, LatLng::new(1.0, 1.0), LatLng::new(1.001, 1.002))).unwrap();
        while completed.on_frame(id, &view).decision == FrameDecision::Continue {}
        assert_eq!(completed.state(), ScanState::Completed);
        assert!(completed.last_summary().is_some());
        let effects = completed.handle(ControlEvent::Reset);
        assert_eq!(completed.snapshot(), canonical);
        assert!(completed.last_summary().is_none());

        // Reset twice in a row is still canonical.
        assert_eq!(completed.handle(ControlEvent::Reset), effects);
        assert_eq!(completed.snapshot(), canonical);
        assert_eq!(
            effects,
            vec![
                Effect::Render(RenderCommand::ClearLayers),
                Effect::Render(RenderCommand::SetView { center: LatLng::new(20.0, 0.0), zoom: 2.0 }),
            ]
        );
    }

    #[test]
    fn test_view_events_clear_the_overlay() {
        let view = view();
        let mut c = controller();
        let id = started(&click_rectangle(&mut c, LatLng::new(1.0, 1.0), LatLng::new(1.002, 1.006))).unwrap();
        // The first row has no height yet; coverage appears once the agent drops a row.
        for _ in 0..30 {
            c.on_frame(id, &view);
        }
        assert!(!c.overlay().is_empty());

        c.handle(ControlEvent::ZoomEnded);
        assert!(c.overlay().is_empty());

        c.on_frame(id, &view);
        c.handle(ControlEvent::ViewResized { width: 640, height: 360 });
        assert!(c.overlay().is_empty());
        assert_eq!((c.overlay().width(), c.overlay().height()), (640, 360));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ScanConfig::default();
        config.speed.min_speed = 0.0;
        assert!(matches!(ScanController::new(config), Err(ConfigError::Invalid(_))));

        let mut config = ScanConfig::default();
        config.agents.default_count = 0;
        assert!(matches!(ScanController::new(config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_reset_while_running_removes_agent_markers_first() {
        let mut c = controller();
        c.handle(ControlEvent::AgentCountSelected(3));
        click_rectangle(&mut c, LatLng::new(1.0, 1.0), LatLng::new(1.002, 1.006));

        let effects = c.handle(ControlEvent::Reset);
        let removed: Vec<usize> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::Render(RenderCommand::RemoveMarker { id }) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![0, 1, 2]);
        assert_eq!(effects[3], Effect::Render(RenderCommand::ClearLayers));
        assert_eq!(effects.len(), 5);
    }

    #[test]
    fn test_place_selection_moves_the_view() {
        let mut c = controller();
        let effects = c.handle(ControlEvent::PlaceSelected(Place {
            label: "Lisbon, Portugal".into(),
            lat: 38.72,
            lon: -9.14,
        }));
        assert_eq!(
            effects,
            vec![
                Effect::Render(RenderCommand::PlaceSearchMarker(SearchMarker {
                    position: LatLng::new(38.72, -9.14),
                    label: "Lisbon, Portugal".into(),
                })),
                Effect::Render(RenderCommand::SetView { center: LatLng::new(38.72, -9.14), zoom: 14.0 }),
            ]
        );
    }
}
