// THEORY:
// The `render_surface` module is the boundary between the simulation and whatever
// draws it. The engine never calls a map API directly; it emits `RenderCommand`s,
// plain data describing what should appear, and a `RenderSurface` adapter applies
// them.
//
// Key architectural principles:
// 1.  **Commands, not Callbacks**: Markers, outlines, view changes and messages are
//     requested as values. The coordinator stays renderer-agnostic and its output is
//     trivially inspectable in tests.
// 2.  **Feedback as Events**: Some commands move the camera (fitting the view to a
//     region, setting the view after a place search). The surface reports those as
//     `ViewChange`s so the controller can react, e.g. by clearing the coverage layer
//     after a zoom.
// 3.  **Headless Reference Adapter**: `HeadlessSurface` keeps everything a map would
//     show as plain state on top of a `Viewport`. It drives the CLI runner and the
//     integration tests.

use crate::core_modules::agent::{AgentId, MarkerState};
use crate::core_modules::region::{BoundingRegion, LatLng};
use crate::core_modules::viewport::{Projector, Viewport};
use image::Rgb;
use std::collections::BTreeMap;

/// A rectangle outline drawn on the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outline {
    pub region: BoundingRegion,
    pub color: Rgb<u8>,
    pub weight: u32,
}

/// An informational popup anchored at a map position.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayMessage {
    pub content: String,
    pub anchor: LatLng,
    /// Persistent messages survive map clicks and other popups.
    pub persistent: bool,
}

/// The single marker placed by a place search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMarker {
    pub position: LatLng,
    pub label: String,
}

/// A side-effect request for the render surface.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    AddMarker(MarkerState),
    MoveMarker { id: AgentId, position: LatLng },
    RemoveMarker { id: AgentId },
    DrawOutline(Outline),
    FitView { region: BoundingRegion, padding: f64 },
    ShowMessage(OverlayMessage),
    SetView { center: LatLng, zoom: f64 },
    /// Removes every layer except the base map.
    ClearLayers,
    PlaceSearchMarker(SearchMarker),
}

/// Camera changes a surface reports back after applying a command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewChange {
    Zoomed,
    Resized { width: u32, height: u32 },
}

/// Anything that can display the scan.
pub trait RenderSurface {
    /// Applies one command and reports any resulting camera changes.
    fn apply(&mut self, command: &RenderCommand) -> Vec<ViewChange>;

    /// The projection currently in effect.
    fn projector(&self) -> &dyn Projector;

    /// Changes the drawing-surface size, as a window resize would.
    fn resize(&mut self, width: u32, height: u32) -> ViewChange;
}

/// An in-memory map surface.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    viewport: Viewport,
    markers: BTreeMap<AgentId, MarkerState>,
    outlines: Vec<Outline>,
    messages: Vec<OverlayMessage>,
    search_marker: Option<SearchMarker>,
}

impl HeadlessSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            markers: BTreeMap::new(),
            outlines: Vec::new(),
            messages: Vec::new(),
            search_marker: None,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn markers(&self) -> &BTreeMap<AgentId, MarkerState> {
        &self.markers
    }

    pub fn outlines(&self) -> &[Outline] {
        &self.outlines
    }

    pub fn messages(&self) -> &[OverlayMessage] {
        &self.messages
    }

    pub fn search_marker(&self) -> Option<&SearchMarker> {
        self.search_marker.as_ref()
    }

    fn move_camera(&mut self, update: impl FnOnce(&mut Viewport)) -> Vec<ViewChange> {
        let before = self.viewport;
        update(&mut self.viewport);

        let mut changes = Vec::new();
        if self.viewport.zoom() != before.zoom() {
            changes.push(ViewChange::Zoomed);
        }
        if self.viewport.center() != before.center() {
            let (width, height) = self.viewport.size();
            changes.push(ViewChange::Resized { width, height });
        }
        changes
    }
}

impl RenderSurface for HeadlessSurface {
    fn apply(&mut self, command: &RenderCommand) -> Vec<ViewChange> {
        match command {
            RenderCommand::AddMarker(marker) => {
                self.markers.insert(marker.id, *marker);
            }
            RenderCommand::MoveMarker { id, position } => {
                if let Some(marker) = self.markers.get_mut(id) {
                    marker.position = *position;
                }
            }
            RenderCommand::RemoveMarker { id } => {
                self.markers.remove(id);
            }
            RenderCommand::DrawOutline(outline) => self.outlines.push(*outline),
            RenderCommand::FitView { region, padding } => {
                return self.move_camera(|view| view.fit_bounds(region, *padding));
            }
            RenderCommand::ShowMessage(message) => self.messages.push(message.clone()),
            RenderCommand::SetView { center, zoom } => {
                return self.move_camera(|view| view.set_view(*center, *zoom));
            }
            RenderCommand::ClearLayers => {
                self.markers.clear();
                self.outlines.clear();
                self.messages.clear();
                self.search_marker = None;
            }
            RenderCommand::PlaceSearchMarker(marker) => self.search_marker = Some(marker.clone()),
        }
        Vec::new()
    }

    fn projector(&self) -> &dyn Projector {
        &self.viewport
    }

    fn resize(&mut self, width: u32, height: u32) -> ViewChange {
        self.viewport.resize(width, height);
        ViewChange::Resized { width, height }
    }
}
