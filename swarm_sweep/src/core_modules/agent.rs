// THEORY:
// An `Agent` is the stateful participant of a scan, in the same way a tracked blob
// is the stateful counterpart of a single-frame detection. It binds one strip of
// the region to one trajectory and remembers whether (and when) it finished.
//
// Agents are plain data. They know nothing about markers, maps or canvases; the
// renderer-facing view of an agent is the `MarkerState` snapshot, which adapters
// translate into whatever their surface needs.

use crate::core_modules::region::{LatLng, SubRegion};
use crate::core_modules::trajectory::{Direction, Trajectory};
use image::Rgb;

/// Index of an agent within its scan. Agent `i` sweeps strip `i`.
pub type AgentId = usize;

/// One scanning agent and its sweep state.
#[derive(Debug, Clone)]
pub struct Agent {
    /// Stable identifier for the lifetime of one scan.
    pub id: AgentId,
    /// The strip this agent exclusively covers.
    pub sub_region: SubRegion,
    /// Marker and coverage color.
    pub color: Rgb<u8>,
    /// Set once the sweep reached the strip's southern edge. Never cleared.
    pub finished: bool,
    /// The tick on which `finished` first became true.
    pub finished_at: Option<u64>,
    trajectory: Trajectory,
}

impl Agent {
    pub fn new(id: AgentId, sub_region: SubRegion, speed: f64, row_pitch: f64, color: Rgb<u8>) -> Self {
        Self {
            id,
            sub_region,
            color,
            finished: false,
            finished_at: None,
            trajectory: Trajectory::new(sub_region.bounds, speed, row_pitch),
        }
    }

    /// Moves the agent one step along its sweep and records completion.
    pub fn advance(&mut self, tick: u64) -> LatLng {
        let position = self.trajectory.step();
        if !self.finished && position.lat <= self.sub_region.bounds.lat_min() {
            self.finished = true;
            self.finished_at = Some(tick);
        }
        position
    }

    pub fn position(&self) -> LatLng {
        self.trajectory.position()
    }

    pub fn speed(&self) -> f64 {
        self.trajectory.speed()
    }

    pub fn direction(&self) -> Direction {
        self.trajectory.direction()
    }

    /// The anchor the coverage rectangle is painted from.
    pub fn anchor(&self) -> LatLng {
        self.sub_region.bounds.top_left()
    }

    pub fn marker(&self) -> MarkerState {
        MarkerState {
            id: self.id,
            position: self.position(),
            color: self.color,
            finished: self.finished,
        }
    }
}

/// Renderer-agnostic snapshot of an agent's visual state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerState {
    pub id: AgentId,
    pub position: LatLng,
    pub color: Rgb<u8>,
    pub finished: bool,
}
