// THEORY:
// This file is the main entry point for the `swarm_sweep` library crate. It
// exposes the engine that sweeps a user-selected map rectangle with a small swarm
// of simulated agents, paints their coverage, and reports when every agent has
// finished.
//
// Layering, from the bottom up:
// - `core_modules`: geometry (regions, strips, trajectories, projection), the agents
//   themselves, the coverage raster and the render-command vocabulary.
// - `coordinator`: one scan's state machine and its per-frame tick.
// - `session`: the application state. Events in, effects out.
// - `scheduler`: the frame loop, the host that wires a controller to a render
//   surface, and the liveness guard that retires stale loops.
// - `lookup`: geocoding of typed place names.
//
// A consumer normally builds a `ScanController` from a `ScanConfig`, wraps it in a
// `ScanHost` with a `RenderSurface`, dispatches `ControlEvent`s, and runs
// `run_scan_loop` for every session a dispatch starts.

pub mod config;
pub mod coordinator;
pub mod core_modules;
pub mod error;
pub mod lookup;
pub mod scheduler;
pub mod session;

pub use config::{ConfigError, ScanConfig};
pub use coordinator::{FrameDecision, ScanCoordinator, ScanState, ScanSummary, SessionId, StopReason};
pub use core_modules::region::{BoundingRegion, LatLng, SubRegion, partition};
pub use core_modules::render_surface::{HeadlessSurface, RenderCommand, RenderSurface, ViewChange};
pub use core_modules::viewport::{Projector, Viewport};
pub use error::ScanError;
pub use lookup::{NominatimClient, Place, PlaceLookup, SearchError};
pub use scheduler::{
    Dispatch, FrameScheduler, ImmediateScheduler, IntervalScheduler, LoopOutcome, ScanHost, run_scan_loop,
    spawn_scan_loop,
};
pub use session::{ControlEvent, Effect, ScanController};
