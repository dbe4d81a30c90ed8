pub mod agent;
pub mod coverage;
pub mod region;
pub mod render_surface;
pub mod trajectory;
pub mod viewport;
