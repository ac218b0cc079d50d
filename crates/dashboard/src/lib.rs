//! # Relay Dashboard
//!
//! Staff-side half of the relay.
//!
//! - [`DashboardState`]: pure reducer over broker events; last-write-wins by envelope timestamp
//! - [`LiveView`]: a mounted dashboard owning its subscription
//! - [`render`]: plain-text rendering of the current state

pub mod render;
pub mod state;
pub mod view;

pub use render::render;
pub use state::{ConnectionState, DashboardState, DisplayState, Outcome, Snapshot};
pub use view::LiveView;
