//! Production audio backends
//!
//! The rodio playback resource and the cpal output-route monitor.

pub mod output;
pub mod route;

pub use output::{RodioFactory, RodioResource};
pub use route::CpalRouteMonitor;
