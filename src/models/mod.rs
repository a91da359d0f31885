//! Model traits and implementations
//!
//! The CTRV motion model and the lidar/radar measurement models.

mod observation;
mod transition;

pub use observation::*;
pub use transition::*;
