//! Core types for type-safe vector spaces, measurements and the belief

pub mod angle;
pub mod belief;
pub mod measurement;
pub mod spaces;
pub mod transforms;
