//! API handlers module

pub mod analyze;
pub mod health;
pub mod mode;
