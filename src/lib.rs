//! Usage analytics for Factory Droid sessions.

pub mod droid;
pub mod shared;
