//! Configuration helpers.

pub mod duration;
