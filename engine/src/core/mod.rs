//! Core utilities: period keys and money math.

pub mod money;
pub mod period;
