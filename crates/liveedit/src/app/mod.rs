//! Application layer: the stamping pass, the patch engine and the relay
//! boundary in front of it.

pub mod patch;
pub mod relay;
pub mod rewrite;
pub mod stamp;
