//! Generic Access Profile types
//!
//! Device addresses, GAP modes and the pairing parameters the demos hand to
//! the stack when a peer asks to pair.

pub mod constants;
pub mod pairing;
pub mod types;

#[cfg(test)]
mod tests;

pub use constants::*;
pub use pairing::*;
pub use types::*;
