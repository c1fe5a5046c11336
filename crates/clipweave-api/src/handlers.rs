//! Request handlers.

pub mod compile;
pub mod health;

pub use compile::*;
pub use health::*;
