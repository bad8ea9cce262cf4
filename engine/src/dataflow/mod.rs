//! Engine → UI event plumbing.

pub mod relay;

pub use relay::{MultipleEmitters, Relay, relay};
