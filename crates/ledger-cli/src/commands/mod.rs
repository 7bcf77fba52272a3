pub mod add;
pub mod common;
pub mod completions;
pub mod pending;
pub mod prune;
pub mod sync;
pub mod view;
