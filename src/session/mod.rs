//! Run-wide setup and the context scenarios are driven with

mod bootstrap;
mod context;

pub use bootstrap::{bootstrap, clean_targets, teardown, CleanTarget, ResourceType, ServiceType};
pub use context::TestContext;
