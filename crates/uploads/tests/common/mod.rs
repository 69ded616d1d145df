pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mocks::{FailingDeleteRegistry, RecordingIngestion, StaticTenancy};
