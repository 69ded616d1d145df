//! Session registry for the studiolink upload subsystem.
//!
//! Sessions live in process memory only. A restart loses every in-flight
//! upload and clients start over.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{RegistryError, RegistryResult};
pub use memory::InMemoryRegistry;
pub use store::{SessionPredicate, SessionRegistry};
