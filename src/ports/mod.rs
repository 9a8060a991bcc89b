//! Ports - interfaces the application core consumes.

mod broadcaster;
mod store;

pub use broadcaster::Broadcaster;
pub use store::KeyValueStore;
