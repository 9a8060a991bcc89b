//! In-memory adapters for testing.

mod store;

pub use store::InMemoryStore;
