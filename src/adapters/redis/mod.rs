//! Redis adapters - production persistence.

mod store;

pub use store::RedisStore;
