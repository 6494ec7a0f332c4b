//! In-memory storage backend for Talaria.
//!
//! [`MemoryStorage`] and [`MemoryQueueStore`] implement the trait contracts
//! from `talaria-storage` against [`dashmap`]. Entries live for the process
//! lifetime; the queue claim path uses entry-level conditional updates so
//! the no-double-claim guarantee holds even with several loop instances.

pub mod queue;
pub mod store;

pub use queue::MemoryQueueStore;
pub use store::MemoryStorage;
