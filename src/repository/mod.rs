pub mod kv;
pub mod proxy;

pub use kv::{KvStore, MemoryKvStore, PgKvStore};
pub use proxy::ProxyRecordStore;
