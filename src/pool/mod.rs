pub mod object_pool;
pub mod registry;

pub use object_pool::{ObjectPool, PoolStats};
pub use registry::PoolRegistry;
