pub mod file_cache;
pub mod http;
pub mod memory_cache;

pub use file_cache::FileCache;
pub use http::HttpGateway;
pub use memory_cache::MemoryCache;
