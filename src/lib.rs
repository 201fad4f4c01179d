pub mod config;
pub mod server;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use storage::FileStorage;
