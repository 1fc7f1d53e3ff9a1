// SQLite chat history store

pub use operations::*;
pub use pool::*;

pub mod operations;
pub mod pool;
