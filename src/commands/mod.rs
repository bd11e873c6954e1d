//! CLI commands implementation

pub mod init;
pub mod migrate;
pub mod serve;
pub mod sql;
pub mod status;

pub use init::*;
pub use migrate::*;
pub use serve::*;
pub use sql::*;
pub use status::*;
