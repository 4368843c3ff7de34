//! Command implementations.

pub mod flush;
pub mod get;
pub mod list;
pub mod login;
pub mod logout;
pub mod queue;
pub mod watch;
pub mod whoami;
pub mod write;
