//! logmon - stream appended lines of watched text files, like `tail -f` as a service.

pub mod config;
pub mod server;
pub mod watcher;
