pub mod block;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod exec;
pub mod io;
pub mod network;
pub mod resource;
pub mod spec;
pub mod utils;

pub mod prelude;
