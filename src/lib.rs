mod client;
mod cluster;
mod config;
mod errors;
mod node;
mod provision;
mod scenario;
mod topology;
pub(crate) mod utils;

pub use client::*;
pub use cluster::*;
pub use config::*;
pub use errors::*;
pub use node::*;
pub use provision::*;
pub use scenario::*;
pub use topology::*;


//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
