pub mod config;
pub mod controller;
pub mod directory;
pub mod filter;
pub mod model;
pub mod owner;
pub mod rollout;

pub use config::{kube_client, RestarterConfig};
pub use controller::*;

#[cfg(test)]
pub mod fixtures;
