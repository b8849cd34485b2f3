//! Networks and parameter utilities used by the trainers.

pub mod mlp;
pub mod target_network;

pub use mlp::{MlpConfig, MlpModel};
pub use target_network::soft_update;
