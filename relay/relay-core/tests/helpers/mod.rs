#![allow(dead_code)]

pub mod fixtures;
pub mod mock_network;

pub use fixtures::*;
pub use mock_network::*;
