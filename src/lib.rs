pub mod config;
pub mod creative;
pub mod graph;
pub mod model;
pub mod publish;
pub mod resolver;
pub mod store;
pub mod thumbnail;
pub mod upload;
