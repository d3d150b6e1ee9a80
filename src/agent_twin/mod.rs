pub mod agent;
pub mod agent_facts;
pub mod audit;
pub mod catalog;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod directory;
pub mod envelope;
pub mod forwarder;
pub mod handler;
pub mod http_client_pool;
pub mod mention;
pub mod selector;
#[cfg(feature = "server")]
pub mod server;
