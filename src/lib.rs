pub mod cli;
pub mod error;
pub mod net;
pub mod policy;
pub mod service;
pub mod store;
