pub mod address;
pub mod command;
pub mod connection;
pub mod constants;
pub mod scan;
pub mod types;
