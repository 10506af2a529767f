pub mod application;
pub mod status;
pub mod style;
pub mod types;
