pub mod cache;
pub mod diagram;
pub mod error;
pub mod extract;
pub mod generator;
