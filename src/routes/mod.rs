pub mod cors;
pub mod generate;
