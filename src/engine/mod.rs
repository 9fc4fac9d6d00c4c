pub mod types;
pub mod simulator;
pub mod registry;
pub mod book;
