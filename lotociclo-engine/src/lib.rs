pub mod absence;
pub mod config;
pub mod cycle;
pub mod error;
pub mod generator;
pub mod history;
pub mod report;
pub mod service;
pub mod store;
pub mod tracker;

pub use error::CycleError;
