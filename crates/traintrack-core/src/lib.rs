pub mod access;
pub mod accounts;
pub mod artifact;
pub mod config;
pub mod error;
pub mod execution;
pub mod io;
pub mod paths;
pub mod registry;
pub mod token;
pub mod types;
pub mod upload;

pub use error::{Result, TrainTrackError};
