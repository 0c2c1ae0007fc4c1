pub mod config;
pub mod error;
pub mod feed;
pub mod pipeline;
pub mod tags;

pub use config::AppConfig;
pub use error::{Error, FetchError, Result, TagFailure};
pub use pipeline::{Pipeline, RunReport};
