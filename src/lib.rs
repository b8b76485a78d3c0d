pub mod app;
pub mod chart;
pub mod config;
pub mod error;
pub mod fetch;
pub mod quote;
pub mod series;
pub mod utils;

pub use error::{AppError, ParseError, Result};
