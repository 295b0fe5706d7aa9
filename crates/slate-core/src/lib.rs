pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::SlateConfig;
pub use error::{Result, SlateError};
pub use types::*;
