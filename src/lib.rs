pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod generator;
pub mod logger;
pub mod parser;
pub mod utils;

// Re-export commonly used types
pub use error::{ReqfileError, Result};
pub use parser::{ParseOptions, ParseResult, ParseWarning, Request};
