pub mod curl;

pub use curl::{parse_curl, parse_curl_args};
