pub mod postman;

pub use postman::{to_collection, to_json};
