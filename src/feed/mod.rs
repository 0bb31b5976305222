pub mod decoder;
pub mod rest;
pub mod types;

pub use decoder::RoundDecoder;
pub use rest::FeedClient;
pub use types::{FeedItem, FeedResponse};
