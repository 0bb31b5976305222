pub mod api;
pub mod channel;
pub mod config;
pub mod error;
pub mod feed;
pub mod model;
pub mod poller;
pub mod predictor;
