pub mod app;
pub mod client;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod granule;
pub mod listing;
pub mod metadata;
pub mod output;
pub mod store;

pub use app::EcostressCloud;
pub use error::FetchError;
