//! HTTP API for the intake service

mod catalog;
mod health;
mod intake;
mod records;
mod review;
mod sse;

pub use catalog::catalog_routes;
pub use health::health_routes;
pub use intake::intake_routes;
pub use records::record_routes;
pub use review::review_routes;
pub use sse::event_stream;
