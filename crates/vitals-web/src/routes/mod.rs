mod health;
mod service;
mod worker;

pub use health::health_routes;
pub use service::service_routes;
pub use worker::worker_routes;
