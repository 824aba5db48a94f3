pub mod routes;
pub mod server;

mod auth;
mod error;
mod state;

pub use error::{Result, WebError};
pub use server::{app, start_server};
pub use state::AppState;
