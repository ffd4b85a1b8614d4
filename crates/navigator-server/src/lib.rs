//! Navigator HTTP server: conversational retrieval and tool invocation
//! endpoints over the `navigator-chat` pipelines.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
