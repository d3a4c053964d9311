// Application layer: request validation, orchestration over the account
// store, and the error taxonomy surfaced to clients.

pub mod error;
pub mod response;
pub mod service;

pub use error::*;
pub use response::*;
pub use service::*;
