// Application layer - use cases and orchestration.
// Validation of user input lives here; the balance engine in `domain` stays permissive.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
