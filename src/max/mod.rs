pub mod client;
pub mod error;
pub mod types;
pub mod updates;

pub use client::MaxClient;
pub use error::{ApiError, AuthError};
pub use updates::{PollOptions, UpdateStream};
