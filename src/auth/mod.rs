// Authentication module
// Manages the session credential, its persistence and the token lifecycle

mod manager;
mod store;
mod types;

pub use manager::AuthManager;
pub use store::CredentialStore;
pub use types::{Credential, TokenStatus};
