pub mod jwt;

// Re-export commonly used items
pub use jwt::{CredentialError, TokenClaims, issue_token};
