//! Credential protection for Odoo connections and reasoning service keys.
//!
//! - `credentials`: zeroizing secret container with redacted `Debug`
//! - `connection`: validated connection details and connection URL parsing
//! - `encryption`: AES-GCM credential sealing (feature `encryption`)
//!
//! # Security Guarantees
//! - Secrets live in `Zeroizing` containers and are wiped on drop
//! - `Display` and `Debug` of every type here omit the secret
//! - Endpoints are validated to carry no embedded user information

mod connection;
mod credentials;

#[cfg(feature = "encryption")]
pub mod encryption;

pub use connection::{Connection, parse_connection_url};
pub use credentials::Credential;
