//! Authentication strategies and credential sources for SSH connections.
//!
//! Strategies follow the Strategy pattern so the connector can try several
//! methods in order:
//!
//! - [`PasswordAuth`]: Password-based authentication
//! - [`KeyAuth`]: Private key file authentication (optional passphrase)
//! - [`AgentAuth`]: SSH agent authentication
//!
//! [`AuthChain::for_method`] turns a configured [`AuthMethod`] plus the
//! secrets from a [`CredentialSource`] into the chain the connector runs.
//!
//! [`AuthMethod`]: crate::config::AuthMethod

mod agent;
mod chain;
mod credentials;
mod key;
mod password;
mod traits;

pub use agent::AgentAuth;
pub use chain::AuthChain;
pub use credentials::{
    CredentialSource, Credentials, EnvCredentials, PASSPHRASE_ENV_VAR, PASSWORD_ENV_VAR,
    StaticCredentials,
};
pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use traits::AuthStrategy;
