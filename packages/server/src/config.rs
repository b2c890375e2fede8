//! Runtime configuration resolved at startup.

/// Settings the server binary assembles from flags and the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub host: String,
    /// Port the listener binds to.
    pub port: u16,
    /// Base URL of the identity service.
    pub identity_url: String,
    /// Audience expected in access tokens.
    pub token_audience: String,
    /// Shared secret access tokens are verified against.
    pub verify_secret: String,
    /// Environment label reported by the version endpoint.
    pub environment: String,
    /// Number of chat messages kept before the oldest is evicted.
    pub history_cap: usize,
}
