//! Concrete backends for the domain's store and provider traits.

pub mod history;
pub mod identity;

pub use history::InMemoryHistoryStore;
pub use identity::HttpIdentityProvider;
