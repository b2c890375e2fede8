//! Core domain types and collaborator interfaces.
//!
//! The traits here are the seams to external systems: the platform identity
//! API and the ordered-list store behind the chat history. Concrete
//! implementations live in the `infrastructure` layer.

pub mod chat;
pub mod history;
pub mod identity;
pub mod round;
pub mod settlement;

pub use chat::{AuthState, ConnectionId, build_broadcast};
pub use history::{HistoryStore, StoreError};
pub use identity::{AuthTokens, Claims, IdentityError, IdentityProvider, Profile};
pub use round::{MinigameKind, RoundSummary};
pub use settlement::SettleError;
