//! Identity provider port and the GoTrue-style client.

pub mod gotrue;
pub mod provider;

pub use gotrue::{GoTrueAuth, SharedAccessToken};
pub use provider::{Identity, IdentityEvent, IdentityMetadata, IdentityProvider, SignUpResponse};
