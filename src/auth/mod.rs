//! Control-plane authentication.
//!
//! The SAML path is a strictly sequential pipeline: discover the IdP's
//! WS-Trust endpoint from the tenant login redirects, resolve the relying
//! party identifier, request a security token, encode it, and trade it for a
//! bearer token at `/api/sessions`. Any failing step aborts the attempt.

mod authenticator;
mod error;
pub mod metadata;
pub mod redirect;
pub mod session;
pub mod token;
pub mod wstrust;

pub use authenticator::{Authenticate, SamlAuthenticator};
pub use error::{AuthError, AuthPhase};
pub use session::accept_media_type;
pub use token::{SecurityAssertion, encode_assertion};
