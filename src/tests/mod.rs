//! Consolidated test modules.
//!
//! End-to-end login scenarios against a mocked control plane and identity
//! provider.

mod login_e2e;
