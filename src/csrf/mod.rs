//! Synchronizer token pattern: token codec, session binding, exemptions,
//! origin and method checks, and the engine tying them together.
//!
//! See [OWASP](https://owasp.org/www-community/attacks/csrf).

pub mod engine;
pub mod exemption;
pub mod method;
pub mod origin;
pub mod store;
pub mod token;
