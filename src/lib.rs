//! packed-attest - Webauthn Packed Attestation Statement Verification
//!
//! During a Webauthn registration ceremony an authenticator may provide a
//! packed attestation statement, asserting that the newly created credential
//! really was generated by a genuine device (or is self-asserted by the
//! credential key itself). This library implements the verification
//! procedure for that statement format only: it decides whether the
//! statement is acceptable, and derives the attestation type and trust path
//! from the statement's shape.
//!
//! The caller is expected to have already decoded the attestation object
//! and parsed the authenticator data. This library consumes the statement's
//! structured fields, the exact authenticator data bytes, and the client
//! data hash, and returns a [`proto::ParsedAttestationData`] on success.
//!
//! Other attestation statement formats (fido-u2f, tpm, android-key,
//! android-safetynet, apple, none) use different verification procedures
//! and are out of scope here. ECDAA is explicitly unsupported and surfaces
//! on a fatal error channel, distinct from an ordinary rejection.

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

mod attestation;
mod crypto;

pub mod error;
pub mod interface;

/// Protocol bindings
pub mod proto {
    pub use crate::interface::*;
    pub use base64urlsafedata::Base64UrlSafeData;
}

pub use crate::attestation::{
    validate_extension, verify_packed_attestation, AttestationX509Extension, FidoGenCeAaguid,
};
pub use crate::crypto::compute_sha256;
