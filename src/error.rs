//! Error types produced during attestation verification. Failures travel on
//! two channels that callers must keep apart: an unsupported statement is
//! fatal and can never be processed, while a rejection is the ordinary
//! negative verdict of validation.

use openssl::error::ErrorStack;
use thiserror::Error;

/// A statement feature this library does not implement at all.
///
/// This is not a validation verdict. The statement could not be judged, so
/// the caller must refuse the registration outright rather than handling it
/// as a merely invalid statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnsupportedFeature {
    /// The statement carries an `ecdaaKeyId`, selecting ECDAA attestation.
    #[error("ECDAA attestation is not supported")]
    Ecdaa,
}

/// Why an attestation statement was refused.
///
/// A rejection is an expected outcome. The caller declines the credential,
/// and identical inputs will always be declined again; there is nothing to
/// retry.
#[derive(Debug, Error)]
pub enum Rejection {
    /// The attestation statement was not a CBOR map.
    #[error("attestation statement map invalid")]
    AttestationStatementMapInvalid,
    /// The required `alg` member is missing.
    #[error("attestation statement alg missing")]
    AttestationStatementAlgMissing,
    /// The `alg` member is not a recognised algorithm identifier.
    #[error("attestation statement alg invalid")]
    AttestationStatementAlgInvalid,
    /// The `alg` member disagrees with the credential public key algorithm.
    #[error("attestation statement alg mismatch")]
    AttestationStatementAlgMismatch,
    /// The required `sig` member is missing.
    #[error("attestation statement sig missing")]
    AttestationStatementSigMissing,
    /// The signature did not verify over the expected data.
    #[error("attestation statement sig invalid")]
    AttestationStatementSigInvalid,
    /// The `x5c` member could not be used as a certificate chain.
    #[error("attestation statement x5c invalid")]
    AttestationStatementX5CInvalid,
    /// Members of the statement that are mutually exclusive were both set.
    #[error("attestation statement fields conflicting")]
    AttestationStatementFieldsConflicting,
    /// A certificate extension that must be present is absent.
    #[error("attestation certificate extension missing")]
    AttestationStatementMissingExtension,
    /// The leaf certificate aaguid extension disagrees with the aaguid in
    /// the authenticator data.
    #[error("attestation certificate aaguid mismatch")]
    AttestationCertificateAAGUIDMismatch,
    /// The leaf certificate does not meet the packed attestation
    /// certificate requirements.
    #[error("attestation certificate requirements not met")]
    AttestationCertificateRequirementsNotMet,
    /// A certificate public key is not a valid elliptic curve key.
    #[error("certificate public key invalid")]
    CertificatePublicKeyInvalid,
    /// A COSE key could not be read from its CBOR form.
    #[error("COSE key invalid cbor value")]
    COSEKeyInvalidCBORValue,
    /// A COSE key is of a type that is not accepted here.
    #[error("COSE key invalid type")]
    COSEKeyInvalidType,
    /// A COSE algorithm identifier is outside the supported set.
    #[error("COSE key invalid algorithm")]
    COSEKeyInvalidAlgorithm,
    /// EC coordinates did not name a point on the declared curve.
    #[error("COSE key ECDSA x/y coordinates invalid")]
    COSEKeyECDSAXYInvalid,
    /// The EC curve identifier is unknown.
    #[error("COSE key ECDSA curve invalid")]
    COSEKeyECDSAInvalidCurve,
    /// RSA modulus or exponent are the wrong size.
    #[error("COSE key RSA n/e invalid")]
    COSEKeyRSANEInvalid,
    /// An OpenSSL operation failed on the supplied data.
    #[error("openssl error: {0}")]
    OpenSSLError(#[from] ErrorStack),
}

/// The failure channel of [`crate::verify_packed_attestation`].
#[derive(Debug, Error)]
pub enum AttestError {
    /// The statement cannot be processed at all. Callers must surface this
    /// as a fatal condition and must not fold it into an ordinary
    /// rejection.
    #[error("unsupported attestation feature: {0}")]
    Unsupported(#[from] UnsupportedFeature),
    /// The statement was processed and refused. This is the expected
    /// negative outcome of validation.
    #[error("attestation statement rejected: {0}")]
    Rejected(#[from] Rejection),
}
