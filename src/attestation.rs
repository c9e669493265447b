//! Attestation information and verification procedures. This implements
//! the verification procedure for the packed attestation statement format,
//! deciding whether a newly created credential was produced by a genuine
//! authenticator or is self-asserted by the credential key.

use std::cell::OnceCell;

use base64urlsafedata::Base64UrlSafeData;
use openssl::x509;
use x509_parser::oid_registry::Oid;

use crate::crypto::{assert_ec_key_consistent, assert_packed_attest_req, verify_signature};
use crate::error::{AttestError, Rejection, UnsupportedFeature};
use crate::interface::*;

/// x509 certificate extensions are validated by checking
/// that the value of the extension is equal to some other value
pub trait AttestationX509Extension {
    /// the type of the value in the certificate extension
    type Output: Eq;

    /// the oid of the extension
    const OID: Oid<'static>;

    /// how to parse the value out of the certificate extension
    fn parse(i: &[u8]) -> der_parser::error::BerResult<'_, Self::Output>;

    /// if `true`, then validating this certificate fails if this extension
    /// is missing
    const IS_REQUIRED: bool;

    /// what error to return if validation fails---i.e. if the "other value"
    /// is not equal to that in the extension
    const VALIDATION_ERROR: Rejection;
}

/// The Fido AAGUID x509 extension
pub struct FidoGenCeAaguid;

impl AttestationX509Extension for FidoGenCeAaguid {
    // If cert contains an extension with OID 1 3 6 1 4 1 45724 1 1 4 (id-fido-gen-ce-aaguid)
    const OID: Oid<'static> = der_parser::oid!(1.3.6 .1 .4 .1 .45724 .1 .1 .4);

    // verify that the value of this extension matches the aaguid in authenticatorData.
    type Output = Aaguid;

    fn parse(i: &[u8]) -> der_parser::error::BerResult<'_, Self::Output> {
        let (rem, aaguid) = der_parser::der::parse_der_octetstring(i)?;
        let aaguid: Aaguid = aaguid
            .as_slice()
            .map_err(|_| der_parser::error::BerError::InvalidLength)?
            .try_into()
            .map_err(|_| der_parser::error::BerError::InvalidLength)?;

        Ok((rem, aaguid))
    }

    const IS_REQUIRED: bool = false;

    const VALIDATION_ERROR: Rejection = Rejection::AttestationCertificateAAGUIDMismatch;
}

/// Validate an x509 extension is present in an x509 certificate
pub fn validate_extension<T>(
    x509: &x509::X509,
    data: &<T as AttestationX509Extension>::Output,
) -> Result<(), Rejection>
where
    T: AttestationX509Extension,
{
    let der_bytes = x509.to_der().map_err(Rejection::OpenSSLError)?;
    x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| Rejection::AttestationStatementX5CInvalid)?
        .1
        .extensions()
        .iter()
        .find_map(|extension| {
            (extension.oid == T::OID).then(|| {
                T::parse(extension.value)
                    .map_err(|_| Rejection::AttestationStatementX5CInvalid)
                    .and_then(|(_, output)| {
                        if &output == data {
                            Ok(())
                        } else {
                            Err(T::VALIDATION_ERROR)
                        }
                    })
            })
        })
        .unwrap_or({
            if T::IS_REQUIRED {
                Err(Rejection::AttestationStatementMissingExtension)
            } else {
                Ok(())
            }
        })
}

/// The certificate chain supplied in an x5c member. Parsing is deferred
/// until a verification step needs the chain, and happens at most once.
/// The cache belongs to a single verification call and is never shared
/// across calls or threads.
pub(crate) struct CertificateChain<'a> {
    raw: &'a [Base64UrlSafeData],
    parsed: OnceCell<Vec<x509::X509>>,
}

impl<'a> CertificateChain<'a> {
    pub(crate) fn new(raw: &'a [Base64UrlSafeData]) -> Self {
        CertificateChain {
            raw,
            parsed: OnceCell::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The parsed chain, leaf first. Malformed DER anywhere in the list is
    /// a rejection.
    pub(crate) fn certs(&self) -> Result<&[x509::X509], Rejection> {
        if let Some(certs) = self.parsed.get() {
            return Ok(certs);
        }

        let certs = self
            .raw
            .iter()
            .map(|der| x509::X509::from_der(der.as_ref()).map_err(Rejection::OpenSSLError))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.parsed.get_or_init(|| certs))
    }

    /// The attestation certificate. attestnCert MUST be the first element
    /// in the array.
    pub(crate) fn leaf(&self) -> Result<&x509::X509, Rejection> {
        self.certs()?
            .first()
            .ok_or(Rejection::AttestationStatementX5CInvalid)
    }
}

/// Perform the verification procedure for the packed attestation statement
/// format over `att_stmt`, as produced during a registration ceremony.
///
/// `auth_data` carries the exact encoded authenticator data bytes and the
/// attested credential the caller parsed from them. `client_data_hash` is
/// the SHA-256 digest of the client data JSON, as computed by the caller.
///
/// On success the attestation type and trust path are returned. A
/// statement selecting ECDAA fails with [`AttestError::Unsupported`],
/// which the caller must treat as fatal; every other failure is an
/// [`AttestError::Rejected`] and is the expected way to decline a
/// credential.
///
/// <https://w3c.github.io/webauthn/#sctn-packed-attestation>
pub fn verify_packed_attestation(
    att_stmt: &PackedAttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<ParsedAttestationData, AttestError> {
    // If ecdaaKeyId is present, then the attestation type is ECDAA. We can
    // not judge such a statement at all, so this surfaces on the fatal
    // channel before any validation is attempted.
    if att_stmt.ecdaa_key_id.is_some() {
        debug!("ecdaaKeyId present in attestation statement");
        return Err(AttestError::Unsupported(UnsupportedFeature::Ecdaa));
    }

    // alg and sig are required members of the statement.
    let alg = att_stmt
        .alg
        .ok_or(Rejection::AttestationStatementAlgMissing)?;
    let sig = att_stmt
        .sig
        .as_ref()
        .ok_or(Rejection::AttestationStatementSigMissing)?;

    // x5c and ecdaaKeyId are mutually exclusive. At most one of them may
    // be set on a well formed statement.
    let set_members = [!att_stmt.x5c.is_empty(), att_stmt.ecdaa_key_id.is_some()]
        .iter()
        .filter(|present| **present)
        .count();
    if set_members >= 2 {
        return Err(Rejection::AttestationStatementFieldsConflicting.into());
    }

    let acd = &auth_data.acd;
    let chain = CertificateChain::new(&att_stmt.x5c);

    // Every key the statement could be verified under must be an elliptic
    // curve key whose point lies on its declared curve. With a chain, that
    // is one key per certificate; without one, the credential key itself.
    if chain.is_empty() {
        match &acd.credential_pk.key {
            COSEKeyType::EC_EC2(_) => acd.credential_pk.validate()?,
            _ => {
                debug!("credential public key is not an EC key");
                return Err(Rejection::COSEKeyInvalidType.into());
            }
        }
    } else {
        for certificate in chain.certs()? {
            assert_ec_key_consistent(certificate)?;
        }
    }

    // Certificate requirements apply only when a leaf exists. Self
    // attestation has no certificate to judge.
    if !chain.is_empty() {
        let leaf = chain.leaf()?;

        // Verify that attestnCert meets the requirements in § 8.2.1 Packed
        // Attestation Statement Certificate Requirements.
        assert_packed_attest_req(leaf)?;

        // If attestnCert contains an extension with OID 1.3.6.1.4.1.45724.1.1.4
        // (id-fido-gen-ce-aaguid) verify that the value of this extension matches
        // the aaguid in authenticatorData.
        validate_extension::<FidoGenCeAaguid>(leaf, &acd.aaguid)?;
    }

    // Verify that sig is a valid signature over the concatenation of
    // authenticatorData and clientDataHash.
    let verification_data: Vec<u8> = auth_data
        .auth_data_bytes
        .iter()
        .chain(client_data_hash.iter())
        .copied()
        .collect();

    let is_valid_signature = if chain.is_empty() {
        // Self attestation: validate that alg matches the algorithm of the
        // credentialPublicKey in authenticatorData, then verify under the
        // credential public key.
        if alg != acd.credential_pk.type_ {
            return Err(Rejection::AttestationStatementAlgMismatch.into());
        }
        acd.credential_pk
            .verify_signature(sig.as_ref(), &verification_data)?
    } else {
        verify_signature(chain.leaf()?, sig.as_ref(), &verification_data)?
    };

    if !is_valid_signature {
        trace!("packed attestation signature invalid");
        return Err(Rejection::AttestationStatementSigInvalid.into());
    }

    resolve_trust_path(&chain)
}

// The attestation type and trust path follow from the statement's shape
// alone. This only runs once the cryptographic checks have succeeded.
fn resolve_trust_path(chain: &CertificateChain<'_>) -> Result<ParsedAttestationData, AttestError> {
    if chain.is_empty() {
        // If neither x5c nor ecdaaKeyId is present, self attestation is in
        // use: attestation type Self and an empty attestation trust path.
        Ok(ParsedAttestationData::Self_)
    } else {
        // Optionally, inspect x5c and consult externally provided knowledge
        // to determine whether attStmt conveys a Basic or AttCA attestation.
        // We do not, so the two remain indistinguishable here.
        Ok(ParsedAttestationData::BasicOrAttCa(chain.certs()?.to_vec()))
    }
}
