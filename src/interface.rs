//! Structs and representations used at the verification boundary. The
//! caller decodes the attestation object and parses the authenticator
//! data; these types carry the results into the verifier.

use base64urlsafedata::Base64UrlSafeData;
use openssl::x509;
use serde::{Deserialize, Serialize};

use crate::error::Rejection;

/// Representation of an AAGUID
/// <https://www.w3.org/TR/webauthn/#aaguid>
pub type Aaguid = [u8; 16];

/// The ID of a credential, assigned by the authenticator.
pub type CredentialID = Base64UrlSafeData;

/// An ECDSACurve identifier. You probably will never need to alter
/// or use this value, as it is set inside the Credential for you.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ECDSACurve {
    // +---------+-------+----------+------------------------------------+
    // | Name    | Value | Key Type | Description                        |
    // +---------+-------+----------+------------------------------------+
    // | P-256   | 1     | EC2      | NIST P-256 also known as secp256r1 |
    // | P-384   | 2     | EC2      | NIST P-384 also known as secp384r1 |
    // | P-521   | 3     | EC2      | NIST P-521 also known as secp521r1 |
    // +---------+-------+----------+------------------------------------+
    /// Identifies this curve as SECP256R1 (X9_62_PRIME256V1 in OpenSSL)
    SECP256R1 = 1,
    /// Identifies this curve as SECP384R1
    SECP384R1 = 2,
    /// Identifies this curve as SECP521R1
    SECP521R1 = 3,
}

impl ECDSACurve {
    /// The size in bytes of an affine coordinate on this curve.
    pub(crate) fn coordinate_size(&self) -> usize {
        match self {
            ECDSACurve::SECP256R1 => 32,
            ECDSACurve::SECP384R1 => 48,
            ECDSACurve::SECP521R1 => 66,
        }
    }
}

impl TryFrom<i128> for ECDSACurve {
    type Error = Rejection;

    fn try_from(u: i128) -> Result<Self, Self::Error> {
        match u {
            1 => Ok(ECDSACurve::SECP256R1),
            2 => Ok(ECDSACurve::SECP384R1),
            3 => Ok(ECDSACurve::SECP521R1),
            _ => Err(Rejection::COSEKeyECDSAInvalidCurve),
        }
    }
}

/// A COSE signature algorithm identifier. This is a closed set; statements
/// naming any other algorithm are refused when decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
#[repr(i64)]
pub enum COSEAlgorithm {
    /// Identifies this algorithm as ECDSA with SHA-256 (recommended curve SECP256R1)
    ES256 = -7,
    /// Identifies this algorithm as ECDSA with SHA-384 (recommended curve SECP384R1)
    ES384 = -35,
    /// Identifies this algorithm as ECDSA with SHA-512 (recommended curve SECP521R1)
    ES512 = -36,
    /// Identifies this algorithm as RSASSA-PKCS1-v1_5 with SHA-256
    RS256 = -257,
}

impl TryFrom<i64> for COSEAlgorithm {
    type Error = Rejection;

    fn try_from(i: i64) -> Result<Self, Self::Error> {
        match i {
            -7 => Ok(COSEAlgorithm::ES256),
            -35 => Ok(COSEAlgorithm::ES384),
            -36 => Ok(COSEAlgorithm::ES512),
            -257 => Ok(COSEAlgorithm::RS256),
            _ => Err(Rejection::COSEKeyInvalidAlgorithm),
        }
    }
}

impl TryFrom<i128> for COSEAlgorithm {
    type Error = Rejection;

    fn try_from(i: i128) -> Result<Self, Self::Error> {
        i64::try_from(i)
            .map_err(|_| Rejection::COSEKeyInvalidAlgorithm)
            .and_then(COSEAlgorithm::try_from)
    }
}

impl From<COSEAlgorithm> for i64 {
    fn from(c: COSEAlgorithm) -> Self {
        c as i64
    }
}

/// A COSE Elliptic Curve Public Key. This is generally the provided
/// credential that an authenticator registers, and is used to authenticate
/// the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEEC2Key {
    /// The curve that this key references.
    pub curve: ECDSACurve,
    /// The key's public X coordinate.
    pub x: Base64UrlSafeData,
    /// The key's public Y coordinate.
    pub y: Base64UrlSafeData,
}

/// A COSE RSA PublicKey. This is a provided credential from a registered
/// authenticator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSERSAKey {
    /// An RSA modulus
    pub n: Base64UrlSafeData,
    /// An RSA exponent
    pub e: [u8; 3],
}

/// The numeric id of the COSEKeyType used in the CBOR fields.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i64)]
pub enum COSEKeyTypeId {
    /// Reserved
    EC_Reserved = 0,
    /// Octet Key Pair
    EC_OKP = 1,
    /// Elliptic Curve Keys w/ x- and y-coordinate
    EC_EC2 = 2,
    /// RSA
    EC_RSA = 3,
    /// Symmetric
    EC_Symmetric = 4,
}

/// The type of Key contained within a COSE value. Only elliptic curve EC2
/// keys are ever accepted for verification; the RSA variant exists so that
/// such keys can be represented and then refused explicitly.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum COSEKeyType {
    /// Identifies this as an Eliptic Curve EC2 key
    EC_EC2(COSEEC2Key),
    /// Identifies this as an RSA key
    RSA(COSERSAKey),
}

/// A COSE Key as provided by the Authenticator. You should never need
/// to alter or change these values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEKey {
    /// The type of key that this contains
    pub type_: COSEAlgorithm,
    /// The public key
    pub key: COSEKeyType,
}

/// A packed attestation statement, as decoded from the `attStmt` member of
/// the attestation object.
///
/// Decoding only reproduces the shape of the statement it was given. Field
/// presence and mutual exclusion are judged by
/// [`crate::verify_packed_attestation`] so that the validation order is
/// observable to the caller.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PackedAttestationStatement {
    /// The COSE algorithm the authenticator claims to have signed with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<COSEAlgorithm>,
    /// The attestation signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig: Option<Base64UrlSafeData>,
    /// The attestation certificate chain, DER encoded, leaf first. When
    /// empty, the statement asserts self attestation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub x5c: Vec<Base64UrlSafeData>,
    /// The ECDAA key identifier. Its presence is fatal to verification.
    #[serde(
        rename = "ecdaaKeyId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ecdaa_key_id: Option<Base64UrlSafeData>,
}

impl TryFrom<&serde_cbor_2::Value> for PackedAttestationStatement {
    type Error = Rejection;

    fn try_from(att_stmt: &serde_cbor_2::Value) -> Result<Self, Self::Error> {
        let att_stmt_map =
            cbor_try_map!(att_stmt).map_err(|_| Rejection::AttestationStatementMapInvalid)?;

        let alg = match att_stmt_map.get(&serde_cbor_2::Value::Text("alg".to_string())) {
            Some(alg_value) => {
                let alg = cbor_try_i128!(alg_value)
                    .map_err(|_| Rejection::AttestationStatementAlgInvalid)
                    .and_then(COSEAlgorithm::try_from)?;
                Some(alg)
            }
            None => None,
        };

        let sig = att_stmt_map
            .get(&serde_cbor_2::Value::Text("sig".to_string()))
            .map(|sig_value| {
                cbor_try_bytes!(sig_value)
                    .map(|b| Base64UrlSafeData(b.clone()))
                    .map_err(|_| Rejection::AttestationStatementSigMissing)
            })
            .transpose()?;

        let x5c = match att_stmt_map.get(&serde_cbor_2::Value::Text("x5c".to_string())) {
            Some(x5c_value) => {
                let x5c_array_ref = cbor_try_array!(x5c_value)
                    .map_err(|_| Rejection::AttestationStatementX5CInvalid)?;
                x5c_array_ref
                    .iter()
                    .map(|values| {
                        cbor_try_bytes!(values)
                            .map(|b| Base64UrlSafeData(b.clone()))
                            .map_err(|_| Rejection::AttestationStatementX5CInvalid)
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => Vec::new(),
        };

        let ecdaa_key_id = att_stmt_map
            .get(&serde_cbor_2::Value::Text("ecdaaKeyId".to_string()))
            .map(|value| {
                cbor_try_bytes!(value)
                    .map(|b| Base64UrlSafeData(b.clone()))
                    .map_err(|_| Rejection::AttestationStatementMapInvalid)
            })
            .transpose()?;

        Ok(PackedAttestationStatement {
            alg,
            sig,
            x5c,
            ecdaa_key_id,
        })
    }
}

/// Attested Credential Data, parsed out of the authenticator data by the
/// caller. Carries the credential public key that backs self attestation.
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    /// The guid of the authenticator. May indicate manufacturer.
    pub aaguid: Aaguid,
    /// The credential ID.
    pub credential_id: CredentialID,
    /// The credentials public Key.
    pub credential_pk: COSEKey,
}

/// Authenticator data as consumed during attestation verification.
#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    /// The exact encoded authenticator data bytes. Used verbatim as the
    /// leading part of the signature base.
    pub auth_data_bytes: Vec<u8>,
    /// The attested credential embedded in those bytes.
    pub acd: AttestedCredentialData,
}

/// The attestation conveyed by a verified packed statement.
#[derive(Debug, Clone)]
pub enum ParsedAttestationData {
    /// A certificate chain vouches for the authenticator key. Whether this
    /// is a Basic or AttCA attestation can not be told from the statement
    /// alone. The chain is ordered leaf first.
    BasicOrAttCa(Vec<x509::X509>),
    /// The credential is authenticated using surrogate basic attestation.
    /// The credential private key created the attestation signature and
    /// there is no trust path.
    Self_,
}

impl ParsedAttestationData {
    /// The trust path supporting this attestation, if one exists.
    pub fn trust_path(&self) -> Option<&[x509::X509]> {
        match self {
            ParsedAttestationData::BasicOrAttCa(chain) => Some(chain.as_slice()),
            ParsedAttestationData::Self_ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use std::collections::BTreeMap;

    use super::*;
    use serde_cbor_2::Value;

    #[test]
    fn statement_decode_self_attestation_shape() {
        let mut m = BTreeMap::new();
        m.insert(Value::Text("alg".to_string()), Value::Integer(-7));
        m.insert(Value::Text("sig".to_string()), Value::Bytes(vec![1, 2, 3]));
        let stmt = PackedAttestationStatement::try_from(&Value::Map(m)).unwrap();

        assert_eq!(stmt.alg, Some(COSEAlgorithm::ES256));
        assert_eq!(stmt.sig, Some(Base64UrlSafeData(vec![1, 2, 3])));
        assert!(stmt.x5c.is_empty());
        assert!(stmt.ecdaa_key_id.is_none());
    }

    #[test]
    fn statement_decode_preserves_missing_members() {
        let stmt = PackedAttestationStatement::try_from(&Value::Map(BTreeMap::new())).unwrap();

        assert!(stmt.alg.is_none());
        assert!(stmt.sig.is_none());
        assert!(stmt.x5c.is_empty());
    }

    #[test]
    fn statement_decode_x5c_chain_order() {
        let mut m = BTreeMap::new();
        m.insert(Value::Text("alg".to_string()), Value::Integer(-7));
        m.insert(Value::Text("sig".to_string()), Value::Bytes(vec![0xff]));
        m.insert(
            Value::Text("x5c".to_string()),
            Value::Array(vec![
                Value::Bytes(vec![0x30, 0x01]),
                Value::Bytes(vec![0x30, 0x02]),
            ]),
        );
        let stmt = PackedAttestationStatement::try_from(&Value::Map(m)).unwrap();

        assert_eq!(stmt.x5c.len(), 2);
        assert_eq!(stmt.x5c[0], Base64UrlSafeData(vec![0x30, 0x01]));
    }

    #[test]
    fn statement_decode_rejects_unknown_alg() {
        let mut m = BTreeMap::new();
        m.insert(Value::Text("alg".to_string()), Value::Integer(-9999));
        let err = PackedAttestationStatement::try_from(&Value::Map(m)).unwrap_err();

        assert!(matches!(err, Rejection::COSEKeyInvalidAlgorithm));
    }

    #[test]
    fn statement_decode_rejects_non_map() {
        let err = PackedAttestationStatement::try_from(&Value::Bool(true)).unwrap_err();

        assert!(matches!(err, Rejection::AttestationStatementMapInvalid));
    }
}
