//! Cryptographic operation wrapper for packed attestation verification.
//! This module exists to allow ease of auditing, safe operation wrappers
//! for the library, and cryptographic provider abstraction. This module
//! currently uses OpenSSL as the cryptographic primitive provider.

use openssl::{bn, ec, hash, nid, pkey, rsa, sha, sign, x509};
use x509_parser::extensions::ParsedExtension;

use crate::error::Rejection;
use crate::interface::*;

// Why OpenSSL over another rust crate?
// - Well, the openssl crate allows us to reconstruct a public key from the
//   x/y group coords, where most others want a pkcs formatted structure. As
//   a result, it's easiest to use openssl as it gives us exactly what we need
//   for these operations, and despite it's many challenges as a library, it
//   has resources and investment into it's maintenance, so we can a least
//   assert a higher level of confidence in it that <backyard crypto here>.

impl ECDSACurve {
    fn to_openssl_nid(&self) -> nid::Nid {
        match self {
            ECDSACurve::SECP256R1 => nid::Nid::X9_62_PRIME256V1,
            ECDSACurve::SECP384R1 => nid::Nid::SECP384R1,
            ECDSACurve::SECP521R1 => nid::Nid::SECP521R1,
        }
    }
}

impl TryFrom<&serde_cbor_2::Value> for COSEKey {
    type Error = Rejection;

    fn try_from(d: &serde_cbor_2::Value) -> Result<COSEKey, Self::Error> {
        let m = cbor_try_map!(d)?;

        // See also https://tools.ietf.org/html/rfc8152#section-3.1
        // These values look like:
        // Object({
        //     // negative (-) values are per-algo specific
        //     Integer(-3): Bytes([48, 185, 178, 204, ...]), // y
        //     Integer(-2): Bytes([158, 212, 171, 234, ...]), // x
        //     Integer(-1): U64(1),  // curve identifier
        //     Integer(1): U64(2),   // key type identifier
        //     Integer(3): I64(-7)   // content type see https://tools.ietf.org/html/rfc8152#section-8.1
        // })
        // Now each of these integers has a specific meaning, and you need to parse them in order.
        // First, value 1 for the key type.

        let key_type_value = m
            .get(&serde_cbor_2::Value::Integer(1))
            .ok_or(Rejection::COSEKeyInvalidCBORValue)?;
        let key_type = cbor_try_i128!(key_type_value)?;

        let content_type_value = m
            .get(&serde_cbor_2::Value::Integer(3))
            .ok_or(Rejection::COSEKeyInvalidCBORValue)?;
        let content_type = cbor_try_i128!(content_type_value)?;

        let type_ = COSEAlgorithm::try_from(content_type)?;

        // https://www.iana.org/assignments/cose/cose.xhtml
        // https://www.w3.org/TR/webauthn/#sctn-encoded-credPubKey-examples
        if key_type == (COSEKeyTypeId::EC_EC2 as i128)
            && (type_ == COSEAlgorithm::ES256
                || type_ == COSEAlgorithm::ES384
                || type_ == COSEAlgorithm::ES512)
        {
            // This indicates this is an EC2 key consisting of crv, x, y, which are stored in
            // crv (-1), x (-2) and y (-3)
            let curve_type_value = m
                .get(&serde_cbor_2::Value::Integer(-1))
                .ok_or(Rejection::COSEKeyInvalidCBORValue)?;
            let curve_type = cbor_try_i128!(curve_type_value)?;

            let curve = ECDSACurve::try_from(curve_type)?;

            let x_value = m
                .get(&serde_cbor_2::Value::Integer(-2))
                .ok_or(Rejection::COSEKeyInvalidCBORValue)?;
            let x = cbor_try_bytes!(x_value)?;

            let y_value = m
                .get(&serde_cbor_2::Value::Integer(-3))
                .ok_or(Rejection::COSEKeyInvalidCBORValue)?;
            let y = cbor_try_bytes!(y_value)?;

            let coord_len = curve.coordinate_size();
            if x.len() != coord_len || y.len() != coord_len {
                return Err(Rejection::COSEKeyECDSAXYInvalid);
            }

            let cose_key = COSEKey {
                type_,
                key: COSEKeyType::EC_EC2(COSEEC2Key {
                    curve,
                    x: x.to_vec().into(),
                    y: y.to_vec().into(),
                }),
            };

            // The rfc additionally states:
            //   "   Applications MUST check that the curve and the key type are
            //     consistent and reject a key if they are not."
            // this means feeding the values to openssl to validate them for us!
            cose_key.validate()?;
            Ok(cose_key)
        } else if key_type == (COSEKeyTypeId::EC_RSA as i128) && (type_ == COSEAlgorithm::RS256) {
            // RSAKey
            // -257 -> RS256 aka RSASSA-PKCS1-v1_5 with SHA-256

            // -1 -> n 256 bytes
            // -2 -> e 3 bytes
            let n_value = m
                .get(&serde_cbor_2::Value::Integer(-1))
                .ok_or(Rejection::COSEKeyInvalidCBORValue)?;
            let n = cbor_try_bytes!(n_value)?;

            let e_value = m
                .get(&serde_cbor_2::Value::Integer(-2))
                .ok_or(Rejection::COSEKeyInvalidCBORValue)?;
            let e = cbor_try_bytes!(e_value)?;

            if n.len() != 256 || e.len() != 3 {
                return Err(Rejection::COSEKeyRSANEInvalid);
            }

            // Set the n and e, we know they are proper sizes.
            let mut e_temp = [0; 3];
            e_temp.copy_from_slice(e.as_slice());

            let cose_key = COSEKey {
                type_,
                key: COSEKeyType::RSA(COSERSAKey {
                    n: n.to_vec().into(),
                    e: e_temp,
                }),
            };

            cose_key.validate()?;
            Ok(cose_key)
        } else {
            debug!(?key_type, ?type_, "COSEKeyInvalidType");
            Err(Rejection::COSEKeyInvalidType)
        }
    }
}

impl COSEKey {
    /// Validate that the key is well formed. For EC keys the coordinates
    /// must name a point on the declared curve, for RSA keys the public
    /// components must reconstruct.
    pub(crate) fn validate(&self) -> Result<(), Rejection> {
        self.get_openssl_pkey().map(|_| ())
    }

    /// Retrieve the public key of this COSEKey as an OpenSSL structure
    fn get_openssl_pkey(&self) -> Result<pkey::PKey<pkey::Public>, Rejection> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let curve = ec2k.curve.to_openssl_nid();
                let ec_group =
                    ec::EcGroup::from_curve_name(curve).map_err(Rejection::OpenSSLError)?;

                let xbn =
                    bn::BigNum::from_slice(ec2k.x.as_ref()).map_err(Rejection::OpenSSLError)?;
                let ybn =
                    bn::BigNum::from_slice(ec2k.y.as_ref()).map_err(Rejection::OpenSSLError)?;

                let ec_key = ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)
                    .map_err(|_| Rejection::COSEKeyECDSAXYInvalid)?;

                // check_key asserts the point is on the curve and is not
                // the identity or otherwise degenerate.
                ec_key
                    .check_key()
                    .map_err(|_| Rejection::COSEKeyECDSAXYInvalid)?;

                pkey::PKey::from_ec_key(ec_key).map_err(Rejection::OpenSSLError)
            }
            COSEKeyType::RSA(rsak) => {
                let nbn = bn::BigNum::from_slice(rsak.n.as_ref()).map_err(Rejection::OpenSSLError)?;
                let ebn = bn::BigNum::from_slice(&rsak.e).map_err(Rejection::OpenSSLError)?;

                let rsa_key = rsa::Rsa::from_public_components(nbn, ebn)
                    .map_err(|_| Rejection::COSEKeyRSANEInvalid)?;

                pkey::PKey::from_rsa(rsa_key).map_err(Rejection::OpenSSLError)
            }
        }
    }

    /// Verifies data was signed with this COSEKey. The digest is fixed at
    /// SHA-256 for packed attestation.
    pub fn verify_signature(
        &self,
        signature: &[u8],
        verification_data: &[u8],
    ) -> Result<bool, Rejection> {
        let pkey = self.get_openssl_pkey()?;

        let mut verifier = sign::Verifier::new(hash::MessageDigest::sha256(), &pkey)
            .map_err(Rejection::OpenSSLError)?;
        verifier
            .update(verification_data)
            .map_err(Rejection::OpenSSLError)?;
        verifier.verify(signature).map_err(Rejection::OpenSSLError)
    }
}

/// Confirm the certificate's public key is an elliptic curve key, and that
/// it passes openssl's curve consistency checks. Any other key type is
/// refused.
pub(crate) fn assert_ec_key_consistent(certificate: &x509::X509) -> Result<(), Rejection> {
    let pk = certificate.public_key().map_err(Rejection::OpenSSLError)?;

    let ec_key = pk
        .ec_key()
        .map_err(|_| Rejection::CertificatePublicKeyInvalid)?;

    ec_key
        .check_key()
        .map_err(|_| Rejection::CertificatePublicKeyInvalid)
}

/// Validate a signature over verification_data against the certificate's
/// public key. The digest is fixed at SHA-256 for packed attestation.
pub(crate) fn verify_signature(
    certificate: &x509::X509,
    signature: &[u8],
    verification_data: &[u8],
) -> Result<bool, Rejection> {
    let pkey = certificate.public_key().map_err(Rejection::OpenSSLError)?;

    let mut verifier = sign::Verifier::new(hash::MessageDigest::sha256(), &pkey)
        .map_err(Rejection::OpenSSLError)?;
    verifier
        .update(verification_data)
        .map_err(Rejection::OpenSSLError)?;
    verifier.verify(signature).map_err(Rejection::OpenSSLError)
}

pub(crate) fn assert_packed_attest_req(x509: &x509::X509) -> Result<(), Rejection> {
    // Verify that attestnCert meets the requirements in § 8.2.1 Packed
    // Attestation Statement Certificate Requirements.
    // https://w3c.github.io/webauthn/#sctn-packed-attestation-cert-requirements

    // Version MUST be set to 3 (which is indicated by an ASN.1 INTEGER with value 2).
    if x509.version() != 2 {
        return Err(Rejection::AttestationCertificateRequirementsNotMet);
    }

    // Subject field MUST be set to:
    //
    // Subject-OU
    //  Literal string "Authenticator Attestation" (UTF8String)
    let subject_name_ref = x509.subject_name();

    let subject_ou = subject_name_ref
        .entries_by_nid(nid::Nid::ORGANIZATIONALUNITNAME)
        .next();

    #[allow(deprecated)]
    match subject_ou {
        Some(ou) => match ou.data().as_utf8() {
            Ok(ou_d) => {
                if ou_d.to_string() != "Authenticator Attestation" {
                    return Err(Rejection::AttestationCertificateRequirementsNotMet);
                }
            }
            Err(_) => return Err(Rejection::AttestationCertificateRequirementsNotMet),
        },
        None => return Err(Rejection::AttestationCertificateRequirementsNotMet),
    }

    // The Basic Constraints extension MUST have the CA component set to false.
    let der_bytes = x509.to_der().map_err(Rejection::OpenSSLError)?;
    let basic_constraints_ca = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| Rejection::AttestationStatementX5CInvalid)?
        .1
        .extensions()
        .iter()
        .find_map(|extension| match extension.parsed_extension() {
            ParsedExtension::BasicConstraints(bc) => Some(bc.ca),
            _ => None,
        });

    match basic_constraints_ca {
        Some(false) => Ok(()),
        _ => Err(Rejection::AttestationCertificateRequirementsNotMet),
    }
}

/// Compute the sha256 of a slice of data.
pub fn compute_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = sha::Sha256::new();
    hasher.update(data);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use std::collections::BTreeMap;

    use super::*;
    use hex_literal::hex;
    use serde_cbor_2::Value;

    #[test]
    fn cbor_es256() {
        let hex_data = hex!(
                "A5"         // Map - 5 elements
                "01 02"      //   1:   2,  ; kty: EC2 key type
                "03 26"      //   3:  -7,  ; alg: ES256 signature algorithm
                "20 01"      //  -1:   1,  ; crv: P-256 curve
                "21 58 20   65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d" // -2:   x,  ; x-coordinate
                "22 58 20   1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c" // -3:   y,  ; y-coordinate
        );

        let val: Value = serde_cbor_2::from_slice(&hex_data).unwrap();
        let key = COSEKey::try_from(&val).unwrap();

        assert_eq!(key.type_, COSEAlgorithm::ES256);
        match key.key {
            COSEKeyType::EC_EC2(pkey) => {
                assert_eq!(
                    pkey.x.as_ref(),
                    hex!("65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d")
                );
                assert_eq!(
                    pkey.y.as_ref(),
                    hex!("1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c")
                );
                assert_eq!(pkey.curve, ECDSACurve::SECP256R1);
            }
            _ => panic!("Key should be parsed EC2 key"),
        }
    }

    #[test]
    fn cbor_es384() {
        let hex_data = hex!(
                "A5"         // Map - 5 elements
                "01 02"      //   1:   2,  ; kty: EC2 key type
                "03 38 22"   //   3:  -35,  ; alg: ES384 signature algorithm
                "20 02"      //  -1:   2,  ; crv: P-384 curve
                "21 58 30   ceeaf818731db7af2d02e029854823d71bdbf65fb0c6ff69" // -2: x, ; x-coordinate
                           "42c9cf891efe18ea81430517d777f5c43550da801be5bf2f"
                "22 58 30   dda1d0ead72e042efb7c36a38cc021abb2ca1a2e38159edd" // -3: y ; y-coordinate
                           "a8c25f391e9a38d79dd56b9427d1c7c70cfa778ab849b087"
        );

        let val: Value = serde_cbor_2::from_slice(&hex_data).unwrap();
        let key = COSEKey::try_from(&val).unwrap();

        assert_eq!(key.type_, COSEAlgorithm::ES384);
        match key.key {
            COSEKeyType::EC_EC2(pkey) => {
                assert_eq!(pkey.curve, ECDSACurve::SECP384R1);
            }
            _ => panic!("Key should be parsed EC2 key"),
        }
    }

    #[test]
    fn cbor_es512() {
        let hex_data = hex!(
                "A5"         // Map - 5 elements
                "01 02"      //   1:   2,  ; kty: EC2 key type
                "03 38 23"   //   3:  -36,  ; alg: ES512 signature algorithm
                "20 03"      //  -1:   3,  ; crv: P-521 curve
                "21 58 42   0106cfaacf34b13f24bbb2f806fd9cfacff9a2a5ef9ecfcd85664609a0b2f6d4fd" // -2:   x,  ; x-coordinate
                           "b8e1d58630905f13f38d8eed8714eceb716920a3a235581623261fed961f7b7d72"
                "22 58 42   0089597a052a8d3c8b2b5692d467dea19f8e1b9ca17fa563a1a826855dade04811" // -3:   y,  ; y-coordinate
                           "b2881819e72f1706daeaf7d3773b2e284983a0eec33c2fe3ff5697722e95b29536");

        let val: Value = serde_cbor_2::from_slice(&hex_data).unwrap();
        let key = COSEKey::try_from(&val).unwrap();

        assert_eq!(key.type_, COSEAlgorithm::ES512);
        match key.key {
            COSEKeyType::EC_EC2(pkey) => {
                assert_eq!(pkey.curve, ECDSACurve::SECP521R1);
            }
            _ => panic!("Key should be parsed EC2 key"),
        }
    }

    #[test]
    fn cbor_es256_rejects_point_off_curve() {
        // Same structure as cbor_es256 but the x coordinate is corrupted,
        // so the point no longer lies on P-256.
        let hex_data = hex!(
                "A5"
                "01 02"
                "03 26"
                "20 01"
                "21 58 20   00eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d"
                "22 58 20   1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c"
        );

        let val: Value = serde_cbor_2::from_slice(&hex_data).unwrap();
        let err = COSEKey::try_from(&val).unwrap_err();

        assert!(matches!(err, Rejection::COSEKeyECDSAXYInvalid));
    }

    #[test]
    fn cbor_rs256() {
        let mut m = BTreeMap::new();
        m.insert(Value::Integer(1), Value::Integer(3)); // kty: RSA
        m.insert(Value::Integer(3), Value::Integer(-257)); // alg: RS256
        m.insert(Value::Integer(-1), Value::Bytes(vec![0xab; 256])); // n
        m.insert(Value::Integer(-2), Value::Bytes(vec![0x01, 0x00, 0x01])); // e

        let key = COSEKey::try_from(&Value::Map(m)).unwrap();

        assert_eq!(key.type_, COSEAlgorithm::RS256);
        assert!(matches!(key.key, COSEKeyType::RSA(_)));
    }

    #[test]
    fn cbor_rejects_okp_key_type() {
        let mut m = BTreeMap::new();
        m.insert(Value::Integer(1), Value::Integer(1)); // kty: OKP
        m.insert(Value::Integer(3), Value::Integer(-7));

        let err = COSEKey::try_from(&Value::Map(m)).unwrap_err();

        assert!(matches!(err, Rejection::COSEKeyInvalidType));
    }

    #[test]
    fn sha256_digest_is_32_bytes() {
        let dgst = compute_sha256(b"packed attestation");
        assert_eq!(dgst.len(), 32);
        assert_eq!(
            dgst,
            hex!("92476bb5498eab481be34b0f152fd1e7a885750b0fce2fdcbfd84436089dbc94")
        );
    }
}
