//! Envelope signature verification (RSA PKCS#1 v1.5 over SHA-1).
//!
//! The signer's public key comes from the PEM X.509 certificate referenced by
//! the envelope's `SigningCertURL`. Every failure mode collapses into
//! [`VerificationError`]: a bad signature and a broken certificate both mean
//! "do not trust this envelope".

use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha1::Sha1;
use x509_cert::der::{DecodePem, Encode};
use x509_cert::Certificate;

use crate::error::VerificationError;

/// Identifies the envelope in verification errors.
#[derive(Debug, Clone, Copy)]
pub struct VerificationContext<'a> {
    pub message_id: &'a str,
    pub signature_version: &'a str,
}

impl VerificationContext<'_> {
    pub(crate) fn fail(&self, reason: impl Into<String>) -> VerificationError {
        VerificationError {
            message_id: self.message_id.to_string(),
            signature_version: self.signature_version.to_string(),
            reason: reason.into(),
        }
    }
}

/// Verify `signature` over `canonical` with the key in `certificate_pem`.
pub fn verify_signature(
    certificate_pem: &[u8],
    canonical: &[u8],
    signature: &[u8],
    context: &VerificationContext<'_>,
) -> Result<(), VerificationError> {
    let public_key = load_public_key(certificate_pem).map_err(|reason| context.fail(reason))?;

    let signature = Signature::try_from(signature)
        .map_err(|e| context.fail(format!("invalid signature bytes: {}", e)))?;

    VerifyingKey::<Sha1>::new(public_key)
        .verify(canonical, &signature)
        .map_err(|_| context.fail("sha1WithRSAEncryption verification failed"))
}

/// Extract the RSA public key from a PEM certificate.
fn load_public_key(certificate_pem: &[u8]) -> Result<RsaPublicKey, String> {
    let certificate = Certificate::from_pem(certificate_pem)
        .map_err(|e| format!("malformed certificate: {}", e))?;

    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| format!("malformed certificate key: {}", e))?;

    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| format!("unsupported certificate key: {}", e))
}
