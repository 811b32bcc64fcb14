use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies join tokens over `"{code}:{user_id}"`.
///
/// Verification is advisory: an unsigned or unverifiable join is still
/// accepted, the player record just stays unverified.
#[derive(Debug, Clone)]
pub struct JoinSigner {
    secret: Option<String>,
}

impl JoinSigner {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    pub fn sign(&self, code: &str, user_id: &str) -> Option<String> {
        let secret = self.secret.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(format!("{code}:{user_id}").as_bytes());
        Some(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, code: &str, user_id: &str, sig: &str) -> bool {
        let Some(secret) = self.secret.as_ref() else {
            return false;
        };
        let Ok(decoded) = URL_SAFE_NO_PAD.decode(sig) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(format!("{code}:{user_id}").as_bytes());
        mac.verify_slice(&decoded).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> JoinSigner {
        JoinSigner::new(Some("test-secret".to_string()))
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let signer = signer();
        let sig = signer.sign("ABC234", "user1").unwrap();
        assert!(signer.verify("ABC234", "user1", &sig));
    }

    #[test]
    fn test_signature_is_bound_to_room_and_user() {
        let signer = signer();
        let sig = signer.sign("ABC234", "user1").unwrap();
        assert!(!signer.verify("ABC235", "user1", &sig));
        assert!(!signer.verify("ABC234", "user2", &sig));
    }

    #[test]
    fn test_garbage_signature_fails() {
        let signer = signer();
        assert!(!signer.verify("ABC234", "user1", "not-base64!!"));
        assert!(!signer.verify("ABC234", "user1", ""));
    }

    #[test]
    fn test_no_secret_never_signs_or_verifies() {
        let signer = JoinSigner::new(None);
        assert!(signer.sign("ABC234", "user1").is_none());
        assert!(!signer.verify("ABC234", "user1", "anything"));
    }
}
