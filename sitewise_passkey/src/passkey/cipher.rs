use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

use crate::utils::{UtilError, base64url_decode, base64url_encode};

/// AES-256-GCM for challenges at rest. Output is `base64url(nonce || ciphertext || tag)`.
#[derive(Clone)]
pub(crate) struct ChallengeCipher {
    key: [u8; 32],
}

impl ChallengeCipher {
    pub(crate) fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    fn sealing_key(&self) -> Result<LessSafeKey, UtilError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|_| UtilError::Crypto("Invalid AES-256-GCM key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }

    pub(crate) fn encrypt(&self, plaintext: &[u8]) -> Result<String, UtilError> {
        let key = self.sealing_key()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| UtilError::Crypto("Failed to generate nonce".to_string()))?;

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| UtilError::Crypto("Encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(base64url_encode(&sealed))
    }

    pub(crate) fn decrypt(&self, sealed: &str) -> Result<Vec<u8>, UtilError> {
        let sealed = base64url_decode(sealed)?;
        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(UtilError::Format("Sealed challenge too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| UtilError::Format("Invalid nonce".to_string()))?;

        let key = self.sealing_key()?;
        let mut in_out = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| UtilError::Crypto("Decryption failed".to_string()))?;
        Ok(plaintext.to_vec())
    }
}
