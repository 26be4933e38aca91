// src/signer.rs
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;

use crate::error::RelayError;
use crate::hash::keccak256;
use crate::types::SIGNATURE_LENGTH;

/// EIP-191 prefix for a 32-byte message.
pub const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Recovery ids are written as 27/28, as wallet contracts expect.
const RECOVERY_ID_OFFSET: u8 = 27;

/// Digest actually fed to ECDSA: `keccak256(prefix || hash)`.
pub fn personal_message_digest(hash: &[u8]) -> Result<[u8; 32], RelayError> {
    if hash.len() != 32 {
        return Err(RelayError::InvalidHashLength(hash.len()));
    }
    let mut message = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + hash.len());
    message.extend_from_slice(PERSONAL_MESSAGE_PREFIX);
    message.extend_from_slice(hash);
    Ok(keccak256(message))
}

/// Signs operation hashes with a secp256k1 key. Key material is supplied by the caller.
pub struct OperationSigner {
    wallet: LocalWallet,
}

impl OperationSigner {
    /// Accepts a hex private key with or without `0x`.
    pub fn from_private_key(private_key: &str) -> Result<Self, RelayError> {
        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| RelayError::Signing(e.to_string()))?;
        Ok(Self { wallet })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Returns `r || s || v` with `v` in {27, 28}.
    pub fn sign_hash(&self, hash: &[u8]) -> Result<[u8; SIGNATURE_LENGTH], RelayError> {
        let digest = personal_message_digest(hash)?;
        let (signature, recovery_id) = self
            .wallet
            .signer()
            .sign_prehash_recoverable(&digest)
            .map_err(|e| RelayError::Signing(e.to_string()))?;

        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte() + RECOVERY_ID_OFFSET;
        Ok(out)
    }
}

impl std::fmt::Debug for OperationSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSigner")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexutil::parse_hex_bytes;
    use ethers::types::{RecoveryMessage, Signature, H256};
    use ethers::utils::hash_message;

    const PRIVATE_KEY: &str = "ac4bab11ad6b7ec2c84e5e293710828234ab63b62d377a23681228be588fab57";

    fn signer() -> OperationSigner {
        OperationSigner::from_private_key(PRIVATE_KEY).unwrap()
    }

    fn sign_hex(data: &str) -> String {
        let hash = parse_hex_bytes(data).unwrap();
        format!("0x{}", hex::encode(signer().sign_hash(&hash).unwrap()))
    }

    #[test]
    fn known_signatures() {
        assert_eq!(
            sign_hex("0x27236e94abb05957b21cba540c0d5f2c72bdb8747457e1cc23fee757667c93cf"),
            "0x210af945f4be3a6a179e10240fd8ed5cd3d9317734d36a7b9bb969a9139bb3fc69c0f095cc52b616b1120887ceb71fd811a849ef59dc847ad3ef8c56004c5be61b"
        );
        assert_eq!(
            sign_hex("0x0128b079ffdb48a614f1cf8ea1d2f1da15d9715797c63be745a77e1b1d8839b7"),
            "0xb9258a347f35b42e3862cd9c66371c110b9429617fc371eef6b147798af397d8343ac9fcf7152fd97b476463b4c9d32db964333deb7e01feca9787dae71770981b"
        );
    }

    #[test]
    fn deterministic_with_protocol_recovery_byte() {
        let hash = [7u8; 32];
        let first = signer().sign_hash(&hash).unwrap();
        let second = signer().sign_hash(&hash).unwrap();
        assert_eq!(first, second);
        assert!(first[64] == 27 || first[64] == 28);
    }

    #[test]
    fn digest_matches_eip191() {
        let hash = [0x42u8; 32];
        let ours = personal_message_digest(&hash).unwrap();
        assert_eq!(H256(ours), hash_message(hash));
    }

    #[test]
    fn recovers_to_signer() {
        let hash = [0x5au8; 32];
        let raw = signer().sign_hash(&hash).unwrap();
        let signature = Signature::try_from(&raw[..]).unwrap();
        let digest = personal_message_digest(&hash).unwrap();
        let recovered = signature
            .recover(RecoveryMessage::Hash(H256(digest)))
            .unwrap();
        assert_eq!(recovered, signer().address());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            signer().sign_hash(&[0u8; 31]),
            Err(RelayError::InvalidHashLength(31))
        ));
        assert!(matches!(
            signer().sign_hash(&[0u8; 33]),
            Err(RelayError::InvalidHashLength(33))
        ));
    }

    #[test]
    fn rejects_bad_key() {
        assert!(matches!(
            OperationSigner::from_private_key("not a key"),
            Err(RelayError::Signing(_))
        ));
        assert!(OperationSigner::from_private_key(&format!("0x{}", PRIVATE_KEY)).is_ok());
    }
}
