use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::SolwireError;

/// An unsigned transaction as produced by an upstream builder (swap SDK,
/// claim builder). The wire bytes are carried opaquely; the blockhash
/// metadata rides alongside so the confirmation poll knows when the
/// transaction can no longer land.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnsignedTransaction {
    /// Base64 of the serialized transaction (legacy or versioned wire form).
    pub tx_base64: String,
    /// Blockhash the builder stamped into the message.
    pub recent_blockhash: String,
    /// Block height after which the blockhash is dead.
    pub last_valid_block_height: u64,
}

/// A fully signed transaction ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx_base64: String,
}

impl UnsignedTransaction {
    /// The message portion of the wire bytes (everything after the
    /// signature array). This is what gets signed.
    pub fn message_bytes(&self) -> Result<Vec<u8>, SolwireError> {
        let bytes = self.decode()?;
        let (count, prefix_len) = decode_shortvec(&bytes)?;
        let sig_end = prefix_len + count * 64;
        if bytes.len() <= sig_end {
            return Err(SolwireError::InvalidTransaction(
                "message truncated after signature array".into(),
            ));
        }
        Ok(bytes[sig_end..].to_vec())
    }

    /// Splice a 64-byte signature into the fee-payer slot (index 0) and
    /// return the signed wire form. The message bytes are untouched.
    pub fn with_fee_payer_signature(
        &self,
        signature: &[u8; 64],
    ) -> Result<SignedTransaction, SolwireError> {
        let mut bytes = self.decode()?;
        let (count, prefix_len) = decode_shortvec(&bytes)?;
        if count == 0 {
            return Err(SolwireError::InvalidTransaction(
                "transaction has no signature slots".into(),
            ));
        }
        if bytes.len() < prefix_len + count * 64 {
            return Err(SolwireError::InvalidTransaction(
                "signature array truncated".into(),
            ));
        }
        bytes[prefix_len..prefix_len + 64].copy_from_slice(signature);
        Ok(SignedTransaction {
            tx_base64: general_purpose::STANDARD.encode(&bytes),
        })
    }

    fn decode(&self) -> Result<Vec<u8>, SolwireError> {
        general_purpose::STANDARD
            .decode(&self.tx_base64)
            .map_err(|e| SolwireError::InvalidTransaction(format!("bad base64: {e}")))
    }
}

impl SignedTransaction {
    /// First signature of the wire bytes, base58. The transaction id.
    pub fn signature(&self) -> Result<String, SolwireError> {
        let bytes = general_purpose::STANDARD
            .decode(&self.tx_base64)
            .map_err(|e| SolwireError::InvalidTransaction(format!("bad base64: {e}")))?;
        let (count, prefix_len) = decode_shortvec(&bytes)?;
        if count == 0 || bytes.len() < prefix_len + 64 {
            return Err(SolwireError::InvalidTransaction(
                "no signature present".into(),
            ));
        }
        Ok(bs58::encode(&bytes[prefix_len..prefix_len + 64]).into_string())
    }
}

/// Decode a compact-u16 length prefix. Returns (value, bytes consumed).
fn decode_shortvec(bytes: &[u8]) -> Result<(usize, usize), SolwireError> {
    let mut value: usize = 0;
    for (i, &byte) in bytes.iter().take(3).enumerate() {
        value |= ((byte & 0x7f) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(SolwireError::InvalidTransaction(
        "unterminated compact-u16 prefix".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_tx(sig_count: u8, message: &[u8]) -> UnsignedTransaction {
        let mut bytes = vec![sig_count];
        bytes.extend(std::iter::repeat(0u8).take(sig_count as usize * 64));
        bytes.extend_from_slice(message);
        UnsignedTransaction {
            tx_base64: general_purpose::STANDARD.encode(&bytes),
            recent_blockhash: "11111111111111111111111111111111".into(),
            last_valid_block_height: 100,
        }
    }

    #[test]
    fn shortvec_single_byte() {
        assert_eq!(decode_shortvec(&[1, 0, 0]).unwrap(), (1, 1));
        assert_eq!(decode_shortvec(&[0x7f]).unwrap(), (127, 1));
    }

    #[test]
    fn shortvec_two_bytes() {
        // 0x80 | 0x00, 0x01 → 128
        assert_eq!(decode_shortvec(&[0x80, 0x01, 0]).unwrap(), (128, 2));
    }

    #[test]
    fn message_bytes_skips_signatures() {
        let tx = wire_tx(2, b"message-body");
        assert_eq!(tx.message_bytes().unwrap(), b"message-body");
    }

    #[test]
    fn splice_signature_preserves_message() {
        let tx = wire_tx(1, b"payload");
        let sig = [7u8; 64];
        let signed = tx.with_fee_payer_signature(&sig).unwrap();

        let bytes = general_purpose::STANDARD
            .decode(&signed.tx_base64)
            .unwrap();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..65], &sig[..]);
        assert_eq!(&bytes[65..], b"payload");
    }

    #[test]
    fn signature_is_base58_of_first_slot() {
        let tx = wire_tx(1, b"x");
        let signed = tx.with_fee_payer_signature(&[9u8; 64]).unwrap();
        let sig = signed.signature().unwrap();
        assert_eq!(bs58::decode(&sig).into_vec().unwrap(), vec![9u8; 64]);
    }

    #[test]
    fn rejects_zero_signature_slots() {
        let tx = wire_tx(0, b"m");
        assert!(tx.with_fee_payer_signature(&[0u8; 64]).is_err());
    }
}
