//! Minimal legacy-transaction encoding for memo publishes.
//!
//! A memo transaction is one signature over a message that references
//! exactly two accounts: the fee-paying writer and the memo program.
//! That is small enough that hand-encoding the wire format beats pulling
//! in a full ledger SDK.

use crate::error::{BeatsError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signer, SigningKey};

/// SPL Memo program id.
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";

/// Shortvec (compact-u16) length prefix used throughout the wire format.
fn push_compact_u16(buf: &mut Vec<u8>, mut value: u16) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn decode_32(b58: &str, what: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(b58)
        .into_vec()
        .map_err(|e| BeatsError::Ledger(format!("{} is not base58: {}", what, e)))?;
    bytes
        .try_into()
        .map_err(|_| BeatsError::Ledger(format!("{} must be 32 bytes", what)))
}

/// Build and sign a legacy memo transaction, returned base64-encoded for
/// `sendTransaction`.
pub fn build_memo_transaction(
    writer: &SigningKey,
    recent_blockhash: &str,
    memo: &[u8],
) -> Result<String> {
    let blockhash = decode_32(recent_blockhash, "blockhash")?;
    let program_id = decode_32(MEMO_PROGRAM_ID, "memo program id")?;
    let writer_pub = writer.verifying_key().to_bytes();
    let data_len = u16::try_from(memo.len())
        .map_err(|_| BeatsError::Ledger(format!("memo too large: {} bytes", memo.len())))?;

    // Message: header, account keys, blockhash, instructions
    let mut message = Vec::with_capacity(128 + memo.len());
    message.push(1); // required signatures
    message.push(0); // read-only signed accounts
    message.push(1); // read-only unsigned accounts (the program)
    push_compact_u16(&mut message, 2);
    message.extend_from_slice(&writer_pub);
    message.extend_from_slice(&program_id);
    message.extend_from_slice(&blockhash);
    push_compact_u16(&mut message, 1);
    message.push(1); // program id index
    push_compact_u16(&mut message, 0); // the memo instruction names no accounts
    push_compact_u16(&mut message, data_len);
    message.extend_from_slice(memo);

    let signature = writer.sign(&message);

    let mut transaction = Vec::with_capacity(1 + 64 + message.len());
    push_compact_u16(&mut transaction, 1);
    transaction.extend_from_slice(&signature.to_bytes());
    transaction.extend_from_slice(&message);

    Ok(BASE64.encode(transaction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    #[test]
    fn test_compact_u16_encoding() {
        let cases: [(u16, &[u8]); 5] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (566, &[0xb6, 0x04]),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            push_compact_u16(&mut buf, value);
            assert_eq!(buf, expected, "encoding of {}", value);
        }
    }

    #[test]
    fn test_memo_transaction_layout() {
        let writer = SigningKey::from_bytes(&[9u8; 32]);
        let blockhash = bs58::encode([1u8; 32]).into_string();
        let memo = b"{\"v\":1,\"type\":\"anchor\"}";

        let encoded = build_memo_transaction(&writer, &blockhash, memo).expect("build");
        let raw = BASE64.decode(encoded).expect("base64");

        // 1 signature count + 64 signature + 3 header + 1 keys-len + 64 keys
        // + 32 blockhash + 1 instr-len + 1 program idx + 1 accounts-len
        // + 1 data-len + memo
        assert_eq!(raw.len(), 1 + 64 + 3 + 1 + 64 + 32 + 1 + 1 + 1 + 1 + memo.len());
        assert_eq!(raw[0], 1, "one signature");
        assert_eq!(&raw[65..68], &[1, 0, 1], "message header");
        assert_eq!(&raw[69..101], writer.verifying_key().to_bytes(), "writer is fee payer");
        assert_eq!(&raw[raw.len() - memo.len()..], memo, "memo data is last");

        // the signature must verify over the message bytes
        let signature = ed25519_dalek::Signature::from_bytes(
            raw[1..65].try_into().expect("64-byte signature"),
        );
        assert!(writer
            .verifying_key()
            .verify(&raw[65..], &signature)
            .is_ok());
    }

    #[test]
    fn test_rejects_bad_blockhash() {
        let writer = SigningKey::from_bytes(&[9u8; 32]);
        assert!(build_memo_transaction(&writer, "short", b"memo").is_err());
        assert!(build_memo_transaction(&writer, "!!!", b"memo").is_err());
    }
}
