//! Wire codec for ledger memos.
//!
//! Anchors and timestamps travel as single-line JSON memos written by the
//! service's ledger key. Ledger RPC layers prefix returned memos with
//! `"[<len>] "`; parsing strips it, serialization never emits it.

use crate::beat::{is_hex_hash, GlobalAnchor};
use crate::error::{BeatsError, Result};
use serde::Serialize;
use serde_json::Value;

/// Hard cap on a serialized memo. The ledger's memo program enforces the
/// same bound; checking before publish avoids burning a transaction fee
/// on a doomed submission.
pub const MAX_MEMO_BYTES: usize = 566;

#[derive(Serialize)]
struct AnchorMemoWire<'a> {
    v: u8,
    #[serde(rename = "type")]
    kind: &'a str,
    beat_index: u64,
    hash: &'a str,
    prev: &'a str,
    utc: i64,
    difficulty: u32,
    epoch: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    solana_entropy: Option<&'a str>,
}

#[derive(Serialize)]
struct TimestampMemoWire<'a> {
    v: u8,
    #[serde(rename = "type")]
    kind: &'a str,
    hash: &'a str,
    anchor_index: u64,
    anchor_hash: &'a str,
    utc: i64,
}

/// Strip the `"[<len>] "` prefix some ledger layers put in front of memo
/// text. Memos without the prefix pass through unchanged.
fn strip_memo_prefix(raw: &str) -> &str {
    if let Some(rest) = raw.strip_prefix('[') {
        if let Some(close) = rest.find("] ") {
            if !rest[..close].is_empty() && rest[..close].bytes().all(|b| b.is_ascii_digit()) {
                return &rest[close + 2..];
            }
        }
    }
    raw
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}

/// Parse a memo into an anchor, or `None` when the memo is anything else.
///
/// "Anything else" covers unrelated memos the writer may have published,
/// malformed JSON, wrong `v`/`type`, and out-of-shape fields — none of
/// which are errors, the scanner just skips them.
pub fn parse_anchor_memo(raw: &str) -> Option<GlobalAnchor> {
    let body = strip_memo_prefix(raw.trim());
    let value: Value = serde_json::from_str(body).ok()?;

    if value.get("v")?.as_u64()? != 1 || value.get("type")?.as_str()? != "anchor" {
        return None;
    }

    let beat_index = value.get("beat_index")?.as_u64()?;
    let hash = value.get("hash")?.as_str()?;
    let prev = value.get("prev")?.as_str()?;
    if !is_hex_hash(hash) || !is_hex_hash(prev) {
        return None;
    }
    let utc = value.get("utc")?.as_i64()?;
    if utc < 0 {
        return None;
    }
    let difficulty = as_u32(value.get("difficulty")?)?;
    if difficulty == 0 {
        return None;
    }
    let epoch = as_u32(value.get("epoch")?)?;
    let solana_entropy = match value.get("solana_entropy") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(_) => return None,
    };

    Some(GlobalAnchor {
        beat_index,
        hash: hash.to_string(),
        prev_hash: prev.to_string(),
        utc,
        difficulty,
        epoch,
        solana_entropy,
        signature: None,
    })
}

/// Serialize an anchor to its memo form, enforcing the size cap.
///
/// Field order is fixed by the wire format (`prev`, not `prev_hash`, on
/// the wire).
pub fn serialize_anchor_memo(anchor: &GlobalAnchor) -> Result<String> {
    let wire = AnchorMemoWire {
        v: 1,
        kind: "anchor",
        beat_index: anchor.beat_index,
        hash: &anchor.hash,
        prev: &anchor.prev_hash,
        utc: anchor.utc,
        difficulty: anchor.difficulty,
        epoch: anchor.epoch,
        solana_entropy: anchor.solana_entropy.as_deref(),
    };
    let json = serde_json::to_string(&wire)
        .map_err(|e| BeatsError::Memo(format!("serialize failed: {}", e)))?;
    if json.len() > MAX_MEMO_BYTES {
        return Err(BeatsError::Memo(format!(
            "anchor memo is {} bytes, cap is {}",
            json.len(),
            MAX_MEMO_BYTES
        )));
    }
    Ok(json)
}

/// Serialize a timestamp memo binding `hash` to the given anchor.
pub fn serialize_timestamp_memo(
    hash: &str,
    anchor_index: u64,
    anchor_hash: &str,
    utc: i64,
) -> Result<String> {
    let wire = TimestampMemoWire {
        v: 1,
        kind: "timestamp",
        hash,
        anchor_index,
        anchor_hash,
        utc,
    };
    let json = serde_json::to_string(&wire)
        .map_err(|e| BeatsError::Memo(format!("serialize failed: {}", e)))?;
    if json.len() > MAX_MEMO_BYTES {
        return Err(BeatsError::Memo(format!(
            "timestamp memo is {} bytes, cap is {}",
            json.len(),
            MAX_MEMO_BYTES
        )));
    }
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beat::create_global_anchor;

    #[test]
    fn test_anchor_memo_round_trip() {
        let anchor = create_global_anchor(None, 1000, 0, None).expect("anchor");
        let memo = serialize_anchor_memo(&anchor).expect("serialize");
        let parsed = parse_anchor_memo(&memo).expect("parse back");
        assert_eq!(parsed, anchor);
    }

    #[test]
    fn test_anchor_memo_round_trip_with_entropy() {
        let entropy = bs58::encode([3u8; 32]).into_string();
        let anchor = create_global_anchor(None, 1000, 7, Some(&entropy)).expect("anchor");
        let memo = serialize_anchor_memo(&anchor).expect("serialize");
        assert!(memo.contains("\"solana_entropy\""));
        let parsed = parse_anchor_memo(&memo).expect("parse back");
        assert_eq!(parsed, anchor);
    }

    #[test]
    fn test_parse_strips_ledger_prefix() {
        let anchor = create_global_anchor(None, 1000, 0, None).expect("anchor");
        let memo = serialize_anchor_memo(&anchor).expect("serialize");
        let prefixed = format!("[{}] {}", memo.len(), memo);
        let parsed = parse_anchor_memo(&prefixed).expect("prefixed memo must parse");
        assert_eq!(parsed, anchor);
        // parse→serialize round-trip equals the memo with its prefix stripped
        assert_eq!(serialize_anchor_memo(&parsed).expect("reserialize"), memo);
    }

    #[test]
    fn test_parse_rejects_non_anchor_memos() {
        assert!(parse_anchor_memo("gm").is_none());
        assert!(parse_anchor_memo("{\"v\":1,\"type\":\"timestamp\"}").is_none());
        assert!(parse_anchor_memo("{\"v\":2,\"type\":\"anchor\"}").is_none());
        assert!(parse_anchor_memo("[12] not json at all").is_none());
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        let anchor = create_global_anchor(None, 1000, 0, None).expect("anchor");
        let memo = serialize_anchor_memo(&anchor).expect("serialize");

        let short_hash = memo.replacen(&anchor.hash, "abc123", 1);
        assert!(parse_anchor_memo(&short_hash).is_none(), "short hash must be rejected");

        let negative_index = memo.replacen("\"beat_index\":0", "\"beat_index\":-1", 1);
        assert!(parse_anchor_memo(&negative_index).is_none());

        let zero_difficulty = memo.replacen("\"difficulty\":1000", "\"difficulty\":0", 1);
        assert!(parse_anchor_memo(&zero_difficulty).is_none());
    }

    #[test]
    fn test_memo_wire_field_names() {
        let anchor = create_global_anchor(None, 1000, 0, None).expect("anchor");
        let memo = serialize_anchor_memo(&anchor).expect("serialize");
        assert!(memo.contains("\"prev\":"), "wire field must be named prev");
        assert!(!memo.contains("prev_hash"), "prev_hash is the in-memory name only");
        assert!(memo.starts_with("{\"v\":1,\"type\":\"anchor\""));
        assert!(memo.len() <= MAX_MEMO_BYTES);
    }

    #[test]
    fn test_timestamp_memo_shape() {
        let memo = serialize_timestamp_memo(&"a".repeat(64), 12, &"b".repeat(64), 1_700_000_000_000)
            .expect("serialize");
        assert!(memo.starts_with("{\"v\":1,\"type\":\"timestamp\""));
        assert!(memo.contains("\"anchor_index\":12"));
        assert!(memo.len() <= MAX_MEMO_BYTES);
    }
}
