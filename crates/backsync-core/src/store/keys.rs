//! Key encoding for the store's column families.
//!
//! Entry ids are signed 64-bit integers (head inserts count downward, below
//! zero), encoded sign-flipped big-endian so lexicographic key order equals
//! numeric order. Queue names are length-prefixed with a big-endian u16 so
//! names never collide across length boundaries. Composite keys use `:`
//! (0x3A) as separator.

const SEPARATOR: u8 = b':';
const SIGN_BIT: u64 = 1 << 63;

/// Encode an entry id as 8 bytes that sort lexicographically in numeric
/// order, negative ids included.
pub(crate) fn encode_id(id: i64) -> [u8; 8] {
    ((id as u64) ^ SIGN_BIT).to_be_bytes()
}

/// Decode an id produced by [`encode_id`]. `None` unless exactly 8 bytes.
pub(crate) fn decode_id(bytes: &[u8]) -> Option<i64> {
    let raw: [u8; 8] = bytes.try_into().ok()?;
    Some((u64::from_be_bytes(raw) ^ SIGN_BIT) as i64)
}

/// Key of an entry in the `requests` CF: the encoded id alone, so a full
/// scan of the CF walks entries in global enqueue order.
pub(crate) fn entry_key(id: i64) -> [u8; 8] {
    encode_id(id)
}

/// Encode a variable-length string with a 2-byte big-endian length prefix.
fn encode_string(s: &str) -> Vec<u8> {
    let len = u16::try_from(s.len()).expect("queue name exceeds 64 KiB");
    let mut buf = Vec::with_capacity(2 + s.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    buf
}

/// Key in the `queue_index` CF: `{queue_name}:{id}`. Iterating one queue's
/// prefix yields that queue's entries in id order — its FIFO content.
pub(crate) fn index_key(queue_name: &str, id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(&encode_string(queue_name));
    key.push(SEPARATOR);
    key.extend_from_slice(&encode_id(id));
    key
}

/// Prefix covering every index key of one queue.
pub(crate) fn queue_prefix(queue_name: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(24);
    prefix.extend_from_slice(&encode_string(queue_name));
    prefix.push(SEPARATOR);
    prefix
}

/// The largest index key one queue can produce. Reverse iteration starting
/// here finds the queue's tail entry.
pub(crate) fn queue_prefix_upper(queue_name: &str) -> Vec<u8> {
    let mut key = queue_prefix(queue_name);
    key.extend_from_slice(&[0xFF; 8]);
    key
}

/// Split an index key back into `(queue_name, id)`.
///
/// Key format: `{name_len(2B)}{queue_name}:{id(8B)}`. Returns `None` for
/// malformed keys.
pub(crate) fn parse_index_key(key: &[u8]) -> Option<(String, i64)> {
    if key.len() < 2 + 1 + 8 {
        return None;
    }
    let name_len = u16::from_be_bytes([key[0], key[1]]) as usize;
    if key.len() != 2 + name_len + 1 + 8 {
        return None;
    }
    if key[2 + name_len] != SEPARATOR {
        return None;
    }
    let queue_name = std::str::from_utf8(&key[2..2 + name_len]).ok()?.to_string();
    let id = decode_id(&key[2 + name_len + 1..])?;
    Some((queue_name, id))
}
