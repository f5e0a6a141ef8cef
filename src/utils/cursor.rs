//! Keyset cursors for newest-first entry listings.
//! A cursor is `"{created_at_rfc3339}|{entry_id}"` in URL-safe base64 and
//! points at the last entry of the page it was issued with.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

use crate::domain::EntryId;

pub fn encode(created_at: DateTime<Utc>, id: EntryId) -> String {
    let s = format!("{}|{}", created_at.to_rfc3339(), id);
    URL_SAFE_NO_PAD.encode(s)
}

pub fn decode(cursor: &str) -> Result<(DateTime<Utc>, EntryId), String> {
    let decoded = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|e| format!("base64 decode error: {}", e))?;
    let s = String::from_utf8(decoded).map_err(|e| format!("utf8 error: {}", e))?;
    let mut parts = s.splitn(2, '|');
    let ts_str = parts.next().ok_or_else(|| "missing timestamp in cursor".to_string())?;
    let id_str = parts.next().ok_or_else(|| "missing id in cursor".to_string())?;
    let ts = DateTime::parse_from_rfc3339(ts_str)
        .map_err(|e| format!("timestamp parse error: {}", e))?
        .with_timezone(&Utc);
    let id = id_str
        .parse::<EntryId>()
        .map_err(|e| format!("id parse error: {}", e))?;
    Ok((ts, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_what_it_encodes() {
        let ts = Utc::now();
        let cursor = encode(ts, 981);
        assert_eq!(decode(&cursor).unwrap(), (ts, 981));
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("not base64!").is_err());
        assert!(decode(&URL_SAFE_NO_PAD.encode("no-separator")).is_err());
        assert!(decode(&URL_SAFE_NO_PAD.encode("2026-01-01T00:00:00Z|abc")).is_err());
    }
}
