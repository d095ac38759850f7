//! Comma-delimited form of a tag id list.
//!
//! Quizzes store tag ids as a native JSON array. Rows written by the older
//! quizzes service hold the same list as `"1,2,3"`; [`deserialize`] accepts
//! both. The batch lookup query (`id__in=`) uses [`encode`] too.

use serde::{Deserialize, Deserializer};

use crate::errors::ModelError;

pub const DELIMITER: char = ',';

/// Join ids with [`DELIMITER`]. Order and duplicates are kept.
pub fn encode(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}

/// Inverse of [`encode`]. Blank segments are skipped; anything else that is not
/// an integer is an error.
pub fn decode(raw: &str) -> Result<Vec<i64>, ModelError> {
    raw.split(DELIMITER)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment.parse::<i64>().map_err(|_| ModelError::TagIdCodec {
                raw: raw.to_string(),
                segment: segment.to_string(),
            })
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTagIds {
    Native(Vec<i64>),
    Delimited(String),
}

/// Serde helper for fields that may hold either representation.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StoredTagIds>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(StoredTagIds::Native(ids)) => Ok(ids),
        Some(StoredTagIds::Delimited(raw)) => decode(&raw).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_keeps_order_and_duplicates() {
        assert_eq!(encode(&[3, 1, 3, -2]), "3,1,3,-2");
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn decode_inverts_encode() {
        for ids in [vec![], vec![7], vec![1, 2, 3], vec![5, 5, 0, -1, i64::MAX]] {
            assert_eq!(decode(&encode(&ids)).unwrap(), ids);
        }
    }

    #[test]
    fn decode_tolerates_blanks_and_whitespace() {
        assert_eq!(decode(" 1, 2 ,,3,").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode("").unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode("1,x,3").unwrap_err();
        assert_eq!(
            err,
            ModelError::TagIdCodec { raw: "1,x,3".into(), segment: "x".into() }
        );
    }

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "super::deserialize")]
        tags: Vec<i64>,
    }

    #[test]
    fn deserialize_accepts_both_forms() {
        let native: Row = serde_json::from_str(r#"{"tags":[4,2]}"#).unwrap();
        let legacy: Row = serde_json::from_str(r#"{"tags":"4,2"}"#).unwrap();
        let null: Row = serde_json::from_str(r#"{"tags":null}"#).unwrap();
        let missing: Row = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(native.tags, vec![4, 2]);
        assert_eq!(legacy.tags, vec![4, 2]);
        assert!(null.tags.is_empty());
        assert!(missing.tags.is_empty());
    }

    #[test]
    fn deserialize_surfaces_bad_legacy_rows() {
        assert!(serde_json::from_str::<Row>(r#"{"tags":"1,two"}"#).is_err());
    }
}
