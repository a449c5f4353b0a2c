use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Deserializer;
use std::str::FromStr;
use url::form_urlencoded;

/// Entity the legacy API emits without declaring it.
const BULLET: &str = "&bull;";
const BULLET_CDATA: &str = "<![CDATA[&bull;]]>";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Xml(#[from] quick_xml::DeError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

/// Decode a legacy XML document.
///
/// Only a copy of `body` is patched; the caller keeps the original bytes.
pub(crate) fn xml<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    let text = std::str::from_utf8(body)?.replace(BULLET, BULLET_CDATA);
    Ok(quick_xml::de::from_str(&text)?)
}

pub(crate) fn json<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    Ok(serde_json::from_slice(body)?)
}

/// Envelope of the paged modern list endpoints.
#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned + Default")]
pub(crate) struct Page<T> {
    #[serde(default)]
    pub(crate) data: T,
    #[serde(default)]
    pub(crate) paging: Paging,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    pub(crate) next: Option<String>,
    #[serde(default)]
    pub(crate) previous: Option<String>,
}

impl Paging {
    pub(crate) fn next_offset(&self) -> u32 {
        self.next.as_deref().map(offset_of).unwrap_or(0)
    }

    pub(crate) fn prev_offset(&self) -> u32 {
        self.previous.as_deref().map(offset_of).unwrap_or(0)
    }
}

/// `{"node": ...}` wrapper of v2 list items.
#[derive(Debug, Deserialize)]
pub(crate) struct Node<T> {
    pub(crate) node: T,
}

/// The `offset` query parameter of a paging link, 0 when absent or invalid.
pub(crate) fn offset_of(link: &str) -> u32 {
    let query = link.split_once('?').map_or("", |(_, query)| query);
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "offset")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0)
}

/// Numbers in legacy documents are often empty elements; read those as the
/// default value.
pub(crate) fn deserialize_number_from_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    let raw: String = Deserialize::deserialize(deserializer)?;
    Ok(raw.trim().parse::<T>().unwrap_or_default())
}

/// [`deserialize_number_from_string`] for elements that may be missing.
pub(crate) fn deserialize_optional_number<'de, D, T>(
    deserializer: D,
) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    deserialize_number_from_string(deserializer).map(Some)
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Entry {
        #[serde(default, deserialize_with = "deserialize_number_from_string")]
        id: u32,
        #[serde(default)]
        synopsis: String,
    }

    #[test]
    fn test_bullet_fixup() {
        let body = b"<entry><id>7</id><synopsis>one &bull; two</synopsis></entry>";
        let entry: Entry = xml(body).unwrap();
        assert_eq!(entry.id, 7);
        assert!(entry.synopsis.contains("&bull;"));
        assert!(entry.synopsis.starts_with("one"));
        assert!(entry.synopsis.ends_with("two"));
    }

    #[test]
    fn test_bullet_without_fixup_fails() {
        let raw = "<entry><id>7</id><synopsis>one &bull; two</synopsis></entry>";
        assert!(quick_xml::de::from_str::<Entry>(raw).is_err());
    }

    #[test]
    fn test_invalid_utf8_fails() {
        let err = xml::<Entry>(b"<entry><synopsis>caf\xe9</synopsis></entry>").unwrap_err();
        assert!(matches!(err, DecodeError::Utf8(_)));
    }

    #[test]
    fn test_empty_number() {
        let entry: Entry = xml(b"<entry><id></id></entry>").unwrap();
        assert_eq!(entry.id, 0);
    }

    #[test]
    fn test_offsets() {
        assert_eq!(offset_of("?offset=4"), 4);
        assert_eq!(
            offset_of("https://api.myanimelist.net/v2/anime/ranking?offset=10&limit=5"),
            10
        );
        assert_eq!(offset_of("https://api.myanimelist.net/v2/anime?limit=5"), 0);
        assert_eq!(offset_of("?offset=-3"), 0);
        assert_eq!(offset_of("?offset=abc"), 0);
        assert_eq!(offset_of(""), 0);
    }

    #[test]
    fn test_page_envelope() {
        let page: Page<Vec<serde_json::Value>> = json(
            br#"{"data":[{"id":1},{"id":2}],"paging":{"next":"?offset=4","previous":"?offset=2"}}"#,
        )
        .unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.paging.next_offset(), 4);
        assert_eq!(page.paging.prev_offset(), 2);

        let page: Page<Vec<serde_json::Value>> = json(br#"{"data":[]}"#).unwrap();
        assert_eq!(page.paging.next_offset(), 0);
        assert_eq!(page.paging.prev_offset(), 0);
    }
}
