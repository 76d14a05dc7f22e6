//! JSON encoding and decoding settings.

use serde::{de::DeserializeOwned, Serialize};

/// Encodes request bodies as JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonEncoder {
    pretty: bool,
}

impl JsonEncoder {
    /// An encoder producing compact JSON (the default).
    pub fn new() -> Self {
        Self::default()
    }

    /// An encoder producing indented JSON.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Serializes `value` to JSON bytes.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<Vec<u8>> {
        if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        }
    }
}

/// Decodes response bodies from JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonDecoder {
    empty_body_as_null: bool,
}

impl JsonDecoder {
    /// A strict decoder: an empty body is a decode error (the default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats an empty (or all-whitespace) body as JSON `null`, so
    /// `204 No Content` responses decode into `()` or `Option<T>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use callwright::JsonDecoder;
    ///
    /// let decoder = JsonDecoder::new().empty_body_as_null(true);
    /// let value: Option<u32> = decoder.decode(b"").unwrap();
    /// assert_eq!(value, None);
    ///
    /// assert!(JsonDecoder::new().decode::<Option<u32>>(b"").is_err());
    /// ```
    pub fn empty_body_as_null(mut self, enabled: bool) -> Self {
        self.empty_body_as_null = enabled;
        self
    }

    /// Deserializes `bytes` into `T`.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> serde_json::Result<T> {
        if self.empty_body_as_null && bytes.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_slice(b"null");
        }
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        id: u32,
        tags: Vec<String>,
    }

    #[test]
    fn test_encode_then_decode_is_lossless() {
        let payload = Payload {
            id: 3,
            tags: vec!["a".to_string(), "b".to_string()],
        };

        for encoder in [JsonEncoder::new(), JsonEncoder::pretty()] {
            let bytes = encoder.encode(&payload).unwrap();
            let decoded: Payload = JsonDecoder::new().decode(&bytes).unwrap();
            assert_eq!(decoded, payload);
        }
    }

    #[test]
    fn test_pretty_output_is_indented() {
        let bytes = JsonEncoder::pretty().encode(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_empty_body_handling() {
        let lenient = JsonDecoder::new().empty_body_as_null(true);
        lenient.decode::<()>(b" \n").unwrap();
        assert!(JsonDecoder::new().decode::<()>(b"").is_err());
        assert!(lenient.decode::<Payload>(b"").is_err());
    }
}
