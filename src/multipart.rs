//! `multipart/form-data` request bodies.
//!
//! Each field is written as
//!
//! ```text
//! --{boundary}\r\n
//! Content-Disposition: form-data; name="{name}"[; filename="{filename}"]\r\n
//! Content-Type: {type}\r\n
//! \r\n
//! {bytes}\r\n
//! ```
//!
//! and the body ends with `--{boundary}--`. A fresh boundary is generated
//! every time the modifier is applied.
//!
//! Field and file names are quoted strings, so `"`, CR and LF in them are
//! percent-encoded (`%22`, `%0D`, `%0A`) the way browsers encode form
//! submissions. Line breaks in the other header values are replaced with
//! spaces.

use crate::{BoxError, Modifier, Request};
use bytes::{BufMut, Bytes, BytesMut};
use http::header::{HeaderValue, CONTENT_TYPE};
use std::borrow::Cow;

/// Default charset declared by text fields.
pub const DEFAULT_CHARSET: &str = "ISO-8859-1";

/// Default `Content-Transfer-Encoding` declared by text fields.
pub const DEFAULT_TRANSFER_ENCODING: &str = "8bit";

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    /// Arbitrary bytes, optionally presented as a file upload.
    Data {
        /// The form field name.
        name: String,
        /// The file name presented to the server.
        filename: Option<String>,
        /// The part's content.
        data: Bytes,
        /// The part's MIME type.
        mime_type: String,
    },
    /// A plain-text value.
    Text {
        /// The form field name.
        name: String,
        /// The text value.
        value: String,
        /// The declared charset.
        charset: String,
        /// The declared transfer encoding.
        transfer_encoding: String,
    },
}

impl FormField {
    /// A binary part without a file name.
    pub fn data(name: impl Into<String>, data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        FormField::Data {
            name: name.into(),
            filename: None,
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// A binary part presented as an uploaded file.
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
        mime_type: impl Into<String>,
    ) -> Self {
        FormField::Data {
            name: name.into(),
            filename: Some(filename.into()),
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// A text part using the default charset and transfer encoding.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormField::Text {
            name: name.into(),
            value: value.into(),
            charset: DEFAULT_CHARSET.to_string(),
            transfer_encoding: DEFAULT_TRANSFER_ENCODING.to_string(),
        }
    }

    fn write_to(&self, body: &mut BytesMut, boundary: &str) {
        body.put_slice(format!("--{boundary}\r\n").as_bytes());
        match self {
            FormField::Data {
                name,
                filename,
                data,
                mime_type,
            } => {
                body.put_slice(format!("Content-Disposition: form-data; name=\"{}\"", quoted(name)).as_bytes());
                if let Some(filename) = filename {
                    body.put_slice(format!("; filename=\"{}\"", quoted(filename)).as_bytes());
                }
                body.put_slice(format!("\r\nContent-Type: {}\r\n\r\n", single_line(mime_type)).as_bytes());
                body.put_slice(data);
            }
            FormField::Text {
                name,
                value,
                charset,
                transfer_encoding,
            } => {
                body.put_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\
                         Content-Type: text/plain; charset={}\r\n\
                         Content-Transfer-Encoding: {}\r\n\r\n{value}",
                        quoted(name),
                        single_line(charset),
                        single_line(transfer_encoding),
                    )
                    .as_bytes(),
                );
            }
        }
        body.put_slice(b"\r\n");
    }
}

/// Serializes `fields` into a multipart body delimited by `boundary`.
pub fn encode(fields: &[FormField], boundary: &str) -> Bytes {
    let mut body = BytesMut::new();
    for field in fields {
        field.write_to(&mut body, boundary);
    }
    body.put_slice(format!("--{boundary}--").as_bytes());
    body.freeze()
}

/// Escapes a value for a quoted `Content-Disposition` parameter.
fn quoted(value: &str) -> Cow<'_, str> {
    if !value.contains(['"', '\r', '\n']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 6);
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        Cow::Owned(value.replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

fn generate_boundary() -> String {
    format!("Boundary-{:032x}", rand::random::<u128>())
}

impl Modifier {
    /// Sets a `multipart/form-data` body built from `fields`.
    ///
    /// # Examples
    ///
    /// ```
    /// use callwright::{FormField, Modifier, Request};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), callwright::BoxError> {
    /// let upload = Modifier::multipart_form_data(vec![
    ///     FormField::text("title", "Holiday"),
    ///     FormField::file("photo", "beach.png", vec![0x89u8, 0x50], "image/png"),
    /// ]);
    ///
    /// let mut request = Request::new(Method::POST, "https://api.example.com/photos".parse()?);
    /// upload.apply(&mut request).await?;
    /// assert!(request
    ///     .header("content-type")
    ///     .unwrap()
    ///     .starts_with("multipart/form-data; boundary="));
    /// # Ok(())
    /// # }
    /// ```
    pub fn multipart_form_data(fields: Vec<FormField>) -> Modifier {
        Modifier::new(move |request: &mut Request| {
            let boundary = generate_boundary();
            request.headers.insert(
                CONTENT_TYPE,
                HeaderValue::try_from(format!("multipart/form-data; boundary={boundary}"))?,
            );
            request.body = Some(encode(&fields, &boundary));
            Ok::<_, BoxError>(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_encode_layout() {
        let fields = vec![
            FormField::data("meta", &b"{}"[..], "application/json"),
            FormField::file("doc", "a.txt", &b"hello"[..], "text/plain"),
            FormField::text("note", "hi"),
        ];

        let body = encode(&fields, "XYZ");
        let expected = "--XYZ\r\n\
                        Content-Disposition: form-data; name=\"meta\"\r\n\
                        Content-Type: application/json\r\n\
                        \r\n\
                        {}\r\n\
                        --XYZ\r\n\
                        Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
                        Content-Type: text/plain\r\n\
                        \r\n\
                        hello\r\n\
                        --XYZ\r\n\
                        Content-Disposition: form-data; name=\"note\"\r\n\
                        Content-Type: text/plain; charset=ISO-8859-1\r\n\
                        Content-Transfer-Encoding: 8bit\r\n\
                        \r\n\
                        hi\r\n\
                        --XYZ--";
        assert_eq!(std::str::from_utf8(&body).unwrap(), expected);
    }

    #[test]
    fn test_names_cannot_break_out_of_their_header() {
        let fields = vec![FormField::file(
            "up\"load",
            "evil.txt\"\r\nContent-Type: text/html\r\n\r\n<script>",
            &b"x"[..],
            "text/plain\r\nX-Injected: 1",
        )];

        let body = encode(&fields, "XYZ");
        let expected = "--XYZ\r\n\
                        Content-Disposition: form-data; name=\"up%22load\"; \
                        filename=\"evil.txt%22%0D%0AContent-Type: text/html%0D%0A%0D%0A<script>\"\r\n\
                        Content-Type: text/plain  X-Injected: 1\r\n\
                        \r\n\
                        x\r\n\
                        --XYZ--";
        assert_eq!(std::str::from_utf8(&body).unwrap(), expected);
    }

    #[test]
    fn test_plain_names_are_not_copied() {
        assert!(matches!(quoted("report.pdf"), Cow::Borrowed("report.pdf")));
        assert_eq!(quoted("a\"b"), "a%22b");
    }

    #[test]
    fn test_empty_form_is_just_the_terminator() {
        assert_eq!(&encode(&[], "b")[..], b"--b--");
    }

    #[tokio::test]
    async fn test_boundary_is_unique_per_application() {
        let modifier = Modifier::multipart_form_data(vec![FormField::text("a", "b")]);

        let mut first = Request::new(Method::POST, "https://api.example.com".parse().unwrap());
        let mut second = first.clone();
        modifier.apply(&mut first).await.unwrap();
        modifier.apply(&mut second).await.unwrap();

        let boundary = |request: &Request| {
            request
                .header("content-type")
                .unwrap()
                .trim_start_matches("multipart/form-data; boundary=")
                .to_string()
        };
        let (a, b) = (boundary(&first), boundary(&second));
        assert_ne!(a, b);
        assert!(first.body_bytes().ends_with(format!("--{a}--").as_bytes()));
        assert!(second.body_bytes().starts_with(format!("--{b}\r\n").as_bytes()));
    }
}
