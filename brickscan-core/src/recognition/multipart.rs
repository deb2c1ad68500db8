//! `multipart/form-data` encoding for the single-image upload.

use uuid::Uuid;

/// Filename announced for the uploaded image.
pub const UPLOAD_FILE_NAME: &str = "scan.jpg";

/// Content type announced for the uploaded image.
pub const UPLOAD_CONTENT_TYPE: &str = "image/jpeg";

/// An encoded multipart body and the boundary that delimits it.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl MultipartBody {
    /// Encode one file part under a fresh random boundary.
    ///
    /// The boundary is regenerated in the (astronomically unlikely) case
    /// that it occurs inside the payload.
    pub fn single_file(field_name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        let mut boundary = generate_boundary();
        while contains(data, boundary.as_bytes()) {
            boundary = generate_boundary();
        }
        Self::with_boundary(boundary, field_name, file_name, content_type, data)
    }

    /// Encode one file part under the given boundary.
    pub fn with_boundary(
        boundary: String,
        field_name: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Self {
        let mut bytes = Vec::with_capacity(data.len() + 256);

        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        bytes.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quoted(field_name),
                escape_quoted(file_name)
            )
            .as_bytes(),
        );
        bytes.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        bytes.extend_from_slice(data);
        bytes.extend_from_slice(b"\r\n");
        bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        Self { boundary, bytes }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Random per-request boundary token.
pub fn generate_boundary() -> String {
    format!("Boundary-{}", Uuid::new_v4().simple())
}

// Header parameter values are quoted strings: quotes and line breaks are not allowed raw.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_part_layout() {
        let body = MultipartBody::with_boundary(
            "Boundary-test".into(),
            "query_image",
            UPLOAD_FILE_NAME,
            UPLOAD_CONTENT_TYPE,
            b"\xff\xd8jpeg-bytes\xff\xd9",
        );

        let mut expected = Vec::new();
        expected.extend_from_slice(b"--Boundary-test\r\n");
        expected.extend_from_slice(
            b"Content-Disposition: form-data; name=\"query_image\"; filename=\"scan.jpg\"\r\n",
        );
        expected.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
        expected.extend_from_slice(b"\xff\xd8jpeg-bytes\xff\xd9");
        expected.extend_from_slice(b"\r\n--Boundary-test--\r\n");

        assert_eq!(
            body.content_type(),
            "multipart/form-data; boundary=Boundary-test"
        );
        assert_eq!(body.into_bytes(), expected);
    }

    #[test]
    fn test_boundary_unique_per_body() {
        let a = MultipartBody::single_file("f", "scan.jpg", "image/jpeg", b"x");
        let b = MultipartBody::single_file("f", "scan.jpg", "image/jpeg", b"x");
        assert_ne!(a.boundary(), b.boundary());
        assert!(a.boundary().starts_with("Boundary-"));
    }

    #[test]
    fn test_field_name_is_escaped() {
        let body = MultipartBody::with_boundary(
            "b".into(),
            "evil\"\r\nX-Injected: 1",
            "scan.jpg",
            "image/jpeg",
            b"",
        );
        let text = String::from_utf8(body.into_bytes()).unwrap();
        assert!(text.contains("name=\"evil%22%0D%0AX-Injected: 1\""));
        assert!(!text.contains("\r\nX-Injected"));
    }
}
