use uuid::Uuid;

use crate::Language;

#[derive(Debug, Clone)]
pub struct ImagePart {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A batch of images plus the display language, laid out the way
/// `POST /api/detect` reads it: `image_0..image_{n-1}`, then `language`,
/// then `imageCount`.
#[derive(Debug, Clone, Default)]
pub struct DetectionRequest {
    language: Language,
    images: Vec<ImagePart>,
}

impl DetectionRequest {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            images: Vec::new(),
        }
    }

    pub fn with_image(
        mut self,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.images.push(ImagePart {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        });
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..self.images.len())
            .map(|i| format!("image_{}", i))
            .collect();
        names.push("language".to_string());
        names.push("imageCount".to_string());
        names
    }

    pub fn boundary() -> String {
        format!("----cropcare-{}", Uuid::new_v4().simple())
    }

    /// Returns the `Content-Type` header value and the encoded body.
    pub fn into_multipart(self, boundary: &str) -> (String, Vec<u8>) {
        let count = self.images.len();
        let mut body = MultipartBody::new(boundary);
        for (i, image) in self.images.into_iter().enumerate() {
            body = body.file(
                &format!("image_{}", i),
                &image.file_name,
                &image.content_type,
                &image.data,
            );
        }
        body.text("language", self.language.as_ref())
            .text("imageCount", &count.to_string())
            .finish()
    }
}

/// Minimal `multipart/form-data` encoder.
#[derive(Debug)]
pub struct MultipartBody {
    boundary: String,
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_string(),
            buf: Vec::new(),
        }
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.open_part();
        self.buf.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quoted(name),
                escape_quoted(file_name)
            )
            .as_bytes(),
        );
        self.buf
            .extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part();
        self.buf.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_quoted(name)
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.buf,
        )
    }

    fn open_part(&mut self) {
        self.buf
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
    }
}

// Browsers percent-encode quotes and drop line breaks in header parameters.
fn escape_quoted(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .map(|c| if c == '"' { "%22".to_string() } else { c.to_string() })
        .collect()
}
