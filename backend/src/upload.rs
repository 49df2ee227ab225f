use actix_multipart::{Field, Multipart};
use futures::TryStreamExt;
use shared::Language;
use std::collections::BTreeMap;

const MAX_TEXT_FIELD_BYTES: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No image files provided")]
    NoFiles,
    #[error("Invalid file type. Please upload images only.")]
    InvalidType { file_name: String },
    #[error("File too large. Maximum size is {limit_mb}MB per image.")]
    TooLarge { file_name: String, limit_mb: usize },
    #[error("Unsupported language. Use one of: en, hi, ne.")]
    UnsupportedLanguage(String),
    #[error("Malformed multipart payload")]
    Malformed(#[from] actix_multipart::MultipartError),
}

/// File part metadata. Bytes are counted, not kept: diagnosis only looks at
/// the file name.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

/// Raw fields of a detect request before selection and validation.
#[derive(Debug, Default)]
pub struct DetectForm {
    indexed: BTreeMap<usize, UploadedImage>,
    legacy: Option<UploadedImage>,
    language: Option<String>,
    image_count: Option<String>,
}

enum FieldKind {
    Indexed(usize),
    Legacy,
    Language,
    ImageCount,
    Other,
}

impl FieldKind {
    fn from_name(name: &str) -> Self {
        match name {
            "image" => FieldKind::Legacy,
            "language" => FieldKind::Language,
            "imageCount" => FieldKind::ImageCount,
            _ => name
                .strip_prefix("image_")
                .and_then(canonical_index)
                .map(FieldKind::Indexed)
                .unwrap_or(FieldKind::Other),
        }
    }
}

// Digits exactly as `usize` prints them: no sign, no leading zeros.
fn canonical_index(digits: &str) -> Option<usize> {
    let index: usize = digits.parse().ok()?;
    (index.to_string() == digits).then_some(index)
}

impl DetectForm {
    /// Reads every field of the stream. Only the first occurrence of a field
    /// name counts.
    pub async fn read(mut payload: Multipart) -> Result<Self, UploadError> {
        let mut form = DetectForm::default();

        while let Some(mut field) = payload.try_next().await? {
            let kind = FieldKind::from_name(field.name().unwrap_or_default());
            match kind {
                FieldKind::Indexed(index) => {
                    let image = read_image(&mut field).await?;
                    form.indexed.entry(index).or_insert(image);
                }
                FieldKind::Legacy => {
                    let image = read_image(&mut field).await?;
                    form.legacy.get_or_insert(image);
                }
                FieldKind::Language => {
                    let value = read_text(&mut field).await?;
                    form.language.get_or_insert(value);
                }
                FieldKind::ImageCount => {
                    let value = read_text(&mut field).await?;
                    form.image_count.get_or_insert(value);
                }
                FieldKind::Other => drain(&mut field).await?,
            }
        }

        Ok(form)
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Picks `image_0..image_{imageCount-1}` in index order, falling back to the
    /// single `image` field when none of those are present.
    pub fn into_images(self) -> Vec<UploadedImage> {
        let count = parse_image_count(self.image_count.as_deref());
        let mut images: Vec<UploadedImage> = if count > 0 {
            let upper = usize::try_from(count).unwrap_or(usize::MAX);
            self.indexed
                .into_iter()
                .filter(|(index, _)| *index < upper)
                .map(|(_, image)| image)
                .collect()
        } else {
            Vec::new()
        };

        if images.is_empty() {
            images.extend(self.legacy);
        }
        images
    }
}

/// Rejects the batch on the first offending file, in upload order.
pub fn validate_images(images: &[UploadedImage], max_image_mb: usize) -> Result<(), UploadError> {
    if images.is_empty() {
        return Err(UploadError::NoFiles);
    }
    let max_bytes = max_image_mb.saturating_mul(1024 * 1024);
    for image in images {
        if !image.content_type.starts_with("image/") {
            return Err(UploadError::InvalidType {
                file_name: image.file_name.clone(),
            });
        }
        if image.size > max_bytes {
            return Err(UploadError::TooLarge {
                file_name: image.file_name.clone(),
                limit_mb: max_image_mb,
            });
        }
    }
    Ok(())
}

/// The `language` field wins; without it the first supported language in
/// `Accept-Language` is used, then English.
pub fn resolve_language(
    field: Option<&str>,
    accept_language: Option<&str>,
) -> Result<Language, UploadError> {
    match field.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => Language::from_tag(value)
            .ok_or_else(|| UploadError::UnsupportedLanguage(value.to_string())),
        None => Ok(accept_language
            .and_then(Language::from_accept_language)
            .unwrap_or_default()),
    }
}

// Leading integer, like a browser's parseInt; missing, unparseable or zero
// counts as one image.
fn parse_image_count(value: Option<&str>) -> i64 {
    value
        .and_then(parse_leading_int)
        .filter(|n| *n != 0)
        .unwrap_or(1)
}

fn parse_leading_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(sign * magnitude)
}

async fn read_image(field: &mut Field) -> Result<UploadedImage, UploadError> {
    let file_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .unwrap_or_default()
        .to_string();
    let content_type = field
        .content_type()
        .map(|mime| mime.to_string())
        .unwrap_or_default();

    let mut size = 0;
    while let Some(chunk) = field.try_next().await? {
        size += chunk.len();
    }

    Ok(UploadedImage {
        file_name,
        content_type,
        size,
    })
}

async fn read_text(field: &mut Field) -> Result<String, UploadError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        let room = MAX_TEXT_FIELD_BYTES.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn drain(field: &mut Field) -> Result<(), UploadError> {
    while field.try_next().await?.is_some() {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, content_type: &str, size: usize) -> UploadedImage {
        UploadedImage {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            size,
        }
    }

    fn form(indexed: &[(usize, &str)], legacy: Option<&str>, count: Option<&str>) -> DetectForm {
        DetectForm {
            indexed: indexed
                .iter()
                .map(|(i, name)| (*i, image(name, "image/jpeg", 10)))
                .collect(),
            legacy: legacy.map(|name| image(name, "image/png", 10)),
            language: None,
            image_count: count.map(str::to_string),
        }
    }

    fn names(images: &[UploadedImage]) -> Vec<&str> {
        images.iter().map(|i| i.file_name.as_str()).collect()
    }

    fn indexed_as(name: &str) -> Option<usize> {
        match FieldKind::from_name(name) {
            FieldKind::Indexed(index) => Some(index),
            _ => None,
        }
    }

    #[test]
    fn only_canonical_image_indices_are_collected() {
        assert_eq!(indexed_as("image_0"), Some(0));
        assert_eq!(indexed_as("image_12"), Some(12));
        assert_eq!(indexed_as("image_01"), None);
        assert_eq!(indexed_as("image_+1"), None);
        assert_eq!(indexed_as("image_"), None);
        assert_eq!(indexed_as("image_1a"), None);
        assert!(matches!(FieldKind::from_name("image"), FieldKind::Legacy));
    }

    #[test]
    fn huge_limit_saturates_instead_of_overflowing() {
        let images = vec![image("a.jpg", "image/jpeg", 1)];
        assert!(validate_images(&images, usize::MAX).is_ok());
    }

    #[test]
    fn image_count_limits_selection() {
        let images = form(&[(0, "a"), (1, "b"), (2, "c")], None, Some("2")).into_images();
        assert_eq!(names(&images), vec!["a", "b"]);
    }

    #[test]
    fn missing_indices_are_skipped() {
        let images = form(&[(0, "a"), (2, "c")], None, Some("3")).into_images();
        assert_eq!(names(&images), vec!["a", "c"]);
    }

    #[test]
    fn missing_count_means_one_image() {
        let images = form(&[(0, "a"), (1, "b")], None, None).into_images();
        assert_eq!(names(&images), vec!["a"]);
        let images = form(&[(0, "a"), (1, "b")], None, Some("zero")).into_images();
        assert_eq!(names(&images), vec!["a"]);
        let images = form(&[(0, "a"), (1, "b")], None, Some("0")).into_images();
        assert_eq!(names(&images), vec!["a"]);
    }

    #[test]
    fn legacy_field_is_only_a_fallback() {
        let images = form(&[(0, "a")], Some("legacy"), Some("1")).into_images();
        assert_eq!(names(&images), vec!["a"]);
        let images = form(&[], Some("legacy"), Some("4")).into_images();
        assert_eq!(names(&images), vec!["legacy"]);
        let images = form(&[(0, "a")], Some("legacy"), Some("-3")).into_images();
        assert_eq!(names(&images), vec!["legacy"]);
    }

    #[test]
    fn leading_integers_parse_like_parse_int() {
        assert_eq!(parse_leading_int("3"), Some(3));
        assert_eq!(parse_leading_int("  12abc"), Some(12));
        assert_eq!(parse_leading_int("-2"), Some(-2));
        assert_eq!(parse_leading_int("+7"), Some(7));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let err = validate_images(&[], 10).unwrap_err();
        assert_eq!(err.to_string(), "No image files provided");
    }

    #[test]
    fn non_image_content_type_is_rejected() {
        let images = vec![image("a.jpg", "image/jpeg", 1), image("notes.txt", "text/plain", 1)];
        match validate_images(&images, 10) {
            Err(UploadError::InvalidType { file_name }) => assert_eq!(file_name, "notes.txt"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        let limit = 10 * 1024 * 1024;
        assert!(validate_images(&[image("a.jpg", "image/jpeg", limit)], 10).is_ok());
        let err = validate_images(&[image("a.jpg", "image/jpeg", limit + 1)], 10).unwrap_err();
        assert_eq!(err.to_string(), "File too large. Maximum size is 10MB per image.");
    }

    #[test]
    fn type_is_checked_before_size() {
        let images = vec![image("big.bin", "application/octet-stream", usize::MAX)];
        assert!(matches!(
            validate_images(&images, 10),
            Err(UploadError::InvalidType { .. })
        ));
    }

    #[test]
    fn language_field_takes_precedence() {
        assert_eq!(resolve_language(Some("hi"), Some("ne")).unwrap(), Language::Hi);
        assert_eq!(resolve_language(Some(" NE "), None).unwrap(), Language::Ne);
    }

    #[test]
    fn missing_language_uses_accept_language_then_english() {
        assert_eq!(resolve_language(None, Some("ne-NP,en;q=0.8")).unwrap(), Language::Ne);
        assert_eq!(resolve_language(Some(""), Some("fr")).unwrap(), Language::En);
        assert_eq!(resolve_language(None, None).unwrap(), Language::En);
    }

    #[test]
    fn unsupported_language_is_rejected() {
        assert!(matches!(
            resolve_language(Some("fr"), None),
            Err(UploadError::UnsupportedLanguage(code)) if code == "fr"
        ));
    }
}
