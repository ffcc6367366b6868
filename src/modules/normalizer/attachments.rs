// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use super::draft::DraftAttachment;
use super::raw::RawAttachment;
use rand::Rng;

/// A MIME part is an attachment if any of: explicit `attachment` disposition, explicit
/// `inline` disposition, a Content-ID is present, or it's an `image/*` part with no explicit
/// `attachment` disposition (inline images that never set a disposition at all).
pub fn is_attachment_part(content_type: &str, disposition: Option<&str>, content_id: Option<&str>) -> bool {
    let disposition_lower = disposition.map(str::to_ascii_lowercase);
    match disposition_lower.as_deref() {
        Some("attachment") => true,
        Some("inline") => true,
        _ => content_id.is_some() || content_type.starts_with("image/"),
    }
}

pub fn normalize_attachment(raw: &RawAttachment) -> DraftAttachment {
    let content_id = raw.content_id.clone();
    let filename = raw.filename.clone().unwrap_or_else(|| {
        synthesize_filename(content_id.as_deref(), &raw.content_type)
    });
    DraftAttachment {
        filename,
        content_type: raw.content_type.clone(),
        content_id,
        size: raw.content.len() as i64,
        content: raw.content.clone(),
    }
}

/// Synthetic filename for a nameless inline part: built from the Content-ID if present,
/// otherwise a short random suffix, with an extension chosen from the MIME-type table.
fn synthesize_filename(content_id: Option<&str>, content_type: &str) -> String {
    let stem = match content_id {
        Some(cid) if !cid.is_empty() => sanitize_stem(cid),
        _ => format!("{:08x}", rand::rng().random::<u32>()),
    };
    let ext = extension_for(content_type);
    format!("{stem}{ext}")
}

fn sanitize_stem(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('<').trim_end_matches('>');
    let cleaned: String = trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}

/// MIME-type → extension table. Falls back to `mime_guess`, then a bare `.bin`.
fn extension_for(content_type: &str) -> String {
    let known: &[(&str, &str)] = &[
        ("image/jpeg", ".jpg"),
        ("image/png", ".png"),
        ("image/gif", ".gif"),
        ("image/bmp", ".bmp"),
        ("image/webp", ".webp"),
        ("image/svg+xml", ".svg"),
        ("text/plain", ".txt"),
        ("text/html", ".html"),
        ("application/pdf", ".pdf"),
    ];
    let normalized = content_type.split(';').next().unwrap_or(content_type).trim();
    if let Some((_, ext)) = known.iter().find(|(ty, _)| ty.eq_ignore_ascii_case(normalized)) {
        return (*ext).to_string();
    }
    mime_guess::get_mime_extensions_str(normalized)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_disposition_is_always_an_attachment() {
        assert!(is_attachment_part("application/pdf", Some("attachment"), None));
    }

    #[test]
    fn content_id_alone_makes_it_an_attachment() {
        assert!(is_attachment_part("application/octet-stream", None, Some("abc")));
    }

    #[test]
    fn bare_image_without_disposition_is_an_attachment() {
        assert!(is_attachment_part("image/png", None, None));
    }

    #[test]
    fn plain_text_body_part_is_not_an_attachment() {
        assert!(!is_attachment_part("text/plain", None, None));
    }

    #[test]
    fn synthesizes_filename_from_content_id() {
        let raw = RawAttachment {
            filename: None,
            content_type: "image/png".into(),
            content_id: Some("<logo123>".into()),
            disposition: Some("inline".into()),
            content: vec![1, 2, 3],
        };
        let draft = normalize_attachment(&raw);
        assert_eq!(draft.filename, "logo123.png");
        assert_eq!(draft.content_id.as_deref(), Some("<logo123>"));
    }

    #[test]
    fn keeps_provided_filename() {
        let raw = RawAttachment {
            filename: Some("report.pdf".into()),
            content_type: "application/pdf".into(),
            content_id: None,
            disposition: Some("attachment".into()),
            content: vec![1],
        };
        assert_eq!(normalize_attachment(&raw).filename, "report.pdf");
    }
}
