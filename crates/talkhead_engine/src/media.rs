use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use talkhead_core::MediaRef;
use talkhead_logging::talkhead_debug;

use crate::RenderError;

/// Turns a media reference into something the render service can fetch:
/// hosted URLs pass through, local files are inlined as `data:` URIs.
pub async fn resolve_media(what: &'static str, media: &MediaRef) -> Result<String, RenderError> {
    match media {
        MediaRef::Url(url) => Ok(url.clone()),
        MediaRef::File(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|err| RenderError::InvalidMedia {
                    what,
                    reason: format!("{}: {err}", path.display()),
                })?;
            if bytes.is_empty() {
                return Err(RenderError::InvalidMedia {
                    what,
                    reason: format!("{} is empty", path.display()),
                });
            }
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            talkhead_debug!(
                "inlining {} {:?} ({} bytes, {})",
                what,
                path,
                bytes.len(),
                mime.essence_str()
            );
            Ok(format!(
                "data:{};base64,{}",
                mime.essence_str(),
                STANDARD.encode(&bytes)
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn urls_pass_through() {
        let media = MediaRef::Url("https://cdn.example.com/face.png".to_string());
        assert_eq!(
            resolve_media("image", &media).await.unwrap(),
            "https://cdn.example.com/face.png"
        );
    }

    #[tokio::test]
    async fn files_become_data_uris() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("face.png");
        std::fs::write(&path, b"png!").unwrap();

        let uri = resolve_media("image", &MediaRef::File(path)).await.unwrap();
        assert_eq!(uri, "data:image/png;base64,cG5nIQ==");
    }

    #[tokio::test]
    async fn missing_file_is_invalid_media() {
        let media = MediaRef::File(PathBuf::from("/definitely/not/here.png"));
        let err = resolve_media("image", &media).await.unwrap_err();
        assert!(matches!(err, RenderError::InvalidMedia { what: "image", .. }));
    }
}
