use std::path::{Component, Path, PathBuf};

use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use super::types::GatewayApiError;

/// Maps a request path below `/static` onto `root`, refusing anything that could leave it.
pub(super) fn resolve_static_path(root: &Path, requested: &str) -> Option<PathBuf> {
    if requested.contains('\\') || requested.contains('\0') {
        return None;
    }
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(segment) => {
                resolved.push(segment);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (depth > 0).then_some(resolved)
}

pub(super) fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" | "md" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

pub(super) async fn serve_static_file(root: &Path, requested: &str) -> Response {
    let Some(path) = resolve_static_path(root, requested) else {
        return GatewayApiError::not_found(format!("static asset '{requested}' not found"))
            .into_response();
    };
    match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => {}
        _ => {
            return GatewayApiError::not_found(format!("static asset '{requested}' not found"))
                .into_response();
        }
    }
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(CONTENT_TYPE, guess_content_type(&path))], bytes).into_response(),
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "failed to read static asset");
            GatewayApiError::internal("failed to read static asset").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{guess_content_type, resolve_static_path};

    #[test]
    fn unit_resolve_static_path_stays_under_root() {
        let root = Path::new("/srv/static");
        assert_eq!(
            resolve_static_path(root, "css/site.css"),
            Some(root.join("css").join("site.css"))
        );
        assert_eq!(
            resolve_static_path(root, "./index.html"),
            Some(root.join("index.html"))
        );
    }

    #[test]
    fn regression_traversal_and_absolute_paths_are_refused() {
        let root = Path::new("/srv/static");
        assert_eq!(resolve_static_path(root, "../secret.txt"), None);
        assert_eq!(resolve_static_path(root, "css/../../secret.txt"), None);
        assert_eq!(resolve_static_path(root, "/etc/passwd"), None);
        assert_eq!(resolve_static_path(root, "..\\secret.txt"), None);
        assert_eq!(resolve_static_path(root, ""), None);
    }

    #[test]
    fn unit_content_type_is_guessed_from_extension() {
        assert_eq!(
            guess_content_type(Path::new("a/index.HTML")),
            "text/html; charset=utf-8"
        );
        assert_eq!(guess_content_type(Path::new("logo.png")), "image/png");
        assert_eq!(
            guess_content_type(Path::new("archive.bin")),
            "application/octet-stream"
        );
    }
}
