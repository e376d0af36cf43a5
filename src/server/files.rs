//! Static file responses: files, index pages, directory listings.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{HeaderValue, Method, Response, StatusCode, Uri};
use http_body_util::Full;
use hyper::body::Bytes;
use log::debug;

const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

fn html_type() -> HeaderValue {
    HeaderValue::from_static("text/html; charset=utf-8")
}

/// Map a request path onto the served root.
///
/// Returns `None` for anything that would leave the root.
pub fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(request_path).ok()?;
    let mut resolved = root.to_path_buf();

    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') => return None,
            s => {
                // A drive prefix or root would replace the whole path on join
                if !matches!(Path::new(s).components().next(), Some(Component::Normal(_))) {
                    return None;
                }
                resolved.push(s);
            }
        }
    }

    Some(resolved)
}

/// Produce the response for one request against `root`.
pub async fn respond(root: &Path, method: &Method, uri: &Uri) -> Response<Full<Bytes>> {
    let head = match *method {
        Method::GET => false,
        Method::HEAD => true,
        _ => return error_page(StatusCode::NOT_IMPLEMENTED, "Unsupported method"),
    };

    let Some(path) = resolve(root, uri.path()) else {
        debug!("rejected path outside root: {}", uri.path());
        return error_page(StatusCode::NOT_FOUND, "File not found");
    };

    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta,
        Err(_) => return error_page(StatusCode::NOT_FOUND, "File not found"),
    };

    if !meta.is_dir() {
        return send_file(&path, head).await;
    }

    if !uri.path().ends_with('/') {
        let location = match uri.query() {
            Some(q) => format!("{}/?{}", uri.path(), q),
            None => format!("{}/", uri.path()),
        };
        return redirect(&location);
    }

    for index in INDEX_FILES {
        let candidate = path.join(index);
        if tokio::fs::metadata(&candidate)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return send_file(&candidate, head).await;
        }
    }

    match list_directory(&path, uri.path()).await {
        Ok(page) => html(StatusCode::OK, page, head),
        Err(_) => error_page(StatusCode::NOT_FOUND, "No permission to list directory"),
    }
}

async fn send_file(path: &Path, head: bool) -> Response<Full<Bytes>> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(_) => return error_page(StatusCode::NOT_FOUND, "File not found"),
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let len = data.len();
    let body = if head { Bytes::new() } else { Bytes::from(data) };

    let mut resp = Response::new(Full::new(body));
    resp.headers_mut().insert(CONTENT_TYPE, content_type);
    resp.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
    resp
}

async fn list_directory(dir: &Path, request_path: &str) -> std::io::Result<String> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        entries.push((name, is_dir));
    }
    entries.sort_by_key(|(name, _)| name.to_lowercase());

    let display = urlencoding::decode(request_path).unwrap_or(Cow::Borrowed(request_path));
    let title = format!("Directory listing for {}", escape_html(&display));

    let mut page = String::new();
    page.push_str("<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>{}</title>\n</head>\n<body>\n", title));
    page.push_str(&format!("<h1>{}</h1>\n<hr>\n<ul>\n", title));
    for (name, is_dir) in entries {
        let suffix = if is_dir { "/" } else { "" };
        page.push_str(&format!(
            "<li><a href=\"{}{}\">{}{}</a></li>\n",
            urlencoding::encode(&name),
            suffix,
            escape_html(&name),
            suffix
        ));
    }
    page.push_str("</ul>\n<hr>\n</body>\n</html>\n");

    Ok(page)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn html(status: StatusCode, page: String, head: bool) -> Response<Full<Bytes>> {
    let len = page.len();
    let body = if head { Bytes::new() } else { Bytes::from(page) };

    let mut resp = Response::new(Full::new(body));
    *resp.status_mut() = status;
    resp.headers_mut().insert(CONTENT_TYPE, html_type());
    resp.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
    resp
}

fn error_page(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let page = format!(
        "<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Error response</title>\n</head>\n<body>\n<h1>Error response</h1>\n\
         <p>Error code: {}</p>\n<p>Message: {}.</p>\n</body>\n</html>\n",
        status.as_u16(),
        escape_html(message)
    );
    html(status, page, false)
}

fn redirect(location: &str) -> Response<Full<Bytes>> {
    let Ok(value) = HeaderValue::from_str(location) else {
        return error_page(StatusCode::NOT_FOUND, "File not found");
    };

    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = StatusCode::MOVED_PERMANENTLY;
    resp.headers_mut().insert(LOCATION, value);
    resp.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(0usize));
    resp
}
