use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use mime_guess::from_path;
use rust_embed::RustEmbed;
use tower_http::services::ServeDir;

#[derive(RustEmbed)]
#[folder = "assets"]
pub struct Assets;

/// Router for `/assets/*`, from `static_dir` when given, else from the embedded copy
pub fn assets_router(static_dir: Option<&str>) -> Router {
    match static_dir {
        Some(dir) => Router::new().nest_service("/assets", ServeDir::new(dir)),
        None => Router::new().route("/assets/{*path}", get(serve_embedded)),
    }
}

async fn serve_embedded(Path(path): Path<String>) -> Response {
    match Assets::get(&path) {
        Some(content) => {
            let mime = from_path(&path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}
