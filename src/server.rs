//! HTTP surface: upload a report, get the analysis text and a link to the
//! rendered PDF.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::artifact::ArtifactStore;
use crate::error::Error;
use crate::fonts::Fonts;
use crate::gemini::ReportAnalyzer;
use crate::intake::PageRasterizer;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const DOWNLOAD_FILENAME: &str = "health_report.pdf";

const INDEX_HTML: &str = r#"<html>
    <head><title>Clinical Report Analyzer</title></head>
    <body>
        <h2>Clinical Report Analyzer is running</h2>
        <form action="/analyze" method="post" enctype="multipart/form-data">
            <input type="file" name="file" accept=".png,.jpg,.jpeg,.pdf">
            <button type="submit">Analyze</button>
        </form>
    </body>
</html>"#;

pub struct AppState {
    pub analyzer: Arc<dyn ReportAnalyzer>,
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub fonts: Arc<Fonts>,
    pub store: ArtifactStore,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    message: String,
    response_text: String,
    report_id: String,
    pdf_url: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Map a pipeline failure to the status returned to the client.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::InvalidImage(_) => StatusCode::BAD_REQUEST,
        Error::Analysis(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .route("/download/:id", get(download))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        .with_state(state)
}

fn too_large() -> Response {
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("File too large. Maximum {}MB.", MAX_UPLOAD_BYTES / (1024 * 1024)),
    )
}

/// Bodies cut off by the request limit surface as multipart errors carrying 413.
fn multipart_error(err: &MultipartError, message: &str) -> Response {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large()
    } else {
        error_response(StatusCode::BAD_REQUEST, message)
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn analyze(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                log::warn!("Malformed multipart body: {e}");
                return multipart_error(&e, "Malformed upload.");
            }
        };
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        match field.bytes().await {
            Ok(bytes) => upload = Some((filename, bytes.to_vec())),
            Err(e) => {
                log::warn!("Failed to read upload bytes: {e}");
                return multipart_error(&e, "Failed to read file data.");
            }
        }
    }

    let Some((filename, bytes)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "No file provided.");
    };
    if bytes.len() > MAX_UPLOAD_BYTES {
        return too_large();
    }

    let worker_state = state.clone();
    let worker_filename = filename.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        crate::analyze_upload(
            &worker_filename,
            &bytes,
            worker_state.analyzer.as_ref(),
            worker_state.rasterizer.as_ref(),
            &worker_state.fonts,
            &worker_state.store,
        )
    })
    .await;

    match outcome {
        Ok(Ok(outcome)) => {
            log::info!("Analyzed {filename} -> report {}", outcome.report_id);
            (
                StatusCode::OK,
                Json(AnalyzeResponse {
                    message: "Report analyzed and PDF generated.".into(),
                    pdf_url: format!("/download/{}", outcome.report_id),
                    report_id: outcome.report_id,
                    response_text: outcome.response_text,
                }),
            )
                .into_response()
        }
        Ok(Err(e)) => {
            let status = status_for(&e);
            if status.is_server_error() {
                log::error!("Analyzing {filename} failed: {e}");
            } else {
                log::warn!("Rejected {filename}: {e}");
            }
            error_response(status, e.to_string())
        }
        Err(e) => {
            log::error!("Analysis task for {filename} panicked: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error.")
        }
    }
}

async fn download(State(state): State<Arc<AppState>>, UrlPath(id): UrlPath<String>) -> Response {
    let Some(path) = state.store.resolve(&id) else {
        return error_response(StatusCode::NOT_FOUND, "Report not found.");
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{DOWNLOAD_FILENAME}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            log::error!("Failed to read {}: {e}", path.display());
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read report.")
        }
    }
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!(
        "Listening on http://{}, reports in {}",
        listener.local_addr()?,
        state.store.dir().display()
    );
    let app = router(Arc::new(state));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutting down");
        })
        .await?;
    Ok(())
}
