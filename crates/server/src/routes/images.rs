use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use deployment::Deployment;

use crate::{DeploymentImpl, error::ApiError};

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/images/{file_name}", get(serve_image))
}

/// GET /images/{file_name}
async fn serve_image(
    State(deployment): State<DeploymentImpl>,
    Path(file_name): Path<String>,
) -> Result<Response, ApiError> {
    let (bytes, format) = deployment.image().read_local(&file_name).await?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.mime_type())),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=86400"),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn test_missing_and_traversal_paths_are_not_found() {
        let app = TestApp::new().await;
        assert_eq!(
            app.raw_get("/api/images/nothing-here.png").await.0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            app.raw_get("/api/images/..%2Fdb.sqlite").await.0,
            StatusCode::NOT_FOUND
        );
    }
}
