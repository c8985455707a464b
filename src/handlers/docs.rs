use crate::{
    auth::RequestIdentity,
    state::AppState,
    utils::{config::ServerConfig, ApiError},
};
use axum::{
    extract::State,
    response::{Html, Json},
    Extension,
};
use serde_json::{json, Value};
use tracing::debug;

/// Serve the documentation UI landing page.
///
/// The identity, when present, was attached by the authorization gate
/// upstream.
pub async fn index(
    State(state): State<AppState>,
    identity: Option<Extension<RequestIdentity>>,
) -> Html<String> {
    if let Some(Extension(identity)) = identity {
        debug!(name = %identity.name, role = %identity.role, "serving documentation UI");
    }

    Html(render_index(state.gate.uri_path()))
}

/// OpenAPI 3 document for the hosted API.
pub async fn openapi(State(state): State<AppState>) -> Json<Value> {
    Json(api_document(&state.config.server))
}

fn api_document(server: &ServerConfig) -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": env!("CARGO_PKG_NAME"),
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "servers": [
            {"url": format!("http://{}:{}", server.host, server.port)}
        ],
        "paths": {
            "/health": {
                "get": {
                    "summary": "Service health check",
                    "responses": {
                        "200": {
                            "description": "Service is healthy",
                            "content": {"application/json": {}},
                        }
                    }
                }
            }
        }
    })
}

/// JSON 404 for anything not routed.
pub async fn not_found() -> ApiError {
    ApiError::not_found_error("resource not found")
}

fn render_index(docs_path: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>API Documentation</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({{
      url: "{docs_path}/openapi.json",
      dom_id: "#swagger-ui",
    }});
  </script>
</body>
</html>
"##
    )
}
