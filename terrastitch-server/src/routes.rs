//! HTTP request handling for the tile service.
//!
//! Routes, the request-validation policy (including the maximum-zoom size
//! restriction), and the readiness/liveness probes. All tile math lives in
//! the library; this layer only parses untrusted input and maps errors to
//! status codes.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use terrastitch::service::TileService;
use terrastitch::tile::{OutputSize, TileCoord, TileVersion, TilesetKind};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Highest zoom level present in the backing tileset.
const MAX_ZOOM: u8 = 15;

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TileService>,
    /// Readiness flag: flipped off when shutdown begins so load balancers
    /// stop routing new traffic here.
    pub ready: Arc<AtomicBool>,
    /// Cancelled when shutdown begins; every in-flight render holds a
    /// child of this token.
    pub shutdown: CancellationToken,
    /// Version used for the liveness probe's backend fetch.
    pub health_version: TileVersion,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(ready_handler))
        .route("/live", get(live_handler))
        .route(
            "/tilezen/terrain/:version/:tilesize/:tileset/:z/:x/:y",
            get(sized_tile_handler),
        )
        .route(
            "/tilezen/terrain/:version/:tileset/:z/:x/:y",
            get(unsized_tile_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Applies the output-size policy for a requested zoom.
///
/// Zoom levels beyond the backing tileset don't exist, and at the maximum
/// zoom the zoom-in plans (512/516) would need children one level deeper
/// than the pyramid goes, while the borderless 256 is already served
/// directly; only 260 is legal there.
fn resolve_output_size(zoom: u8, pixels: u32) -> Result<OutputSize, &'static str> {
    if zoom > MAX_ZOOM {
        return Err("Invalid zoom");
    }
    let size = OutputSize::from_pixels(pixels).ok_or("Invalid tilesize")?;
    if zoom == MAX_ZOOM && size != OutputSize::S260 {
        return Err("Invalid zoom");
    }
    Ok(size)
}

fn not_found(message: &'static str) -> Response {
    (StatusCode::NOT_FOUND, message).into_response()
}

async fn sized_tile_handler(
    State(state): State<AppState>,
    Path((version, tilesize, tileset, z, x, y)): Path<(
        String,
        String,
        String,
        String,
        String,
        String,
    )>,
) -> Response {
    handle_tile(state, version, Some(tilesize), tileset, z, x, y).await
}

async fn unsized_tile_handler(
    State(state): State<AppState>,
    Path((version, tileset, z, x, y)): Path<(String, String, String, String, String)>,
) -> Response {
    handle_tile(state, version, None, tileset, z, x, y).await
}

async fn handle_tile(
    state: AppState,
    version: String,
    tilesize: Option<String>,
    tileset: String,
    z: String,
    x: String,
    y: String,
) -> Response {
    let pixels = match tilesize {
        None => 256,
        Some(raw) => match raw.parse::<u32>() {
            Ok(parsed) => parsed,
            Err(_) => return not_found("Invalid tilesize"),
        },
    };

    let tileset: TilesetKind = match tileset.parse() {
        Ok(parsed) => parsed,
        Err(_) => return not_found("Invalid tileset"),
    };

    let version = match TileVersion::parse(&version) {
        Ok(parsed) => parsed,
        Err(_) => return not_found("Invalid version"),
    };

    // The final segment carries a wire-format extension: "10.png". The
    // extension must be present but its value is ignored; the response is
    // always PNG.
    let Some((y, extension)) = y.split_once('.') else {
        return not_found("Invalid tile coordinate");
    };
    if extension.is_empty() {
        return not_found("Invalid tile coordinate");
    }

    let tile = match TileCoord::parse(&z, &x, y) {
        Ok(parsed) => parsed,
        Err(_) => return not_found("Invalid tile coordinate"),
    };

    let size = match resolve_output_size(tile.zoom, pixels) {
        Ok(resolved) => resolved,
        Err(message) => return not_found(message),
    };

    info!(tile = %tile, size = %size, tileset = %tileset, "requested tile");

    let cancel = state.shutdown.child_token();
    match state
        .service
        .render_tile(size, tileset, &version, tile, cancel)
        .await
    {
        Ok(png) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/png")],
            Body::from(png),
        )
            .into_response(),
        Err(error) => {
            warn!(tile = %tile, error = %error, "tile render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error fetching tile").into_response()
        }
    }
}

/// Readiness probe; fails once graceful shutdown has begun.
async fn ready_handler(State(state): State<AppState>) -> Response {
    if state.ready.load(Ordering::SeqCst) {
        StatusCode::OK.into_response()
    } else {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// Liveness probe: verifies the backend by fetching the root tile.
async fn live_handler(State(state): State<AppState>) -> Response {
    match state.service.health_check(&state.health_version).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => {
            warn!(error = %error, "health check failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::Request;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::AtomicUsize;
    use terrastitch::fetch::{FetchError, TileFetcher};
    use tower::ServiceExt;

    /// Counts fetches and serves a solid source tile.
    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TileFetcher for CountingFetcher {
        async fn fetch_tile(
            &self,
            _tile: TileCoord,
            _tileset: TilesetKind,
            _version: &TileVersion,
        ) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let image = RgbaImage::from_pixel(256, 256, Rgba([1, 2, 3, 255]));
            Ok(terrastitch::compose::encode_png(&image).unwrap())
        }
    }

    fn test_app() -> (Router, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Arc::new(CountingFetcher {
            calls: calls.clone(),
        });
        let state = AppState {
            service: Arc::new(TileService::new(fetcher)),
            ready: Arc::new(AtomicBool::new(true)),
            shutdown: CancellationToken::new(),
            health_version: TileVersion::parse("v1").unwrap(),
        };
        (router(state), calls)
    }

    async fn send(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[test]
    fn test_size_policy_inside_pyramid() {
        for pixels in [256u32, 260, 512, 516] {
            assert!(resolve_output_size(5, pixels).is_ok());
        }
        assert!(resolve_output_size(5, 300).is_err());
    }

    #[test]
    fn test_size_policy_at_max_zoom_only_260() {
        assert!(resolve_output_size(MAX_ZOOM, 260).is_ok());
        for pixels in [256u32, 512, 516] {
            assert!(resolve_output_size(MAX_ZOOM, pixels).is_err());
        }
        assert!(resolve_output_size(MAX_ZOOM + 1, 260).is_err());
    }

    #[tokio::test]
    async fn test_tile_route_serves_png() {
        let (app, calls) = test_app();
        let (status, body) =
            send(app, "/tilezen/terrain/v1/256/terrarium/5/10/10.png").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let image = image::load_from_memory(&body).unwrap();
        assert_eq!((image.width(), image.height()), (256, 256));
    }

    #[tokio::test]
    async fn test_unsized_route_defaults_to_256() {
        let (app, calls) = test_app();
        let (status, body) = send(app, "/tilezen/terrain/v1/normal/5/10/10.png").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let image = image::load_from_memory(&body).unwrap();
        assert_eq!(image.width(), 256);
    }

    #[tokio::test]
    async fn test_max_zoom_512_rejected_before_any_fetch() {
        let (app, calls) = test_app();
        let (status, body) =
            send(app, "/tilezen/terrain/v1/512/terrarium/15/100/50.png").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, b"Invalid zoom");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_inputs_are_404() {
        let cases = [
            ("/tilezen/terrain/v1/300/terrarium/5/10/10.png", "Invalid tilesize"),
            ("/tilezen/terrain/v1/256/watercolor/5/10/10.png", "Invalid tileset"),
            ("/tilezen/terrain/vx/256/terrarium/5/10/10.png", "Invalid version"),
            ("/tilezen/terrain/v1/256/terrarium/5/10/99.png", "Invalid tile coordinate"),
            ("/tilezen/terrain/v1/256/terrarium/a/10/10.png", "Invalid tile coordinate"),
            ("/tilezen/terrain/v1/256/terrarium/5/10/10.", "Invalid tile coordinate"),
            ("/tilezen/terrain/v1/256/terrarium/5/10/10", "Invalid tile coordinate"),
            ("/tilezen/terrain/v1/256/terrarium/16/10/10.png", "Invalid zoom"),
        ];
        for (uri, expected) in cases {
            let (app, calls) = test_app();
            let (status, body) = send(app, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "uri {}", uri);
            assert_eq!(body, expected.as_bytes(), "uri {}", uri);
            assert_eq!(calls.load(Ordering::SeqCst), 0, "uri {}", uri);
        }
    }

    #[tokio::test]
    async fn test_huge_zoom_is_a_client_error_not_a_crash() {
        // Zoom values past the addressable pyramid must come back as a
        // plain 404, and nothing may be fetched.
        for uri in [
            "/tilezen/terrain/v1/256/terrarium/70/0/0.png",
            "/tilezen/terrain/v1/256/terrarium/255/0/0.png",
        ] {
            let (app, calls) = test_app();
            let (status, body) = send(app, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "uri {}", uri);
            assert_eq!(body, b"Invalid tile coordinate", "uri {}", uri);
            assert_eq!(calls.load(Ordering::SeqCst), 0, "uri {}", uri);
        }
    }

    #[tokio::test]
    async fn test_extension_is_ignored_and_response_is_png() {
        let (app, calls) = test_app();
        let (status, body) = send(app, "/tilezen/terrain/v1/256/terrarium/5/10/10.jpg").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(body.starts_with(b"\x89PNG"));
    }

    #[tokio::test]
    async fn test_ready_flips_with_flag() {
        let (app, _) = test_app();
        let (status, _) = send(app.clone(), "/ready").await;
        assert_eq!(status, StatusCode::OK);

        let calls = Arc::new(AtomicUsize::new(0));
        let state = AppState {
            service: Arc::new(TileService::new(Arc::new(CountingFetcher {
                calls: calls.clone(),
            }))),
            ready: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
            health_version: TileVersion::parse("v1").unwrap(),
        };
        let (status, _) = send(router(state), "/ready").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_live_fetches_root_tile() {
        let (app, calls) = test_app();
        let (status, _) = send(app, "/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
