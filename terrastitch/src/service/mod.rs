//! Tile rendering service
//!
//! [`TileService`] is the request-facing facade: plan, fetch concurrently,
//! composite, encode. It owns the fan-out/fan-in fetch orchestration with
//! first-error cancellation; everything else is delegated to the pure
//! modules.

mod error;

pub use error::TileServiceError;

use crate::compose::{composite, decode_source_tile, encode_png, Fragment};
use crate::fetch::TileFetcher;
use crate::plan::{plan_instructions, Instruction};
use crate::tile::{OutputSize, TileCoord, TileVersion, TilesetKind};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Renders composited output tiles from a backing tile store.
///
/// Stateless across requests: each render owns its own instruction list,
/// fragment set, and canvas. The only shared resource is the fetch
/// backend's connection pool, which is safe for concurrent use.
pub struct TileService {
    fetcher: Arc<dyn TileFetcher>,
}

impl TileService {
    pub fn new(fetcher: Arc<dyn TileFetcher>) -> Self {
        Self { fetcher }
    }

    /// Renders one output tile and returns its PNG bytes.
    ///
    /// Plans the source fetches for `(tile, size)`, executes them
    /// concurrently, composites the fragments, and encodes the canvas.
    /// Fails with the first fetch or decode error encountered; no partial
    /// image is ever produced.
    ///
    /// `cancel` composes the caller's cancellation (client disconnect,
    /// shutdown) into the fetch batch; dropping the returned future also
    /// aborts all in-flight fetches.
    pub async fn render_tile(
        &self,
        size: OutputSize,
        tileset: TilesetKind,
        version: &TileVersion,
        tile: TileCoord,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, TileServiceError> {
        let instructions = plan_instructions(tile, size);
        debug!(
            tile = %tile,
            size = %size,
            tileset = %tileset,
            fetches = instructions.len(),
            "planned output tile"
        );
        for instruction in &instructions {
            trace!(source = %instruction.tile, "will fetch");
        }

        let fragments = self
            .fetch_fragments(instructions, tileset, version, &cancel)
            .await?;

        let canvas = composite(size.pixels(), &fragments);
        Ok(encode_png(&canvas)?)
    }

    /// Executes the fetch instructions concurrently and decodes each
    /// response.
    ///
    /// One task per instruction (at most 16), all sharing one cancellation
    /// signal. The first fetch or decode failure cancels the signal so
    /// in-flight requests abort early; every started task is joined before
    /// returning, then the first error observed is surfaced. On success the
    /// fragment count equals the instruction count, each fragment tagged
    /// with the spec it satisfies; completion order is irrelevant.
    async fn fetch_fragments(
        &self,
        instructions: Vec<Instruction>,
        tileset: TilesetKind,
        version: &TileVersion,
        cancel: &CancellationToken,
    ) -> Result<Vec<Fragment>, TileServiceError> {
        let batch_cancel = cancel.child_token();
        let mut tasks = JoinSet::new();

        for instruction in &instructions {
            let fetcher = Arc::clone(&self.fetcher);
            let version = version.clone();
            let token = batch_cancel.clone();
            let instruction = *instruction;

            tasks.spawn(async move {
                // Check for cancellation before starting
                if token.is_cancelled() {
                    return Err(TileServiceError::Cancelled);
                }

                let bytes = tokio::select! {
                    _ = token.cancelled() => return Err(TileServiceError::Cancelled),
                    fetched = fetcher.fetch_tile(instruction.tile, tileset, &version) => {
                        fetched.map_err(|source| TileServiceError::Fetch {
                            tile: instruction.tile,
                            source,
                        })?
                    }
                };

                let image =
                    decode_source_tile(&bytes).map_err(|source| TileServiceError::Decode {
                        tile: instruction.tile,
                        source,
                    })?;

                Ok(Fragment {
                    image,
                    spec: instruction.spec,
                })
            });
        }

        let mut fragments = Vec::with_capacity(instructions.len());
        let mut first_error: Option<TileServiceError> = None;

        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(join_error) => Err(TileServiceError::TaskJoin(join_error.to_string())),
            };

            match result {
                Ok(fragment) => fragments.push(fragment),
                Err(error) => {
                    batch_cancel.cancel();
                    // A real failure outranks the cancellations it caused.
                    match &first_error {
                        None => first_error = Some(error),
                        Some(existing) if existing.is_cancelled() && !error.is_cancelled() => {
                            first_error = Some(error)
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        Ok(fragments)
    }

    /// Liveness check: fetches the root terrarium tile through the backend.
    pub async fn health_check(&self, version: &TileVersion) -> Result<(), TileServiceError> {
        let root = TileCoord::new(0, 0, 0);
        self.fetcher
            .fetch_tile(root, TilesetKind::Terrarium, version)
            .await
            .map_err(|source| TileServiceError::Fetch { tile: root, source })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::encode_png;
    use crate::fetch::FetchError;
    use crate::tile::SOURCE_TILE_SIZE;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn source_tile_png(pixel: Rgba<u8>) -> Vec<u8> {
        let image = RgbaImage::from_pixel(SOURCE_TILE_SIZE, SOURCE_TILE_SIZE, pixel);
        encode_png(&image).unwrap()
    }

    fn version() -> TileVersion {
        TileVersion::parse("v1").unwrap()
    }

    /// Fetcher that records requested tiles and fails the ones in
    /// `fail_tiles`.
    struct MockFetcher {
        payload: Vec<u8>,
        fail_tiles: Vec<TileCoord>,
        requested: Mutex<Vec<TileCoord>>,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn serving(payload: Vec<u8>) -> Self {
            Self {
                payload,
                fail_tiles: Vec::new(),
                requested: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_on(mut self, tile: TileCoord) -> Self {
            self.fail_tiles.push(tile);
            self
        }
    }

    #[async_trait]
    impl TileFetcher for MockFetcher {
        async fn fetch_tile(
            &self,
            tile: TileCoord,
            _tileset: TilesetKind,
            _version: &TileVersion,
        ) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(tile);
            if self.fail_tiles.contains(&tile) {
                return Err(FetchError::Status {
                    status: 404,
                    url: format!("mock://{}", tile),
                });
            }
            Ok(self.payload.clone())
        }
    }

    #[tokio::test]
    async fn test_render_256_passes_source_through() {
        let pixel = Rgba([12, 34, 56, 255]);
        let fetcher = Arc::new(MockFetcher::serving(source_tile_png(pixel)));
        let service = TileService::new(fetcher.clone());

        let tile = TileCoord::new(5, 10, 10);
        let png = service
            .render_tile(
                OutputSize::S256,
                TilesetKind::Terrarium,
                &version(),
                tile,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        // Exactly one fetch, for the tile itself
        assert_eq!(*fetcher.requested.lock().unwrap(), vec![tile]);

        // Output content equals the decoded source tile unchanged
        let output = decode_source_tile(&png).unwrap();
        assert_eq!(output.dimensions(), (256, 256));
        assert!(output.pixels().all(|p| *p == pixel));
    }

    #[tokio::test]
    async fn test_render_260_fetches_nine_neighbors() {
        let fetcher = Arc::new(MockFetcher::serving(source_tile_png(Rgba([1, 2, 3, 255]))));
        let service = TileService::new(fetcher.clone());

        let png = service
            .render_tile(
                OutputSize::S260,
                TilesetKind::Normal,
                &version(),
                TileCoord::new(5, 10, 10),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 9);

        let image = image::load_from_memory(&png).unwrap();
        assert_eq!(image.width(), 260);
        assert_eq!(image.height(), 260);
    }

    #[tokio::test]
    async fn test_fragment_count_matches_instructions() {
        let fetcher = Arc::new(MockFetcher::serving(source_tile_png(Rgba([9, 9, 9, 255]))));
        let service = TileService::new(fetcher);

        let instructions =
            plan_instructions(TileCoord::new(4, 3, 3), OutputSize::S516);
        let count = instructions.len();
        let fragments = service
            .fetch_fragments(
                instructions.clone(),
                TilesetKind::Terrarium,
                &version(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(fragments.len(), count);

        // Every fragment maps back to exactly one instruction's spec
        let mut specs: Vec<_> = instructions.iter().map(|i| i.spec).collect();
        for fragment in &fragments {
            let position = specs
                .iter()
                .position(|spec| *spec == fragment.spec)
                .expect("fragment spec not found among instructions");
            specs.remove(position);
        }
        assert!(specs.is_empty());
    }

    #[tokio::test]
    async fn test_single_fetch_failure_fails_the_batch() {
        let failing = TileCoord::new(6, 21, 20);
        let fetcher = Arc::new(
            MockFetcher::serving(source_tile_png(Rgba([0, 0, 0, 255]))).failing_on(failing),
        );
        let service = TileService::new(fetcher);

        let result = service
            .render_tile(
                OutputSize::S512,
                TilesetKind::Terrarium,
                &version(),
                TileCoord::new(5, 10, 10),
                CancellationToken::new(),
            )
            .await;

        match result {
            Err(TileServiceError::Fetch { tile, .. }) => assert_eq!(tile, failing),
            other => panic!("expected fetch error, got {:?}", other.map(|_| "png bytes")),
        }
    }

    #[tokio::test]
    async fn test_undecodable_payload_fails_the_batch() {
        let fetcher = Arc::new(MockFetcher::serving(vec![0xba, 0xad, 0xf0, 0x0d]));
        let service = TileService::new(fetcher);

        let result = service
            .render_tile(
                OutputSize::S256,
                TilesetKind::Terrarium,
                &version(),
                TileCoord::new(1, 0, 0),
                CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(TileServiceError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_pre_cancelled_request_fetches_nothing_useful() {
        let fetcher = Arc::new(MockFetcher::serving(source_tile_png(Rgba([5, 5, 5, 255]))));
        let service = TileService::new(fetcher);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = service
            .render_tile(
                OutputSize::S260,
                TilesetKind::Terrarium,
                &version(),
                TileCoord::new(5, 10, 10),
                cancel,
            )
            .await;

        assert!(matches!(result, Err(TileServiceError::Cancelled)));
    }

    #[tokio::test]
    async fn test_health_check_fetches_root_tile() {
        let fetcher = Arc::new(MockFetcher::serving(source_tile_png(Rgba([1, 1, 1, 255]))));
        let service = TileService::new(fetcher.clone());

        service.health_check(&version()).await.unwrap();
        assert_eq!(
            *fetcher.requested.lock().unwrap(),
            vec![TileCoord::new(0, 0, 0)]
        );
    }

    #[tokio::test]
    async fn test_health_check_surfaces_backend_failure() {
        let fetcher = Arc::new(
            MockFetcher::serving(Vec::new()).failing_on(TileCoord::new(0, 0, 0)),
        );
        let service = TileService::new(fetcher);

        assert!(service.health_check(&version()).await.is_err());
    }
}
