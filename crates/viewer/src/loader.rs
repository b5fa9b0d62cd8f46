//! Asset fetching and decoding off the frame loop.
//!
//! Requests are executed either inline (headless use) or on a tokio blocking
//! pool. Either way completions come back through a channel that the viewer
//! drains once per frame, so the scene is only ever mutated from the frame
//! loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{AssetKind, ViewerError, ViewerResult};
use crate::skeleton::{self, Reconstruction};
use crate::surface::{self, GeometryDecoder, MeshFormat, PrepareOptions, PreparedSurface, QualityTier};

/// Where asset bytes come from
pub trait AssetSource: Send + Sync {
    fn fetch(&self, asset: &str) -> Result<Vec<u8>, String>;
}

/// Reads assets from the local file system, relative paths resolved against `root`
#[derive(Clone, Debug, Default)]
pub struct FileSource {
    root: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }
}

impl AssetSource for FileSource {
    fn fetch(&self, asset: &str) -> Result<Vec<u8>, String> {
        let path = PathBuf::from(asset);
        let path = match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        };
        std::fs::read(&path).map_err(|e| format!("{}: {e}", path.display()))
    }
}

/// In-memory assets keyed by reference
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    assets: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.assets.insert(asset.into(), bytes.into());
    }

    pub fn with(mut self, asset: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(asset, bytes);
        self
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, asset: &str) -> Result<Vec<u8>, String> {
        self.assets
            .get(asset)
            .cloned()
            .ok_or_else(|| format!("asset not found: {asset}"))
    }
}

/// Shared flag flipped once when the owning viewer is torn down
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Identifies one request; `seq` increases per asset kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    pub kind: AssetKind,
    pub seq: u64,
}

#[derive(Clone, Debug)]
pub enum LoadRequest {
    Skeleton {
        asset: String,
    },
    Mesh {
        compressed: Option<String>,
        uncompressed: Option<String>,
        options: PrepareOptions,
    },
}

#[derive(Debug)]
pub enum LoadedAsset {
    Skeleton {
        asset: String,
        reconstruction: Reconstruction,
    },
    Mesh {
        asset: String,
        surface: PreparedSurface,
    },
}

#[derive(Debug)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub result: ViewerResult<LoadedAsset>,
}

/// Fetch and reconstruct a skeleton
pub fn load_skeleton(source: &dyn AssetSource, asset: &str) -> ViewerResult<Reconstruction> {
    let bytes = source
        .fetch(asset)
        .map_err(|e| ViewerError::fetch_failed(AssetKind::Skeleton, asset, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let parsed = skeleton::parse_swc(&text);
    let recon = skeleton::reconstruct(&parsed);

    if recon.primitive_count() == 0 {
        return Err(ViewerError::EmptyGeometry {
            kind: AssetKind::Skeleton,
            asset: asset.to_string(),
        });
    }
    info!(
        "Loaded skeleton {asset}: {} records, {} connectors",
        parsed.len(),
        recon.edges.len()
    );
    Ok(recon)
}

fn load_compressed(
    source: &dyn AssetSource,
    decoder: &dyn GeometryDecoder,
    asset: &str,
    options: &PrepareOptions,
) -> ViewerResult<PreparedSurface> {
    let bytes = source.fetch(asset).map_err(|details| ViewerError::DecodeFailed {
        asset: asset.to_string(),
        details,
    })?;
    let raw = decoder.decode(&bytes).map_err(|details| ViewerError::DecodeFailed {
        asset: asset.to_string(),
        details,
    })?;
    surface::prepare(raw, asset, options)
}

fn load_uncompressed(source: &dyn AssetSource, asset: &str, options: &PrepareOptions) -> ViewerResult<PreparedSurface> {
    let bytes = source
        .fetch(asset)
        .map_err(|e| ViewerError::fetch_failed(AssetKind::Mesh, asset, e))?;
    let format = MeshFormat::detect(asset).unwrap_or_else(|| {
        debug!("no format hint in {asset}, assuming OBJ");
        MeshFormat::Obj
    });
    let raw = surface::decode_uncompressed(format, asset, &bytes)
        .map_err(|e| ViewerError::fetch_failed(AssetKind::Mesh, asset, e.to_string()))?;
    surface::prepare(raw, asset, options)
}

/// Load the surface mesh.
///
/// A compressed reference is tried first at its own quality tier, then once
/// at the lower tier. When that also fails (or no decoder is installed) the
/// uncompressed reference, if any, is used instead. `EmptyGeometry` is only
/// returned when every source that was tried decoded to nothing.
pub fn load_mesh(
    source: &dyn AssetSource,
    decoder: Option<&dyn GeometryDecoder>,
    compressed: Option<&str>,
    uncompressed: Option<&str>,
    options: &PrepareOptions,
) -> ViewerResult<(String, PreparedSurface)> {
    let mut failures = Vec::new();

    if let Some(asset) = compressed {
        match decoder {
            Some(decoder) => {
                let tiers = std::iter::once(asset.to_string()).chain(QualityTier::fallback_ref(asset));
                for tier in tiers {
                    match load_compressed(source, decoder, &tier, options) {
                        Ok(prepared) => {
                            info!("Loaded compressed mesh {tier}: {} triangles", prepared.mesh.triangle_count());
                            return Ok((tier, prepared));
                        }
                        Err(e) => {
                            warn!("{e}");
                            failures.push(e);
                        }
                    }
                }
            }
            None => warn!("no geometry decoder installed, skipping {asset}"),
        }
    }

    if let Some(asset) = uncompressed {
        match load_uncompressed(source, asset, options) {
            Ok(prepared) => {
                info!("Loaded mesh {asset}: {} triangles", prepared.mesh.triangle_count());
                return Ok((asset.to_string(), prepared));
            }
            Err(e) => failures.push(e),
        }
    }

    let all_empty = failures
        .iter()
        .all(|e| matches!(e, ViewerError::EmptyGeometry { .. }));
    let last = if all_empty {
        failures.into_iter().next()
    } else {
        failures
            .into_iter()
            .rev()
            .find(|e| !matches!(e, ViewerError::EmptyGeometry { .. }))
    };
    let asset = compressed.or(uncompressed).unwrap_or_default();
    Err(match last {
        Some(e @ (ViewerError::EmptyGeometry { .. } | ViewerError::AssetFetchFailed { .. })) => e,
        Some(e) => ViewerError::fetch_failed(AssetKind::Mesh, asset, e.to_string()),
        None => ViewerError::fetch_failed(AssetKind::Mesh, asset, "no decoder for compressed geometry"),
    })
}

struct Job {
    source: Arc<dyn AssetSource>,
    decoder: Option<Arc<dyn GeometryDecoder>>,
    ticket: LoadTicket,
    request: LoadRequest,
}

impl Job {
    fn run(self) -> LoadCompletion {
        let result = match self.request {
            LoadRequest::Skeleton { asset } => load_skeleton(self.source.as_ref(), &asset)
                .map(|reconstruction| LoadedAsset::Skeleton { asset, reconstruction }),
            LoadRequest::Mesh {
                compressed,
                uncompressed,
                options,
            } => load_mesh(
                self.source.as_ref(),
                self.decoder.as_deref(),
                compressed.as_deref(),
                uncompressed.as_deref(),
                &options,
            )
            .map(|(asset, surface)| LoadedAsset::Mesh { asset, surface }),
        };
        LoadCompletion {
            ticket: self.ticket,
            result,
        }
    }
}

enum Executor {
    Inline,
    Background(Option<tokio::runtime::Runtime>),
}

pub struct AssetLoader {
    source: Arc<dyn AssetSource>,
    decoder: Option<Arc<dyn GeometryDecoder>>,
    executor: Executor,
    tx: mpsc::UnboundedSender<LoadCompletion>,
    rx: mpsc::UnboundedReceiver<LoadCompletion>,
    cancel: CancelToken,
}

impl AssetLoader {
    /// Run every request synchronously inside `request`
    pub fn inline(source: Arc<dyn AssetSource>) -> Self {
        Self::with_executor(source, Executor::Inline)
    }

    /// Run requests on a dedicated tokio blocking pool
    pub fn background(source: Arc<dyn AssetSource>) -> ViewerResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("asset-loader")
            .build()
            .map_err(|e| ViewerError::invalid_state(format!("failed to start loader runtime: {e}")))?;
        Ok(Self::with_executor(source, Executor::Background(Some(runtime))))
    }

    fn with_executor(source: Arc<dyn AssetSource>, executor: Executor) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            decoder: None,
            executor,
            tx,
            rx,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn GeometryDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn request(&self, ticket: LoadTicket, request: LoadRequest) {
        if self.cancel.is_cancelled() {
            debug!("loader cancelled, dropping {:?} request", ticket.kind);
            return;
        }

        let job = Job {
            source: Arc::clone(&self.source),
            decoder: self.decoder.clone(),
            ticket,
            request,
        };
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        let deliver = move |completion: LoadCompletion| {
            if cancel.is_cancelled() {
                debug!("viewer gone, discarding {:?} completion", completion.ticket.kind);
                return;
            }
            let _ = tx.send(completion);
        };

        match &self.executor {
            Executor::Inline => deliver(job.run()),
            Executor::Background(Some(runtime)) => {
                runtime.spawn_blocking(move || deliver(job.run()));
            }
            Executor::Background(None) => debug!("loader shut down, dropping request"),
        }
    }

    /// Completions received since the last poll
    pub fn poll(&mut self) -> Vec<LoadCompletion> {
        let mut out = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            if !self.cancel.is_cancelled() {
                out.push(completion);
            }
        }
        out
    }

    /// Cancel outstanding work and stop the worker pool without blocking
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Executor::Background(runtime) = &mut self.executor {
            if let Some(runtime) = runtime.take() {
                runtime.shutdown_background();
            }
        }
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::surface::RawSurface;

    struct CountingDecoder {
        ok_for: &'static [u8],
    }

    impl GeometryDecoder for CountingDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<RawSurface, String> {
            if bytes == self.ok_for {
                Ok(fixtures::cube_surface(1.0))
            } else {
                Err("corrupt buffer".into())
            }
        }
    }

    #[test]
    fn test_skeleton_fetch_failure() {
        let err = load_skeleton(&MemorySource::new(), "missing.swc").unwrap_err();
        assert!(matches!(err, ViewerError::AssetFetchFailed { kind: AssetKind::Skeleton, .. }));
    }

    #[test]
    fn test_skeleton_empty_is_warning() {
        let source = MemorySource::new().with("e.swc", "# only comments\n");
        let err = load_skeleton(&source, "e.swc").unwrap_err();
        assert!(!err.is_user_visible());
    }

    #[test]
    fn test_compressed_falls_back_to_lower_tier() {
        let source = MemorySource::new()
            .with("n_refined.drc", b"broken".to_vec())
            .with("n_mc.drc", b"good".to_vec());
        let decoder = CountingDecoder { ok_for: b"good" };
        let (asset, prepared) =
            load_mesh(&source, Some(&decoder as &dyn GeometryDecoder), Some("n_refined.drc"), None, &PrepareOptions::default()).unwrap();
        assert_eq!(asset, "n_mc.drc");
        assert_eq!(prepared.mesh.triangle_count(), 12);
    }

    #[test]
    fn test_compressed_failure_reported_as_fetch_failure() {
        let source = MemorySource::new().with("n_refined.drc", b"broken".to_vec());
        let decoder = CountingDecoder { ok_for: b"good" };
        let err = load_mesh(&source, Some(&decoder as &dyn GeometryDecoder), Some("n_refined.drc"), None, &PrepareOptions::default())
            .unwrap_err();
        assert!(matches!(err, ViewerError::AssetFetchFailed { kind: AssetKind::Mesh, .. }));
        assert_eq!(err.user_message(), "Failed to load mesh");
    }

    #[test]
    fn test_compressed_falls_back_to_uncompressed() {
        let source = MemorySource::new().with("cube.obj", fixtures::CUBE_OBJ);
        let (asset, _) = load_mesh(&source, None, Some("n_refined.drc"), Some("cube.obj"), &PrepareOptions::default())
            .unwrap();
        assert_eq!(asset, "cube.obj");
    }

    struct EmptyDecoder;

    impl GeometryDecoder for EmptyDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<RawSurface, String> {
            Ok(RawSurface::default())
        }
    }

    #[test]
    fn test_empty_compressed_mesh_falls_back_to_uncompressed() {
        let source = MemorySource::new()
            .with("n_refined.drc", b"anything".to_vec())
            .with("n.obj", fixtures::CUBE_OBJ);
        let (asset, prepared) = load_mesh(
            &source,
            Some(&EmptyDecoder as &dyn GeometryDecoder),
            Some("n_refined.drc"),
            Some("n.obj"),
            &PrepareOptions::default(),
        )
        .unwrap();
        assert_eq!(asset, "n.obj");
        assert_eq!(prepared.mesh.triangle_count(), 12);
    }

    #[test]
    fn test_empty_refined_tier_falls_back_to_lower_tier() {
        let source = MemorySource::new()
            .with("n_refined.drc", b"anything".to_vec())
            .with("n_mc.drc", b"good".to_vec());
        struct EmptyThenGood;
        impl GeometryDecoder for EmptyThenGood {
            fn decode(&self, bytes: &[u8]) -> Result<RawSurface, String> {
                if bytes == b"good" {
                    Ok(fixtures::cube_surface(1.0))
                } else {
                    Ok(RawSurface::default())
                }
            }
        }
        let (asset, _) = load_mesh(
            &source,
            Some(&EmptyThenGood as &dyn GeometryDecoder),
            Some("n_refined.drc"),
            None,
            &PrepareOptions::default(),
        )
        .unwrap();
        assert_eq!(asset, "n_mc.drc");
    }

    #[test]
    fn test_every_tier_empty_is_empty_geometry() {
        let source = MemorySource::new()
            .with("n_refined.drc", b"a".to_vec())
            .with("n_mc.drc", b"b".to_vec());
        let err = load_mesh(
            &source,
            Some(&EmptyDecoder as &dyn GeometryDecoder),
            Some("n_refined.drc"),
            None,
            &PrepareOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ViewerError::EmptyGeometry { .. }));
        assert!(!err.is_user_visible());
    }

    #[test]
    fn test_file_source_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.swc"), fixtures::SWC_SIMPLE).unwrap();
        let source = FileSource::with_root(dir.path());
        assert_eq!(source.fetch("a.swc").unwrap(), fixtures::SWC_SIMPLE.as_bytes());
        assert!(source.fetch("b.swc").is_err());
    }

    #[test]
    fn test_inline_loader_delivers_on_poll() {
        let source = Arc::new(MemorySource::new().with("a.swc", fixtures::SWC_SIMPLE));
        let mut loader = AssetLoader::inline(source);
        let ticket = LoadTicket { kind: AssetKind::Skeleton, seq: 1 };
        loader.request(ticket, LoadRequest::Skeleton { asset: "a.swc".into() });
        let done = loader.poll();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].ticket, ticket);
        assert!(done[0].result.is_ok());
        assert!(loader.poll().is_empty());
    }

    #[test]
    fn test_cancelled_loader_drops_completions() {
        let source = Arc::new(MemorySource::new().with("a.swc", fixtures::SWC_SIMPLE));
        let mut loader = AssetLoader::inline(source);
        loader.cancel_token().cancel();
        loader.request(
            LoadTicket { kind: AssetKind::Skeleton, seq: 1 },
            LoadRequest::Skeleton { asset: "a.swc".into() },
        );
        assert!(loader.poll().is_empty());
    }

    #[test]
    fn test_background_loader_completes() {
        let source = Arc::new(MemorySource::new().with("a.swc", fixtures::SWC_SIMPLE));
        let mut loader = AssetLoader::background(source).unwrap();
        loader.request(
            LoadTicket { kind: AssetKind::Skeleton, seq: 7 },
            LoadRequest::Skeleton { asset: "a.swc".into() },
        );
        let mut done = Vec::new();
        for _ in 0..200 {
            done.extend(loader.poll());
            if !done.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].ticket.seq, 7);
        loader.shutdown();
    }
}
