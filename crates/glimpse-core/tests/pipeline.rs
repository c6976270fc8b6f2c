//! End-to-end pipeline behavior against a real SQLite store and cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glimpse_core::classify::NoClassifier;
use glimpse_core::{
    Classification, Classifier, ClassifierFactory, ClassifyError, Config, Dimensions, Glimpse,
    GlimpseError, ImageRecord, Label, PipelineError, ScanError, SqliteStore, Store,
};
use image::{DynamicImage, ImageFormat};

/// Decodes what it is given and counts calls across all workers.
struct CountingFactory {
    calls: Arc<AtomicUsize>,
}

struct CountingClassifier {
    calls: Arc<AtomicUsize>,
}

impl ClassifierFactory for CountingFactory {
    fn name(&self) -> &str {
        "counting"
    }

    fn create(&self) -> Result<Box<dyn Classifier>, ClassifyError> {
        Ok(Box::new(CountingClassifier {
            calls: Arc::clone(&self.calls),
        }))
    }
}

impl Classifier for CountingClassifier {
    fn name(&self) -> &str {
        "counting"
    }

    fn classify(&mut self, image: &[u8]) -> Result<Classification, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let decoded =
            image::load_from_memory(image).map_err(|e| ClassifyError::Decode(e.to_string()))?;
        let mut classification = Classification::new(vec![Label::new("picture", 0.99)]);
        classification.model = Some(format!("{}x{}", decoded.width(), decoded.height()));
        Ok(classification)
    }
}

struct Harness {
    photos: tempfile::TempDir,
    data: tempfile::TempDir,
    store: Arc<SqliteStore>,
    calls: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        let data = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(&data.path().join("glimpse.db")).unwrap());
        Self {
            photos: tempfile::tempdir().unwrap(),
            data,
            store,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.general.data_dir = self.data.path().to_path_buf();
        config.workers.parallel_workers = 2;
        config.pipeline.batch_pause_ms = 0;
        config
    }

    fn engine(&self) -> Glimpse {
        Glimpse::with_store(
            self.config(),
            self.store.clone(),
            Arc::new(CountingFactory {
                calls: Arc::clone(&self.calls),
            }),
        )
    }

    fn engine_without_classifier(&self) -> Glimpse {
        Glimpse::with_store(self.config(), self.store.clone(), Arc::new(NoClassifier))
    }

    fn root(&self) -> &Path {
        self.photos.path()
    }

    fn image(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.photos.path().join(name);
        let format = ImageFormat::from_path(&path).unwrap();
        let image = match format {
            ImageFormat::Gif => DynamicImage::new_rgba8(width, height),
            _ => DynamicImage::new_rgb8(width, height),
        };
        image.save_with_format(&path, format).unwrap();
        path
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn by_name<'a>(records: &'a [ImageRecord], name: &str) -> &'a ImageRecord {
    records
        .iter()
        .find(|r| r.path.file_name().and_then(|n| n.to_str()) == Some(name))
        .unwrap_or_else(|| panic!("no record for {name}"))
}

#[tokio::test(flavor = "multi_thread")]
async fn three_file_scenario() {
    let h = Harness::new();
    h.image("a.jpg", 500, 400);
    h.image("b.png", 1200, 900);
    h.image("c.gif", 300, 300);

    let report = h.engine().scan(h.root(), None).await.unwrap();
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.unclassified, 0);
    assert!(report.failed_paths.is_empty());
    assert_eq!(h.calls(), 3);

    let a = by_name(&report.records, "a.jpg");
    assert_eq!(a.dimensions, Dimensions::new(500, 400));
    assert!(a.thumbnail_path.is_none());
    assert!(a.is_classified());

    let b = by_name(&report.records, "b.png");
    assert_eq!(b.dimensions, Dimensions::new(600, 450));
    let thumb = b.thumbnail_path.as_ref().expect("b.png should have a thumbnail");
    assert_eq!(image::image_dimensions(thumb).unwrap(), (600, 450));
    // The classifier saw the thumbnail, not the original.
    assert_eq!(
        b.classification.as_ref().unwrap().model.as_deref(),
        Some("600x450")
    );

    let c = by_name(&report.records, "c.gif");
    assert_eq!(c.dimensions, Dimensions::new(300, 300));
    assert!(c.thumbnail_path.is_none());
    assert!(c.is_classified());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_run_is_idempotent() {
    let h = Harness::new();
    h.image("a.jpg", 500, 400);
    h.image("b.png", 1200, 900);
    h.image("c.gif", 300, 300);
    let glimpse = h.engine();

    let first = glimpse.scan(h.root(), None).await.unwrap();
    let calls_after_first = h.calls();

    let second = glimpse.scan(h.root(), None).await.unwrap();
    assert_eq!(h.calls(), calls_after_first, "nothing should be reclassified");
    assert_eq!(second.records, first.records);
    assert_eq!(second.reused, 3);
    assert_eq!(second.processed, 0);
    assert_eq!(second.session, first.session);
}

#[tokio::test(flavor = "multi_thread")]
async fn resumes_partially_processed_records() {
    let h = Harness::new();
    h.image("a.jpg", 500, 400);
    h.image("b.png", 1200, 900);

    let first = h.engine_without_classifier().scan(h.root(), None).await.unwrap();
    assert_eq!(first.unclassified, 2);
    let thumb = by_name(&first.records, "b.png").thumbnail_path.clone().unwrap();

    let second = h.engine().scan(h.root(), None).await.unwrap();
    assert_eq!(second.unclassified, 0);
    assert_eq!(second.processed, 2);
    assert_eq!(h.calls(), 2);

    let b = by_name(&second.records, "b.png");
    assert_eq!(b.thumbnail_path.as_ref(), Some(&thumb));
    assert_eq!(b.dimensions, Dimensions::new(600, 450));
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupt_file_only_fails_itself() {
    let h = Harness::new();
    h.image("a.jpg", 500, 400);
    h.image("b.png", 1200, 900);
    let corrupt = h.root().join("broken.jpg");
    std::fs::write(&corrupt, b"\xFF\xD8 this is not really a jpeg").unwrap();

    let glimpse = h.engine();
    let report = glimpse.scan(h.root(), None).await.unwrap();
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.unclassified, 1);
    assert_eq!(report.failed_paths.len(), 1);
    assert!(report.failed_paths[0].ends_with("broken.jpg"));

    let broken = by_name(&report.records, "broken.jpg");
    assert!(broken.dimensions.is_unknown());
    assert!(!broken.is_classified());
    assert!(by_name(&report.records, "a.jpg").is_classified());
    assert!(by_name(&report.records, "b.png").is_classified());

    // Only the broken file is retried.
    let before = h.calls();
    let again = glimpse.scan(h.root(), None).await.unwrap();
    assert_eq!(h.calls() - before, 1);
    assert_eq!(again.reused, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn favorite_survives_rescans() {
    let h = Harness::new();
    let a = h.image("a.jpg", 500, 400);

    let unclassified = h.engine_without_classifier();
    let first = unclassified.scan(h.root(), None).await.unwrap();
    let stored = &first.records[0].path;
    assert_eq!(unclassified.set_favorite(stored, true).unwrap(), 1);

    // Resumed and classified: the flag comes from the stored record.
    let glimpse = h.engine();
    let second = glimpse.scan(h.root(), None).await.unwrap();
    assert!(second.records[0].favorite);
    assert!(second.records[0].is_classified());

    // Reused as is.
    h.image("d.png", 20, 20);
    let third = glimpse.scan(h.root(), None).await.unwrap();
    assert!(by_name(&third.records, "a.jpg").favorite);
    assert!(!by_name(&third.records, "d.png").favorite);
    assert!(a.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn vanished_files_are_reported_not_deleted() {
    let h = Harness::new();
    h.image("a.jpg", 500, 400);
    let b = h.image("b.png", 200, 100);
    let glimpse = h.engine();

    let first = glimpse.scan(h.root(), None).await.unwrap();
    std::fs::remove_file(&b).unwrap();

    let second = glimpse.scan(h.root(), None).await.unwrap();
    assert_eq!(second.records.len(), 1);
    assert_eq!(second.missing.len(), 1);
    assert!(second.missing[0].ends_with("b.png"));

    // Still in the store.
    let stored = h.store.get_records(first.session).unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_root_is_a_scan_error() {
    let h = Harness::new();
    let err = h
        .engine()
        .scan(&h.root().join("does-not-exist"), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GlimpseError::Pipeline(PipelineError::Scan(ScanError::NotFound(_)))
    ));
    assert!(h.store.sessions().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_directory_completes() {
    let h = Harness::new();
    let report = h.engine().scan(h.root(), None).await.unwrap();
    assert!(report.records.is_empty());
    assert_eq!(h.store.sessions().unwrap().len(), 1);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn backslash_names_are_reused_across_runs() {
    let h = Harness::new();
    h.image("a\\b.png", 800, 600);
    h.image("plain.jpg", 100, 100);
    let glimpse = h.engine();

    let first = glimpse.scan(h.root(), None).await.unwrap();
    assert_eq!(first.records.len(), 2);
    assert_eq!(h.calls(), 2);

    for _ in 0..2 {
        let again = glimpse.scan(h.root(), None).await.unwrap();
        assert_eq!(again.reused, 2);
        assert_eq!(again.processed, 0);
        assert!(again.missing.is_empty());
    }
    assert_eq!(h.calls(), 2, "nothing should be reclassified");
    assert!(by_name(&first.records, "a\\b.png").thumbnail_path.is_some());
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread")]
async fn non_utf8_names_never_merge() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let h = Harness::new();
    let good = h.image("good.png", 40, 40);
    for name in [&b"bad\xff.png"[..], &b"bad\xfe.png"[..]] {
        std::fs::copy(&good, h.root().join(OsStr::from_bytes(name))).unwrap();
    }
    let glimpse = h.engine();

    let first = glimpse.scan(h.root(), None).await.unwrap();
    assert_eq!(first.records.len(), 1);
    assert!(first.records[0].path.ends_with("good.png"));

    let second = glimpse.scan(h.root(), None).await.unwrap();
    assert_eq!(second.reused, 1);
    assert!(second.missing.is_empty());
    assert_eq!(h.calls(), 1);
}
