use gatewatch::core::db::{AllowListEntry, AllowListRepository};
use gatewatch::core::gate::GateActuator;
use gatewatch::detection::{LineReader, ObjectDetector, PlateDetector, TextRecognizer, VehicleDetector};
use gatewatch::error::{ActuationError, CaptureError, DetectionError, RecognitionError, StoreError};
use gatewatch::models::{BoundingBox, Detection};
use gatewatch::{AccessDecision, FrameSource, GatePipeline};
use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use sqlx::Connection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared call counter handed out by the fakes below
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A 200x200 frame with a horizontal gradient, so thresholding has
/// something to split
pub fn test_frame() -> RgbImage {
    ImageBuffer::from_fn(200, 200, |x, _| {
        let v = (x * 255 / 199) as u8;
        Rgb([v, v, v])
    })
}

pub fn detection(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
    Detection {
        bbox: BoundingBox::new(x1, y1, x2, y2),
        confidence: 0.9,
        class_id: 0,
    }
}

/// Creates an `allowed_vehicles` database in a temp directory holding the
/// given `(plate, owner)` rows. Returns the path and the directory (which
/// must be kept alive).
pub async fn create_allow_list(rows: &[(&str, &str)]) -> (PathBuf, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("smart_home.db");

    let opts = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    let mut conn = SqliteConnection::connect_with(&opts)
        .await
        .expect("Failed to create test database");
    sqlx::query(
        "CREATE TABLE allowed_vehicles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plate_number TEXT UNIQUE NOT NULL,
            owner_name TEXT
        )",
    )
    .execute(&mut conn)
    .await
    .expect("Failed to create allowed_vehicles");
    conn.close().await.expect("Failed to close test database");

    for (plate, owner) in rows {
        insert_vehicle(&path, plate, owner).await;
    }
    (path, dir)
}

/// Adds a row through a separate writer connection, as the admin side would
pub async fn insert_vehicle(path: &Path, plate: &str, owner: &str) {
    let opts = SqliteConnectOptions::new().filename(path);
    let mut conn = SqliteConnection::connect_with(&opts)
        .await
        .expect("Failed to open test database");
    sqlx::query("INSERT INTO allowed_vehicles (plate_number, owner_name) VALUES ($1, $2)")
        .bind(plate)
        .bind(owner)
        .execute(&mut conn)
        .await
        .expect("Failed to insert vehicle");
    conn.close().await.expect("Failed to close test database");
}

/// Frame source that serves a fixed frame, or fails every time
pub struct FakeFrames {
    frame: Option<RgbImage>,
    pub calls: Calls,
}

impl FakeFrames {
    pub fn serving(frame: RgbImage) -> Self {
        Self {
            frame: Some(frame),
            calls: Calls::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            frame: None,
            calls: Calls::default(),
        }
    }
}

impl FrameSource for FakeFrames {
    async fn capture(&mut self) -> Result<RgbImage, CaptureError> {
        self.calls.hit();
        self.frame.clone().ok_or_else(|| CaptureError::Missing {
            path: PathBuf::from("current_image.jpg"),
        })
    }
}

/// One scripted detector answer
#[derive(Debug, Clone)]
pub enum Scripted {
    Found(Vec<Detection>),
    Fails,
}

/// Detector that replays scripted answers in order, repeating the last one,
/// and keeps a copy of every image it was shown
pub struct FakeDetector {
    script: Mutex<Vec<Scripted>>,
    pub calls: Calls,
    pub seen: Arc<Mutex<Vec<RgbImage>>>,
}

impl FakeDetector {
    pub fn new(script: Vec<Scripted>) -> Self {
        assert!(!script.is_empty());
        Self {
            script: Mutex::new(script),
            calls: Calls::default(),
            seen: Arc::default(),
        }
    }

    pub fn always(detections: Vec<Detection>) -> Self {
        Self::new(vec![Scripted::Found(detections)])
    }
}

impl ObjectDetector for FakeDetector {
    fn name(&self) -> &str {
        "fake"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectionError> {
        self.calls.hit();
        self.seen.lock().unwrap().push(image.clone());
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 { script.remove(0) } else { script[0].clone() };
        match next {
            Scripted::Found(detections) => Ok(detections),
            Scripted::Fails => Err(DetectionError::Inference {
                model: "fake".to_string(),
                message: "scripted failure".to_string(),
            }),
        }
    }
}

/// OCR stand-in that replays scripted readings in order, repeating the last
pub struct FakeReader {
    readings: Mutex<Vec<String>>,
    pub calls: Calls,
}

impl FakeReader {
    pub fn new(readings: &[&str]) -> Self {
        assert!(!readings.is_empty());
        Self {
            readings: Mutex::new(readings.iter().map(|r| r.to_string()).collect()),
            calls: Calls::default(),
        }
    }
}

impl LineReader for FakeReader {
    fn read_line(&self, _image: &GrayImage) -> Result<String, RecognitionError> {
        self.calls.hit();
        let mut readings = self.readings.lock().unwrap();
        let next = if readings.len() > 1 { readings.remove(0) } else { readings[0].clone() };
        Ok(next)
    }
}

/// In-memory allow-list; `failing()` makes every lookup a store error
#[derive(Default)]
pub struct MemoryAllowList {
    entries: HashMap<String, Option<String>>,
    fail: bool,
    pub calls: Calls,
}

impl MemoryAllowList {
    pub fn with(rows: &[(&str, &str)]) -> Self {
        Self {
            entries: rows
                .iter()
                .map(|(plate, owner)| (plate.to_string(), Some(owner.to_string())))
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl AllowListRepository for MemoryAllowList {
    async fn find_entry(&self, plate: &str) -> Result<Option<AllowListEntry>, StoreError> {
        self.calls.hit();
        if self.fail {
            return Err(StoreError::Lookup {
                plate: plate.to_string(),
                source: sqlx::Error::PoolTimedOut,
            });
        }
        Ok(self.entries.get(plate).map(|owner| AllowListEntry {
            plate_number: plate.to_string(),
            owner_name: owner.clone(),
        }))
    }
}

/// Gate that counts open signals; `failing()` rejects every one of them
#[derive(Debug, Default)]
pub struct CountingGate {
    pub opens: Calls,
    fail: bool,
}

impl CountingGate {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl GateActuator for CountingGate {
    async fn open(&self) -> Result<(), ActuationError> {
        self.opens.hit();
        if self.fail {
            return Err(ActuationError::NotConnected {
                topic: "home/gate".to_string(),
            });
        }
        Ok(())
    }
}

/// Counters for every fake stage of a pipeline built by `fake_pipeline`
pub struct StageCalls {
    pub captures: Calls,
    pub vehicle_detects: Calls,
    pub plate_detects: Calls,
    pub reads: Calls,
    pub lookups: Calls,
    pub opens: Calls,
}

pub type FakePipeline = GatePipeline<FakeFrames, MemoryAllowList, CountingGate>;

/// Wires fake stages into a pipeline and returns it with their counters
pub fn fake_pipeline(
    frames: FakeFrames,
    vehicles: FakeDetector,
    plates: FakeDetector,
    reader: FakeReader,
    allow_list: MemoryAllowList,
) -> (FakePipeline, StageCalls) {
    fake_pipeline_with_gate(frames, vehicles, plates, reader, allow_list, CountingGate::default())
}

pub fn fake_pipeline_with_gate(
    frames: FakeFrames,
    vehicles: FakeDetector,
    plates: FakeDetector,
    reader: FakeReader,
    allow_list: MemoryAllowList,
    gate: CountingGate,
) -> (FakePipeline, StageCalls) {
    let calls = StageCalls {
        captures: frames.calls.clone(),
        vehicle_detects: vehicles.calls.clone(),
        plate_detects: plates.calls.clone(),
        reads: reader.calls.clone(),
        lookups: allow_list.calls.clone(),
        opens: gate.opens.clone(),
    };

    let pipeline = GatePipeline::new(
        frames,
        VehicleDetector::new(Box::new(vehicles)),
        PlateDetector::new(Box::new(plates)),
        TextRecognizer::new(Box::new(reader)),
        AccessDecision::new(allow_list, gate),
    );
    (pipeline, calls)
}
