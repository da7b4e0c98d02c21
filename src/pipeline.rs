use image::RgbImage;
use std::time::Duration;
use time::UtcOffset;
use tracing::Instrument;

use crate::access::AccessDecision;
use crate::capture::FrameSource;
use crate::core::audit::{ArtifactStore, AuditLog};
use crate::core::db::AllowListRepository;
use crate::core::gate::GateActuator;
use crate::detection::{PlateDetector, TextRecognizer, VehicleDetector};
use crate::models::{AccessOutcome, CanonicalPlate, Detection, StageOutcome, now_at};
use crate::plate;

/// Settings shared by every cycle
#[derive(Clone, Debug)]
pub struct PipelineContext {
    /// Delay between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Offset for log and artifact timestamps, resolved once at startup
    pub utc_offset: UtcOffset,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            utc_offset: UtcOffset::UTC,
        }
    }
}

/// How far a cycle got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// No frame; nothing else ran
    CaptureFailed,
    /// Vehicle model failed; treated as an empty scene
    DetectionFailed,
    NoVehicles,
    /// Every detected vehicle went through the plate stages
    Completed,
}

/// Summary of one capture cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub status: CycleStatus,
    pub vehicles: usize,
    /// Non-empty plates produced by normalization, in vehicle order
    pub plates: Vec<CanonicalPlate>,
    pub outcomes: Vec<AccessOutcome>,
    /// Plates for which the allow-list could not be consulted
    pub store_failures: usize,
}

impl CycleReport {
    fn new(status: CycleStatus) -> Self {
        Self {
            status,
            vehicles: 0,
            plates: Vec::new(),
            outcomes: Vec::new(),
            store_failures: 0,
        }
    }

    pub fn granted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.granted).count()
    }
}

/// Capture → vehicle → plate → text → normalize → decide, one frame at a time.
///
/// Every stage failure is contained within the cycle (or within the current
/// vehicle). The gate is only signalled by a successful grant.
pub struct GatePipeline<F, L, G> {
    frames: F,
    vehicles: VehicleDetector,
    plates: PlateDetector,
    recognizer: TextRecognizer,
    decision: AccessDecision<L, G>,
    audit: Option<AuditLog>,
    artifacts: ArtifactStore,
    context: PipelineContext,
}

impl<F, L, G> GatePipeline<F, L, G>
where
    F: FrameSource,
    L: AllowListRepository,
    G: GateActuator,
{
    pub fn new(
        frames: F,
        vehicles: VehicleDetector,
        plates: PlateDetector,
        recognizer: TextRecognizer,
        decision: AccessDecision<L, G>,
    ) -> Self {
        Self {
            frames,
            vehicles,
            plates,
            recognizer,
            decision,
            audit: None,
            artifacts: ArtifactStore::disabled(),
            context: PipelineContext::default(),
        }
    }

    pub fn with_context(mut self, context: PipelineContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn decision(&self) -> &AccessDecision<L, G> {
        &self.decision
    }

    /// Run one full cycle
    pub async fn run_cycle(&mut self) -> CycleReport {
        let frame = match self.frames.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(stage = "capture", error = %e, "frame capture failed");
                return CycleReport::new(CycleStatus::CaptureFailed);
            }
        };

        let frame = self.vehicles.prepare(&frame);
        let vehicles = match self.vehicles.detect(&frame) {
            StageOutcome::Detected(vehicles) => vehicles,
            StageOutcome::NotFound => {
                tracing::info!(stage = "vehicles", "no vehicles found");
                return CycleReport::new(CycleStatus::NoVehicles);
            }
            StageOutcome::Failed(reason) => {
                tracing::warn!(stage = "vehicles", error = %reason, "vehicle detection failed");
                return CycleReport::new(CycleStatus::DetectionFailed);
            }
        };

        tracing::info!(stage = "vehicles", count = vehicles.len(), "vehicles detected");
        let mut report = CycleReport::new(CycleStatus::Completed);
        report.vehicles = vehicles.len();

        for (index, vehicle) in vehicles.iter().enumerate() {
            self.process_vehicle(&frame, index, vehicle, &mut report).await;
        }

        self.finish_cycle(&report).await;
        report
    }

    async fn process_vehicle(
        &self,
        frame: &RgbImage,
        index: usize,
        vehicle: &Detection,
        report: &mut CycleReport,
    ) {
        let Some(vehicle_crop) = vehicle.crop(frame) else {
            tracing::debug!(vehicle = index, bbox = ?vehicle.bbox, "empty vehicle region");
            return;
        };
        self.artifacts
            .save_vehicle(&vehicle_crop, now_at(self.context.utc_offset));

        let plate = match self.plates.detect(&vehicle_crop) {
            StageOutcome::Detected(plate) => plate,
            StageOutcome::NotFound => {
                tracing::info!(stage = "plate", vehicle = index, "no plate found");
                return;
            }
            StageOutcome::Failed(reason) => {
                tracing::warn!(stage = "plate", vehicle = index, error = %reason, "plate detection failed");
                return;
            }
        };

        let Some(plate_crop) = plate.crop(&vehicle_crop) else {
            tracing::debug!(vehicle = index, bbox = ?plate.bbox, "empty plate region");
            return;
        };
        self.artifacts
            .save_plate(&plate_crop, now_at(self.context.utc_offset));

        let raw = self.recognizer.recognize(&plate_crop);
        let canonical = plate::normalize(&raw);
        tracing::debug!(vehicle = index, raw = %raw, plate = %canonical, quality = ?canonical.quality(), "plate text");

        if canonical.is_empty() {
            tracing::info!(stage = "recognize", vehicle = index, raw = %raw, "no plate text read");
            return;
        }
        report.plates.push(canonical.clone());

        match self.decision.decide(&canonical).await {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(e) => {
                tracing::error!(
                    stage = "decide",
                    vehicle = index,
                    plate = %canonical,
                    error = %e,
                    "allow-list lookup failed, gate stays closed"
                );
                report.store_failures += 1;
            }
        }
    }

    async fn finish_cycle(&self, report: &CycleReport) {
        if report.plates.is_empty() {
            tracing::info!("no license plates recognized");
            return;
        }

        let plates: Vec<String> = report.plates.iter().map(|p| p.as_str().to_string()).collect();
        tracing::info!(plates = %plates.join(", "), granted = report.granted(), "recognized plates");

        if let Some(audit) = &self.audit
            && let Err(e) = audit.append(now_at(self.context.utc_offset), &plates).await
        {
            tracing::warn!(path = %audit.path().display(), error = %e, "failed to write plate log");
        }
    }

    /// Run cycles back to back until `shutdown` resolves. Shutdown is only
    /// observed between cycles; a running cycle always completes.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;
            let report = self
                .run_cycle()
                .instrument(tracing::info_span!("cycle", n = cycle))
                .await;
            tracing::info!(
                cycle,
                status = ?report.status,
                vehicles = report.vehicles,
                granted = report.granted(),
                "cycle finished, waiting {:?}",
                self.context.interval
            );

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(self.context.interval) => {}
            }
        }
    }
}
