use time::UtcOffset;

use crate::core::db::AllowListRepository;
use crate::core::gate::GateActuator;
use crate::error::StoreError;
use crate::models::{AccessOutcome, CanonicalPlate, now_at};

/// Checks a plate against the allow-list and signals the gate on a match
pub struct AccessDecision<L, G> {
    allow_list: L,
    gate: G,
    utc_offset: UtcOffset,
}

impl<L, G> AccessDecision<L, G>
where
    L: AllowListRepository,
    G: GateActuator,
{
    pub fn new(allow_list: L, gate: G) -> Self {
        Self {
            allow_list,
            gate,
            utc_offset: UtcOffset::UTC,
        }
    }

    /// Offset used for outcome timestamps
    pub fn with_utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn allow_list(&self) -> &L {
        &self.allow_list
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    /// Look the plate up and open the gate if it is allowed.
    ///
    /// A lookup failure is returned as an error, never as a denial. A failed
    /// gate signal is logged and does not change the outcome.
    pub async fn decide(&self, plate: &CanonicalPlate) -> Result<AccessOutcome, StoreError> {
        let entry = self.allow_list.find_entry(plate.as_str()).await?;
        let timestamp = now_at(self.utc_offset);

        let Some(entry) = entry else {
            tracing::info!(plate = %plate, quality = ?plate.quality(), "access denied");
            return Ok(AccessOutcome {
                plate: plate.clone(),
                granted: false,
                owner_name: None,
                timestamp,
            });
        };

        tracing::info!(
            plate = %plate,
            owner = entry.owner_name.as_deref().unwrap_or("-"),
            "access granted"
        );
        if let Err(e) = self.gate.open().await {
            tracing::error!(plate = %plate, error = %e, "failed to send gate open command");
        }

        Ok(AccessOutcome {
            plate: plate.clone(),
            granted: true,
            owner_name: entry.owner_name,
            timestamp,
        })
    }
}
