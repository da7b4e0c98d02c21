use crate::error::StoreError;

/// One row of the `allowed_vehicles` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowListEntry {
    pub plate_number: String,
    pub owner_name: Option<String>,
}

/// Read-only view of the vehicles permitted through the gate.
///
/// Implementations must hit the backing store on every call: the list is
/// edited concurrently by the administration side and must not be cached.
pub trait AllowListRepository {
    /// Exact, case-sensitive lookup by canonical plate
    fn find_entry(&self, plate: &str) -> impl Future<Output = Result<Option<AllowListEntry>, StoreError>>;
}
