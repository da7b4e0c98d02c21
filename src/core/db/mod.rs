mod allow_list;
mod state;

use std::path::Path;

use state::StoreState;

use crate::error::StoreError;

pub use allow_list::{AllowListEntry, AllowListRepository};

/// SQLite-backed allow-list (`allowed_vehicles` table)
#[derive(Debug)]
pub struct AllowListDb {
    state: StoreState,
}

impl AllowListDb {
    pub async fn open<P: AsRef<Path>>(database: P) -> Result<Self, StoreError> {
        Ok(Self {
            state: StoreState::open(database).await?,
        })
    }

    /// Open the database and make sure a connection can be established
    pub async fn open_checked<P: AsRef<Path>>(database: P) -> Result<Self, StoreError> {
        let db = Self::open(database).await?;
        db.state.ping().await?;
        Ok(db)
    }

    pub async fn close(&self) {
        self.state.close().await;
    }
}

impl AllowListRepository for AllowListDb {
    async fn find_entry(&self, plate: &str) -> Result<Option<AllowListEntry>, StoreError> {
        let mut conn = self.state.conn().await?;
        let record = sqlx::query_as::<_, (String, Option<String>)>(
            r#"SELECT plate_number, owner_name FROM allowed_vehicles WHERE plate_number = $1 LIMIT 1"#,
        )
        .bind(plate)
        .fetch_optional(&mut **conn)
        .await
        .map_err(|source| StoreError::Lookup {
            plate: plate.to_string(),
            source,
        })?;

        Ok(record.map(|(plate_number, owner_name)| AllowListEntry {
            plate_number,
            owner_name,
        }))
    }
}
