use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventease_core::{CasOutcome, SeatStore, StoreError, StoreResult};
use eventease_shared::{Seat, SeatId, SeatStatus};
use sqlx::PgPool;
use tracing::debug;

const SEAT_COLUMNS: &str = "id, status, holder, version, created_at, last_updated";

pub struct PgSeatStore {
    pool: PgPool,
}

impl PgSeatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct SeatRow {
    id: String,
    status: String,
    holder: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl TryFrom<SeatRow> for Seat {
    type Error = StoreError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        let status: SeatStatus = row.status.parse().map_err(StoreError::Corrupt)?;
        Ok(Seat {
            id: SeatId::new(row.id),
            status,
            holder: row.holder,
            version: row.version,
            created_at: row.created_at,
            last_updated: row.last_updated,
        })
    }
}

fn into_seats(rows: Vec<SeatRow>) -> StoreResult<Vec<Seat>> {
    let mut seats = rows
        .into_iter()
        .map(Seat::try_from)
        .collect::<StoreResult<Vec<_>>>()?;
    // Text ordering in SQL would put A10 before A2
    seats.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(seats)
}

#[async_trait]
impl SeatStore for PgSeatStore {
    async fn get(&self, id: &SeatId) -> StoreResult<Option<Seat>> {
        let row = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {} FROM seats WHERE id = $1",
            SEAT_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(Seat::try_from).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!("SELECT {} FROM seats", SEAT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        into_seats(rows)
    }

    async fn compare_and_swap(
        &self,
        id: &SeatId,
        expected_version: i64,
        next: &Seat,
    ) -> StoreResult<CasOutcome> {
        // Row-level atomicity: the version predicate and the write happen in
        // one statement, so only one of several racing updates can match.
        let updated = sqlx::query_as::<_, SeatRow>(&format!(
            r#"
            UPDATE seats
            SET status = $3, holder = $4, version = $5, last_updated = $6
            WHERE id = $1 AND version = $2
            RETURNING {}
            "#,
            SEAT_COLUMNS
        ))
        .bind(id.as_str())
        .bind(expected_version)
        .bind(next.status.as_str())
        .bind(next.holder.as_deref())
        .bind(next.version)
        .bind(next.last_updated)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        match updated {
            Some(row) => Ok(CasOutcome::Committed(Seat::try_from(row)?)),
            None => {
                debug!(seat_id = %id, expected_version, "Conditional seat update matched no row");
                Ok(CasOutcome::Stale(self.get(id).await?))
            }
        }
    }

    async fn insert_all(&self, seats: &[Seat]) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;
        let mut inserted = 0;

        for seat in seats {
            let result = sqlx::query(
                r#"
                INSERT INTO seats (id, status, holder, version, created_at, last_updated)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(seat.id.as_str())
            .bind(seat.status.as_str())
            .bind(seat.holder.as_deref())
            .bind(seat.version)
            .bind(seat.created_at)
            .bind(seat.last_updated)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(inserted)
    }

    async fn count_by_status(&self, status: SeatStatus) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seats WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(count.max(0) as u64)
    }

    async fn list_by_holder(&self, holder: &str) -> StoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {} FROM seats WHERE holder = $1",
            SEAT_COLUMNS
        ))
        .bind(holder)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        into_seats(rows)
    }
}
