//! PostgreSQL Resource Store
//!
//! One SQL transaction per unit of work. Rows read through a unit of work are
//! taken with `SELECT ... FOR UPDATE`, so concurrent operations on the same
//! rider or dock queue behind each other. Schema constraints back up the
//! engine's invariants:
//!
//! - `loans_one_active_per_rider`: partial unique index, one IN_PROGRESS loan per rider
//! - `docks_bicycle_iff_occupied`: a dock holds a bicycle exactly when OCCUPIED
//!
//! Loan completion is a CAS on `state`.

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::debug;

use super::{ResourceStore, UnitOfWork};
use crate::core_types::{BicycleId, DockId, RiderId};
use crate::loan::error::LoanError;
use crate::loan::state::LoanState;
use crate::loan::types::{Loan, LoanId};
use crate::resources::{
    Bicycle, BicycleStatus, Dock, DockStatus, DocumentKind, PaymentCard, Rider, RiderDocument,
    RiderStatus,
};

/// Idempotent schema bootstrap
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS stations (
    station_id   BIGSERIAL PRIMARY KEY,
    location     TEXT NOT NULL,
    description  TEXT,
    capacity     INTEGER NOT NULL CHECK (capacity >= 0)
);

CREATE TABLE IF NOT EXISTS bicycles (
    bicycle_id   BIGSERIAL PRIMARY KEY,
    model        TEXT NOT NULL,
    brand        TEXT NOT NULL,
    year         INTEGER NOT NULL,
    number       INTEGER NOT NULL UNIQUE,
    status       SMALLINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS docks (
    dock_id      BIGSERIAL PRIMARY KEY,
    number       INTEGER NOT NULL,
    station_id   BIGINT NOT NULL REFERENCES stations (station_id),
    status       SMALLINT NOT NULL DEFAULT 0,
    bicycle_id   BIGINT REFERENCES bicycles (bicycle_id),
    UNIQUE (station_id, number),
    CONSTRAINT docks_bicycle_iff_occupied CHECK ((bicycle_id IS NOT NULL) = (status = 1))
);

CREATE UNIQUE INDEX IF NOT EXISTS docks_one_per_bicycle
    ON docks (bicycle_id) WHERE bicycle_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS riders (
    rider_id       BIGSERIAL PRIMARY KEY,
    name           TEXT NOT NULL,
    email          TEXT NOT NULL UNIQUE,
    phone          TEXT NOT NULL,
    document_kind  SMALLINT NOT NULL,
    document_value TEXT NOT NULL,
    nationality    TEXT,
    status         SMALLINT NOT NULL DEFAULT 1,
    registered_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (document_kind, document_value)
);

CREATE TABLE IF NOT EXISTS payment_cards (
    card_id      BIGSERIAL PRIMARY KEY,
    rider_id     BIGINT NOT NULL REFERENCES riders (rider_id),
    holder_name  TEXT NOT NULL,
    last4        TEXT NOT NULL,
    expiry       TEXT NOT NULL,
    is_primary   BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE UNIQUE INDEX IF NOT EXISTS payment_cards_one_primary
    ON payment_cards (rider_id) WHERE is_primary;

CREATE TABLE IF NOT EXISTS loans (
    loan_id                TEXT PRIMARY KEY,
    rider_id               BIGINT NOT NULL REFERENCES riders (rider_id),
    bicycle_id             BIGINT NOT NULL REFERENCES bicycles (bicycle_id),
    origin_dock_id         BIGINT NOT NULL REFERENCES docks (dock_id),
    origin_station_id      BIGINT NOT NULL REFERENCES stations (station_id),
    started_at             TIMESTAMPTZ NOT NULL,
    initial_fee            NUMERIC(12, 2) NOT NULL,
    state                  SMALLINT NOT NULL,
    destination_dock_id    BIGINT REFERENCES docks (dock_id),
    destination_station_id BIGINT REFERENCES stations (station_id),
    ended_at               TIMESTAMPTZ,
    overtime_fee           NUMERIC(12, 2)
);

CREATE UNIQUE INDEX IF NOT EXISTS loans_one_active_per_rider
    ON loans (rider_id) WHERE state = 10;

CREATE INDEX IF NOT EXISTS loans_rider_started
    ON loans (rider_id, started_at DESC);
"#;

const ACTIVE_LOAN_INDEX: &str = "loans_one_active_per_rider";
const DOCK_CHECK: &str = "docks_bicycle_iff_occupied";

const LOAN_COLUMNS: &str = "loan_id, rider_id, bicycle_id, origin_dock_id, origin_station_id, \
     started_at, initial_fee, state, destination_dock_id, destination_station_id, ended_at, \
     overtime_fee";

/// Resource store backed by PostgreSQL
#[derive(Clone)]
pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), LoanError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        debug!("loan schema ensured");
        Ok(())
    }
}

fn lock_clause(for_update: bool) -> &'static str {
    if for_update { " FOR UPDATE" } else { "" }
}

fn row_to_loan(row: &PgRow) -> Result<Loan, LoanError> {
    let loan_id: String = row.try_get("loan_id")?;
    let state_id: i16 = row.try_get("state")?;
    Ok(Loan {
        loan_id: loan_id
            .parse()
            .map_err(|e| LoanError::SystemError(format!("invalid loan_id {loan_id}: {e}")))?,
        rider_id: row.try_get("rider_id")?,
        bicycle_id: row.try_get("bicycle_id")?,
        origin_dock_id: row.try_get("origin_dock_id")?,
        origin_station_id: row.try_get("origin_station_id")?,
        started_at: row.try_get("started_at")?,
        initial_fee: row.try_get("initial_fee")?,
        state: LoanState::from_id(state_id)
            .ok_or_else(|| LoanError::SystemError(format!("invalid loan state {state_id}")))?,
        destination_dock_id: row.try_get("destination_dock_id")?,
        destination_station_id: row.try_get("destination_station_id")?,
        ended_at: row.try_get("ended_at")?,
        overtime_fee: row.try_get("overtime_fee")?,
    })
}

fn row_to_dock(row: &PgRow) -> Result<Dock, LoanError> {
    let status_id: i16 = row.try_get("status")?;
    Ok(Dock {
        dock_id: row.try_get("dock_id")?,
        number: row.try_get("number")?,
        station_id: row.try_get("station_id")?,
        status: DockStatus::from_id(status_id)
            .ok_or_else(|| LoanError::SystemError(format!("invalid dock status {status_id}")))?,
        bicycle_id: row.try_get("bicycle_id")?,
    })
}

fn row_to_bicycle(row: &PgRow) -> Result<Bicycle, LoanError> {
    let status_id: i16 = row.try_get("status")?;
    Ok(Bicycle {
        bicycle_id: row.try_get("bicycle_id")?,
        model: row.try_get("model")?,
        brand: row.try_get("brand")?,
        year: row.try_get("year")?,
        number: row.try_get("number")?,
        status: BicycleStatus::from_id(status_id).ok_or_else(|| {
            LoanError::SystemError(format!("invalid bicycle status {status_id}"))
        })?,
    })
}

async fn load_rider(
    conn: &mut PgConnection,
    identifier: &str,
    for_update: bool,
) -> Result<Option<Rider>, LoanError> {
    // Domestic (1) sorts before foreign (2)
    let sql = format!(
        "SELECT rider_id, name, email, phone, document_kind, document_value, nationality, \
         status, registered_at FROM riders WHERE document_value = $1 \
         ORDER BY document_kind LIMIT 1{}",
        lock_clause(for_update)
    );
    let Some(row) = sqlx::query(&sql)
        .bind(identifier)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let rider_id: RiderId = row.try_get("rider_id")?;
    let kind_id: i16 = row.try_get("document_kind")?;
    let kind = DocumentKind::from_id(kind_id)
        .ok_or_else(|| LoanError::SystemError(format!("invalid document kind {kind_id}")))?;
    let status_id: i16 = row.try_get("status")?;
    let status = RiderStatus::from_id(status_id)
        .ok_or_else(|| LoanError::SystemError(format!("invalid rider status {status_id}")))?;

    let card_rows = sqlx::query(
        "SELECT card_id, holder_name, last4, expiry, is_primary \
         FROM payment_cards WHERE rider_id = $1 ORDER BY card_id",
    )
    .bind(rider_id)
    .fetch_all(&mut *conn)
    .await?;

    let cards = card_rows
        .iter()
        .map(|r| -> Result<PaymentCard, sqlx::Error> {
            Ok(PaymentCard {
                card_id: r.try_get("card_id")?,
                holder_name: r.try_get("holder_name")?,
                last4: r.try_get("last4")?,
                expiry: r.try_get("expiry")?,
                primary: r.try_get("is_primary")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Rider {
        rider_id,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        document: RiderDocument {
            kind,
            value: row.try_get("document_value")?,
            nationality: row.try_get("nationality")?,
        },
        cards,
        status,
        registered_at: row.try_get("registered_at")?,
    }))
}

async fn load_active_loan(
    conn: &mut PgConnection,
    rider_id: RiderId,
    for_update: bool,
) -> Result<Option<Loan>, LoanError> {
    let sql = format!(
        "SELECT {LOAN_COLUMNS} FROM loans WHERE rider_id = $1 AND state = $2{}",
        lock_clause(for_update)
    );
    let row = sqlx::query(&sql)
        .bind(rider_id)
        .bind(LoanState::InProgress.id())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_loan).transpose()
}

fn is_constraint(err: &sqlx::Error, name: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(name))
}

/// Unit of work wrapping one PostgreSQL transaction
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_rider(&mut self, identifier: &str) -> Result<Option<Rider>, LoanError> {
        load_rider(&mut self.tx, identifier, true).await
    }

    async fn find_active_loan(&mut self, rider_id: RiderId) -> Result<Option<Loan>, LoanError> {
        load_active_loan(&mut self.tx, rider_id, true).await
    }

    async fn get_dock(&mut self, dock_id: DockId) -> Result<Option<Dock>, LoanError> {
        let row = sqlx::query(
            "SELECT dock_id, number, station_id, status, bicycle_id \
             FROM docks WHERE dock_id = $1 FOR UPDATE",
        )
        .bind(dock_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_dock).transpose()
    }

    async fn get_bicycle(&mut self, bicycle_id: BicycleId) -> Result<Option<Bicycle>, LoanError> {
        let row = sqlx::query(
            "SELECT bicycle_id, model, brand, year, number, status \
             FROM bicycles WHERE bicycle_id = $1 FOR UPDATE",
        )
        .bind(bicycle_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_bicycle).transpose()
    }

    async fn insert_loan(&mut self, loan: &Loan) -> Result<(), LoanError> {
        let result = sqlx::query(
            r#"
            INSERT INTO loans
                (loan_id, rider_id, bicycle_id, origin_dock_id, origin_station_id,
                 started_at, initial_fee, state)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(loan.loan_id.to_string())
        .bind(loan.rider_id)
        .bind(loan.bicycle_id)
        .bind(loan.origin_dock_id)
        .bind(loan.origin_station_id)
        .bind(loan.started_at)
        .bind(loan.initial_fee)
        .bind(loan.state.id())
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint(&e, ACTIVE_LOAN_INDEX) => {
                Err(LoanError::LoanAlreadyActive(loan.rider_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_loan(&mut self, loan: &Loan) -> Result<(), LoanError> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET state = $1, destination_dock_id = $2, destination_station_id = $3,
                ended_at = $4, overtime_fee = $5
            WHERE loan_id = $6 AND state = $7
            "#,
        )
        .bind(loan.state.id())
        .bind(loan.destination_dock_id)
        .bind(loan.destination_station_id)
        .bind(loan.ended_at)
        .bind(loan.overtime_fee)
        .bind(loan.loan_id.to_string())
        .bind(LoanState::InProgress.id())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LoanError::InvalidStateTransition(format!(
                "loan {} is not {}",
                loan.loan_id,
                LoanState::InProgress
            )));
        }
        Ok(())
    }

    async fn save_dock(&mut self, dock: &Dock) -> Result<(), LoanError> {
        let result = sqlx::query("UPDATE docks SET status = $1, bicycle_id = $2 WHERE dock_id = $3")
            .bind(dock.status.id())
            .bind(dock.bicycle_id)
            .bind(dock.dock_id)
            .execute(&mut *self.tx)
            .await;

        match result {
            Ok(r) if r.rows_affected() == 0 => Err(LoanError::DockNotFound(dock.dock_id)),
            Ok(_) => Ok(()),
            Err(e) if is_constraint(&e, DOCK_CHECK) => {
                Err(LoanError::InvalidStateTransition(format!(
                    "dock {} is {} with bicycle {:?}",
                    dock.dock_id, dock.status, dock.bicycle_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_bicycle(&mut self, bicycle: &Bicycle) -> Result<(), LoanError> {
        let result = sqlx::query("UPDATE bicycles SET status = $1 WHERE bicycle_id = $2")
            .bind(bicycle.status.id())
            .bind(bicycle.bicycle_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LoanError::BicycleMissing(format!(
                "bicycle {}",
                bicycle.bicycle_id
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LoanError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, LoanError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn find_rider(&self, identifier: &str) -> Result<Option<Rider>, LoanError> {
        let mut conn = self.pool.acquire().await?;
        load_rider(&mut conn, identifier, false).await
    }

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>, LoanError> {
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loans WHERE loan_id = $1");
        let row = sqlx::query(&sql)
            .bind(loan_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_loan).transpose()
    }

    async fn active_loan(&self, rider_id: RiderId) -> Result<Option<Loan>, LoanError> {
        let mut conn = self.pool.acquire().await?;
        load_active_loan(&mut conn, rider_id, false).await
    }

    async fn loan_history(&self, rider_id: RiderId) -> Result<Vec<Loan>, LoanError> {
        let sql = format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE rider_id = $1 \
             ORDER BY started_at DESC, loan_id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(rider_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_loan).collect()
    }
}
