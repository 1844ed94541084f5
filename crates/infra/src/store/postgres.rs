//! Postgres-backed inventory store.
//!
//! Every `InventoryTx` wraps one database transaction (READ COMMITTED). Stock
//! rows are locked with `SELECT ... FOR UPDATE` before any quantity read that
//! feeds a write, which serializes concurrent reservations against the same
//! bucket. Reservations and transfer requests are stored as a JSONB `state`
//! column next to the indexed columns used for filtering.
//!
//! ## Error Mapping
//!
//! | SQLx error | Code | StoreError |
//! |---|---|---|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (other) | any | `Backend` |
//! | Column decode failure | n/a | `Corrupt` |
//! | Pool / IO / other | n/a | `Backend` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use evwarranty_core::{
    CompanyId, ComponentId, ReservationId, ServiceCenterId, StockId, TransferRequestId,
    TypeComponentId, WarehouseId,
};
use evwarranty_inventory::{
    AdjustmentLine, Component, ComponentReservation, InventoryAdjustment, Stock,
    StockHistoryEntry, StockTransferRequest, TypeComponent, Warehouse, WarehouseOwner,
};

use super::r#trait::{
    InventoryStore, InventoryTx, ReservationFilter, StoreError, TransferFilter, UsageCount,
};
use crate::config::InventoryConfig;

macro_rules! stock_select {
    ($tail:literal) => {
        concat!(
            "SELECT id, warehouse_id, type_component_id, quantity_in_stock, quantity_reserved, ",
            "reorder_point, low_stock_notified_at, version, created_at, updated_at FROM stocks ",
            $tail
        )
    };
}

macro_rules! component_select {
    ($tail:literal) => {
        concat!(
            "SELECT id, serial_number, type_component_id, warehouse_id, status, reservation_id, ",
            "created_at, updated_at FROM components ",
            $tail
        )
    };
}

macro_rules! warehouse_select {
    ($tail:literal) => {
        concat!(
            "SELECT id, name, owner_kind, company_id, service_center_id, is_central, created_at ",
            "FROM warehouses ",
            $tail
        )
    };
}

macro_rules! history_select {
    ($tail:literal) => {
        concat!(
            "SELECT id, stock_id, cause, reference_id, delta_in_stock, delta_reserved, ",
            "in_stock_after, reserved_after, actor_id, note, occurred_at FROM stock_history ",
            $tail
        )
    };
}

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Postgres-backed inventory store.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using `database_url` and `db_max_connections` from the config.
    pub async fn connect(config: &InventoryConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Backend("DATABASE_URL is not set".to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn uuid<T: Into<Uuid>>(id: T) -> Uuid {
    id.into()
}

fn uuids<T: Copy + Into<Uuid>>(ids: &[T]) -> Vec<Uuid> {
    ids.iter().map(|id| (*id).into()).collect()
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn parse_col<T>(row: &PgRow, name: &str) -> Result<T, StoreError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    let raw: String = col(row, name)?;
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn stock_from_row(row: &PgRow) -> Result<Stock, StoreError> {
    let version: i64 = col(row, "version")?;
    Stock::restore(
        StockId::from_uuid(col(row, "id")?),
        WarehouseId::from_uuid(col(row, "warehouse_id")?),
        TypeComponentId::from_uuid(col(row, "type_component_id")?),
        col(row, "quantity_in_stock")?,
        col(row, "quantity_reserved")?,
        col(row, "reorder_point")?,
        col(row, "low_stock_notified_at")?,
        version.max(0) as u64,
        col(row, "created_at")?,
        col(row, "updated_at")?,
    )
    .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn component_from_row(row: &PgRow) -> Result<Component, StoreError> {
    let warehouse_id: Option<Uuid> = col(row, "warehouse_id")?;
    let reservation_id: Option<Uuid> = col(row, "reservation_id")?;
    Ok(Component {
        id: ComponentId::from_uuid(col(row, "id")?),
        serial_number: col(row, "serial_number")?,
        type_component_id: TypeComponentId::from_uuid(col(row, "type_component_id")?),
        warehouse_id: warehouse_id.map(WarehouseId::from_uuid),
        status: parse_col(row, "status")?,
        reservation_id: reservation_id.map(ReservationId::from_uuid),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn warehouse_from_row(row: &PgRow) -> Result<Warehouse, StoreError> {
    let owner_kind: String = col(row, "owner_kind")?;
    let company_id = CompanyId::from_uuid(col(row, "company_id")?);
    let service_center_id: Option<Uuid> = col(row, "service_center_id")?;
    let owner = match (owner_kind.as_str(), service_center_id) {
        ("company", _) => WarehouseOwner::Company { company_id },
        ("service_center", Some(sc)) => WarehouseOwner::ServiceCenter {
            service_center_id: ServiceCenterId::from_uuid(sc),
            company_id,
        },
        (other, _) => {
            return Err(StoreError::Corrupt(format!("warehouse owner kind '{other}'")));
        }
    };
    Ok(Warehouse {
        id: WarehouseId::from_uuid(col(row, "id")?),
        name: col(row, "name")?,
        owner,
        is_central: col(row, "is_central")?,
        created_at: col(row, "created_at")?,
    })
}

fn type_component_from_row(row: &PgRow) -> Result<TypeComponent, StoreError> {
    Ok(TypeComponent {
        id: TypeComponentId::from_uuid(col(row, "id")?),
        sku: col(row, "sku")?,
        name: col(row, "name")?,
        category: col(row, "category")?,
        price_cents: col(row, "price_cents")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<StockHistoryEntry, StoreError> {
    Ok(StockHistoryEntry {
        id: evwarranty_core::HistoryEntryId::from_uuid(col(row, "id")?),
        stock_id: StockId::from_uuid(col(row, "stock_id")?),
        cause: parse_col(row, "cause")?,
        reference_id: col(row, "reference_id")?,
        delta_in_stock: col(row, "delta_in_stock")?,
        delta_reserved: col(row, "delta_reserved")?,
        in_stock_after: col(row, "in_stock_after")?,
        reserved_after: col(row, "reserved_after")?,
        actor_id: evwarranty_core::UserId::from_uuid(col(row, "actor_id")?),
        note: col(row, "note")?,
        occurred_at: col(row, "occurred_at")?,
    })
}

fn adjustment_from_row(row: &PgRow) -> Result<InventoryAdjustment, StoreError> {
    let lines: Json<Vec<AdjustmentLine>> = col(row, "lines")?;
    let transfer_request_id: Option<Uuid> = col(row, "transfer_request_id")?;
    Ok(InventoryAdjustment {
        id: evwarranty_core::AdjustmentId::from_uuid(col(row, "id")?),
        stock_id: StockId::from_uuid(col(row, "stock_id")?),
        adjustment_type: parse_col(row, "adjustment_type")?,
        reason: col(row, "reason")?,
        note: col(row, "note")?,
        lines: lines.0,
        adjusted_by: evwarranty_core::UserId::from_uuid(col(row, "adjusted_by")?),
        adjusted_at: col(row, "adjusted_at")?,
        transfer_request_id: transfer_request_id.map(TransferRequestId::from_uuid),
    })
}

fn reservation_from_row(row: &PgRow) -> Result<ComponentReservation, StoreError> {
    let state: Json<ComponentReservation> = col(row, "state")?;
    Ok(state.0)
}

fn transfer_from_row(row: &PgRow) -> Result<StockTransferRequest, StoreError> {
    let state: Json<StockTransferRequest> = col(row, "state")?;
    Ok(state.0)
}

fn collect<T>(
    rows: Vec<PgRow>,
    decode: fn(&PgRow) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    rows.iter().map(decode).collect()
}

#[async_trait]
impl InventoryTx for PostgresTx {
    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> Result<(), StoreError> {
        let (owner_kind, service_center_id) = match warehouse.owner {
            WarehouseOwner::Company { .. } => ("company", None),
            WarehouseOwner::ServiceCenter {
                service_center_id, ..
            } => ("service_center", Some(uuid(service_center_id))),
        };
        sqlx::query(
            r#"
            INSERT INTO warehouses (id, name, owner_kind, company_id, service_center_id, is_central, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(uuid(warehouse.id))
        .bind(&warehouse.name)
        .bind(owner_kind)
        .bind(uuid(warehouse.company_id()))
        .bind(service_center_id)
        .bind(warehouse.is_central)
        .bind(warehouse.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_warehouse", e))?;
        Ok(())
    }

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        let row = sqlx::query(warehouse_select!("WHERE id = $1"))
            .bind(uuid(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_warehouse", e))?;
        row.as_ref().map(warehouse_from_row).transpose()
    }

    async fn list_warehouses(&mut self) -> Result<Vec<Warehouse>, StoreError> {
        let rows = sqlx::query(warehouse_select!("ORDER BY name, id"))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_warehouses", e))?;
        collect(rows, warehouse_from_row)
    }

    async fn service_center_warehouse(
        &mut self,
        service_center_id: ServiceCenterId,
    ) -> Result<Option<Warehouse>, StoreError> {
        let row = sqlx::query(warehouse_select!(
            "WHERE service_center_id = $1 ORDER BY created_at LIMIT 1"
        ))
        .bind(uuid(service_center_id))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("service_center_warehouse", e))?;
        row.as_ref().map(warehouse_from_row).transpose()
    }

    async fn central_warehouse(
        &mut self,
        company_id: CompanyId,
    ) -> Result<Option<Warehouse>, StoreError> {
        let row = sqlx::query(warehouse_select!(
            "WHERE owner_kind = 'company' AND company_id = $1 AND is_central ORDER BY created_at LIMIT 1"
        ))
        .bind(uuid(company_id))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("central_warehouse", e))?;
        row.as_ref().map(warehouse_from_row).transpose()
    }

    async fn insert_type_component(&mut self, component: &TypeComponent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO type_components (id, sku, name, category, price_cents) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(uuid(component.id))
        .bind(&component.sku)
        .bind(&component.name)
        .bind(&component.category)
        .bind(component.price_cents)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_type_component", e))?;
        Ok(())
    }

    async fn get_type_component(
        &mut self,
        id: TypeComponentId,
    ) -> Result<Option<TypeComponent>, StoreError> {
        let row = sqlx::query(
            "SELECT id, sku, name, category, price_cents FROM type_components WHERE id = $1",
        )
        .bind(uuid(id))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_type_component", e))?;
        row.as_ref().map(type_component_from_row).transpose()
    }

    async fn find_type_component_by_sku(
        &mut self,
        sku: &str,
    ) -> Result<Option<TypeComponent>, StoreError> {
        let row = sqlx::query(
            "SELECT id, sku, name, category, price_cents FROM type_components WHERE sku = $1",
        )
        .bind(sku)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_type_component_by_sku", e))?;
        row.as_ref().map(type_component_from_row).transpose()
    }

    #[instrument(skip(self, candidate), fields(warehouse_id = %candidate.warehouse_id, type_component_id = %candidate.type_component_id), err)]
    async fn get_or_create_stock(&mut self, candidate: &Stock) -> Result<Stock, StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO stocks (
                id, warehouse_id, type_component_id, quantity_in_stock, quantity_reserved,
                reorder_point, low_stock_notified_at, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (warehouse_id, type_component_id) DO NOTHING
            "#,
        )
        .bind(uuid(candidate.id))
        .bind(uuid(candidate.warehouse_id))
        .bind(uuid(candidate.type_component_id))
        .bind(candidate.quantity_in_stock())
        .bind(candidate.quantity_reserved())
        .bind(candidate.reorder_point)
        .bind(candidate.low_stock_notified_at)
        .bind(candidate.version() as i64)
        .bind(candidate.created_at)
        .bind(candidate.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock", e))?
        .rows_affected();
        debug!(inserted, "stock bucket resolved");

        let row = sqlx::query(stock_select!(
            "WHERE warehouse_id = $1 AND type_component_id = $2"
        ))
        .bind(uuid(candidate.warehouse_id))
        .bind(uuid(candidate.type_component_id))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("select_stock", e))?;
        stock_from_row(&row)
    }

    async fn get_stock(&mut self, id: StockId) -> Result<Option<Stock>, StoreError> {
        let row = sqlx::query(stock_select!("WHERE id = $1"))
            .bind(uuid(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_stock", e))?;
        row.as_ref().map(stock_from_row).transpose()
    }

    async fn lock_stock(&mut self, id: StockId) -> Result<Option<Stock>, StoreError> {
        let row = sqlx::query(stock_select!("WHERE id = $1 FOR UPDATE"))
            .bind(uuid(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_stock", e))?;
        row.as_ref().map(stock_from_row).transpose()
    }

    async fn find_stock(
        &mut self,
        warehouse_id: WarehouseId,
        type_component_id: TypeComponentId,
    ) -> Result<Option<Stock>, StoreError> {
        let row = sqlx::query(stock_select!(
            "WHERE warehouse_id = $1 AND type_component_id = $2"
        ))
        .bind(uuid(warehouse_id))
        .bind(uuid(type_component_id))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_stock", e))?;
        row.as_ref().map(stock_from_row).transpose()
    }

    async fn update_stock(&mut self, stock: &Stock) -> Result<(), StoreError> {
        let affected = sqlx::query(
            r#"
            UPDATE stocks SET
                quantity_in_stock = $2,
                quantity_reserved = $3,
                reorder_point = $4,
                low_stock_notified_at = $5,
                version = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(uuid(stock.id))
        .bind(stock.quantity_in_stock())
        .bind(stock.quantity_reserved())
        .bind(stock.reorder_point)
        .bind(stock.low_stock_notified_at)
        .bind(stock.version() as i64)
        .bind(stock.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_stock", e))?
        .rows_affected();
        if affected == 0 {
            return Err(StoreError::Backend(format!("stock {} does not exist", stock.id)));
        }
        Ok(())
    }

    async fn list_stocks(
        &mut self,
        warehouse_ids: Option<&[WarehouseId]>,
    ) -> Result<Vec<Stock>, StoreError> {
        let rows = sqlx::query(stock_select!(
            "WHERE ($1::uuid[] IS NULL OR warehouse_id = ANY($1)) ORDER BY warehouse_id, created_at, id"
        ))
        .bind(warehouse_ids.map(uuids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_stocks", e))?;
        collect(rows, stock_from_row)
    }

    async fn insert_component(&mut self, component: &Component) -> Result<bool, StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO components (
                id, serial_number, type_component_id, warehouse_id, status, reservation_id,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (serial_number) DO NOTHING
            "#,
        )
        .bind(uuid(component.id))
        .bind(&component.serial_number)
        .bind(uuid(component.type_component_id))
        .bind(component.warehouse_id.map(uuid))
        .bind(component.status.as_str())
        .bind(component.reservation_id.map(uuid))
        .bind(component.created_at)
        .bind(component.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_component", e))?
        .rows_affected();
        Ok(inserted == 1)
    }

    async fn update_component(&mut self, component: &Component) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE components SET
                warehouse_id = $2,
                status = $3,
                reservation_id = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(uuid(component.id))
        .bind(component.warehouse_id.map(uuid))
        .bind(component.status.as_str())
        .bind(component.reservation_id.map(uuid))
        .bind(component.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_component", e))?;
        Ok(())
    }

    async fn find_component_by_serial(
        &mut self,
        serial_number: &str,
    ) -> Result<Option<Component>, StoreError> {
        let row = sqlx::query(component_select!("WHERE serial_number = $1"))
            .bind(serial_number)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_component_by_serial", e))?;
        row.as_ref().map(component_from_row).transpose()
    }

    async fn lock_components(&mut self, ids: &[ComponentId]) -> Result<Vec<Component>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(component_select!("WHERE id = ANY($1) ORDER BY id FOR UPDATE"))
            .bind(uuids(ids))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_components", e))?;
        collect(rows, component_from_row)
    }

    async fn lock_available_components(
        &mut self,
        warehouse_id: WarehouseId,
        type_component_id: TypeComponentId,
        limit: i64,
    ) -> Result<Vec<Component>, StoreError> {
        let rows = sqlx::query(component_select!(
            "WHERE warehouse_id = $1 AND type_component_id = $2 AND status = 'IN_STOCK' \
             ORDER BY created_at, id LIMIT $3 FOR UPDATE"
        ))
        .bind(uuid(warehouse_id))
        .bind(uuid(type_component_id))
        .bind(limit.max(0))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_available_components", e))?;
        collect(rows, component_from_row)
    }

    async fn insert_reservation(
        &mut self,
        reservation: &ComponentReservation,
    ) -> Result<(), StoreError> {
        let (Some(case_line_id), Some(stock_id), Some(warehouse_id), Some(type_component_id), Some(reserved_at)) = (
            reservation.case_line_id(),
            reservation.stock_id(),
            reservation.warehouse_id(),
            reservation.type_component_id(),
            reservation.reserved_at(),
        ) else {
            return Err(StoreError::Backend(format!(
                "reservation {} was never created",
                reservation.id_typed()
            )));
        };
        sqlx::query(
            r#"
            INSERT INTO component_reservations (
                id, case_line_id, stock_id, warehouse_id, type_component_id, status, quantity,
                reserved_at, installed_at, state
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(uuid(reservation.id_typed()))
        .bind(uuid(case_line_id))
        .bind(uuid(stock_id))
        .bind(uuid(warehouse_id))
        .bind(uuid(type_component_id))
        .bind(reservation.status().as_str())
        .bind(reservation.quantity())
        .bind(reserved_at)
        .bind(reservation.installed_at())
        .bind(Json(reservation))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_reservation", e))?;
        Ok(())
    }

    async fn update_reservation(
        &mut self,
        reservation: &ComponentReservation,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE component_reservations SET status = $2, installed_at = $3, state = $4 WHERE id = $1",
        )
        .bind(uuid(reservation.id_typed()))
        .bind(reservation.status().as_str())
        .bind(reservation.installed_at())
        .bind(Json(reservation))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_reservation", e))?;
        Ok(())
    }

    async fn get_reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<ComponentReservation>, StoreError> {
        let row = sqlx::query("SELECT state FROM component_reservations WHERE id = $1")
            .bind(uuid(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_reservation", e))?;
        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn lock_reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<ComponentReservation>, StoreError> {
        let row = sqlx::query("SELECT state FROM component_reservations WHERE id = $1 FOR UPDATE")
            .bind(uuid(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_reservation", e))?;
        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn list_reservations(
        &mut self,
        filter: &ReservationFilter,
    ) -> Result<Vec<ComponentReservation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT state FROM component_reservations
            WHERE ($1::uuid IS NULL OR case_line_id = $1)
              AND ($2::uuid[] IS NULL OR warehouse_id = ANY($2))
              AND ($3::text IS NULL OR status = $3)
            ORDER BY reserved_at, id
            "#,
        )
        .bind(filter.case_line_id.map(uuid))
        .bind(filter.warehouse_ids.as_deref().map(uuids))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_reservations", e))?;
        collect(rows, reservation_from_row)
    }

    async fn installed_usage(
        &mut self,
        warehouse_ids: Option<&[WarehouseId]>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<UsageCount>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                type_component_id,
                COUNT(*) AS installations,
                COALESCE(SUM(quantity), 0)::BIGINT AS quantity
            FROM component_reservations
            WHERE status = 'INSTALLED'
              AND ($1::uuid[] IS NULL OR warehouse_id = ANY($1))
              AND ($2::timestamptz IS NULL OR installed_at >= $2)
            GROUP BY type_component_id
            ORDER BY quantity DESC, installations DESC, type_component_id
            "#,
        )
        .bind(warehouse_ids.map(uuids))
        .bind(since)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("installed_usage", e))?;

        rows.iter()
            .map(|row| {
                Ok(UsageCount {
                    type_component_id: TypeComponentId::from_uuid(col(row, "type_component_id")?),
                    installations: col(row, "installations")?,
                    quantity: col(row, "quantity")?,
                })
            })
            .collect()
    }

    async fn insert_adjustment(
        &mut self,
        adjustment: &InventoryAdjustment,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_adjustments (
                id, stock_id, adjustment_type, reason, note, lines, adjusted_by, adjusted_at,
                transfer_request_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(uuid(adjustment.id))
        .bind(uuid(adjustment.stock_id))
        .bind(adjustment.adjustment_type.as_str())
        .bind(&adjustment.reason)
        .bind(&adjustment.note)
        .bind(Json(&adjustment.lines))
        .bind(uuid(adjustment.adjusted_by))
        .bind(adjustment.adjusted_at)
        .bind(adjustment.transfer_request_id.map(uuid))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_adjustment", e))?;
        Ok(())
    }

    async fn list_adjustments(
        &mut self,
        stock_id: StockId,
    ) -> Result<Vec<InventoryAdjustment>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, stock_id, adjustment_type, reason, note, lines, adjusted_by, adjusted_at,
                   transfer_request_id
            FROM inventory_adjustments
            WHERE stock_id = $1
            ORDER BY adjusted_at, id
            "#,
        )
        .bind(uuid(stock_id))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_adjustments", e))?;
        collect(rows, adjustment_from_row)
    }

    async fn insert_transfer(&mut self, request: &StockTransferRequest) -> Result<(), StoreError> {
        let (Some(requesting), Some(requested_at)) =
            (request.requesting_warehouse_id(), request.requested_at())
        else {
            return Err(StoreError::Backend(format!(
                "transfer request {} was never created",
                request.id_typed()
            )));
        };
        sqlx::query(
            r#"
            INSERT INTO stock_transfer_requests (
                id, kind, status, requesting_warehouse_id, sourcing_warehouse_id, requested_at, state
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(uuid(request.id_typed()))
        .bind(request.kind().as_str())
        .bind(request.status().as_str())
        .bind(uuid(requesting))
        .bind(request.sourcing_warehouse_id().map(uuid))
        .bind(requested_at)
        .bind(Json(request))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transfer", e))?;
        Ok(())
    }

    async fn update_transfer(&mut self, request: &StockTransferRequest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE stock_transfer_requests
            SET status = $2, sourcing_warehouse_id = $3, state = $4
            WHERE id = $1
            "#,
        )
        .bind(uuid(request.id_typed()))
        .bind(request.status().as_str())
        .bind(request.sourcing_warehouse_id().map(uuid))
        .bind(Json(request))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_transfer", e))?;
        Ok(())
    }

    async fn get_transfer(
        &mut self,
        id: TransferRequestId,
    ) -> Result<Option<StockTransferRequest>, StoreError> {
        let row = sqlx::query("SELECT state FROM stock_transfer_requests WHERE id = $1")
            .bind(uuid(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_transfer", e))?;
        row.as_ref().map(transfer_from_row).transpose()
    }

    async fn lock_transfer(
        &mut self,
        id: TransferRequestId,
    ) -> Result<Option<StockTransferRequest>, StoreError> {
        let row = sqlx::query("SELECT state FROM stock_transfer_requests WHERE id = $1 FOR UPDATE")
            .bind(uuid(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_transfer", e))?;
        row.as_ref().map(transfer_from_row).transpose()
    }

    async fn list_transfers(
        &mut self,
        filter: &TransferFilter,
    ) -> Result<Vec<StockTransferRequest>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT state FROM stock_transfer_requests
            WHERE ($1::uuid[] IS NULL
                   OR requesting_warehouse_id = ANY($1)
                   OR sourcing_warehouse_id = ANY($1))
              AND ($2::text IS NULL OR status = $2)
            ORDER BY requested_at DESC, id DESC
            "#,
        )
        .bind(filter.warehouse_ids.as_deref().map(uuids))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_transfers", e))?;
        collect(rows, transfer_from_row)
    }

    async fn append_history(&mut self, entry: &StockHistoryEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_history (
                id, stock_id, cause, reference_id, delta_in_stock, delta_reserved,
                in_stock_after, reserved_after, actor_id, note, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(uuid(entry.id))
        .bind(uuid(entry.stock_id))
        .bind(entry.cause.as_str())
        .bind(entry.reference_id)
        .bind(entry.delta_in_stock)
        .bind(entry.delta_reserved)
        .bind(entry.in_stock_after)
        .bind(entry.reserved_after)
        .bind(uuid(entry.actor_id))
        .bind(&entry.note)
        .bind(entry.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_history", e))?;
        Ok(())
    }

    async fn history_page(
        &mut self,
        stock_id: StockId,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<StockHistoryEntry>, i64), StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_history WHERE stock_id = $1")
            .bind(uuid(stock_id))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count_history", e))?;

        let rows = sqlx::query(history_select!(
            "WHERE stock_id = $1 ORDER BY seq DESC OFFSET $2 LIMIT $3"
        ))
        .bind(uuid(stock_id))
        .bind(offset.max(0))
        .bind(limit.max(0))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("history_page", e))?;

        Ok((collect(rows, history_from_row)?, total))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Corrupt(format!("{operation}: column {index}: {source}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}
