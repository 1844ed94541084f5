//! Role and warehouse-ownership checks shared by the engines.
//!
//! The role check answers "may this role do this at all" (capability table in
//! `evwarranty-auth`); the ownership check answers "does this actor act for
//! the warehouse being touched". Company-side actors act for every warehouse
//! of their company; service-center actors only for their own center's.

use evwarranty_auth::{Action, Actor, authorize_scoped};
use evwarranty_core::{DomainError, WarehouseId};
use evwarranty_inventory::Warehouse;

use crate::error::InventoryResult;
use crate::store::InventoryTx;

pub fn require(actor: &Actor, action: Action) -> InventoryResult<()> {
    authorize_scoped(actor, action)?;
    Ok(())
}

pub fn can_access(actor: &Actor, warehouse: &Warehouse) -> bool {
    if actor.role.is_company_side() {
        actor.acts_for_company(warehouse.company_id())
    } else {
        match warehouse.service_center_id() {
            Some(sc) => actor.acts_for_service_center(sc),
            None => false,
        }
    }
}

pub fn ensure_access(actor: &Actor, warehouse: &Warehouse) -> InventoryResult<()> {
    if can_access(actor, warehouse) {
        Ok(())
    } else {
        Err(DomainError::unauthorized(format!(
            "user {} does not act for warehouse {}",
            actor.user_id, warehouse.id
        ))
        .into())
    }
}

pub async fn load_warehouse(
    tx: &mut dyn InventoryTx,
    warehouse_id: WarehouseId,
) -> InventoryResult<Warehouse> {
    tx.get_warehouse(warehouse_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("warehouse {warehouse_id}")).into())
}

/// Load a warehouse and check the actor acts for it.
pub async fn accessible_warehouse(
    tx: &mut dyn InventoryTx,
    actor: &Actor,
    warehouse_id: WarehouseId,
) -> InventoryResult<Warehouse> {
    let warehouse = load_warehouse(tx, warehouse_id).await?;
    ensure_access(actor, &warehouse)?;
    Ok(warehouse)
}

/// The explicit warehouse if given, otherwise the actor's own service-center
/// warehouse. Either way the actor must act for it.
pub async fn resolve_warehouse(
    tx: &mut dyn InventoryTx,
    actor: &Actor,
    warehouse_id: Option<WarehouseId>,
) -> InventoryResult<Warehouse> {
    if let Some(id) = warehouse_id {
        return accessible_warehouse(tx, actor, id).await;
    }
    let sc = actor.service_center_id.ok_or_else(|| {
        DomainError::validation("a warehouse is required for actors without a service center")
    })?;
    let warehouse = tx
        .service_center_warehouse(sc)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("warehouse of service center {sc}")))?;
    ensure_access(actor, &warehouse)?;
    Ok(warehouse)
}

/// Every warehouse the actor may read.
pub async fn visible_warehouses(
    tx: &mut dyn InventoryTx,
    actor: &Actor,
) -> InventoryResult<Vec<Warehouse>> {
    let all = tx.list_warehouses().await?;
    Ok(all.into_iter().filter(|w| can_access(actor, w)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use evwarranty_auth::Role;
    use evwarranty_core::{CompanyId, ServiceCenterId, UserId};

    #[test]
    fn company_actors_reach_every_warehouse_of_their_company() {
        let company = CompanyId::new();
        let sc = ServiceCenterId::new();
        let central = Warehouse::for_company(WarehouseId::new(), "Central", company, true, Utc::now());
        let local = Warehouse::for_service_center(WarehouseId::new(), "SC", sc, company, Utc::now());
        let foreign =
            Warehouse::for_company(WarehouseId::new(), "Other", CompanyId::new(), true, Utc::now());

        let coordinator = Actor::company(UserId::new(), Role::PartsCoordinatorCompany, company);
        assert!(can_access(&coordinator, &central));
        assert!(can_access(&coordinator, &local));
        assert!(!can_access(&coordinator, &foreign));
    }

    #[test]
    fn service_center_actors_only_reach_their_own_center() {
        let company = CompanyId::new();
        let sc = ServiceCenterId::new();
        let local = Warehouse::for_service_center(WarehouseId::new(), "SC", sc, company, Utc::now());
        let central = Warehouse::for_company(WarehouseId::new(), "Central", company, true, Utc::now());

        let manager = Actor::service_center(UserId::new(), Role::ServiceCenterManager, sc, Some(company));
        assert!(can_access(&manager, &local));
        assert!(!can_access(&manager, &central));
        assert_eq!(ensure_access(&manager, &central).unwrap_err().kind(), "unauthorized");
    }
}
