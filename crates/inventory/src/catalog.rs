//! Reference data: warehouses and the component catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use evwarranty_core::{
    CompanyId, DomainError, DomainResult, ServiceCenterId, TypeComponentId, WarehouseId,
};

/// Who owns a warehouse.
///
/// Service-center warehouses also record the company the service center works
/// for, so company-side staff can see them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarehouseOwner {
    Company {
        company_id: CompanyId,
    },
    ServiceCenter {
        service_center_id: ServiceCenterId,
        company_id: CompanyId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub owner: WarehouseOwner,
    /// The company's restock source. Only meaningful for company-owned warehouses.
    pub is_central: bool,
    pub created_at: DateTime<Utc>,
}

impl Warehouse {
    pub fn for_company(
        id: WarehouseId,
        name: impl Into<String>,
        company_id: CompanyId,
        is_central: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            owner: WarehouseOwner::Company { company_id },
            is_central,
            created_at,
        }
    }

    pub fn for_service_center(
        id: WarehouseId,
        name: impl Into<String>,
        service_center_id: ServiceCenterId,
        company_id: CompanyId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            owner: WarehouseOwner::ServiceCenter {
                service_center_id,
                company_id,
            },
            is_central: false,
            created_at,
        }
    }

    pub fn company_id(&self) -> CompanyId {
        match self.owner {
            WarehouseOwner::Company { company_id } => company_id,
            WarehouseOwner::ServiceCenter { company_id, .. } => company_id,
        }
    }

    pub fn service_center_id(&self) -> Option<ServiceCenterId> {
        match self.owner {
            WarehouseOwner::Company { .. } => None,
            WarehouseOwner::ServiceCenter {
                service_center_id, ..
            } => Some(service_center_id),
        }
    }
}

/// Catalog entry describing a component kind. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeComponent {
    pub id: TypeComponentId,
    pub sku: String,
    pub name: String,
    pub category: String,
    /// Unit price in minor currency units.
    pub price_cents: i64,
}

impl TypeComponent {
    pub fn new(
        id: TypeComponentId,
        sku: &str,
        name: impl Into<String>,
        category: impl Into<String>,
        price_cents: i64,
    ) -> DomainResult<Self> {
        let sku = normalize_sku(sku)
            .ok_or_else(|| DomainError::validation("sku cannot be empty"))?;
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if price_cents < 0 {
            return Err(DomainError::validation("price cannot be negative"));
        }
        Ok(Self {
            id,
            sku,
            name,
            category: category.into(),
            price_cents,
        })
    }
}

/// SKUs are compared trimmed and upper-cased.
pub fn normalize_sku(sku: &str) -> Option<String> {
    let sku = sku.trim();
    if sku.is_empty() {
        None
    } else {
        Some(sku.to_ascii_uppercase())
    }
}
