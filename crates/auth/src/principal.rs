use serde::{Deserialize, Serialize};

use evwarranty_core::{CompanyId, ServiceCenterId, UserId};

use crate::Role;

/// The authenticated caller of an inventory operation.
///
/// Produced by the upstream auth layer; this crate only reads it. Service-center
/// roles carry a `service_center_id`; company-side roles carry a `company_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub service_center_id: Option<ServiceCenterId>,
    pub company_id: Option<CompanyId>,
}

impl Actor {
    pub fn service_center(
        user_id: UserId,
        role: Role,
        service_center_id: ServiceCenterId,
        company_id: Option<CompanyId>,
    ) -> Self {
        Self {
            user_id,
            role,
            service_center_id: Some(service_center_id),
            company_id,
        }
    }

    pub fn company(user_id: UserId, role: Role, company_id: CompanyId) -> Self {
        Self {
            user_id,
            role,
            service_center_id: None,
            company_id: Some(company_id),
        }
    }

    pub fn acts_for_service_center(&self, id: ServiceCenterId) -> bool {
        self.service_center_id == Some(id)
    }

    pub fn acts_for_company(&self, id: CompanyId) -> bool {
        self.role.is_company_side() && self.company_id == Some(id)
    }
}
