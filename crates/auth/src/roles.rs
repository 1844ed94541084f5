use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role identifier used for RBAC.
///
/// Closed set: the upstream auth layer hands us one of these strings and
/// anything else is rejected at parse time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    EmvAdmin,
    EmvStaff,
    PartsCoordinatorCompany,
    PartsCoordinatorServiceCenter,
    ServiceCenterManager,
    ServiceCenterStaff,
    ServiceCenterTechnician,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::EmvAdmin,
        Role::EmvStaff,
        Role::PartsCoordinatorCompany,
        Role::PartsCoordinatorServiceCenter,
        Role::ServiceCenterManager,
        Role::ServiceCenterStaff,
        Role::ServiceCenterTechnician,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::EmvAdmin => "emv_admin",
            Role::EmvStaff => "emv_staff",
            Role::PartsCoordinatorCompany => "parts_coordinator_company",
            Role::PartsCoordinatorServiceCenter => "parts_coordinator_service_center",
            Role::ServiceCenterManager => "service_center_manager",
            Role::ServiceCenterStaff => "service_center_staff",
            Role::ServiceCenterTechnician => "service_center_technician",
        }
    }

    /// Company-side roles act on behalf of a vehicle company and see every
    /// warehouse that company owns, including its service centers'.
    pub fn is_company_side(&self) -> bool {
        matches!(
            self,
            Role::EmvAdmin | Role::EmvStaff | Role::PartsCoordinatorCompany
        )
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_name() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn rejects_unknown_roles() {
        assert_eq!(
            "super_user".parse::<Role>(),
            Err(UnknownRole("super_user".to_string()))
        );
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&Role::PartsCoordinatorServiceCenter).unwrap();
        assert_eq!(json, "\"parts_coordinator_service_center\"");
    }
}
