use serde::{Deserialize, Serialize};

use crate::Role;

/// An operation of the inventory core that is subject to a role check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewInventory,
    ManageReorderPoints,
    ReserveComponents,
    PickUpComponents,
    InstallComponents,
    CancelReservations,
    AdjustStock,
    RequestTransfer,
    ApproveTransfer,
    RejectTransfer,
    ShipTransfer,
    ReceiveTransfer,
    CancelTransfer,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ViewInventory => "inventory.view",
            Action::ManageReorderPoints => "inventory.reorder_points.manage",
            Action::ReserveComponents => "inventory.reservations.create",
            Action::PickUpComponents => "inventory.reservations.pick_up",
            Action::InstallComponents => "inventory.reservations.install",
            Action::CancelReservations => "inventory.reservations.cancel",
            Action::AdjustStock => "inventory.adjustments.create",
            Action::RequestTransfer => "inventory.transfers.request",
            Action::ApproveTransfer => "inventory.transfers.approve",
            Action::RejectTransfer => "inventory.transfers.reject",
            Action::ShipTransfer => "inventory.transfers.ship",
            Action::ReceiveTransfer => "inventory.transfers.receive",
            Action::CancelTransfer => "inventory.transfers.cancel",
        }
    }

    /// Roles allowed to perform this action. Ownership is checked separately.
    pub fn allowed_roles(&self) -> &'static [Role] {
        use Role::*;
        match self {
            Action::ViewInventory => &Role::ALL,
            Action::ManageReorderPoints => &[
                EmvAdmin,
                PartsCoordinatorCompany,
                PartsCoordinatorServiceCenter,
                ServiceCenterManager,
            ],
            Action::ReserveComponents | Action::CancelReservations => &[
                ServiceCenterManager,
                ServiceCenterStaff,
                PartsCoordinatorServiceCenter,
            ],
            Action::PickUpComponents => &[
                ServiceCenterTechnician,
                PartsCoordinatorServiceCenter,
                ServiceCenterManager,
            ],
            Action::InstallComponents => &[ServiceCenterTechnician, ServiceCenterManager],
            Action::AdjustStock => &[
                EmvAdmin,
                PartsCoordinatorCompany,
                PartsCoordinatorServiceCenter,
                ServiceCenterManager,
            ],
            Action::RequestTransfer | Action::ReceiveTransfer => &[
                ServiceCenterManager,
                ServiceCenterStaff,
                PartsCoordinatorServiceCenter,
            ],
            Action::ApproveTransfer | Action::RejectTransfer => {
                &[EmvAdmin, EmvStaff, PartsCoordinatorCompany]
            }
            Action::ShipTransfer => &[
                EmvAdmin,
                EmvStaff,
                PartsCoordinatorCompany,
                PartsCoordinatorServiceCenter,
                ServiceCenterManager,
            ],
            Action::CancelTransfer => &[
                ServiceCenterManager,
                ServiceCenterStaff,
                PartsCoordinatorServiceCenter,
                EmvAdmin,
            ],
        }
    }
}

impl Role {
    pub fn can(&self, action: Action) -> bool {
        action.allowed_roles().contains(self)
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
