//! What each role may do in the console

use crate::auth::identity::Identity;
use crate::auth::roles::{Role, RoleSet};
use std::fmt;

/// An action a page may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewVehicles,
    CreateVehicles,
    EditVehicles,
    DeleteVehicles,
    LogMovements,
    ViewReports,
    ManageUsers,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::ViewVehicles,
        Capability::CreateVehicles,
        Capability::EditVehicles,
        Capability::DeleteVehicles,
        Capability::LogMovements,
        Capability::ViewReports,
        Capability::ManageUsers,
    ];

    /// Roles required for this capability; `None` means any signed-in operator
    pub fn required_roles(self) -> Option<RoleSet> {
        match self {
            Capability::ViewVehicles | Capability::ViewReports => None,
            Capability::CreateVehicles | Capability::EditVehicles | Capability::LogMovements => {
                Some(RoleSet::of(&[Role::Admin, Role::Editor]))
            }
            Capability::DeleteVehicles | Capability::ManageUsers => Some(RoleSet::of(&[Role::Admin])),
        }
    }

    /// Check whether the identity holds this capability
    pub fn is_granted(self, identity: &Identity) -> bool {
        match self.required_roles() {
            Some(roles) => roles.contains(identity.role()),
            None => true,
        }
    }

    /// All capabilities held by the identity
    pub fn granted_to(identity: &Identity) -> Vec<Capability> {
        Self::ALL
            .iter()
            .copied()
            .filter(|c| c.is_granted(identity))
            .collect()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::ViewVehicles => "view-vehicles",
            Capability::CreateVehicles => "create-vehicles",
            Capability::EditVehicles => "edit-vehicles",
            Capability::DeleteVehicles => "delete-vehicles",
            Capability::LogMovements => "log-movements",
            Capability::ViewReports => "view-reports",
            Capability::ManageUsers => "manage-users",
        };
        write!(f, "{}", name)
    }
}
