use thiserror::Error;

use crate::{Action, Actor};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("role '{role}' may not perform '{action}'")]
    Forbidden { role: String, action: String },

    #[error("actor has no {0} context")]
    MissingScope(&'static str),
}

/// Check the capability table for `actor.role`.
///
/// - No IO
/// - No panics
/// - No ownership logic (callers check which warehouse the actor acts for)
pub fn authorize(actor: &Actor, action: Action) -> Result<(), AuthzError> {
    if actor.role.can(action) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            role: actor.role.to_string(),
            action: action.to_string(),
        })
    }
}

/// Like [`authorize`], and additionally require the actor to carry the scope
/// its role implies (service center for service-center roles, company for
/// company-side roles).
pub fn authorize_scoped(actor: &Actor, action: Action) -> Result<(), AuthzError> {
    authorize(actor, action)?;
    if actor.role.is_company_side() {
        if actor.company_id.is_none() {
            return Err(AuthzError::MissingScope("company"));
        }
    } else if actor.service_center_id.is_none() {
        return Err(AuthzError::MissingScope("service center"));
    }
    Ok(())
}
