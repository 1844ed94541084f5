//! `evwarranty-auth` — role capability checks for the inventory core.
//!
//! Authentication itself happens upstream; this crate only answers "may this
//! actor perform this action". It is decoupled from HTTP and storage.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, authorize_scoped};
pub use permissions::Action;
pub use principal::Actor;
pub use roles::{Role, UnknownRole};
