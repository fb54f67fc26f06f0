/// Roles and privilege administration
///
/// Holds the role model, the admin-application workflow and the
/// developer-only role management operations.

pub mod accounts;
pub mod applications;
pub mod roles;

pub use accounts::RoleAdministration;
pub use applications::{
    AdminApplication, ApplicationStatus, ApplyRequest, ElevationWorkflow,
    RejectApplicationRequest,
};
pub use roles::{Role, RoleSet};
