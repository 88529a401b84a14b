//! Domain services over the module clients

pub mod auth;
pub mod plans;
pub mod roles;
pub mod tenants;
pub mod tickets;
pub mod users;

pub use auth::AuthService;
pub use plans::PlanService;
pub use roles::RoleService;
pub use tenants::TenantService;
pub use tickets::TicketService;
pub use users::UserService;
