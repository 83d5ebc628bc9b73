pub mod entitlement;
pub mod handlers;
pub mod password;
pub mod roles;
pub mod session;

pub use entitlement::{is_paid, require_paid};
pub use roles::{has_any_role, Role};
