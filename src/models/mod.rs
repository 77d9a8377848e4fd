pub mod user;

pub use user::{validate_permissions, Permission, User, UserResponse, FILTER_FIELDS, SORT_FIELDS};
