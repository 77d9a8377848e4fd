mod account;
mod database;
mod jwt;
mod user;

pub use account::AccountService;
pub use database::{Database, MockUserStore, UserListQuery, UserStore};
pub use jwt::{JwtService, TokenClaims, TokenType};
pub use user::UserService;
