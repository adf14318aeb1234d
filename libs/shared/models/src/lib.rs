pub mod auth;
pub mod error;

pub use auth::{JwtClaims, TokenResponse, User, UserRole};
pub use error::{AppError, DomainError, ErrorKind};
