pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::{AvailabilityError, DoctorError};
pub use models::*;
pub use services::*;
