pub mod error;
pub mod handlers;
pub mod session;

pub use error::{ApiError, ApiResult};
pub use session::AdminSession;
