// Request middleware
//
// Provides the signed session cookie that keys results and flash messages

pub mod session;

// Re-export commonly used types
pub use session::{session_middleware, SessionSigner, SESSION_COOKIE};
