pub mod csrf;
pub mod hash;
pub mod session;
pub mod token;
pub mod verify_session;

pub use session::SessionHandle;
pub use verify_session::verify_session;
