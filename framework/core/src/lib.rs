mod service;
mod shutdown;

pub mod prelude {
    pub use crate::service::{OperationalState, SessionId, SessionService, SessionStatus, UserId};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
