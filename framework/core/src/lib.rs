mod clock;
mod shutdown;

pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, TokioClock};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
