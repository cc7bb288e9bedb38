//! External service integrations.

pub mod call_service_client {
    pub use crate::call_service_client::*;
}

pub mod lead_platform_client {
    pub use crate::lead_platform_client::*;
}
