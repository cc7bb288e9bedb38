// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod call_handler {
    pub use crate::call_handler::*;
}

pub mod status_handler {
    pub use crate::status_handler::*;
}
