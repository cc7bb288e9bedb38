// Domain-layer modules and shared errors/models
pub mod phone {
    pub use crate::phone::*;
}

pub mod call_models {
    pub use crate::call_models::*;
}

pub mod status_models {
    pub use crate::status_models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
