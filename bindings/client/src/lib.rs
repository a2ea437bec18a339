mod client;
mod error;
mod models;

pub mod prelude {
    pub use crate::client::{KasmClientConfig, KasmClientInstrumented as KasmClient};
    pub use crate::error::KasmApiError;
    pub use crate::models::Image;
}
