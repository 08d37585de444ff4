mod health;
mod index;

pub use health::{HealthResponse, health_check, memory};
pub use index::{echo, index};
