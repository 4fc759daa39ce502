pub mod disk;
pub mod mutate;
pub mod reserve;
pub mod shared;

pub use shared::AppState;
