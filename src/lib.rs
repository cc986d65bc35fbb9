pub mod api;
pub mod card;
pub mod carousel;
pub mod placement;
pub mod preview;
pub mod schedule;

#[cfg(target_arch = "wasm32")]
pub mod frontend;

#[cfg(not(target_arch = "wasm32"))]
pub mod server;
