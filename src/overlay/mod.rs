//! Overlay module
//!
//! The glasses overlay: its scene state, variant catalog and model loading.

pub mod catalog;
pub mod loader;
pub mod model;
pub mod placeholder;
pub mod state;

pub use catalog::{SourceCandidate, Variant, VariantCatalog};
pub use loader::{AssetFetcher, LoadOutcome, LoadState, LoadStates, ModelFetcher, ModelLoader};
pub use model::{ModelAsset, ModelOrigin};
pub use state::OverlayState;
