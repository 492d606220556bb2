pub mod embedded;
pub mod loader;
pub mod manifest;

pub use loader::{list_genres, load_reference};
pub use manifest::{
    BandReference, GenreReference, MetricTarget, ResolvedTarget, SeverityConfig,
    SuggestionConfig,
};
