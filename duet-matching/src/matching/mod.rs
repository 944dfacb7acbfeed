pub mod deck;
pub mod engine;
pub mod filters;
pub mod matches;
pub mod pool;
pub mod registry;

pub use deck::{swipe_top, DeckError, DeckSwipe, SwipeDeck};
pub use engine::{record_swipe, SwipeError, SwipeOutcome};
pub use filters::SinglesFilters;
pub use pool::{build_candidate_pool, load_candidate_pool, load_singles};
pub use registry::DeckRegistry;
