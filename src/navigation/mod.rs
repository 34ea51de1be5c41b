//! Slide navigation
//!
//! Ordered walk over Title, chapter overviews, verses and the Conclusion.
//! The navigator is pure; side effects (stopping audio, resetting autoplay)
//! are applied by the app controller before a planned transition is applied.

pub mod state;

pub use state::{
    NavigationError, NavigationEvent, Navigator, Position, TransitionReason, TransitionResult,
    View,
};
