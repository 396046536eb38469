pub mod assets;
pub mod draw;
pub mod layout;
pub mod mock;
pub mod story;

pub use assets::StoryAssets;
pub use layout::{CompositionLayout, StoryDesign, TextAlign};
pub use story::StoryComposer;
