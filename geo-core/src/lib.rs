pub mod events;
pub mod geo;
pub mod regions;
pub mod room;
pub mod round;

// Re-export main components
pub use events::*;
pub use room::*;
pub use round::*;
