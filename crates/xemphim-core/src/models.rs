pub mod episode;
pub mod notification;
pub mod theme;

pub use episode::*;
pub use notification::*;
pub use theme::*;
