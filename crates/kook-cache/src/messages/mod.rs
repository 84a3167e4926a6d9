//! Message history windows

mod window;

pub use window::MessageWindow;
