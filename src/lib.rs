pub mod app;
pub mod config;
pub mod gemini;
pub mod generate;
pub mod handler;
pub mod logging;
pub mod state;
pub mod tui;
pub mod ui;
pub mod widget;

#[cfg(test)]
mod testing;

pub use app::App;
pub use widget::ChatWidget;
