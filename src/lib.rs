pub mod artwork;
pub mod caption;
pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod note;
pub mod render;
pub mod source;
pub mod stage;
pub mod storage;
pub mod ui;
pub mod widget;

pub use error::{AppError, AppResult};
