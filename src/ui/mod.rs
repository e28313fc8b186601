mod preview_canvas;

pub use preview_canvas::{load_photo_file, PreviewCanvas};
