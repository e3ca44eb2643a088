//! Single-GET web content fetcher with HTML, visible-text and image-source extraction.

mod error;
mod extract;
mod fetcher;

pub use error::FetchError;
pub use extract::{extract_img_sources, render_html, visible_text};
pub use fetcher::{ContentFetcher, FetchConfig, FetchMode, BROWSER_USER_AGENT};
