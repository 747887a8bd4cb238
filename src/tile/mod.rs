//! Tile layer.
//!
//! Everything between a requested map window and a stitched raster:
//!
//! ```text
//! ┌────────────────────┐     ┌────────────────────┐     ┌────────────────────┐
//! │   window           │────▶│   address          │────▶│   fetcher          │
//! │ (normalize box,    │     │ (URL template →    │     │ (HTTP GET with     │
//! │  navigation)       │     │  tile addresses)   │     │  timeout)          │
//! └────────────────────┘     └────────────────────┘     └─────────┬──────────┘
//!                                                                 │
//!                                                                 ▼
//!                                                       ┌────────────────────┐
//!                                                       │   canvas           │
//!                                                       │ (decode, composite │
//!                                                       │  encode PNG)       │
//!                                                       └────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`normalize`] / [`TileWindow`]: clamp requested windows, compute [`Navigation`]
//! - [`resolve_tiles`] / [`iter_tiles`] / [`TileAddress`]: expand a window into fetch URLs and offsets
//! - [`TileFetcher`] / [`HttpTileFetcher`]: obtain raw tile bytes
//! - [`Canvas`] / [`decode_tile`]: composite tiles and encode the result
//!
//! # Example
//!
//! ```
//! use bigmap::tile::{normalize, WindowRequest};
//!
//! // Out-of-range input is corrected, never rejected
//! let window = normalize(WindowRequest::new(3, -2, 1, 40, 3), 0, 18);
//! assert_eq!((window.xmin, window.xmax), (0, 7));
//! ```

mod address;
mod canvas;
mod fetcher;
mod window;

pub use address::{iter_tiles, resolve_tiles, tile_url, TileAddress};
pub use canvas::{decode_tile, Canvas, DEFAULT_MAX_CANVAS_DIMENSION};
pub use fetcher::{HttpTileFetcher, TileFetcher, DEFAULT_FETCH_TIMEOUT};
pub use window::{normalize, tiles_per_side, Navigation, TileWindow, WindowRequest};
