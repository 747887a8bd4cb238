//! Tile window normalization and map navigation.
//!
//! A [`TileWindow`] is an inclusive box of tile coordinates at one zoom level.
//! Every window that reaches the job queue has gone through [`normalize`],
//! which silently corrects out-of-range input instead of rejecting it:
//!
//! 1. zoom is clamped to the provider's `[min_zoom, max_zoom]`
//! 2. all coordinates are clamped to `[0, 2^zoom - 1]`
//! 3. an inverted box collapses to a single column/row at its lower bound
//!
//! The same rules decide which navigation windows (expand, shift, shrink,
//! zoom) exist for a window: a move that would leave the map yields `None`.

use serde::{Deserialize, Serialize};

// =============================================================================
// Window Types
// =============================================================================

/// A requested, not yet validated window. Values may be negative or inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowRequest {
    pub zoom: i64,
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

impl WindowRequest {
    /// Create a window request.
    pub fn new(zoom: i64, xmin: i64, ymin: i64, xmax: i64, ymax: i64) -> Self {
        Self {
            zoom,
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

/// A normalized, inclusive tile window.
///
/// Invariant: `xmin <= xmax`, `ymin <= ymax`, all within `[0, 2^zoom - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileWindow {
    pub zoom: u32,
    pub xmin: u32,
    pub ymin: u32,
    pub xmax: u32,
    pub ymax: u32,
}

/// Number of tiles along one side of the map at `zoom`.
#[inline]
pub fn tiles_per_side(zoom: u32) -> u64 {
    1u64 << zoom.min(62)
}

/// Clamp a requested window to a provider's zoom range and the map bounds.
pub fn normalize(request: WindowRequest, min_zoom: u32, max_zoom: u32) -> TileWindow {
    let zoom = request.zoom.min(max_zoom as i64).max(min_zoom as i64).max(0) as u32;
    let last = tiles_per_side(zoom) as i64 - 1;

    let xmin = request.xmin.clamp(0, last);
    let ymin = request.ymin.clamp(0, last);
    let xmax = request.xmax.min(last).max(xmin);
    let ymax = request.ymax.min(last).max(ymin);

    TileWindow {
        zoom,
        xmin: xmin as u32,
        ymin: ymin as u32,
        xmax: xmax as u32,
        ymax: ymax as u32,
    }
}

impl TileWindow {
    /// Width of the window in tiles.
    pub fn width_tiles(&self) -> u32 {
        self.xmax - self.xmin + 1
    }

    /// Height of the window in tiles.
    pub fn height_tiles(&self) -> u32 {
        self.ymax - self.ymin + 1
    }

    /// Total number of tiles in the window.
    pub fn tile_count(&self) -> u64 {
        self.width_tiles() as u64 * self.height_tiles() as u64
    }

    /// Canvas size in pixels for a given tile scale.
    pub fn pixel_size(&self, scale: u32) -> (u64, u64) {
        (
            self.width_tiles() as u64 * scale as u64,
            self.height_tiles() as u64 * scale as u64,
        )
    }

    /// Compute all navigation windows reachable from this window.
    pub fn navigation(&self, min_zoom: u32, max_zoom: u32) -> Navigation {
        let z = self.zoom as i64;
        let (x0, y0, x1, y1) = (
            self.xmin as i64,
            self.ymin as i64,
            self.xmax as i64,
            self.ymax as i64,
        );
        let last = tiles_per_side(self.zoom) as i64 - 1;
        let w = x1 - x0;
        let h = y1 - y0;

        let target = |blocked: bool, zoom: i64, xmin: i64, ymin: i64, xmax: i64, ymax: i64| {
            if blocked {
                None
            } else {
                Some(normalize(
                    WindowRequest::new(zoom, xmin, ymin, xmax, ymax),
                    min_zoom,
                    max_zoom,
                ))
            }
        };

        let at_left = x0 == 0;
        let at_right = x1 >= last;
        let at_top = y0 == 0;
        let at_bottom = y1 >= last;
        let single_column = x0 == x1;
        let single_row = y0 == y1;
        let at_max_zoom = self.zoom >= max_zoom;
        let at_min_zoom = self.zoom <= min_zoom;

        Navigation {
            expand_left: target(at_left, z, x0 - 1, y0, x1, y1),
            expand_right: target(at_right, z, x0, y0, x1 + 1, y1),
            expand_top: target(at_top, z, x0, y0 - 1, x1, y1),
            expand_bottom: target(at_bottom, z, x0, y0, x1, y1 + 1),

            shift_left: target(at_left, z, x0 - 1, y0, x1 - 1, y1),
            shift_right: target(at_right, z, x0 + 1, y0, x1 + 1, y1),
            shift_top: target(at_top, z, x0, y0 - 1, x1, y1 - 1),
            shift_bottom: target(at_bottom, z, x0, y0 + 1, x1, y1 + 1),

            shrink_left: target(single_column, z, x0 + 1, y0, x1, y1),
            shrink_right: target(single_column, z, x0, y0, x1 - 1, y1),
            shrink_top: target(single_row, z, x0, y0 + 1, x1, y1),
            shrink_bottom: target(single_row, z, x0, y0, x1, y1 - 1),

            zoom_in_double: target(at_max_zoom, z + 1, x0 * 2, y0 * 2, x1 * 2 + 1, y1 * 2 + 1),
            zoom_in_keep: target(
                at_max_zoom,
                z + 1,
                x0 * 2 + w / 2,
                y0 * 2 + h / 2,
                x1 * 2 - w / 2,
                y1 * 2 - h / 2,
            ),
            zoom_out_half: target(at_min_zoom, z - 1, x0 / 2, y0 / 2, x1 / 2, y1 / 2),
            zoom_out_keep: target(
                at_min_zoom,
                z - 1,
                x0 / 2 - w / 4,
                y0 / 2 - h / 4,
                x1 / 2 + w / 4,
                y1 / 2 + h / 4,
            ),
        }
    }
}

// =============================================================================
// Navigation
// =============================================================================

/// Windows reachable from a map view. `None` marks a move that is not possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub expand_left: Option<TileWindow>,
    pub expand_right: Option<TileWindow>,
    pub expand_top: Option<TileWindow>,
    pub expand_bottom: Option<TileWindow>,

    pub shift_left: Option<TileWindow>,
    pub shift_right: Option<TileWindow>,
    pub shift_top: Option<TileWindow>,
    pub shift_bottom: Option<TileWindow>,

    pub shrink_left: Option<TileWindow>,
    pub shrink_right: Option<TileWindow>,
    pub shrink_top: Option<TileWindow>,
    pub shrink_bottom: Option<TileWindow>,

    /// One zoom level in, covering the same area
    pub zoom_in_double: Option<TileWindow>,
    /// One zoom level in, keeping the centre and tile extent
    pub zoom_in_keep: Option<TileWindow>,
    /// One zoom level out, covering the same area
    pub zoom_out_half: Option<TileWindow>,
    /// One zoom level out, keeping the centre and tile extent
    pub zoom_out_keep: Option<TileWindow>,
}

// =============================================================================
// Tests
// =============================================================================
