//! Tile address resolution.
//!
//! Expands a [`TileWindow`] into the ordered list of tile URLs to fetch,
//! together with each tile's offset (in tile units) inside the output canvas.
//!
//! Order is row-major: top row first, left to right within a row.
//!
//! For sharded providers the `{s}` placeholder is replaced by a character
//! drawn uniformly at random from the shard alphabet, independently for each
//! tile. This only spreads client connections over equivalent hosts; it never
//! changes which tile is fetched.

use uuid::Uuid;

use crate::provider::Provider;

use super::window::TileWindow;

/// One tile to fetch and where it goes on the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileAddress {
    /// Column offset from the window's left edge, in tiles
    pub left: u32,

    /// Row offset from the window's top edge, in tiles
    pub top: u32,

    /// Fully resolved fetch URL
    pub url: String,
}

impl TileAddress {
    /// Pixel offset of this tile on a canvas built with `scale`-pixel tiles.
    pub fn pixel_offset(&self, scale: u32) -> (i64, i64) {
        (
            self.left as i64 * scale as i64,
            self.top as i64 * scale as i64,
        )
    }
}

/// Resolve every tile address of `window` for `provider`.
pub fn resolve_tiles(window: &TileWindow, provider: &Provider) -> Vec<TileAddress> {
    iter_tiles(window, provider).collect()
}

/// Lazily yield the tile addresses of `window`, in the same order as
/// [`resolve_tiles`].
pub fn iter_tiles<'a>(
    window: &TileWindow,
    provider: &'a Provider,
) -> impl Iterator<Item = TileAddress> + 'a {
    let window = *window;

    (window.ymin..=window.ymax).flat_map(move |y| {
        (window.xmin..=window.xmax).map(move |x| TileAddress {
            left: x - window.xmin,
            top: y - window.ymin,
            url: tile_url(provider, x, y, window.zoom),
        })
    })
}

/// Substitute coordinates (and a random shard, if any) into the URL template.
pub fn tile_url(provider: &Provider, x: u32, y: u32, zoom: u32) -> String {
    let url = provider
        .url_template
        .replace("{z}", &zoom.to_string())
        .replace("{y}", &y.to_string())
        .replace("{x}", &x.to_string());

    match pick_shard(&provider.shard_alphabet) {
        Some(shard) => url.replace("{s}", &shard.to_string()),
        None => url,
    }
}

/// Draw one character uniformly from the shard alphabet.
fn pick_shard(alphabet: &str) -> Option<char> {
    let count = alphabet.chars().count();
    if count == 0 {
        return None;
    }

    // 122 random bits per v4 UUID
    let index = (Uuid::new_v4().as_u128() % count as u128) as usize;
    alphabet.chars().nth(index)
}

// =============================================================================
// Tests
// =============================================================================
