//! 256-color palette and direct-color folding.
//!
//! The palette is the standard xterm layout: 16 named colors (replaceable at
//! construction), a 6x6x6 color cube, and a 24-step greyscale ramp. Direct
//! (`38;2;r;g;b`) colors are folded onto the nearest palette entry using the
//! perception-weighted distance `30²·Δr² + 59²·Δg² + 11²·Δb²`; results are
//! memoized since applications tend to reuse a small set of colors.

use std::collections::HashMap;

/// One palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Create an entry from components.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create an entry from a `0xRRGGBB` literal.
    #[must_use]
    pub const fn hex(value: u32) -> Self {
        Self {
            r: ((value >> 16) & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: (value & 0xFF) as u8,
        }
    }
}

/// The default 16 named colors (xterm values).
const NAMED_16: [Rgb; 16] = [
    Rgb::hex(0x000000),
    Rgb::hex(0xcd0000),
    Rgb::hex(0x00cd00),
    Rgb::hex(0xcdcd00),
    Rgb::hex(0x0000ee),
    Rgb::hex(0xcd00cd),
    Rgb::hex(0x00cdcd),
    Rgb::hex(0xe5e5e5),
    Rgb::hex(0x7f7f7f),
    Rgb::hex(0xff0000),
    Rgb::hex(0x00ff00),
    Rgb::hex(0xffff00),
    Rgb::hex(0x5c5cff),
    Rgb::hex(0xff00ff),
    Rgb::hex(0x00ffff),
    Rgb::hex(0xffffff),
];

/// Channel levels of the 6x6x6 cube.
const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// 256-entry color palette with a nearest-match cache.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: [Rgb; 256],
    nearest_cache: HashMap<u32, u16>,
}

impl Palette {
    /// Build the default palette.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(&[])
    }

    /// Build a palette whose first entries are replaced by `seed`.
    ///
    /// At most 16 seed colors are applied; the cube and greyscale ramp are
    /// always the standard values.
    #[must_use]
    pub fn with_seed(seed: &[Rgb]) -> Self {
        let mut colors = [Rgb::new(0, 0, 0); 256];
        colors[..16].copy_from_slice(&NAMED_16);
        for (slot, color) in colors.iter_mut().take(16).zip(seed) {
            *slot = *color;
        }
        for i in 0..216 {
            colors[16 + i] = Rgb::new(
                CUBE_LEVELS[i / 36],
                CUBE_LEVELS[(i / 6) % 6],
                CUBE_LEVELS[i % 6],
            );
        }
        for i in 0..24u16 {
            let v = (8 + 10 * i) as u8;
            colors[232 + i as usize] = Rgb::new(v, v, v);
        }
        Self {
            colors,
            nearest_cache: HashMap::new(),
        }
    }

    /// Look up a palette entry. `None` for the default-color sentinels
    /// (256, 257) and anything else out of range.
    #[must_use]
    pub fn color(&self, index: u16) -> Option<Rgb> {
        self.colors.get(usize::from(index)).copied()
    }

    /// Index of the palette entry nearest to `(r, g, b)`.
    pub fn nearest(&mut self, r: u8, g: u8, b: u8) -> u16 {
        let key = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
        if let Some(&hit) = self.nearest_cache.get(&key) {
            return hit;
        }
        let mut best = 0u16;
        let mut best_dist = u64::MAX;
        for (i, c) in self.colors.iter().enumerate() {
            let dist = weighted_distance(*c, r, g, b);
            if dist < best_dist {
                best_dist = dist;
                best = i as u16;
                if dist == 0 {
                    break;
                }
            }
        }
        self.nearest_cache.insert(key, best);
        best
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

fn weighted_distance(c: Rgb, r: u8, g: u8, b: u8) -> u64 {
    let dr = i64::from(c.r) - i64::from(r);
    let dg = i64::from(c.g) - i64::from(g);
    let db = i64::from(c.b) - i64::from(b);
    (30 * 30 * dr * dr + 59 * 59 * dg * dg + 11 * 11 * db * db) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_cube_and_greyscale_layout() {
        let pal = Palette::new();
        assert_eq!(pal.color(0), Some(Rgb::hex(0x000000)));
        assert_eq!(pal.color(15), Some(Rgb::hex(0xffffff)));
        // First cube entry is black, last is white.
        assert_eq!(pal.color(16), Some(Rgb::new(0, 0, 0)));
        assert_eq!(pal.color(231), Some(Rgb::new(255, 255, 255)));
        // Greyscale ramp: 8, 18, ... 238.
        assert_eq!(pal.color(232), Some(Rgb::new(8, 8, 8)));
        assert_eq!(pal.color(255), Some(Rgb::new(238, 238, 238)));
    }

    #[test]
    fn sentinel_indices_have_no_entry() {
        let pal = Palette::new();
        assert_eq!(pal.color(256), None);
        assert_eq!(pal.color(257), None);
    }

    #[test]
    fn seed_overrides_named_colors_only() {
        let seed = [Rgb::new(1, 2, 3), Rgb::new(4, 5, 6)];
        let pal = Palette::with_seed(&seed);
        assert_eq!(pal.color(0), Some(Rgb::new(1, 2, 3)));
        assert_eq!(pal.color(1), Some(Rgb::new(4, 5, 6)));
        assert_eq!(pal.color(2), Some(NAMED_16[2]));
        assert_eq!(pal.color(16), Some(Rgb::new(0, 0, 0)));
    }

    #[test]
    fn nearest_finds_exact_entries() {
        let mut pal = Palette::new();
        for idx in [0u16, 9, 21, 46, 196, 232, 255] {
            let c = pal.color(idx).unwrap();
            let found = pal.nearest(c.r, c.g, c.b);
            let found_c = pal.color(found).unwrap();
            assert_eq!(found_c, c, "index {idx} resolved to {found}");
        }
    }

    #[test]
    fn nearest_weighs_green_heaviest() {
        let mut pal = Palette::new();
        // A green-ish grey should snap toward the entry with the closest
        // green channel; weighted distance makes green errors 5x costlier
        // than blue errors.
        let idx = pal.nearest(128, 135, 128);
        let c = pal.color(idx).unwrap();
        assert_eq!(c.g, 135);
    }

    #[test]
    fn nearest_is_cached_and_stable() {
        let mut pal = Palette::new();
        let a = pal.nearest(17, 99, 203);
        let b = pal.nearest(17, 99, 203);
        assert_eq!(a, b);
    }
}
