//! Terminal cell: the fundamental unit of the screen buffer.
//!
//! Each cell stores one Unicode scalar plus a packed [`Style`]. The packing
//! mirrors the classic integer-attribute layout used by xterm-compatible
//! engines: 9 bits of background index, 9 bits of foreground index, and a
//! small flag field. Callers never touch the raw bits; [`Style`] exposes
//! typed accessors and hides the packing.

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

use crate::palette::Palette;

bitflags! {
    /// SGR text attribute flags.
    ///
    /// Maps directly to the ECMA-48 SGR parameter values the engine honors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u8 {
        const BOLD      = 1 << 0;
        const UNDERLINE = 1 << 1;
        const BLINK     = 1 << 2;
        const INVERSE   = 1 << 3;
        const INVISIBLE = 1 << 4;
    }
}

/// Palette index meaning "default background".
pub const DEFAULT_BG: u16 = 256;
/// Palette index meaning "default foreground".
pub const DEFAULT_FG: u16 = 257;

/// Packed cell style: background index, foreground index, and flags.
///
/// Layout (low to high): bits 0-8 background (0-255 palette, 256 = default),
/// bits 9-17 foreground (0-255 palette, 257 = default), bits 18-22
/// [`StyleFlags`]. The remaining bits are reserved; bit 31 marks the
/// cursor-overlay pseudo-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Style(u32);

impl Style {
    const COLOR_MASK: u32 = 0x1FF;
    const FG_SHIFT: u32 = 9;
    const FLAG_SHIFT: u32 = 18;
    const OVERLAY_BIT: u32 = 1 << 31;

    /// Default style: default foreground on default background, no flags.
    pub const DEFAULT: Style =
        Style(((DEFAULT_FG as u32) << Self::FG_SHIFT) | DEFAULT_BG as u32);

    /// Cursor-overlay marker. Not a real style: renderers draw the cell under
    /// the cursor as reverse-video of its underlying style when they see it.
    pub const CURSOR_OVERLAY: Style = Style(Self::OVERLAY_BIT);

    /// Build a style from parts. Indices are masked to 9 bits.
    #[must_use]
    pub fn new(fg: u16, bg: u16, flags: StyleFlags) -> Self {
        Style(
            (u32::from(flags.bits()) << Self::FLAG_SHIFT)
                | ((u32::from(fg) & Self::COLOR_MASK) << Self::FG_SHIFT)
                | (u32::from(bg) & Self::COLOR_MASK),
        )
    }

    /// Foreground palette index (257 = default).
    #[must_use]
    pub fn fg(self) -> u16 {
        ((self.0 >> Self::FG_SHIFT) & Self::COLOR_MASK) as u16
    }

    /// Background palette index (256 = default).
    #[must_use]
    pub fn bg(self) -> u16 {
        (self.0 & Self::COLOR_MASK) as u16
    }

    /// Attribute flags.
    #[must_use]
    pub fn flags(self) -> StyleFlags {
        StyleFlags::from_bits_truncate((self.0 >> Self::FLAG_SHIFT) as u8)
    }

    /// Copy of this style with a different foreground.
    #[must_use]
    pub fn with_fg(self, fg: u16) -> Self {
        Self::new(fg, self.bg(), self.flags())
    }

    /// Copy of this style with a different background.
    #[must_use]
    pub fn with_bg(self, bg: u16) -> Self {
        Self::new(self.fg(), bg, self.flags())
    }

    /// Copy of this style with `flag` set or cleared.
    #[must_use]
    pub fn with_flag(self, flag: StyleFlags, on: bool) -> Self {
        let mut flags = self.flags();
        flags.set(flag, on);
        Self::new(self.fg(), self.bg(), flags)
    }

    /// The style used by erase operations: default background, current
    /// foreground, no flags.
    #[must_use]
    pub fn erased(self) -> Self {
        Self::new(self.fg(), DEFAULT_BG, StyleFlags::empty())
    }

    /// Whether this is the cursor-overlay marker rather than a real style.
    #[must_use]
    pub fn is_cursor_overlay(self) -> bool {
        self.0 & Self::OVERLAY_BIT != 0
    }
}

impl Default for Style {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A single cell: one Unicode scalar plus its style.
///
/// Wide glyphs occupy two adjacent cells; the first holds the glyph, the
/// second a space with the same style. The screen keeps the pair together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Cell {
    /// Create a cell with the given character and style.
    #[must_use]
    pub fn new(ch: char, style: Style) -> Self {
        Self { ch, style }
    }

    /// A blank (space) cell carrying `style`.
    #[must_use]
    pub fn blank(style: Style) -> Self {
        Self { ch: ' ', style }
    }

    /// Display width of this cell's character in columns (0, 1, or 2).
    #[must_use]
    pub fn width(&self) -> u8 {
        display_width(self.ch)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank(Style::DEFAULT)
    }
}

/// Display width of a scalar in terminal columns.
///
/// Control characters and combining marks report 0; CJK and other fullwidth
/// ranges report 2.
#[must_use]
pub fn display_width(ch: char) -> u8 {
    match UnicodeWidthChar::width(ch) {
        Some(w) => w.min(2) as u8,
        None => 0,
    }
}

/// Apply a sequence of SGR parameters to `current`, producing the new style.
///
/// Covers the classic subset: reset, bold/underline/blink/inverse/invisible
/// and their clears, 8/16-color foreground and background, `38;5`/`48;5`
/// indexed color, and `38;2`/`48;2` direct color folded to the nearest
/// palette entry. Unknown parameters are traced and skipped. An empty
/// parameter list resets to default, as does a lone `0`.
pub fn apply_sgr(params: &[u16], current: Style, palette: &mut Palette) -> Style {
    if params.is_empty() {
        return Style::DEFAULT;
    }
    let mut style = current;
    let mut i = 0;
    while i < params.len() {
        let p = params[i];
        match p {
            0 => style = Style::DEFAULT,
            1 => style = style.with_flag(StyleFlags::BOLD, true),
            4 => style = style.with_flag(StyleFlags::UNDERLINE, true),
            5 => style = style.with_flag(StyleFlags::BLINK, true),
            7 => style = style.with_flag(StyleFlags::INVERSE, true),
            8 => style = style.with_flag(StyleFlags::INVISIBLE, true),
            22 => style = style.with_flag(StyleFlags::BOLD, false),
            24 => style = style.with_flag(StyleFlags::UNDERLINE, false),
            25 => style = style.with_flag(StyleFlags::BLINK, false),
            27 => style = style.with_flag(StyleFlags::INVERSE, false),
            28 => style = style.with_flag(StyleFlags::INVISIBLE, false),
            30..=37 => style = style.with_fg(p - 30),
            39 => style = style.with_fg(DEFAULT_FG),
            40..=47 => style = style.with_bg(p - 40),
            49 => style = style.with_bg(DEFAULT_BG),
            90..=97 => style = style.with_fg(p - 90 + 8),
            100..=107 => style = style.with_bg(p - 100 + 8),
            38 | 48 => {
                let (index, consumed) = extended_color(&params[i..], palette);
                if let Some(idx) = index {
                    style = if p == 38 {
                        style.with_fg(idx)
                    } else {
                        style.with_bg(idx)
                    };
                }
                i += consumed;
                continue;
            }
            other => {
                tracing::debug!(param = other, "skipping unknown SGR parameter");
            }
        }
        i += 1;
    }
    style
}

/// Resolve a `38;...`/`48;...` extended color clause.
///
/// Returns the palette index (if any) and the number of parameters consumed,
/// counting the introducer itself.
fn extended_color(params: &[u16], palette: &mut Palette) -> (Option<u16>, usize) {
    match params.get(1) {
        Some(5) => {
            let idx = params.get(2).copied().unwrap_or(0).min(255);
            (Some(idx), 3.min(params.len()))
        }
        Some(2) => {
            let r = params.get(2).copied().unwrap_or(0).min(255) as u8;
            let g = params.get(3).copied().unwrap_or(0).min(255) as u8;
            let b = params.get(4).copied().unwrap_or(0).min(255) as u8;
            (Some(palette.nearest(r, g, b)), 5.min(params.len()))
        }
        _ => {
            // Only the introducer is consumed; whatever follows is
            // interpreted as ordinary parameters.
            tracing::debug!(introducer = params[0], "malformed extended SGR color");
            (None, 1)
        }
    }
}
