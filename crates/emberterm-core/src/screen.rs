//! Screen state: cursor, scroll region, tab stops, charset banks, and the
//! alternate buffer.
//!
//! `Screen` owns the [`ScreenBuffer`] and implements every mutation the
//! parser dispatches: printing with wrap/insert/wide-glyph handling, erases,
//! line and character edits, scrolling, and the one-level alternate-screen
//! swap. Cursor coordinates are viewport-relative; `x` may rest at `cols`
//! after printing into the last column (deferred wrap) and the next printable
//! or carriage return resolves it.

use std::collections::{BTreeSet, VecDeque};

use crate::buffer::{Row, ScreenBuffer};
use crate::cell::{display_width, Cell, Style};
use crate::charset::Charset;
use crate::modes::Modes;

/// Primary-screen snapshot captured on entering the alternate buffer.
///
/// The save is shallow on purpose: geometry, lines, cursor, scroll region and
/// tab stops round-trip; the current style, charset banks and shift level are
/// deliberately left live across the swap.
#[derive(Debug, Clone)]
struct AltSnapshot {
    lines: VecDeque<Row>,
    ybase: usize,
    ydisp: usize,
    x: u16,
    y: u16,
    scroll_top: u16,
    scroll_bottom: u16,
    tabs: BTreeSet<u16>,
}

/// The terminal screen: buffer plus all modal cursor state.
#[derive(Debug, Clone)]
pub struct Screen {
    buf: ScreenBuffer,
    pub modes: Modes,
    x: u16,
    y: u16,
    saved_x: u16,
    saved_y: u16,
    scroll_top: u16,
    scroll_bottom: u16,
    tabs: BTreeSet<u16>,
    charsets: [Charset; 4],
    glevel: usize,
    style: Style,
    alt: Option<AltSnapshot>,
}

impl Screen {
    /// Create a blank screen. `cols` and `rows` must already be clamped to
    /// at least 1 by the caller.
    #[must_use]
    pub fn new(cols: u16, rows: u16, scrollback: usize, physical_scroll: bool, convert_eol: bool) -> Self {
        Self {
            buf: ScreenBuffer::new(cols, rows, scrollback, physical_scroll),
            modes: Modes::new(convert_eol),
            x: 0,
            y: 0,
            saved_x: 0,
            saved_y: 0,
            scroll_top: 0,
            scroll_bottom: rows - 1,
            tabs: default_tabs(cols),
            charsets: [Charset::Us; 4],
            glevel: 0,
            style: Style::DEFAULT,
            alt: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn cols(&self) -> u16 {
        self.buf.cols()
    }

    pub fn rows(&self) -> u16 {
        self.buf.rows()
    }

    /// Cursor position `(x, y)`; `x` may equal `cols` at the wrap margin.
    pub fn cursor(&self) -> (u16, u16) {
        (self.x, self.y)
    }

    pub fn scroll_top(&self) -> u16 {
        self.scroll_top
    }

    pub fn scroll_bottom(&self) -> u16 {
        self.scroll_bottom
    }

    /// Current SGR style applied to printed cells.
    pub fn style(&self) -> Style {
        self.style
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    /// Whether the alternate buffer is active.
    pub fn is_alt(&self) -> bool {
        self.alt.is_some()
    }

    pub fn buffer(&self) -> &ScreenBuffer {
        &self.buf
    }

    pub fn buffer_mut(&mut self) -> &mut ScreenBuffer {
        &mut self.buf
    }

    /// Erase style derived from the current SGR state.
    fn erase_style(&self) -> Style {
        self.style.erased()
    }

    // ── Printing ────────────────────────────────────────────────────

    /// Print one character through the active charset.
    pub fn print(&mut self, ch: char) {
        let mapped = self.charsets[self.glevel].map(ch);
        self.put_char(mapped);
    }

    /// Place an already-translated glyph at the cursor.
    fn put_char(&mut self, ch: char) {
        let width = display_width(ch);
        if width == 0 {
            return;
        }
        let cols = self.cols();

        // Resolve a deferred wrap from a previous print into the last column.
        if self.x >= cols {
            if self.modes.wraparound {
                self.x = 0;
                self.index_down();
            } else {
                self.x = cols - 1;
            }
        }

        // A wide glyph that cannot fit before the margin wraps early.
        if width == 2 && self.x + 1 >= cols {
            if self.modes.wraparound && cols >= 2 {
                self.x = 0;
                self.index_down();
            } else {
                let style = self.erase_style();
                let y = self.y;
                if let Some(cell) = self.buf.row_mut(y).cell_mut(cols - 1) {
                    *cell = Cell::blank(style);
                }
                self.buf.mark_dirty(y);
                return;
            }
        }

        let (x, y, style) = (self.x, self.y, self.style);
        if self.modes.insert {
            let row = self.buf.row_mut(y);
            for _ in 0..width {
                row.insert_blank(x, style);
            }
        }
        let row = self.buf.row_mut(y);
        if let Some(cell) = row.cell_mut(x) {
            *cell = Cell::new(ch, style);
        }
        if width == 2 {
            if let Some(cell) = row.cell_mut(x + 1) {
                *cell = Cell::blank(style);
            }
        }
        self.buf.mark_dirty(y);
        self.x += u16::from(width);
    }

    /// REP: repeat the character left of the cursor `n` times.
    pub fn repeat_preceding(&mut self, n: u16) {
        let x = self.x.min(self.cols());
        if x == 0 {
            return;
        }
        let Some(cell) = self.buf.row(self.y).and_then(|r| r.cell(x - 1)) else {
            return;
        };
        let ch = cell.ch;
        for _ in 0..n.max(1) {
            self.put_char(ch);
        }
    }

    // ── Control characters ──────────────────────────────────────────

    pub fn carriage_return(&mut self) {
        self.x = 0;
    }

    /// LF/VT/FF: move down, scrolling at the region bottom. Honors the
    /// convert-eol option by also returning the carriage.
    pub fn line_feed(&mut self) {
        if self.modes.convert_eol {
            self.x = 0;
        }
        self.index_down();
    }

    pub fn backspace(&mut self) {
        if self.x > 0 {
            self.x = self.x.min(self.cols()) - 1;
        }
    }

    pub fn tab(&mut self) {
        self.x = self.next_stop(self.x);
    }

    /// CHT: advance `n` tab stops.
    pub fn tab_forward(&mut self, n: u16) {
        for _ in 0..n.max(1) {
            self.x = self.next_stop(self.x);
        }
    }

    /// CBT: back up `n` tab stops.
    pub fn tab_backward(&mut self, n: u16) {
        for _ in 0..n.max(1) {
            self.x = self.prev_stop(self.x);
        }
    }

    fn next_stop(&self, from: u16) -> u16 {
        let cols = self.cols();
        let mut x = from;
        loop {
            x += 1;
            if x >= cols {
                return cols - 1;
            }
            if self.tabs.contains(&x) {
                return x;
            }
        }
    }

    fn prev_stop(&self, from: u16) -> u16 {
        let mut x = from.min(self.cols());
        loop {
            if x == 0 {
                return 0;
            }
            x -= 1;
            if self.tabs.contains(&x) {
                return x;
            }
        }
    }

    /// HTS: set a tab stop at the cursor column.
    pub fn set_tab_stop(&mut self) {
        self.tabs.insert(self.x.min(self.cols() - 1));
    }

    /// TBC 0: clear the stop at the cursor column.
    pub fn clear_tab_stop(&mut self) {
        self.tabs.remove(&self.x);
    }

    /// TBC 3: clear every stop.
    pub fn clear_all_tab_stops(&mut self) {
        self.tabs.clear();
    }

    // ── Cursor movement ─────────────────────────────────────────────

    fn row_floor(&self) -> u16 {
        if self.modes.origin {
            self.scroll_top
        } else {
            0
        }
    }

    fn row_ceiling(&self) -> u16 {
        if self.modes.origin {
            self.scroll_bottom
        } else {
            self.rows() - 1
        }
    }

    pub fn cursor_up(&mut self, n: u16) {
        let floor = self.row_floor();
        self.y = self.y.saturating_sub(n.max(1)).max(floor.min(self.y));
    }

    pub fn cursor_down(&mut self, n: u16) {
        self.y = (self.y + n.max(1)).min(self.row_ceiling());
    }

    pub fn cursor_forward(&mut self, n: u16) {
        self.x = (self.x + n.max(1)).min(self.cols() - 1);
    }

    pub fn cursor_backward(&mut self, n: u16) {
        self.x = self.x.min(self.cols()).saturating_sub(n.max(1));
    }

    /// CUP/HVP with 0-based coordinates, honoring origin mode.
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        self.y = if self.modes.origin {
            (self.scroll_top + row).min(self.scroll_bottom)
        } else {
            row.min(self.rows() - 1)
        };
        self.x = col.min(self.cols() - 1);
    }

    /// CHA/HPA: absolute column.
    pub fn cursor_column(&mut self, col: u16) {
        self.x = col.min(self.cols() - 1);
    }

    /// VPA: absolute row (origin-relative in origin mode).
    pub fn cursor_row(&mut self, row: u16) {
        self.y = if self.modes.origin {
            (self.scroll_top + row).min(self.scroll_bottom)
        } else {
            row.min(self.rows() - 1)
        };
    }

    /// DECSC / `CSI s`: position only; style and modes are not saved.
    pub fn save_cursor(&mut self) {
        self.saved_x = self.x;
        self.saved_y = self.y;
    }

    /// DECRC / `CSI u`.
    pub fn restore_cursor(&mut self) {
        self.x = self.saved_x.min(self.cols());
        self.y = self.saved_y.min(self.rows() - 1);
    }

    // ── Index / scroll ──────────────────────────────────────────────

    /// IND: down one row, scrolling at the region bottom.
    pub fn index_down(&mut self) {
        if self.y == self.scroll_bottom {
            let style = self.erase_style();
            self.buf.scroll_up(self.scroll_top, self.scroll_bottom, style);
        } else if self.y + 1 < self.rows() {
            self.y += 1;
        }
    }

    /// RI: up one row, scrolling down at the region top.
    pub fn reverse_index(&mut self) {
        if self.y == self.scroll_top {
            let style = self.erase_style();
            self.buf.scroll_down(self.scroll_top, self.scroll_bottom, style);
        } else if self.y > 0 {
            self.y -= 1;
        }
    }

    /// NEL: carriage return plus index.
    pub fn next_line(&mut self) {
        self.carriage_return();
        self.index_down();
    }

    /// SU: scroll the region up `n` rows.
    pub fn scroll_up(&mut self, n: u16) {
        let style = self.erase_style();
        for _ in 0..n.max(1) {
            self.buf.scroll_up(self.scroll_top, self.scroll_bottom, style);
        }
    }

    /// SD: scroll the region down `n` rows.
    pub fn scroll_down(&mut self, n: u16) {
        let style = self.erase_style();
        for _ in 0..n.max(1) {
            self.buf.scroll_down(self.scroll_top, self.scroll_bottom, style);
        }
    }

    /// DECSTBM. `bottom` is the raw 1-based parameter (0 = full height).
    /// Invalid regions are ignored; a valid one homes the cursor.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let rows = self.rows();
        let bottom = if bottom == 0 || bottom > rows { rows } else { bottom };
        if top >= bottom {
            tracing::debug!(top, bottom, "ignoring inverted scroll region");
            return;
        }
        self.scroll_top = top;
        self.scroll_bottom = bottom - 1;
        self.cursor_position(0, 0);
    }

    // ── Erase ───────────────────────────────────────────────────────

    /// ED: 0 below, 1 above, 2 all. Mode 3 is accepted as a no-op upstream.
    pub fn erase_in_display(&mut self, mode: u8) {
        let style = self.erase_style();
        let rows = self.rows();
        let cols = self.cols();
        match mode {
            0 => {
                let (x, y) = (self.x, self.y);
                self.buf.row_mut(y).erase_range(x.min(cols), cols, style);
                for yy in y + 1..rows {
                    self.buf.row_mut(yy).fill(style);
                }
                self.buf.mark_dirty_range(y, rows - 1);
            }
            1 => {
                let (x, y) = (self.x, self.y);
                for yy in 0..y {
                    self.buf.row_mut(yy).fill(style);
                }
                self.buf.row_mut(y).erase_range(0, (x + 1).min(cols), style);
                self.buf.mark_dirty_range(0, y);
            }
            2 => {
                for yy in 0..rows {
                    self.buf.row_mut(yy).fill(style);
                }
                self.buf.mark_all_dirty();
            }
            _ => {}
        }
    }

    /// EL: 0 right, 1 left, 2 whole line.
    pub fn erase_in_line(&mut self, mode: u8) {
        let style = self.erase_style();
        let cols = self.cols();
        let (x, y) = (self.x, self.y);
        let row = self.buf.row_mut(y);
        match mode {
            0 => row.erase_range(x.min(cols), cols, style),
            1 => row.erase_range(0, (x + 1).min(cols), style),
            2 => row.fill(style),
            _ => {}
        }
        self.buf.mark_dirty(y);
    }

    /// ECH: erase `n` cells at the cursor without moving anything. Erasing
    /// past the margin stops at the margin.
    pub fn erase_chars(&mut self, n: u16) {
        let style = self.erase_style();
        let cols = self.cols();
        let (x, y) = (self.x.min(cols), self.y);
        let end = x.saturating_add(n.max(1)).min(cols);
        self.buf.row_mut(y).erase_range(x, end, style);
        self.buf.mark_dirty(y);
    }

    // ── Insert / delete ─────────────────────────────────────────────

    /// ICH: insert `n` blank cells at the cursor.
    pub fn insert_chars(&mut self, n: u16) {
        let style = self.erase_style();
        let (x, y) = (self.x, self.y);
        let row = self.buf.row_mut(y);
        for _ in 0..n.max(1) {
            row.insert_blank(x, style);
        }
        self.buf.mark_dirty(y);
    }

    /// DCH: delete `n` cells at the cursor.
    pub fn delete_chars(&mut self, n: u16) {
        let style = self.erase_style();
        let (x, y) = (self.x, self.y);
        let row = self.buf.row_mut(y);
        for _ in 0..n.max(1) {
            row.delete(x, style);
        }
        self.buf.mark_dirty(y);
    }

    /// IL: insert `n` blank rows at the cursor (inside the region only).
    pub fn insert_lines(&mut self, n: u16) {
        if self.y < self.scroll_top || self.y > self.scroll_bottom {
            return;
        }
        let style = self.erase_style();
        for _ in 0..n.max(1) {
            self.buf.insert_line(self.y, self.scroll_bottom, style);
        }
    }

    /// DL: delete `n` rows at the cursor (inside the region only).
    pub fn delete_lines(&mut self, n: u16) {
        if self.y < self.scroll_top || self.y > self.scroll_bottom {
            return;
        }
        let style = self.erase_style();
        for _ in 0..n.max(1) {
            self.buf.delete_line(self.y, self.scroll_bottom, style);
        }
    }

    // ── Charsets ────────────────────────────────────────────────────

    /// Designate a charset into bank G0-G3.
    pub fn designate_charset(&mut self, slot: u8, charset: Charset) {
        if let Some(bank) = self.charsets.get_mut(usize::from(slot)) {
            *bank = charset;
        }
    }

    /// LS0-LS3 (and the GR locking shifts, which select the same banks).
    pub fn invoke_charset(&mut self, level: u8) {
        if usize::from(level) < self.charsets.len() {
            self.glevel = usize::from(level);
        }
    }

    pub fn charset(&self, slot: u8) -> Charset {
        self.charsets[usize::from(slot) & 3]
    }

    pub fn glevel(&self) -> u8 {
        self.glevel as u8
    }

    // ── Alternate screen ────────────────────────────────────────────

    /// Enter the alternate buffer. Re-entry while saved is a no-op.
    /// `clear` additionally homes the cursor and resets the scroll region
    /// (the `?1049` variant).
    pub fn enter_alt(&mut self, clear: bool) {
        if self.alt.is_some() {
            return;
        }
        let style = self.erase_style();
        let (lines, ybase, ydisp) = self.buf.enter_alt(style);
        self.alt = Some(AltSnapshot {
            lines,
            ybase,
            ydisp,
            x: self.x,
            y: self.y,
            scroll_top: self.scroll_top,
            scroll_bottom: self.scroll_bottom,
            tabs: self.tabs.clone(),
        });
        if clear {
            self.x = 0;
            self.y = 0;
            self.scroll_top = 0;
            self.scroll_bottom = self.rows() - 1;
        }
    }

    /// Leave the alternate buffer, restoring the primary snapshot.
    pub fn leave_alt(&mut self) {
        let Some(snap) = self.alt.take() else {
            return;
        };
        let style = self.erase_style();
        self.buf.restore_primary(snap.lines, snap.ybase, snap.ydisp, style);
        self.x = snap.x.min(self.cols());
        self.y = snap.y.min(self.rows() - 1);
        self.scroll_top = snap.scroll_top.min(self.rows() - 1);
        self.scroll_bottom = snap.scroll_bottom.min(self.rows() - 1);
        if self.scroll_top > self.scroll_bottom {
            self.scroll_top = 0;
            self.scroll_bottom = self.rows() - 1;
        }
        self.tabs = snap.tabs;
    }

    // ── Reset / resize ──────────────────────────────────────────────

    /// DECALN: fill the screen with `E` and home the cursor.
    pub fn screen_alignment(&mut self) {
        let rows = self.rows();
        for y in 0..rows {
            let row = self.buf.row_mut(y);
            for x in 0..row.len() {
                if let Some(cell) = row.cell_mut(x) {
                    *cell = Cell::new('E', Style::DEFAULT);
                }
            }
        }
        self.x = 0;
        self.y = 0;
        self.buf.mark_all_dirty();
    }

    /// Full reset (RIS): everything except geometry and the scrollback cap.
    pub fn reset(&mut self) {
        self.modes.reset();
        self.style = Style::DEFAULT;
        self.x = 0;
        self.y = 0;
        self.saved_x = 0;
        self.saved_y = 0;
        self.scroll_top = 0;
        self.scroll_bottom = self.rows() - 1;
        self.tabs = default_tabs(self.cols());
        self.charsets = [Charset::Us; 4];
        self.glevel = 0;
        self.alt = None;
        self.buf.reset(Style::DEFAULT);
    }

    /// DECSTR: modes, style and scroll region only; the screen is untouched.
    pub fn soft_reset(&mut self) {
        self.modes.soft_reset();
        self.style = Style::DEFAULT;
        self.scroll_top = 0;
        self.scroll_bottom = self.rows() - 1;
    }

    /// Resize to a pre-clamped geometry.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let old_cols = self.cols();
        self.y = self.buf.resize(cols, rows, self.y, self.erase_style());
        self.x = self.x.min(cols);
        self.saved_x = self.saved_x.min(cols);
        self.saved_y = self.saved_y.min(rows - 1);
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        if cols > old_cols {
            for c in (0..cols).step_by(8) {
                if c >= old_cols {
                    self.tabs.insert(c);
                }
            }
        }
    }
}

/// Default tab stops: every 8 columns starting at 0.
fn default_tabs(cols: u16) -> BTreeSet<u16> {
    (0..cols).step_by(8).collect()
}
