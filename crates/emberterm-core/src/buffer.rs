//! Screen buffer: rows, scrollback, and dirty-range tracking.
//!
//! Scrollback and the visible viewport live in one ordered sequence of rows.
//! `ybase` counts the scrollback rows above the viewport, so rows
//! `[ybase, ybase + rows)` are visible; `ydisp` is the display offset and
//! equals `ybase` unless the user has scrolled back. Scrollback is capped and
//! evicts oldest-first.
//!
//! In physical-scroll mode the host owns scrollback: rows leaving the top of
//! the screen are moved to a bounded spill queue the host drains, and `ybase`
//! stays at zero.

use std::collections::VecDeque;

use crate::cell::{Cell, Style};

/// One screen row. Always exactly `cols` cells long after any resize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    /// A row of `cols` blank cells carrying `style`.
    #[must_use]
    pub fn blank(cols: u16, style: Style) -> Self {
        Self {
            cells: vec![Cell::blank(style); usize::from(cols)],
        }
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> u16 {
        self.cells.len() as u16
    }

    /// Whether the row has zero cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at column `x`, if in bounds.
    #[must_use]
    pub fn cell(&self, x: u16) -> Option<&Cell> {
        self.cells.get(usize::from(x))
    }

    /// Mutable cell at column `x`, if in bounds.
    pub fn cell_mut(&mut self, x: u16) -> Option<&mut Cell> {
        self.cells.get_mut(usize::from(x))
    }

    /// All cells in order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Blank the columns `[from, to)` with `style`.
    pub fn erase_range(&mut self, from: u16, to: u16, style: Style) {
        let from = usize::from(from).min(self.cells.len());
        let to = usize::from(to).min(self.cells.len());
        for cell in &mut self.cells[from..to] {
            *cell = Cell::blank(style);
        }
    }

    /// Blank the whole row.
    pub fn fill(&mut self, style: Style) {
        self.erase_range(0, self.len(), style);
    }

    /// Insert a blank cell at `x`, shifting the rest right. The rightmost
    /// cell falls off; a wide pair split at the margin is blanked.
    pub fn insert_blank(&mut self, x: u16, style: Style) {
        let x = usize::from(x);
        if x >= self.cells.len() {
            return;
        }
        self.cells.insert(x, Cell::blank(style));
        self.cells.pop();
        self.fix_split_pair(style);
    }

    /// Delete the cell at `x`, shifting the rest left and appending a blank.
    pub fn delete(&mut self, x: u16, style: Style) {
        let x = usize::from(x);
        if x >= self.cells.len() {
            return;
        }
        self.cells.remove(x);
        self.cells.push(Cell::blank(style));
    }

    /// Grow or truncate to exactly `cols` cells.
    pub fn resize_to(&mut self, cols: u16, style: Style) {
        self.cells.resize(usize::from(cols), Cell::blank(style));
        self.fix_split_pair(style);
    }

    /// If the last cell is the head of a wide pair whose tail fell off the
    /// margin, blank it so no half-glyph survives.
    fn fix_split_pair(&mut self, style: Style) {
        if let Some(last) = self.cells.last_mut() {
            if last.width() == 2 {
                *last = Cell::blank(style);
            }
        }
    }

    /// The row's characters as a string (test and debug helper).
    #[must_use]
    pub fn text(&self) -> String {
        self.cells.iter().map(|c| c.ch).collect()
    }
}

/// Ordered rows plus scrollback bookkeeping and dirty-range tracking.
#[derive(Debug, Clone)]
pub struct ScreenBuffer {
    lines: VecDeque<Row>,
    cols: u16,
    rows: u16,
    ybase: usize,
    ydisp: usize,
    cap: usize,
    physical_scroll: bool,
    spilled: VecDeque<Row>,
    dirty: Option<(u16, u16)>,
}

impl ScreenBuffer {
    /// Allocate a blank buffer of `rows` visible rows.
    #[must_use]
    pub fn new(cols: u16, rows: u16, scrollback: usize, physical_scroll: bool) -> Self {
        let lines = (0..rows)
            .map(|_| Row::blank(cols, Style::DEFAULT))
            .collect();
        Self {
            lines,
            cols,
            rows,
            ybase: 0,
            ydisp: 0,
            cap: scrollback,
            physical_scroll,
            spilled: VecDeque::new(),
            dirty: None,
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Scrollback rows above the viewport.
    pub fn ybase(&self) -> usize {
        self.ybase
    }

    /// Display offset; `< ybase` when the user has scrolled back.
    pub fn ydisp(&self) -> usize {
        self.ydisp
    }

    /// Scrollback cap.
    pub fn scrollback_cap(&self) -> usize {
        self.cap
    }

    /// Total stored rows (scrollback + viewport).
    pub fn total_rows(&self) -> usize {
        self.lines.len()
    }

    /// Viewport row `y` (0-based from the viewport top).
    #[must_use]
    pub fn row(&self, y: u16) -> Option<&Row> {
        self.lines.get(self.ybase + usize::from(y))
    }

    /// Mutable viewport row `y`, growing the buffer with blank rows if the
    /// index does not exist yet.
    pub fn row_mut(&mut self, y: u16) -> &mut Row {
        let idx = self.ybase + usize::from(y);
        while self.lines.len() <= idx {
            self.lines.push_back(Row::blank(self.cols, Style::DEFAULT));
        }
        &mut self.lines[idx]
    }

    /// Row `y` of the *displayed* window (offset by `ydisp`, for renderers).
    #[must_use]
    pub fn display_row(&self, y: u16) -> Option<&Row> {
        self.lines.get(self.ydisp + usize::from(y))
    }

    /// Iterate the visible viewport rows.
    pub fn viewport(&self) -> impl Iterator<Item = &Row> {
        self.lines.iter().skip(self.ybase).take(usize::from(self.rows))
    }

    /// Scrollback row by absolute index (0 = oldest). Only meaningful when
    /// the engine owns scrollback (non-physical mode).
    #[must_use]
    pub fn scrollback_row(&self, index: usize) -> Option<&Row> {
        if index < self.ybase {
            self.lines.get(index)
        } else {
            None
        }
    }

    // ── Dirty-range tracking ────────────────────────────────────────

    /// Widen the pending dirty range to include `y`.
    pub fn mark_dirty(&mut self, y: u16) {
        self.mark_dirty_range(y, y);
    }

    /// Widen the pending dirty range to include `[start, end]`.
    pub fn mark_dirty_range(&mut self, start: u16, end: u16) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.dirty = Some(match self.dirty {
            Some((s, e)) => (s.min(start), e.max(end)),
            None => (start, end),
        });
    }

    /// Mark the whole viewport dirty.
    pub fn mark_all_dirty(&mut self) {
        if self.rows > 0 {
            self.mark_dirty_range(0, self.rows - 1);
        }
    }

    /// Current dirty range without clearing it.
    #[must_use]
    pub fn dirty(&self) -> Option<(u16, u16)> {
        self.dirty
    }

    /// Take and clear the pending dirty range.
    pub fn take_dirty(&mut self) -> Option<(u16, u16)> {
        self.dirty.take()
    }

    // ── Scrolling ───────────────────────────────────────────────────

    /// Scroll the region `[top, bottom]` up one row.
    ///
    /// When the region starts at the top of the screen the departing row
    /// enters scrollback (or the spill queue in physical-scroll mode) and
    /// oldest rows are evicted past the cap. Region-local scrolls never touch
    /// scrollback.
    pub fn scroll_up(&mut self, top: u16, bottom: u16, style: Style) {
        if self.rows == 0 {
            return;
        }
        let top = top.min(self.rows - 1);
        let bottom = bottom.min(self.rows - 1);
        if top > bottom {
            return;
        }
        if top == 0 {
            if self.physical_scroll {
                if let Some(row) = self.lines.remove(self.ybase) {
                    self.spilled.push_back(row);
                    while self.spilled.len() > self.cap {
                        self.spilled.pop_front();
                    }
                }
            } else {
                self.ybase += 1;
                if self.ybase > self.cap {
                    self.lines.pop_front();
                    self.ybase -= 1;
                }
                self.ydisp = self.ybase;
            }
        } else {
            self.lines.remove(self.ybase + usize::from(top));
        }
        self.lines
            .insert(self.ybase + usize::from(bottom), Row::blank(self.cols, style));
        self.mark_dirty_range(top, bottom);
    }

    /// Scroll the region `[top, bottom]` down one row (mirror of
    /// [`scroll_up`](Self::scroll_up); never pulls from scrollback).
    pub fn scroll_down(&mut self, top: u16, bottom: u16, style: Style) {
        if self.rows == 0 {
            return;
        }
        let top = top.min(self.rows - 1);
        let bottom = bottom.min(self.rows - 1);
        if top > bottom {
            return;
        }
        self.lines.remove(self.ybase + usize::from(bottom));
        self.lines
            .insert(self.ybase + usize::from(top), Row::blank(self.cols, style));
        self.mark_dirty_range(top, bottom);
    }

    /// Insert a blank row at viewport row `y`; the row at the region bottom
    /// falls out.
    pub fn insert_line(&mut self, y: u16, bottom: u16, style: Style) {
        if y > bottom || bottom >= self.rows {
            return;
        }
        self.lines
            .insert(self.ybase + usize::from(y), Row::blank(self.cols, style));
        self.lines.remove(self.ybase + usize::from(bottom) + 1);
        self.mark_dirty_range(y, bottom);
    }

    /// Delete viewport row `y`; a blank row appears at the region bottom.
    pub fn delete_line(&mut self, y: u16, bottom: u16, style: Style) {
        if y > bottom || bottom >= self.rows {
            return;
        }
        self.lines.remove(self.ybase + usize::from(y));
        self.lines
            .insert(self.ybase + usize::from(bottom), Row::blank(self.cols, style));
        self.mark_dirty_range(y, bottom);
    }

    // ── Viewport scrolling (user-driven) ────────────────────────────

    /// Move the display window by `delta` rows (negative = toward history).
    /// Returns whether `ydisp` changed.
    pub fn scroll_view(&mut self, delta: i32) -> bool {
        let old = self.ydisp;
        let target = self.ydisp as i64 + i64::from(delta);
        self.ydisp = target.clamp(0, self.ybase as i64) as usize;
        if self.ydisp != old {
            self.mark_all_dirty();
        }
        self.ydisp != old
    }

    /// Snap the display window back to the live viewport.
    /// Returns whether `ydisp` changed.
    pub fn scroll_to_bottom(&mut self) -> bool {
        let changed = self.ydisp != self.ybase;
        if changed {
            self.ydisp = self.ybase;
            self.mark_all_dirty();
        }
        changed
    }

    /// Whether the display window is at the live viewport.
    #[must_use]
    pub fn at_bottom(&self) -> bool {
        self.ydisp == self.ybase
    }

    /// Drain the physical-scroll spill queue.
    pub fn take_spilled(&mut self) -> Vec<Row> {
        self.spilled.drain(..).collect()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Drop scrollback and blank the viewport.
    pub fn reset(&mut self, style: Style) {
        self.lines = (0..self.rows).map(|_| Row::blank(self.cols, style)).collect();
        self.ybase = 0;
        self.ydisp = 0;
        self.spilled.clear();
        self.mark_all_dirty();
    }

    /// Swap in a fresh blank screen for the alternate buffer, returning the
    /// primary `(lines, ybase, ydisp)` for the caller's snapshot.
    pub fn enter_alt(&mut self, style: Style) -> (VecDeque<Row>, usize, usize) {
        let fresh = (0..self.rows).map(|_| Row::blank(self.cols, style)).collect();
        let lines = std::mem::replace(&mut self.lines, fresh);
        let ybase = std::mem::take(&mut self.ybase);
        let ydisp = std::mem::take(&mut self.ydisp);
        self.mark_all_dirty();
        (lines, ybase, ydisp)
    }

    /// Restore a primary screen snapshot, re-fitting it to the current
    /// geometry if the terminal was resized while the alternate buffer was
    /// active.
    pub fn restore_primary(
        &mut self,
        mut lines: VecDeque<Row>,
        ybase: usize,
        ydisp: usize,
        style: Style,
    ) {
        for row in &mut lines {
            row.resize_to(self.cols, style);
        }
        let mut ybase = ybase;
        let target = ybase + usize::from(self.rows);
        if lines.len() > target {
            // The viewport shrank while the snapshot was held: keep the
            // excess as extra scrollback rather than dropping content.
            ybase = lines.len() - usize::from(self.rows);
        } else {
            while lines.len() < ybase + usize::from(self.rows) {
                lines.push_back(Row::blank(self.cols, style));
            }
        }
        while ybase > self.cap {
            lines.pop_front();
            ybase -= 1;
        }
        self.lines = lines;
        self.ybase = ybase;
        self.ydisp = ydisp.min(ybase);
        self.mark_all_dirty();
    }

    /// Resize to `new_cols` x `new_rows`, keeping content where possible.
    ///
    /// Growing pulls rows back out of scrollback before appending blanks;
    /// shrinking pushes top rows into scrollback while the cursor would
    /// otherwise fall off the bottom. Returns the adjusted cursor row.
    pub fn resize(&mut self, new_cols: u16, new_rows: u16, cursor_y: u16, style: Style) -> u16 {
        let mut cursor_y = cursor_y;
        if new_cols != self.cols {
            for row in &mut self.lines {
                row.resize_to(new_cols, style);
            }
            for row in &mut self.spilled {
                row.resize_to(new_cols, style);
            }
            self.cols = new_cols;
        }

        use std::cmp::Ordering;
        match new_rows.cmp(&self.rows) {
            Ordering::Greater => {
                for _ in self.rows..new_rows {
                    if self.ybase > 0 {
                        self.ybase -= 1;
                        cursor_y += 1;
                    } else {
                        self.lines.push_back(Row::blank(new_cols, style));
                    }
                }
            }
            Ordering::Less => {
                for _ in new_rows..self.rows {
                    if cursor_y >= new_rows {
                        if self.physical_scroll {
                            if let Some(row) = self.lines.pop_front() {
                                self.spilled.push_back(row);
                                while self.spilled.len() > self.cap {
                                    self.spilled.pop_front();
                                }
                            }
                        } else {
                            self.ybase += 1;
                            if self.ybase > self.cap {
                                self.lines.pop_front();
                                self.ybase -= 1;
                            }
                        }
                        cursor_y = cursor_y.saturating_sub(1);
                    } else {
                        self.lines.pop_back();
                    }
                }
            }
            Ordering::Equal => {}
        }

        self.rows = new_rows;
        self.ydisp = self.ybase;
        self.mark_all_dirty();
        cursor_y.min(new_rows.saturating_sub(1))
    }
}
