//! The public controller: lifecycle, writes, input, and action execution.
//!
//! [`Terminal`] binds the parser, screen, write queue, input translators and
//! event emitter into the engine surface hosts use. No method returns an
//! error: unknown sequences are traced and dropped, geometry is clamped, and
//! calls after `destroy()` are no-ops.
//!
//! All emissions are synchronous and ordered: bytes within one `write` are
//! processed in order, writes are FIFO, and input-event emissions complete
//! before any later write-induced emission.

use std::time::Instant;

use crate::buffer::Row;
use crate::cell::{apply_sgr, Cell, Style};
use crate::event::{Emitter, Event, EventKind, ListenerId};
use crate::input::{
    encode_mouse_event, translate_key, translate_keypress, Key, KeyAction, Modifiers, MouseButton,
    MouseEventKind, WHEEL_SCROLL_LINES,
};
use crate::modes::{MouseEncoding, MouseProtocol};
use crate::options::Options;
use crate::palette::Palette;
use crate::parser::{Action, Parser};
use crate::screen::Screen;
use crate::writer::{NullScheduler, PumpOutcome, Scheduler, WriteQueue, MAX_CHUNK_BYTES, TIME_BUDGET};

/// An xterm-compatible terminal engine.
pub struct Terminal {
    options: Options,
    screen: Screen,
    palette: Palette,
    parser: Parser,
    queue: WriteQueue,
    scheduler: Box<dyn Scheduler>,
    emitter: Emitter,
    pressed_button: Option<MouseButton>,
    destroyed: bool,
    actions: Vec<Action>,
}

impl Terminal {
    /// Create an engine that drains writes synchronously via [`flush`](Self::flush).
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self::with_scheduler(options, Box::new(NullScheduler))
    }

    /// Create an engine wired to a host scheduler; the host calls
    /// [`pump`](Self::pump) whenever a scheduled callback fires.
    #[must_use]
    pub fn with_scheduler(mut options: Options, scheduler: Box<dyn Scheduler>) -> Self {
        options.cols = options.cols.max(1);
        options.rows = options.rows.max(1);
        let palette = match options.palette.as_deref() {
            Some(seed) => Palette::with_seed(seed),
            None => Palette::new(),
        };
        let screen = Screen::new(
            options.cols,
            options.rows,
            options.scrollback,
            options.physical_scroll,
            options.convert_eol,
        );
        let parser = Parser::new(options.application_mode_cookie.clone(), options.debug);
        Self {
            options,
            screen,
            palette,
            parser,
            queue: WriteQueue::new(),
            scheduler,
            emitter: Emitter::new(),
            pressed_button: None,
            destroyed: false,
            actions: Vec::new(),
        }
    }

    // ── Events ──────────────────────────────────────────────────────

    /// Subscribe to one event kind. Listeners run synchronously, in
    /// subscription order.
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&Event) + 'static,
    {
        self.emitter.subscribe(kind, listener)
    }

    /// Remove a listener.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.emitter.unsubscribe(id)
    }

    fn send(&mut self, bytes: Vec<u8>) {
        self.emitter.emit(&Event::Data(bytes));
    }

    fn emit_refresh(&mut self) {
        if let Some((start, end)) = self.screen.buffer_mut().take_dirty() {
            self.emitter.emit(&Event::Refresh { start, end });
        }
    }

    fn emit_dirty_rows(&mut self) {
        if let Some((start, end)) = self.screen.buffer_mut().take_dirty() {
            self.emitter.emit(&Event::RowsDirty { start, end });
        }
    }

    // ── Write pipeline ──────────────────────────────────────────────

    /// Queue bytes from the application. Never blocks and never fails;
    /// processing happens in `pump`/`flush`.
    pub fn write(&mut self, data: &[u8]) {
        if self.destroyed || data.is_empty() {
            return;
        }
        self.queue.push(data);
        if !self.queue.is_scheduled() {
            self.queue.set_scheduled(true);
            self.scheduler.schedule_now();
        }
    }

    /// `write` for string data.
    pub fn write_str(&mut self, data: &str) {
        self.write(data.as_bytes());
    }

    /// Process queued bytes for one budgeted batch.
    ///
    /// Runs chunks of at most [`MAX_CHUNK_BYTES`]; once [`TIME_BUDGET`] has
    /// elapsed with bytes remaining, re-schedules itself and reports
    /// [`PumpOutcome::Yielded`]. Emits a coalesced `Refresh` either way.
    pub fn pump(&mut self) -> PumpOutcome {
        if self.destroyed {
            return PumpOutcome::Drained;
        }
        let start = Instant::now();
        while let Some(chunk) = self.queue.take_chunk(MAX_CHUNK_BYTES) {
            self.process(&chunk);
            if start.elapsed() >= TIME_BUDGET && !self.queue.is_empty() {
                self.emit_refresh();
                self.scheduler.schedule_now();
                return PumpOutcome::Yielded;
            }
        }
        self.queue.set_scheduled(false);
        self.emit_refresh();
        PumpOutcome::Drained
    }

    /// Drain the queue synchronously, ignoring the time budget.
    pub fn flush(&mut self) {
        if self.destroyed {
            return;
        }
        while let Some(chunk) = self.queue.take_chunk(MAX_CHUNK_BYTES) {
            self.process(&chunk);
        }
        self.queue.set_scheduled(false);
        self.emit_refresh();
    }

    fn process(&mut self, chunk: &[u8]) {
        let mut actions = std::mem::take(&mut self.actions);
        self.parser.feed(chunk, &mut actions);
        for action in actions.drain(..) {
            self.exec(action);
        }
        self.actions = actions;
    }

    // ── Action execution ────────────────────────────────────────────

    fn exec(&mut self, action: Action) {
        match action {
            Action::Print(ch) => self.screen.print(ch),
            Action::Bell => self.emitter.emit(&Event::Bell),
            Action::LineFeed => self.screen.line_feed(),
            Action::CarriageReturn => self.screen.carriage_return(),
            Action::Backspace => self.screen.backspace(),
            Action::Tab => self.screen.tab(),
            Action::CursorUp(n) => self.screen.cursor_up(n),
            Action::CursorDown(n) => self.screen.cursor_down(n),
            Action::CursorForward(n) => self.screen.cursor_forward(n),
            Action::CursorBackward(n) => self.screen.cursor_backward(n),
            Action::CursorNextLine(n) => {
                self.screen.cursor_down(n);
                self.screen.carriage_return();
            }
            Action::CursorPrevLine(n) => {
                self.screen.cursor_up(n);
                self.screen.carriage_return();
            }
            Action::CursorColumn(col) => self.screen.cursor_column(col),
            Action::CursorRow(row) => self.screen.cursor_row(row),
            Action::CursorPosition { row, col } => self.screen.cursor_position(row, col),
            Action::HorizontalRelative(n) => self.screen.cursor_forward(n),
            Action::VerticalRelative(n) => self.screen.cursor_down(n),
            Action::TabForward(n) => self.screen.tab_forward(n),
            Action::TabBackward(n) => self.screen.tab_backward(n),
            Action::EraseInDisplay(mode) => self.screen.erase_in_display(mode),
            Action::EraseInLine(mode) => self.screen.erase_in_line(mode),
            Action::InsertLines(n) => self.screen.insert_lines(n),
            Action::DeleteLines(n) => self.screen.delete_lines(n),
            Action::InsertChars(n) => self.screen.insert_chars(n),
            Action::DeleteChars(n) => self.screen.delete_chars(n),
            Action::EraseChars(n) => self.screen.erase_chars(n),
            Action::ScrollUp(n) => self.screen.scroll_up(n),
            Action::ScrollDown(n) => self.screen.scroll_down(n),
            Action::RepeatChar(n) => self.screen.repeat_preceding(n),
            Action::DeviceAttributes { secondary } => self.device_attributes(secondary),
            Action::DeviceStatus { code, private } => self.device_status(code, private),
            Action::ClearTabStop(mode) => match mode {
                0 => self.screen.clear_tab_stop(),
                3 => self.screen.clear_all_tab_stops(),
                other => {
                    if self.options.debug {
                        tracing::debug!(mode = other, "ignoring unknown TBC mode");
                    }
                }
            },
            Action::SetModes { params, private } => {
                for p in params {
                    self.update_mode(p, private, true);
                }
            }
            Action::ResetModes { params, private } => {
                for p in params {
                    self.update_mode(p, private, false);
                }
            }
            Action::Sgr(params) => {
                let style = apply_sgr(&params, self.screen.style(), &mut self.palette);
                self.screen.set_style(style);
            }
            Action::SoftReset => self.screen.soft_reset(),
            Action::SetScrollRegion { top, bottom } => self.screen.set_scroll_region(top, bottom),
            Action::SaveCursor => self.screen.save_cursor(),
            Action::RestoreCursor => self.screen.restore_cursor(),
            Action::Index => self.screen.index_down(),
            Action::ReverseIndex => self.screen.reverse_index(),
            Action::NextLine => self.screen.next_line(),
            Action::FullReset => self.full_reset(),
            Action::SetTabStop => self.screen.set_tab_stop(),
            Action::KeypadApplication(on) => self.screen.modes.application_keypad = on,
            Action::DesignateCharset { slot, charset } => {
                self.screen.designate_charset(slot, charset);
            }
            Action::InvokeCharset(level) => self.screen.invoke_charset(level),
            // SS2/SS3 are acknowledged without effect.
            Action::SingleShift(_) => {}
            Action::ScreenAlignment => self.screen.screen_alignment(),
            Action::OscDispatch { ps, pt } => self.osc_dispatch(ps, pt),
            Action::DcsRequest { prefix, data } => self.dcs_request(&prefix, &data),
            Action::AppModeStart(params) => self.emitter.emit(&Event::AppModeStart(params)),
            Action::AppModeData(bytes) => self.emitter.emit(&Event::AppModeData(bytes)),
            Action::AppModeEnd => self.emitter.emit(&Event::AppModeEnd),
        }
    }

    fn osc_dispatch(&mut self, ps: u32, pt: String) {
        match ps {
            0 | 1 | 2 => self.emitter.emit(&Event::Title(pt)),
            other => {
                if self.options.debug {
                    tracing::debug!(ps = other, "ignoring OSC selector");
                }
            }
        }
    }

    /// DECRQSS and friends. Known status requests are answered bit-exactly;
    /// everything else (softfonts, terminfo queries) is parsed and dropped.
    fn dcs_request(&mut self, prefix: &str, data: &str) {
        if prefix != "$q" {
            if self.options.debug {
                tracing::debug!(prefix, "ignoring DCS request");
            }
            return;
        }
        let reply = match data {
            "\"p" => Some("61\"p".to_string()),
            "\"q" => Some("0\"q".to_string()),
            "r" => Some(format!(
                "{};{}r",
                self.screen.scroll_top() + 1,
                self.screen.scroll_bottom() + 1
            )),
            "m" => Some("0m".to_string()),
            _ => None,
        };
        let bytes = match reply {
            Some(body) => format!("\x1bP1$r{body}\x1b\\").into_bytes(),
            None => b"\x1bP0$r\x1b\\".to_vec(),
        };
        self.send(bytes);
    }

    fn device_attributes(&mut self, secondary: bool) {
        let name = self.options.term_name.clone();
        let reply: Option<&[u8]> = if secondary {
            if name.starts_with("xterm") {
                Some(b"\x1b[>0;276;0c")
            } else if name.starts_with("rxvt") {
                Some(b"\x1b[>85;95;0c")
            } else if name.starts_with("screen") {
                Some(b"\x1b[>83;40003;0c")
            } else {
                None
            }
        } else if name.starts_with("xterm") || name.starts_with("rxvt") || name.starts_with("screen")
        {
            Some(b"\x1b[?1;2c")
        } else if name.starts_with("linux") {
            Some(b"\x1b[?6c")
        } else {
            None
        };
        if let Some(bytes) = reply {
            self.send(bytes.to_vec());
        }
    }

    fn device_status(&mut self, code: u16, private: bool) {
        match code {
            5 if !private => self.send(b"\x1b[0n".to_vec()),
            6 => {
                let (x, y) = self.screen.cursor();
                let body = format!("{};{}R", y + 1, x + 1);
                let bytes = if private {
                    format!("\x1b[?{body}")
                } else {
                    format!("\x1b[{body}")
                };
                self.send(bytes.into_bytes());
            }
            other => {
                if self.options.debug {
                    tracing::debug!(code = other, private, "ignoring DSR request");
                }
            }
        }
    }

    /// SM/RM. Unknown codes are accepted silently (traced under debug).
    fn update_mode(&mut self, code: u16, private: bool, enable: bool) {
        if !private {
            match code {
                4 => self.screen.modes.insert = enable,
                other => {
                    if self.options.debug {
                        tracing::debug!(code = other, enable, "ignoring ANSI mode");
                    }
                }
            }
            return;
        }
        match code {
            1 => self.screen.modes.application_cursor = enable,
            3 => self.set_132_columns(enable),
            6 => {
                self.screen.modes.origin = enable;
                self.screen.cursor_position(0, 0);
            }
            7 => self.screen.modes.wraparound = enable,
            9 => {
                self.screen.modes.mouse_protocol = if enable {
                    MouseProtocol::X10
                } else {
                    MouseProtocol::None
                };
            }
            25 => self.screen.modes.cursor_visible = enable,
            47 | 1047 => {
                if enable {
                    self.screen.enter_alt(false);
                } else {
                    self.screen.leave_alt();
                }
            }
            66 => self.screen.modes.application_keypad = enable,
            1000 => {
                self.screen.modes.mouse_protocol = if enable {
                    MouseProtocol::Vt200
                } else {
                    MouseProtocol::None
                };
            }
            1002 => {
                self.screen.modes.mouse_protocol = if enable {
                    MouseProtocol::ButtonEvent
                } else {
                    MouseProtocol::None
                };
            }
            1003 => {
                self.screen.modes.mouse_protocol = if enable {
                    MouseProtocol::AnyEvent
                } else {
                    MouseProtocol::None
                };
            }
            1004 => self.screen.modes.focus_events = enable,
            1005 => {
                self.screen.modes.mouse_encoding = if enable {
                    MouseEncoding::Utf8
                } else {
                    MouseEncoding::Default
                };
            }
            1006 => {
                self.screen.modes.mouse_encoding = if enable {
                    MouseEncoding::Sgr
                } else {
                    MouseEncoding::Default
                };
            }
            1015 => {
                self.screen.modes.mouse_encoding = if enable {
                    MouseEncoding::Urxvt
                } else {
                    MouseEncoding::Default
                };
            }
            1049 => {
                if enable {
                    self.screen.enter_alt(true);
                } else {
                    self.screen.leave_alt();
                }
            }
            other => {
                if self.options.debug {
                    tracing::debug!(code = other, enable, "ignoring DEC private mode");
                }
            }
        }
    }

    /// DECCOLM: switch to 132 columns, remembering the previous width.
    fn set_132_columns(&mut self, enable: bool) {
        if enable {
            if self.screen.modes.saved_cols.is_none() {
                self.screen.modes.saved_cols = Some(self.screen.cols());
            }
            let rows = self.screen.rows();
            self.screen.resize(132, rows);
        } else if let Some(cols) = self.screen.modes.saved_cols.take() {
            let rows = self.screen.rows();
            self.screen.resize(cols, rows);
        }
    }

    fn full_reset(&mut self) {
        self.screen.reset();
        self.queue.clear();
        self.pressed_button = None;
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// RIS-equivalent reset. Palette, geometry and the scrollback cap
    /// survive; buffered-but-unprocessed bytes are discarded.
    pub fn reset(&mut self) {
        if self.destroyed {
            return;
        }
        self.full_reset();
        self.emit_dirty_rows();
    }

    /// Resize the screen. Non-positive dimensions are clamped to 1.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if self.destroyed {
            return;
        }
        let cols = cols.max(1);
        let rows = rows.max(1);
        if cols == self.screen.cols() && rows == self.screen.rows() {
            return;
        }
        self.screen.resize(cols, rows);
        self.options.cols = cols;
        self.options.rows = rows;
        self.emit_dirty_rows();
    }

    /// Tear down: pending work is dropped, subscribers are cleared, and all
    /// further calls become no-ops. Idempotent.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.queue.clear();
        self.emitter.clear();
    }

    // ── Input ───────────────────────────────────────────────────────

    /// Feed a logical key event.
    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) {
        if self.destroyed {
            return;
        }
        match translate_key(key, modifiers, &self.screen.modes) {
            KeyAction::Emit(bytes) => {
                self.snap_to_bottom();
                self.emitter.emit(&Event::Key(bytes.clone()));
                self.send(bytes);
            }
            KeyAction::ScrollView(delta) => self.scroll_view(delta),
            KeyAction::ScrollPages(pages) => self.scroll_pages(pages),
            KeyAction::Passthrough => {}
            KeyAction::Unmapped => {
                self.emitter.emit(&Event::UnknownKey { key, modifiers });
            }
        }
    }

    /// Feed a translated character (the printable path).
    pub fn key_press(&mut self, ch: char, modifiers: Modifiers) {
        if self.destroyed {
            return;
        }
        let bytes = translate_keypress(ch, modifiers);
        self.snap_to_bottom();
        self.emitter.emit(&Event::Key(bytes.clone()));
        self.send(bytes);
    }

    /// Feed a mouse event in cell coordinates.
    pub fn mouse(
        &mut self,
        kind: MouseEventKind,
        button: Option<MouseButton>,
        modifiers: Modifiers,
        x: u16,
        y: u16,
    ) {
        if self.destroyed {
            return;
        }
        if matches!(kind, MouseEventKind::WheelUp | MouseEventKind::WheelDown)
            && self.screen.modes.mouse_protocol == MouseProtocol::None
        {
            let delta = if kind == MouseEventKind::WheelUp {
                -WHEEL_SCROLL_LINES
            } else {
                WHEEL_SCROLL_LINES
            };
            self.scroll_view(delta);
            return;
        }
        let report_button = match kind {
            MouseEventKind::Move => self.pressed_button,
            _ => button,
        };
        if let Some(bytes) =
            encode_mouse_event(kind, report_button, modifiers, x, y, &self.screen.modes)
        {
            self.send(bytes);
        }
        match kind {
            MouseEventKind::Down => self.pressed_button = button,
            MouseEventKind::Up => self.pressed_button = None,
            _ => {}
        }
    }

    /// Report a focus change (only when `?1004` is enabled).
    pub fn focus(&mut self, focused: bool) {
        if self.destroyed {
            return;
        }
        if self.screen.modes.focus_events {
            self.send(if focused {
                b"\x1b[I".to_vec()
            } else {
                b"\x1b[O".to_vec()
            });
        }
    }

    // ── View scrolling ──────────────────────────────────────────────

    /// Scroll the display window by `delta` rows (negative = into history).
    pub fn scroll_view(&mut self, delta: i32) {
        if self.destroyed {
            return;
        }
        if self.screen.buffer_mut().scroll_view(delta) {
            self.emit_manual_scroll();
        }
    }

    /// Scroll by whole pages.
    pub fn scroll_pages(&mut self, pages: i32) {
        let page = i32::from(self.screen.rows().saturating_sub(1).max(1));
        self.scroll_view(pages.saturating_mul(page));
    }

    /// Snap the display window to the live screen.
    pub fn scroll_to_bottom(&mut self) {
        if self.destroyed {
            return;
        }
        self.snap_to_bottom();
    }

    fn snap_to_bottom(&mut self) {
        if self.screen.buffer_mut().scroll_to_bottom() {
            self.emit_manual_scroll();
        }
    }

    fn emit_manual_scroll(&mut self) {
        let position = self.screen.buffer().ydisp();
        let at_bottom = self.screen.buffer().at_bottom();
        self.emitter.emit(&Event::ManualScroll {
            position,
            at_bottom,
        });
        self.emit_dirty_rows();
    }

    // ── Getters (engine-thread synchronous) ─────────────────────────

    pub fn cols(&self) -> u16 {
        self.screen.cols()
    }

    pub fn rows(&self) -> u16 {
        self.screen.rows()
    }

    /// Cursor `(x, y)`; `x` may equal `cols` at the wrap margin.
    pub fn cursor(&self) -> (u16, u16) {
        self.screen.cursor()
    }

    pub fn cursor_visible(&self) -> bool {
        self.screen.modes.cursor_visible
    }

    pub fn is_alt(&self) -> bool {
        self.screen.is_alt()
    }

    /// Number of scrollback rows held above the viewport.
    pub fn scrollback_len(&self) -> usize {
        self.screen.buffer().ybase()
    }

    /// Cell at viewport position, if in bounds.
    pub fn cell(&self, x: u16, y: u16) -> Option<Cell> {
        self.screen.buffer().row(y)?.cell(x).copied()
    }

    /// Viewport row text (test and debug aid).
    pub fn row_text(&self, y: u16) -> Option<String> {
        self.screen.buffer().row(y).map(Row::text)
    }

    /// Current SGR style.
    pub fn style(&self) -> Style {
        self.screen.style()
    }

    /// Read access to the full screen model.
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Drain rows spilled by physical-scroll mode.
    pub fn take_spilled(&mut self) -> Vec<Row> {
        self.screen.buffer_mut().take_spilled()
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("cols", &self.cols())
            .field("rows", &self.rows())
            .field("cursor", &self.cursor())
            .field("alt", &self.is_alt())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn term(cols: u16, rows: u16) -> Terminal {
        Terminal::new(Options {
            cols,
            rows,
            scrollback: 50,
            ..Options::default()
        })
    }

    fn feed(t: &mut Terminal, data: &[u8]) {
        t.write(data);
        t.flush();
    }

    fn data_sink(t: &mut Terminal) -> Rc<RefCell<Vec<u8>>> {
        let sink = Rc::new(RefCell::new(Vec::new()));
        let out = sink.clone();
        t.subscribe(EventKind::Data, move |ev| {
            if let Event::Data(bytes) = ev {
                out.borrow_mut().extend_from_slice(bytes);
            }
        });
        sink
    }

    // ── Replies ─────────────────────────────────────────────────────

    #[test]
    fn dsr_reports_cursor_position() {
        let mut t = term(80, 24);
        let sink = data_sink(&mut t);
        feed(&mut t, b"\x1b[6n");
        assert_eq!(&*sink.borrow(), b"\x1b[1;1R");

        sink.borrow_mut().clear();
        feed(&mut t, b"\x1b[3;5H\x1b[6n");
        assert_eq!(&*sink.borrow(), b"\x1b[3;5R");
    }

    #[test]
    fn decdsr_keeps_private_prefix() {
        let mut t = term(80, 24);
        let sink = data_sink(&mut t);
        feed(&mut t, b"\x1b[?6n");
        assert_eq!(&*sink.borrow(), b"\x1b[?1;1R");
    }

    #[test]
    fn dsr_five_reports_ok() {
        let mut t = term(80, 24);
        let sink = data_sink(&mut t);
        feed(&mut t, b"\x1b[5n");
        assert_eq!(&*sink.borrow(), b"\x1b[0n");
    }

    #[test]
    fn da1_replies_by_term_name() {
        let mut t = term(80, 24);
        let sink = data_sink(&mut t);
        feed(&mut t, b"\x1b[c");
        assert_eq!(&*sink.borrow(), b"\x1b[?1;2c");

        let mut linux = Terminal::new(Options {
            term_name: "linux".into(),
            ..Options::default()
        });
        let sink = data_sink(&mut linux);
        feed(&mut linux, b"\x1b[c");
        assert_eq!(&*sink.borrow(), b"\x1b[?6c");
    }

    #[test]
    fn da2_replies_by_term_name() {
        for (name, expected) in [
            ("xterm", &b"\x1b[>0;276;0c"[..]),
            ("rxvt-unicode", &b"\x1b[>85;95;0c"[..]),
            ("screen-256color", &b"\x1b[>83;40003;0c"[..]),
        ] {
            let mut t = Terminal::new(Options {
                term_name: name.into(),
                ..Options::default()
            });
            let sink = data_sink(&mut t);
            feed(&mut t, b"\x1b[>c");
            assert_eq!(&*sink.borrow(), expected, "term {name}");
        }
    }

    #[test]
    fn decrqss_replies() {
        let mut t = term(80, 24);
        let sink = data_sink(&mut t);
        feed(&mut t, b"\x1bP$q\"p\x1b\\");
        assert_eq!(&*sink.borrow(), b"\x1bP1$r61\"p\x1b\\");

        sink.borrow_mut().clear();
        feed(&mut t, b"\x1b[3;10r\x1bP$qr\x1b\\");
        assert_eq!(&*sink.borrow(), b"\x1bP1$r3;10r\x1b\\");

        sink.borrow_mut().clear();
        feed(&mut t, b"\x1bP$qz\x1b\\");
        assert_eq!(&*sink.borrow(), b"\x1bP0$r\x1b\\");
    }

    // ── Modes ───────────────────────────────────────────────────────

    #[test]
    fn insert_mode_via_sm_rm() {
        let mut t = term(10, 2);
        feed(&mut t, b"abc\r\x1b[4hX");
        assert_eq!(t.row_text(0).unwrap(), "Xabc      ");
        feed(&mut t, b"\x1b[4l\rY");
        assert_eq!(t.row_text(0).unwrap(), "Yabc      ");
    }

    #[test]
    fn mode_132_columns_saves_and_restores_width() {
        let mut t = term(80, 24);
        feed(&mut t, b"\x1b[?3h");
        assert_eq!(t.cols(), 132);
        feed(&mut t, b"\x1b[?3l");
        assert_eq!(t.cols(), 80);
    }

    #[test]
    fn unknown_modes_are_accepted_silently() {
        let mut t = term(10, 4);
        feed(&mut t, b"\x1b[?12h\x1b[2004h\x1b[?9999lok");
        assert_eq!(t.row_text(0).unwrap(), "ok        ");
    }

    #[test]
    fn cursor_visibility_mode() {
        let mut t = term(10, 4);
        assert!(t.cursor_visible());
        feed(&mut t, b"\x1b[?25l");
        assert!(!t.cursor_visible());
        feed(&mut t, b"\x1b[?25h");
        assert!(t.cursor_visible());
    }

    // ── Title and bell ──────────────────────────────────────────────

    #[test]
    fn title_and_bell_events() {
        let mut t = term(10, 4);
        let titles = Rc::new(RefCell::new(Vec::new()));
        let bells = Rc::new(RefCell::new(0));
        {
            let titles = titles.clone();
            t.subscribe(EventKind::Title, move |ev| {
                if let Event::Title(s) = ev {
                    titles.borrow_mut().push(s.clone());
                }
            });
        }
        {
            let bells = bells.clone();
            t.subscribe(EventKind::Bell, move |_| *bells.borrow_mut() += 1);
        }
        feed(&mut t, b"\x1b]2;my title\x07\x07");
        assert_eq!(&*titles.borrow(), &["my title".to_string()]);
        assert_eq!(*bells.borrow(), 1);
    }

    // ── Keyboard ────────────────────────────────────────────────────

    #[test]
    fn key_down_emits_key_and_data() {
        let mut t = term(10, 4);
        let sink = data_sink(&mut t);
        let keys = Rc::new(RefCell::new(Vec::new()));
        {
            let keys = keys.clone();
            t.subscribe(EventKind::Key, move |ev| {
                if let Event::Key(bytes) = ev {
                    keys.borrow_mut().push(bytes.clone());
                }
            });
        }
        t.key_down(Key::Enter, Modifiers::empty());
        assert_eq!(&*sink.borrow(), b"\r");
        assert_eq!(&*keys.borrow(), &[b"\r".to_vec()]);
    }

    #[test]
    fn arrow_keys_respect_application_cursor_mode() {
        let mut t = term(10, 4);
        let sink = data_sink(&mut t);
        t.key_down(Key::Up, Modifiers::empty());
        assert_eq!(&*sink.borrow(), b"\x1b[A");
        sink.borrow_mut().clear();
        feed(&mut t, b"\x1b[?1h");
        t.key_down(Key::Up, Modifiers::empty());
        assert_eq!(&*sink.borrow(), b"\x1bOA");
    }

    #[test]
    fn unknown_key_event() {
        let mut t = term(10, 4);
        let unknown = Rc::new(RefCell::new(Vec::new()));
        {
            let unknown = unknown.clone();
            t.subscribe(EventKind::UnknownKey, move |ev| {
                if let Event::UnknownKey { key, .. } = ev {
                    unknown.borrow_mut().push(*key);
                }
            });
        }
        t.key_down(Key::F(20), Modifiers::empty());
        assert_eq!(&*unknown.borrow(), &[Key::F(20)]);
    }

    #[test]
    fn keystroke_snaps_view_to_bottom() {
        let mut t = term(2, 2);
        feed(&mut t, b"a\r\nb\r\nc\r\nd");
        assert!(t.scrollback_len() > 0);
        t.scroll_view(-2);
        assert_ne!(t.screen().buffer().ydisp(), t.screen().buffer().ybase());
        t.key_press('x', Modifiers::empty());
        assert_eq!(t.screen().buffer().ydisp(), t.screen().buffer().ybase());
    }

    // ── Mouse ───────────────────────────────────────────────────────

    #[test]
    fn mouse_reporting_follows_modes() {
        let mut t = term(80, 24);
        let sink = data_sink(&mut t);
        t.mouse(
            MouseEventKind::Down,
            Some(MouseButton::Left),
            Modifiers::empty(),
            0,
            0,
        );
        assert!(sink.borrow().is_empty(), "no protocol, no report");

        feed(&mut t, b"\x1b[?1002h\x1b[?1006h");
        t.mouse(
            MouseEventKind::Down,
            Some(MouseButton::Left),
            Modifiers::empty(),
            4,
            2,
        );
        t.mouse(
            MouseEventKind::Up,
            Some(MouseButton::Left),
            Modifiers::empty(),
            4,
            2,
        );
        assert_eq!(&*sink.borrow(), b"\x1b[<0;5;3M\x1b[<0;5;3m");
    }

    #[test]
    fn drag_motion_uses_pressed_button() {
        let mut t = term(80, 24);
        let sink = data_sink(&mut t);
        feed(&mut t, b"\x1b[?1002h\x1b[?1006h");
        t.mouse(
            MouseEventKind::Down,
            Some(MouseButton::Middle),
            Modifiers::empty(),
            1,
            1,
        );
        sink.borrow_mut().clear();
        t.mouse(MouseEventKind::Move, None, Modifiers::empty(), 2, 1);
        assert_eq!(&*sink.borrow(), b"\x1b[<33;3;2M", "button 1 + motion 32");
    }

    #[test]
    fn wheel_without_protocol_scrolls_view() {
        let mut t = term(2, 2);
        feed(&mut t, b"a\r\nb\r\nc\r\nd\r\ne\r\nf\r\ng");
        let ybase = t.screen().buffer().ybase();
        assert!(ybase >= 5);
        t.mouse(MouseEventKind::WheelUp, None, Modifiers::empty(), 0, 0);
        assert_eq!(t.screen().buffer().ydisp(), ybase - 5);
    }

    // ── Focus ───────────────────────────────────────────────────────

    #[test]
    fn focus_events_only_when_enabled() {
        let mut t = term(10, 4);
        let sink = data_sink(&mut t);
        t.focus(true);
        assert!(sink.borrow().is_empty());
        feed(&mut t, b"\x1b[?1004h");
        t.focus(true);
        t.focus(false);
        assert_eq!(&*sink.borrow(), b"\x1b[I\x1b[O");
    }

    // ── Application mode ────────────────────────────────────────────

    #[test]
    fn app_mode_events_flow_through() {
        let mut t = Terminal::new(Options {
            application_mode_cookie: Some("tok".into()),
            ..Options::default()
        });
        let log = Rc::new(RefCell::new(Vec::new()));
        for kind in [
            EventKind::AppModeStart,
            EventKind::AppModeData,
            EventKind::AppModeEnd,
        ] {
            let log = log.clone();
            t.subscribe(kind, move |ev| log.borrow_mut().push(ev.clone()));
        }
        feed(&mut t, b"\x1b&tok;get\x07raw-bytes\x00");
        assert_eq!(
            &*log.borrow(),
            &[
                Event::AppModeStart(vec!["tok".into(), "get".into()]),
                Event::AppModeData(b"raw-bytes".to_vec()),
                Event::AppModeEnd,
            ]
        );
    }

    // ── Refresh coalescing ──────────────────────────────────────────

    #[test]
    fn flush_emits_one_coalesced_refresh() {
        let mut t = term(10, 4);
        let refreshes = Rc::new(RefCell::new(Vec::new()));
        {
            let refreshes = refreshes.clone();
            t.subscribe(EventKind::Refresh, move |ev| {
                if let Event::Refresh { start, end } = ev {
                    refreshes.borrow_mut().push((*start, *end));
                }
            });
        }
        feed(&mut t, b"a\r\nb\r\nc");
        assert_eq!(refreshes.borrow().len(), 1);
        let (start, end) = refreshes.borrow()[0];
        assert!(start == 0 && end >= 2);
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    #[test]
    fn reset_restores_fresh_state() {
        let mut t = term(10, 4);
        feed(&mut t, b"\x1b[31mjunk\x1b[?1h\x1b[2;3r\x1b[?1049h");
        t.reset();
        assert_eq!(t.cursor(), (0, 0));
        assert_eq!(t.style(), Style::DEFAULT);
        assert!(!t.is_alt());
        assert!(!t.screen().modes.application_cursor);
        assert_eq!(t.scrollback_len(), 0);
        for y in 0..4 {
            assert_eq!(t.row_text(y).unwrap(), "          ");
        }
    }

    #[test]
    fn ris_from_stream_resets() {
        let mut t = term(10, 4);
        feed(&mut t, b"\x1b[31mstuff\x1bcx");
        assert_eq!(t.row_text(0).unwrap(), "x         ");
        assert_eq!(t.cell(0, 0).unwrap().style, Style::DEFAULT);
    }

    #[test]
    fn destroy_is_idempotent_and_silences_everything() {
        let mut t = term(10, 4);
        let sink = data_sink(&mut t);
        t.destroy();
        t.destroy();
        t.write(b"ignored");
        t.flush();
        t.key_down(Key::Enter, Modifiers::empty());
        t.resize(20, 20);
        assert!(sink.borrow().is_empty());
        assert_eq!(t.cols(), 10);
    }

    #[test]
    fn resize_clamps_to_one() {
        let mut t = term(10, 4);
        t.resize(0, 0);
        assert_eq!((t.cols(), t.rows()), (1, 1));
    }

    #[test]
    fn physical_scroll_spills_to_host_queue() {
        let mut t = Terminal::new(Options {
            cols: 3,
            rows: 2,
            physical_scroll: true,
            ..Options::default()
        });
        feed(&mut t, b"abcdefg");
        let spilled = t.take_spilled();
        assert_eq!(spilled.len(), 1);
        assert_eq!(spilled[0].text(), "abc");
        assert_eq!(t.scrollback_len(), 0);
    }

    #[test]
    fn pump_drains_like_flush() {
        let mut t = term(10, 2);
        t.write(b"hello");
        assert_eq!(t.pump(), PumpOutcome::Drained);
        assert_eq!(t.row_text(0).unwrap(), "hello     ");
    }

    #[test]
    fn write_after_reset_still_works() {
        let mut t = term(10, 2);
        feed(&mut t, b"before");
        t.reset();
        feed(&mut t, b"after");
        assert_eq!(t.row_text(0).unwrap(), "after     ");
    }
}
