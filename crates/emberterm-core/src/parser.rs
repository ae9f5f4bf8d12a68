//! Escape-sequence parser.
//!
//! A byte-incremental state machine covering the ECMA-48 + xterm subset:
//! C0 controls, CSI (with DEC-private prefixes), OSC, DCS, charset
//! designators, the DEC `#` arm, and the cookie-gated application mode used
//! for out-of-band payloads. The parser is pure: it emits typed [`Action`]s
//! and never touches screen state, so a sequence split across `feed` calls
//! behaves exactly like the concatenated stream.
//!
//! Multi-byte UTF-8 characters are assembled here as well; malformed
//! sequences are dropped, matching how terminals tolerate binary output.

use smallvec::SmallVec;

use crate::charset::Charset;

/// Inline capacity for CSI parameter lists.
///
/// SGR with a direct color clause carries five parameters; eight covers
/// everything realistic without heap allocation.
pub type CsiParams = SmallVec<[u16; 8]>;

/// Parser output actions, executed by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Print one character (already decoded from UTF-8, not yet charset-mapped).
    Print(char),
    /// BEL.
    Bell,
    /// LF, VT, or FF.
    LineFeed,
    /// CR.
    CarriageReturn,
    /// BS.
    Backspace,
    /// HT.
    Tab,
    /// CUU/CUD/CUF/CUB with the count already defaulted to 1.
    CursorUp(u16),
    CursorDown(u16),
    CursorForward(u16),
    CursorBackward(u16),
    /// CNL / CPL: move and return the carriage.
    CursorNextLine(u16),
    CursorPrevLine(u16),
    /// CHA/HPA: absolute column, 0-based.
    CursorColumn(u16),
    /// VPA: absolute row, 0-based.
    CursorRow(u16),
    /// CUP/HVP, 0-based.
    CursorPosition { row: u16, col: u16 },
    /// HPR / VPR: relative moves.
    HorizontalRelative(u16),
    VerticalRelative(u16),
    /// CHT / CBT: tab stops forward or backward.
    TabForward(u16),
    TabBackward(u16),
    /// ED 0-2. Mode 3 is accepted upstream as a no-op.
    EraseInDisplay(u8),
    /// EL 0-2.
    EraseInLine(u8),
    InsertLines(u16),
    DeleteLines(u16),
    InsertChars(u16),
    DeleteChars(u16),
    EraseChars(u16),
    ScrollUp(u16),
    ScrollDown(u16),
    /// REP: repeat the preceding graphic character.
    RepeatChar(u16),
    /// DA1 / DA2.
    DeviceAttributes { secondary: bool },
    /// DSR / DECDSR. `private` mirrors the `?` prefix back into the reply.
    DeviceStatus { code: u16, private: bool },
    /// TBC: 0 = at cursor, 3 = all.
    ClearTabStop(u16),
    /// SM (`h`). `private` is the `?` prefix.
    SetModes { params: CsiParams, private: bool },
    /// RM (`l`).
    ResetModes { params: CsiParams, private: bool },
    /// SGR parameter list, raw.
    Sgr(CsiParams),
    /// DECSTR (`CSI ! p`).
    SoftReset,
    /// DECSTBM: `top` 0-based; `bottom` is the raw 1-based parameter
    /// (0 = full height).
    SetScrollRegion { top: u16, bottom: u16 },
    /// DECSC / `CSI s`.
    SaveCursor,
    /// DECRC / `CSI u`.
    RestoreCursor,
    /// IND / RI / NEL.
    Index,
    ReverseIndex,
    NextLine,
    /// RIS (`ESC c`).
    FullReset,
    /// HTS (`ESC H`).
    SetTabStop,
    /// DECKPAM / DECKPNM.
    KeypadApplication(bool),
    /// Charset designation into bank G0-G3.
    DesignateCharset { slot: u8, charset: Charset },
    /// Locking shifts (SI/SO, LS2, LS3, and the GR variants).
    InvokeCharset(u8),
    /// SS2 / SS3: accepted, no effect on output.
    SingleShift(u8),
    /// DECALN (`ESC # 8`).
    ScreenAlignment,
    /// A complete OSC: numeric selector plus payload.
    OscDispatch { ps: u32, pt: String },
    /// A complete DCS: up-to-two-byte introducer plus payload.
    DcsRequest { prefix: String, data: String },
    /// Application mode opened with a matching cookie.
    AppModeStart(Vec<String>),
    /// Raw application-mode payload (terminated by NUL or chunk end).
    AppModeData(Vec<u8>),
    /// Application mode closed.
    AppModeEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Escape,
    Csi,
    Osc,
    Dcs,
    /// Waiting for a charset designator byte for bank `slot`.
    CharsetSelect { slot: u8 },
    /// Saw `/` in a designator: one more byte completes ISO Latin.
    CharsetExt { slot: u8 },
    /// `ESC _` / `ESC ^`: consume until ST or BEL.
    Ignore,
    /// `ESC &`: accumulating cookie-gated application-mode parameters.
    AppStart,
    /// Inside application mode: bulk bytes pass through until NUL.
    AppEnd,
    /// `ESC #`: waiting for the final byte.
    DecHash,
    /// `ESC %`: accept exactly one more byte.
    EscPercent,
    /// Assembling a multi-byte UTF-8 character.
    Utf8 { remaining: u8 },
}

/// The escape-sequence state machine.
#[derive(Debug, Clone)]
pub struct Parser {
    state: State,
    params: CsiParams,
    cur_param: u32,
    prefix: Option<u8>,
    postfix: Option<u8>,
    osc_ps: u32,
    osc_in_pt: bool,
    osc_pt: Vec<u8>,
    dcs_prefix: String,
    dcs_data: Vec<u8>,
    saw_esc: bool,
    app_params: Vec<String>,
    app_cur: String,
    cookie: Option<String>,
    debug: bool,
    utf8_buf: [u8; 4],
    utf8_len: u8,
}

impl Parser {
    /// Create a parser. `cookie` gates the application-mode channel; `debug`
    /// enables protocol-warning traces.
    #[must_use]
    pub fn new(cookie: Option<String>, debug: bool) -> Self {
        Self {
            state: State::Normal,
            params: CsiParams::new(),
            cur_param: 0,
            prefix: None,
            postfix: None,
            osc_ps: 0,
            osc_in_pt: false,
            osc_pt: Vec::new(),
            dcs_prefix: String::new(),
            dcs_data: Vec::new(),
            saw_esc: false,
            app_params: Vec::new(),
            app_cur: String::new(),
            cookie,
            debug,
            utf8_buf: [0; 4],
            utf8_len: 0,
        }
    }

    /// Feed a chunk of bytes, appending parsed actions to `out`.
    ///
    /// Parser state survives chunk boundaries, so splitting a stream at any
    /// byte produces the same actions as the whole. Application-mode payload
    /// is sliced here in bulk rather than dispatched per byte.
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<Action>) {
        let mut i = 0;
        while i < bytes.len() {
            if self.state == State::AppEnd {
                let rest = &bytes[i..];
                match rest.iter().position(|&b| b == 0) {
                    Some(pos) => {
                        if pos > 0 {
                            out.push(Action::AppModeData(rest[..pos].to_vec()));
                        }
                        out.push(Action::AppModeEnd);
                        self.state = State::Normal;
                        i += pos + 1;
                    }
                    None => {
                        out.push(Action::AppModeData(rest.to_vec()));
                        i = bytes.len();
                    }
                }
                continue;
            }
            if let Some(action) = self.advance(bytes[i]) {
                out.push(action);
            }
            i += 1;
        }
    }

    /// Convenience wrapper returning a fresh action vector.
    #[must_use]
    pub fn feed_vec(&mut self, bytes: &[u8]) -> Vec<Action> {
        let mut out = Vec::new();
        self.feed(bytes, &mut out);
        out
    }

    /// Advance by one byte. At most one action results per byte; the
    /// application-mode bulk path lives in [`feed`](Self::feed).
    fn advance(&mut self, b: u8) -> Option<Action> {
        match self.state {
            State::Normal => self.advance_normal(b),
            State::Escape => self.advance_escape(b),
            State::Csi => self.advance_csi(b),
            State::Osc => self.advance_osc(b),
            State::Dcs => self.advance_dcs(b),
            State::CharsetSelect { slot } => self.advance_charset(b, slot),
            State::CharsetExt { slot } => {
                // The byte after `/` completes an ISO Latin designation.
                self.state = State::Normal;
                Some(Action::DesignateCharset {
                    slot,
                    charset: Charset::IsoLatin,
                })
            }
            State::Ignore => self.advance_ignore(b),
            State::AppStart => self.advance_app_start(b),
            State::AppEnd => unreachable!("bulk application data is handled in feed()"),
            State::DecHash => self.advance_dec_hash(b),
            State::EscPercent => {
                // ESC % @ / ESC % G select the default or UTF-8 encoding.
                // The engine is always UTF-8; accept and move on.
                self.state = State::Normal;
                None
            }
            State::Utf8 { remaining } => self.advance_utf8(b, remaining),
        }
    }

    fn protocol_warning(&self, what: &str, byte: u8) {
        if self.debug {
            tracing::debug!(byte, what, "unhandled sequence byte");
        }
    }

    // ── Normal ──────────────────────────────────────────────────────

    fn advance_normal(&mut self, b: u8) -> Option<Action> {
        match b {
            0x07 => Some(Action::Bell),
            0x08 => Some(Action::Backspace),
            0x09 => Some(Action::Tab),
            0x0A | 0x0B | 0x0C => Some(Action::LineFeed),
            0x0D => Some(Action::CarriageReturn),
            // SO / SI: locking shifts to G1 / G0.
            0x0E => Some(Action::InvokeCharset(1)),
            0x0F => Some(Action::InvokeCharset(0)),
            0x1B => {
                self.state = State::Escape;
                None
            }
            0x20..=0x7E => Some(Action::Print(b as char)),
            // UTF-8 leading bytes (0xC0/0xC1 are overlong, 0xF5+ out of range).
            0xC2..=0xDF => {
                self.start_utf8(b, 1);
                None
            }
            0xE0..=0xEF => {
                self.start_utf8(b, 2);
                None
            }
            0xF0..=0xF4 => {
                self.start_utf8(b, 3);
                None
            }
            _ => None,
        }
    }

    fn start_utf8(&mut self, b: u8, remaining: u8) {
        self.utf8_buf[0] = b;
        self.utf8_len = 1;
        self.state = State::Utf8 { remaining };
    }

    fn advance_utf8(&mut self, b: u8, remaining: u8) -> Option<Action> {
        if (0x80..=0xBF).contains(&b) {
            let idx = usize::from(self.utf8_len);
            if idx < 4 {
                self.utf8_buf[idx] = b;
                self.utf8_len += 1;
            }
            if remaining == 1 {
                self.state = State::Normal;
                let len = usize::from(self.utf8_len);
                let ch = core::str::from_utf8(&self.utf8_buf[..len])
                    .ok()
                    .and_then(|s| s.chars().next());
                self.utf8_len = 0;
                ch.map(Action::Print)
            } else {
                self.state = State::Utf8 {
                    remaining: remaining - 1,
                };
                None
            }
        } else {
            // Invalid continuation: drop the partial character and reprocess
            // this byte from the ground state.
            self.state = State::Normal;
            self.utf8_len = 0;
            self.advance_normal(b)
        }
    }

    // ── Escape ──────────────────────────────────────────────────────

    fn advance_escape(&mut self, b: u8) -> Option<Action> {
        self.state = State::Normal;
        match b {
            b'[' => {
                self.params.clear();
                self.cur_param = 0;
                self.prefix = None;
                self.postfix = None;
                self.state = State::Csi;
                None
            }
            b']' => {
                self.osc_ps = 0;
                self.osc_in_pt = false;
                self.osc_pt.clear();
                self.saw_esc = false;
                self.state = State::Osc;
                None
            }
            b'P' => {
                self.dcs_prefix.clear();
                self.dcs_data.clear();
                self.saw_esc = false;
                self.state = State::Dcs;
                None
            }
            b'&' => {
                self.app_params.clear();
                self.app_cur.clear();
                self.state = State::AppStart;
                None
            }
            b'_' | b'^' => {
                self.saw_esc = false;
                self.state = State::Ignore;
                None
            }
            b'c' => Some(Action::FullReset),
            b'D' => Some(Action::Index),
            b'E' => Some(Action::NextLine),
            b'M' => Some(Action::ReverseIndex),
            b'7' => Some(Action::SaveCursor),
            b'8' => Some(Action::RestoreCursor),
            b'=' => Some(Action::KeypadApplication(true)),
            b'>' => Some(Action::KeypadApplication(false)),
            b'H' => Some(Action::SetTabStop),
            b'N' => Some(Action::SingleShift(2)),
            b'O' => Some(Action::SingleShift(3)),
            // Locking shifts: LS2, LS3, LS3R, LS2R, LS1R.
            b'n' => Some(Action::InvokeCharset(2)),
            b'o' => Some(Action::InvokeCharset(3)),
            b'|' => Some(Action::InvokeCharset(3)),
            b'}' => Some(Action::InvokeCharset(2)),
            b'~' => Some(Action::InvokeCharset(1)),
            b'(' => {
                self.state = State::CharsetSelect { slot: 0 };
                None
            }
            b')' | b'-' => {
                self.state = State::CharsetSelect { slot: 1 };
                None
            }
            b'*' | b'.' => {
                self.state = State::CharsetSelect { slot: 2 };
                None
            }
            b'+' | b'/' => {
                self.state = State::CharsetSelect { slot: 3 };
                None
            }
            b'#' => {
                self.state = State::DecHash;
                None
            }
            b'%' => {
                self.state = State::EscPercent;
                None
            }
            // A bare ST with nothing open.
            b'\\' => None,
            other => {
                self.protocol_warning("unknown ESC final", other);
                None
            }
        }
    }

    // ── CSI ─────────────────────────────────────────────────────────

    fn advance_csi(&mut self, b: u8) -> Option<Action> {
        match b {
            b'0'..=b'9' => {
                self.cur_param = self
                    .cur_param
                    .saturating_mul(10)
                    .saturating_add(u32::from(b - b'0'));
                None
            }
            b';' => {
                self.push_param();
                None
            }
            b'?' | b'>' | b'!' if self.params.is_empty() && self.cur_param == 0 => {
                self.prefix = Some(b);
                None
            }
            b'$' | b'"' | b' ' | b'\'' => {
                self.postfix = Some(b);
                None
            }
            0x40..=0x7E => {
                self.push_param();
                let action = self.dispatch_csi(b);
                self.prefix = None;
                self.postfix = None;
                self.state = State::Normal;
                action
            }
            other => {
                self.protocol_warning("unexpected CSI byte", other);
                None
            }
        }
    }

    fn push_param(&mut self) {
        self.params
            .push(self.cur_param.min(u32::from(u16::MAX)) as u16);
        self.cur_param = 0;
    }

    fn dispatch_csi(&mut self, final_byte: u8) -> Option<Action> {
        let p0 = self.params.first().copied().unwrap_or(0);
        let p1 = self.params.get(1).copied().unwrap_or(0);
        let n = p0.max(1);
        let private = self.prefix == Some(b'?');

        match (self.prefix, final_byte) {
            (None, b'A') => Some(Action::CursorUp(n)),
            (None, b'B') => Some(Action::CursorDown(n)),
            (None, b'C') => Some(Action::CursorForward(n)),
            (None, b'D') => Some(Action::CursorBackward(n)),
            (None, b'E') => Some(Action::CursorNextLine(n)),
            (None, b'F') => Some(Action::CursorPrevLine(n)),
            (None, b'G') | (None, b'`') => Some(Action::CursorColumn(n - 1)),
            (None, b'd') => Some(Action::CursorRow(n - 1)),
            (None, b'H') | (None, b'f') => Some(Action::CursorPosition {
                row: n - 1,
                col: p1.max(1) - 1,
            }),
            (None, b'I') => Some(Action::TabForward(n)),
            (None, b'Z') => Some(Action::TabBackward(n)),
            (None, b'J') => match p0 {
                0..=2 => Some(Action::EraseInDisplay(p0 as u8)),
                // ED 3 (scrollback erase) is accepted but has no effect.
                3 => None,
                _ => {
                    self.protocol_warning("unknown ED mode", final_byte);
                    None
                }
            },
            (None, b'K') => {
                if p0 <= 2 {
                    Some(Action::EraseInLine(p0 as u8))
                } else {
                    self.protocol_warning("unknown EL mode", final_byte);
                    None
                }
            }
            (None, b'L') => Some(Action::InsertLines(n)),
            (None, b'M') => Some(Action::DeleteLines(n)),
            (None, b'@') => Some(Action::InsertChars(n)),
            (None, b'P') => Some(Action::DeleteChars(n)),
            (None, b'X') => Some(Action::EraseChars(n)),
            (None, b'S') => Some(Action::ScrollUp(n)),
            (None, b'T') => {
                if self.params.len() > 1 {
                    // Multi-parameter T is mouse-tracking configuration;
                    // not supported.
                    self.protocol_warning("unsupported multi-param T", final_byte);
                    None
                } else {
                    Some(Action::ScrollDown(n))
                }
            }
            (None, b'a') => Some(Action::HorizontalRelative(n)),
            (None, b'e') => Some(Action::VerticalRelative(n)),
            (None, b'b') => Some(Action::RepeatChar(n)),
            (None, b'c') if p0 == 0 => Some(Action::DeviceAttributes { secondary: false }),
            (Some(b'>'), b'c') => Some(Action::DeviceAttributes { secondary: true }),
            (None, b'g') => Some(Action::ClearTabStop(p0)),
            (None, b'h') | (Some(b'?'), b'h') => Some(Action::SetModes {
                params: self.params.clone(),
                private,
            }),
            (None, b'l') | (Some(b'?'), b'l') => Some(Action::ResetModes {
                params: self.params.clone(),
                private,
            }),
            (None, b'm') => Some(Action::Sgr(self.params.clone())),
            (None, b'n') | (Some(b'?'), b'n') => Some(Action::DeviceStatus {
                code: p0,
                private,
            }),
            (Some(b'!'), b'p') => Some(Action::SoftReset),
            (None, b'r') => Some(Action::SetScrollRegion {
                top: n - 1,
                bottom: p1,
            }),
            (None, b's') => Some(Action::SaveCursor),
            (None, b'u') => Some(Action::RestoreCursor),
            _ => {
                self.protocol_warning("unknown CSI final", final_byte);
                None
            }
        }
    }

    // ── OSC ─────────────────────────────────────────────────────────

    fn advance_osc(&mut self, b: u8) -> Option<Action> {
        if self.saw_esc {
            self.saw_esc = false;
            if b == b'\\' {
                return self.dispatch_osc();
            }
            // Stray ESC inside the payload: drop it and keep collecting.
        }
        match b {
            0x1B => {
                self.saw_esc = true;
                None
            }
            0x07 => self.dispatch_osc(),
            _ => {
                if self.osc_in_pt {
                    self.osc_pt.push(b);
                } else if b.is_ascii_digit() {
                    self.osc_ps = self
                        .osc_ps
                        .saturating_mul(10)
                        .saturating_add(u32::from(b - b'0'));
                } else if b == b';' {
                    self.osc_in_pt = true;
                } else {
                    // Malformed selector: treat the rest as payload.
                    self.osc_in_pt = true;
                    self.osc_pt.push(b);
                }
                None
            }
        }
    }

    fn dispatch_osc(&mut self) -> Option<Action> {
        self.state = State::Normal;
        let pt = String::from_utf8_lossy(&self.osc_pt).into_owned();
        let ps = self.osc_ps;
        self.osc_pt.clear();
        self.osc_ps = 0;
        self.osc_in_pt = false;
        Some(Action::OscDispatch { ps, pt })
    }

    // ── DCS ─────────────────────────────────────────────────────────

    fn advance_dcs(&mut self, b: u8) -> Option<Action> {
        if self.saw_esc {
            self.saw_esc = false;
            if b == b'\\' {
                return self.dispatch_dcs();
            }
        }
        match b {
            0x1B => {
                self.saw_esc = true;
                None
            }
            0x07 => self.dispatch_dcs(),
            _ => {
                if self.dcs_prefix.len() < 2 {
                    self.dcs_prefix.push(b as char);
                } else {
                    self.dcs_data.push(b);
                }
                None
            }
        }
    }

    fn dispatch_dcs(&mut self) -> Option<Action> {
        self.state = State::Normal;
        let prefix = std::mem::take(&mut self.dcs_prefix);
        let data = String::from_utf8_lossy(&self.dcs_data).into_owned();
        self.dcs_data.clear();
        Some(Action::DcsRequest { prefix, data })
    }

    // ── Ignore ──────────────────────────────────────────────────────

    fn advance_ignore(&mut self, b: u8) -> Option<Action> {
        if self.saw_esc {
            self.saw_esc = false;
            if b == b'\\' {
                self.state = State::Normal;
                return None;
            }
        }
        match b {
            0x1B => self.saw_esc = true,
            0x07 => self.state = State::Normal,
            _ => {}
        }
        None
    }

    // ── Charset designation ─────────────────────────────────────────

    fn advance_charset(&mut self, b: u8, slot: u8) -> Option<Action> {
        if b == b'/' {
            self.state = State::CharsetExt { slot };
            return None;
        }
        self.state = State::Normal;
        let charset = match Charset::from_final(b) {
            Some(cs) => cs,
            None => {
                self.protocol_warning("unknown charset designator", b);
                Charset::Us
            }
        };
        Some(Action::DesignateCharset { slot, charset })
    }

    // ── DEC # ───────────────────────────────────────────────────────

    fn advance_dec_hash(&mut self, b: u8) -> Option<Action> {
        self.state = State::Normal;
        if b == b'8' {
            Some(Action::ScreenAlignment)
        } else {
            self.protocol_warning("unknown DEC # final", b);
            None
        }
    }

    // ── Application mode ────────────────────────────────────────────

    fn advance_app_start(&mut self, b: u8) -> Option<Action> {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'/' => {
                self.app_cur.push(b as char);
                None
            }
            b';' => {
                self.app_params.push(std::mem::take(&mut self.app_cur));
                None
            }
            0x07 => {
                self.app_params.push(std::mem::take(&mut self.app_cur));
                let params = std::mem::take(&mut self.app_params);
                let matches = self
                    .cookie
                    .as_deref()
                    .is_some_and(|cookie| params.first().map(String::as_str) == Some(cookie));
                if matches {
                    self.state = State::AppEnd;
                    Some(Action::AppModeStart(params))
                } else {
                    if self.debug {
                        tracing::debug!("application mode cookie mismatch");
                    }
                    self.state = State::Normal;
                    None
                }
            }
            other => {
                self.protocol_warning("malformed application-mode header", other);
                self.app_params.clear();
                self.app_cur.clear();
                self.state = State::Normal;
                None
            }
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(None, false)
    }
}
