//! Mode registry: ANSI and DEC private modes the engine tracks.
//!
//! Modes are toggled by SM/RM (`CSI Pm h` / `CSI Pm l`, with the `?` prefix
//! for DEC private codes). Only the modes listed here change behavior;
//! everything else is accepted silently and traced.

/// Mouse reporting protocol (which events are reported at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseProtocol {
    /// No mouse reporting.
    #[default]
    None,
    /// X10 compatibility (`?9`): presses only, no modifiers, no releases.
    X10,
    /// VT200 (`?1000`): press immediately followed by release.
    Vt200,
    /// Button-event tracking (`?1002`): presses, releases, drag motion.
    ButtonEvent,
    /// Any-event tracking (`?1003`): all motion reported.
    AnyEvent,
}

/// Mouse coordinate encoding (how events are serialized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseEncoding {
    /// Classic `CSI M` with three `32 + value` bytes.
    #[default]
    Default,
    /// `?1005`: the three values are UTF-8 encoded, extending the range.
    Utf8,
    /// `?1006`: SGR form `CSI < b ; x ; y M|m`.
    Sgr,
    /// `?1015`: urxvt form `CSI b ; x ; y M`.
    Urxvt,
    /// VT300 locator-style form `CSI 24<d> ~ [x,y] CR`. Never selected by
    /// SM/RM; hosts opt in explicitly.
    Vt300,
}

/// The engine's modal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modes {
    /// IRM (`4`): printables shift the rest of the row right.
    pub insert: bool,
    /// DECCKM (`?1`): arrows send `ESC O _` instead of `ESC [ _`.
    pub application_cursor: bool,
    /// DECKPAM (`?66` / `ESC =`): numpad sends function sequences.
    pub application_keypad: bool,
    /// DECOM (`?6`): cursor addressing is relative to the scroll region.
    pub origin: bool,
    /// DECAWM (`?7`): printables at the right margin wrap to the next row.
    pub wraparound: bool,
    /// DECTCEM (`?25`): renderers draw the cursor.
    pub cursor_visible: bool,
    /// `?1004`: report focus changes as `CSI I` / `CSI O`.
    pub focus_events: bool,
    pub mouse_protocol: MouseProtocol,
    pub mouse_encoding: MouseEncoding,
    /// LF implies CR.
    pub convert_eol: bool,
    /// Columns saved by 132-column mode (`?3`) for restore on reset.
    pub saved_cols: Option<u16>,
}

impl Modes {
    /// Initial mode state.
    #[must_use]
    pub fn new(convert_eol: bool) -> Self {
        Self {
            insert: false,
            application_cursor: false,
            application_keypad: false,
            origin: false,
            wraparound: true,
            cursor_visible: true,
            focus_events: false,
            mouse_protocol: MouseProtocol::None,
            mouse_encoding: MouseEncoding::Default,
            convert_eol,
            saved_cols: None,
        }
    }

    /// Full reset (RIS): everything back to initial state. `convert_eol` is
    /// a construction option, not a terminal mode, so it survives.
    pub fn reset(&mut self) {
        *self = Self::new(self.convert_eol);
    }

    /// Soft reset (DECSTR): the subset xterm resets without touching the
    /// screen — insert, origin, wraparound, keypad, cursor visibility.
    pub fn soft_reset(&mut self) {
        self.insert = false;
        self.origin = false;
        self.wraparound = true;
        self.application_keypad = false;
        self.application_cursor = false;
        self.cursor_visible = true;
    }
}

impl Default for Modes {
    fn default() -> Self {
        Self::new(false)
    }
}
