//! Engine construction options.

use crate::palette::Rgb;

/// Options supplied when creating a [`Terminal`](crate::Terminal).
///
/// Geometry is clamped to at least 1x1. The palette seed replaces colors
/// 0-15; the cube and greyscale ramp are fixed. `application_mode_cookie`
/// arms the out-of-band data channel; without it, application-mode headers
/// are rejected.
#[derive(Debug, Clone)]
pub struct Options {
    pub cols: u16,
    pub rows: u16,
    /// Scrollback cap in rows (FIFO eviction past it).
    pub scrollback: usize,
    /// Replacement for palette entries 0-15.
    pub palette: Option<Vec<Rgb>>,
    /// Terminal name reported by device-attribute queries.
    pub term_name: String,
    pub cursor_blink: bool,
    pub visual_bell: bool,
    pub pop_on_bell: bool,
    /// LF implies CR.
    pub convert_eol: bool,
    /// Host keeps scrollback: rows leaving the screen go to the spill queue.
    pub physical_scroll: bool,
    /// Shared secret for the application-mode channel.
    pub application_mode_cookie: Option<String>,
    /// Trace protocol warnings.
    pub debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            scrollback: 1000,
            palette: None,
            term_name: "xterm".into(),
            cursor_blink: false,
            visual_bell: false,
            pop_on_bell: false,
            convert_eol: false,
            physical_scroll: false,
            application_mode_cookie: None,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_xterm_80x24() {
        let o = Options::default();
        assert_eq!((o.cols, o.rows), (80, 24));
        assert_eq!(o.scrollback, 1000);
        assert_eq!(o.term_name, "xterm");
        assert!(!o.convert_eol);
        assert!(o.application_mode_cookie.is_none());
    }
}
