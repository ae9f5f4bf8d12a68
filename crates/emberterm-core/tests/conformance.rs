//! End-to-end conformance scenarios driven through the public [`Terminal`].
//!
//! Each test feeds a byte stream into a fresh engine and checks the
//! resulting screen, cursor, scrollback, emitted bytes, or events.

use std::cell::RefCell;
use std::rc::Rc;

use emberterm_core::{
    Event, EventKind, Key, Modifiers, MouseButton, MouseEventKind, Options, Style, Terminal,
    DEFAULT_BG,
};

fn term(cols: u16, rows: u16, scrollback: usize) -> Terminal {
    Terminal::new(Options {
        cols,
        rows,
        scrollback,
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

// ── Scenario: hello ─────────────────────────────────────────────────

#[test]
fn hello_on_fresh_screen() {
    let mut t = term(80, 24, 1000);
    feed(&mut t, b"hi");
    let h = t.cell(0, 0).unwrap();
    let i = t.cell(1, 0).unwrap();
    assert_eq!(h.ch, 'h');
    assert_eq!(h.style, Style::DEFAULT);
    assert_eq!(i.ch, 'i');
    assert_eq!(i.style, Style::DEFAULT);
    assert_eq!(t.cursor(), (2, 0));
}

// ── Scenario: color ─────────────────────────────────────────────────

#[test]
fn basic_sgr_color() {
    let mut t = term(80, 24, 1000);
    feed(&mut t, b"\x1b[31mA\x1b[0mB");
    let a = t.cell(0, 0).unwrap();
    assert_eq!(a.ch, 'A');
    assert_eq!(a.style.fg(), 1);
    let b = t.cell(1, 0).unwrap();
    assert_eq!(b.ch, 'B');
    assert_eq!(b.style, Style::DEFAULT);
}

#[test]
fn sgr_256_color() {
    let mut t = term(80, 24, 1000);
    feed(&mut t, b"\x1b[38;5;196mX");
    let x = t.cell(0, 0).unwrap();
    assert_eq!(x.ch, 'X');
    assert_eq!(x.style.fg(), 196);
}

// ── Scenario: wrap + scroll ─────────────────────────────────────────

#[test]
fn wrap_and_scroll_into_scrollback() {
    let mut t = term(3, 2, 10);
    feed(&mut t, b"abcdefg");
    assert_eq!(t.row_text(0).unwrap(), "def");
    assert_eq!(t.row_text(1).unwrap(), "g  ");
    assert_eq!(t.scrollback_len(), 1);
    assert_eq!(
        t.screen().buffer().scrollback_row(0).unwrap().text(),
        "abc"
    );
    assert_eq!(t.cursor(), (1, 1));
}

// ── Scenario: alternate screen ──────────────────────────────────────

#[test]
fn alt_screen_roundtrip() {
    let mut t = term(80, 24, 1000);
    feed(&mut t, b"A\x1b[?1049h");
    assert!(t.is_alt());
    feed(&mut t, b"B");
    assert_eq!(t.cell(0, 0).unwrap().ch, 'B');
    feed(&mut t, b"\x1b[?1049l");
    assert!(!t.is_alt());
    assert_eq!(t.cell(0, 0).unwrap().ch, 'A');
    assert_eq!(t.cursor(), (1, 0), "cursor back where the save left it");
    assert_eq!(t.row_text(0).unwrap().trim_end(), "A");
}

#[test]
fn alt_screen_restores_primary_bitwise() {
    let mut t = term(10, 4, 100);
    feed(&mut t, b"\x1b[44mpainted\r\nrows here");
    let before: Vec<_> = (0..4)
        .map(|y| t.screen().buffer().row(y).unwrap().clone())
        .collect();
    feed(&mut t, b"\x1b[?47h\x1b[31mALT ALT ALT\x1b[2J\x1b[?47l");
    let after: Vec<_> = (0..4)
        .map(|y| t.screen().buffer().row(y).unwrap().clone())
        .collect();
    assert_eq!(after, before);
}

#[test]
fn alt_reentry_is_single_level() {
    let mut t = term(10, 4, 100);
    feed(&mut t, b"main\x1b[?1049h\x1b[HaltX\x1b[?1049h");
    assert_eq!(
        t.row_text(0).unwrap().trim_end(),
        "altX",
        "second save request is a no-op"
    );
    feed(&mut t, b"\x1b[?1049l");
    assert_eq!(t.row_text(0).unwrap().trim_end(), "main");
}

// ── Scenario: DSR ───────────────────────────────────────────────────

#[test]
fn dsr_on_fresh_screen() {
    let mut t = term(80, 24, 1000);
    let sink = data_sink(&mut t);
    feed(&mut t, b"\x1b[6n");
    assert_eq!(&*sink.borrow(), b"\x1b[1;1R");
}

// ── Boundary: deferred wrap ─────────────────────────────────────────

#[test]
fn full_row_leaves_cursor_on_margin() {
    let mut t = term(5, 3, 10);
    feed(&mut t, b"abcde");
    assert_eq!(t.cursor(), (5, 0), "x == cols, y unchanged");
    feed(&mut t, b"f");
    assert_eq!(t.cursor(), (1, 1), "next printable wraps to x=1, y+1");
    assert_eq!(t.row_text(1).unwrap(), "f    ");
}

#[test]
fn margin_wrap_scrolls_at_bottom() {
    let mut t = term(5, 2, 10);
    feed(&mut t, b"aaaaa\r\nbbbbb");
    assert_eq!(t.cursor(), (5, 1));
    feed(&mut t, b"c");
    assert_eq!(t.scrollback_len(), 1);
    assert_eq!(t.row_text(0).unwrap(), "bbbbb");
    assert_eq!(t.row_text(1).unwrap(), "c    ");
}

// ── Boundary: ECH at the margin ─────────────────────────────────────

#[test]
fn ech_clipped_by_margin() {
    let mut t = term(8, 2, 10);
    feed(&mut t, b"abcdefgh\x1b[1;6H\x1b[9X");
    // Cursor at column 6 (0-based 5): only 3 cells remain to erase.
    assert_eq!(t.row_text(0).unwrap(), "abcde   ");
}

// ── Boundary: sequences split across writes ─────────────────────────

#[test]
fn csi_split_across_writes_matches_concatenated() {
    let mut split = term(20, 4, 10);
    split.write(b"\x1b[3");
    split.write(b"1mred\x1b[");
    split.write(b"0m!");
    split.flush();

    let mut whole = term(20, 4, 10);
    feed(&mut whole, b"\x1b[31mred\x1b[0m!");

    for y in 0..4 {
        assert_eq!(split.row_text(y), whole.row_text(y));
        for x in 0..20 {
            assert_eq!(split.cell(x, y), whole.cell(x, y));
        }
    }
    assert_eq!(split.cursor(), whole.cursor());
}

#[test]
fn utf8_split_across_writes() {
    let mut t = term(10, 2, 10);
    let bytes = "中".as_bytes();
    t.write(&bytes[..1]);
    t.flush();
    t.write(&bytes[1..]);
    t.flush();
    assert_eq!(t.cell(0, 0).unwrap().ch, '中');
    assert_eq!(t.cursor(), (2, 0), "wide glyph advanced two columns");
}

// ── Round-trip laws ─────────────────────────────────────────────────

#[test]
fn save_restore_cursor_law() {
    let mut t = term(40, 12, 10);
    feed(&mut t, b"\x1b[5;7H\x1b7\x1b[H\x1b[3B\x1b[10C\x1b8");
    assert_eq!(t.cursor(), (6, 4));
    // The ANSI forms obey the same law.
    feed(&mut t, b"\x1b[2;2H\x1b[s\x1b[10;10H\x1b[u");
    assert_eq!(t.cursor(), (1, 1));
}

#[test]
fn tab_set_and_back_tab_law() {
    let mut t = term(40, 4, 10);
    // Set a stop at column 11, move right of it (before the next default
    // stop at 17), and back-tab home to it.
    feed(&mut t, b"\x1b[1;11H\x1bH\x1b[1;14H\x1b[Z");
    assert_eq!(t.cursor().0, 10);
}

// ── Erase semantics ─────────────────────────────────────────────────

#[test]
fn erase_display_variants() {
    let mut t = term(3, 3, 10);
    feed(&mut t, b"aaa\r\nbbb\r\nccc\x1b[2;2H\x1b[J");
    assert_eq!(t.row_text(0).unwrap(), "aaa");
    assert_eq!(t.row_text(1).unwrap(), "b  ");
    assert_eq!(t.row_text(2).unwrap(), "   ");

    let mut t = term(3, 3, 10);
    feed(&mut t, b"aaa\r\nbbb\r\nccc\x1b[2;2H\x1b[1J");
    assert_eq!(t.row_text(0).unwrap(), "   ");
    assert_eq!(t.row_text(1).unwrap(), "  b");
    assert_eq!(t.row_text(2).unwrap(), "ccc");

    let mut t = term(3, 3, 10);
    feed(&mut t, b"aaa\r\nbbb\r\nccc\x1b[2J");
    for y in 0..3 {
        assert_eq!(t.row_text(y).unwrap(), "   ");
    }
}

#[test]
fn erase_scrollback_request_is_noop() {
    let mut t = term(2, 2, 10);
    feed(&mut t, b"a\r\nb\r\nc\x1b[3J");
    assert!(t.scrollback_len() > 0, "ED 3 leaves scrollback alone");
}

// ── Scroll region behavior ──────────────────────────────────────────

#[test]
fn scroll_region_contains_line_feeds() {
    let mut t = term(1, 5, 10);
    feed(&mut t, b"a\r\nb\r\nc\r\nd\r\ne");
    feed(&mut t, b"\x1b[2;4r\x1b[4;1H\n");
    assert_eq!(t.row_text(0).unwrap(), "a");
    assert_eq!(t.row_text(1).unwrap(), "c");
    assert_eq!(t.row_text(2).unwrap(), "d");
    assert_eq!(t.row_text(3).unwrap(), " ");
    assert_eq!(t.row_text(4).unwrap(), "e");
    assert_eq!(t.scrollback_len(), 0, "region scroll spares scrollback");
}

#[test]
fn reverse_index_in_region() {
    let mut t = term(1, 4, 10);
    feed(&mut t, b"a\r\nb\r\nc\r\nd\x1b[2;3r\x1b[2;1H\x1bM");
    assert_eq!(t.row_text(0).unwrap(), "a");
    assert_eq!(t.row_text(1).unwrap(), " ");
    assert_eq!(t.row_text(2).unwrap(), "b");
    assert_eq!(t.row_text(3).unwrap(), "d");
}

// ── Origin mode ─────────────────────────────────────────────────────

#[test]
fn origin_mode_homes_into_region() {
    let mut t = term(10, 10, 10);
    feed(&mut t, b"\x1b[3;8r\x1b[?6h\x1b[HX");
    assert_eq!(t.row_text(2).unwrap().trim_end(), "X");
}

// ── Charsets through the stream ─────────────────────────────────────

#[test]
fn line_drawing_charset_via_stream() {
    let mut t = term(10, 2, 10);
    feed(&mut t, b"\x1b(0lqqk\x1b(B x");
    assert_eq!(t.row_text(0).unwrap().trim_end(), "\u{250c}\u{2500}\u{2500}\u{2510} x");
}

#[test]
fn shift_out_uses_g1() {
    let mut t = term(10, 2, 10);
    feed(&mut t, b"\x1b)0q\x0eq\x0fq");
    assert_eq!(t.row_text(0).unwrap().trim_end(), "q\u{2500}q");
}

// ── Insert and repeat ───────────────────────────────────────────────

#[test]
fn insert_mode_and_rep() {
    let mut t = term(10, 2, 10);
    feed(&mut t, b"ab\x1b[3b");
    assert_eq!(t.row_text(0).unwrap(), "abbb      ");
}

// ── DECALN ──────────────────────────────────────────────────────────

#[test]
fn decaln_fills_screen() {
    let mut t = term(4, 2, 10);
    feed(&mut t, b"\x1b#8");
    assert_eq!(t.row_text(0).unwrap(), "EEEE");
    assert_eq!(t.row_text(1).unwrap(), "EEEE");
    assert_eq!(t.cursor(), (0, 0));
}

// ── Erase uses the erase style ──────────────────────────────────────

#[test]
fn erase_applies_default_background() {
    let mut t = term(4, 2, 10);
    feed(&mut t, b"\x1b[41m\x1b[2J");
    let cell = t.cell(0, 0).unwrap();
    assert_eq!(cell.ch, ' ');
    assert_eq!(cell.style.bg(), DEFAULT_BG);
}

// ── convert_eol option ──────────────────────────────────────────────

#[test]
fn convert_eol_makes_lf_return_carriage() {
    let mut t = Terminal::new(Options {
        cols: 10,
        rows: 4,
        convert_eol: true,
        ..Options::default()
    });
    feed(&mut t, b"one\ntwo");
    assert_eq!(t.row_text(0).unwrap().trim_end(), "one");
    assert_eq!(t.row_text(1).unwrap().trim_end(), "two");
}

// ── Reset equivalence ───────────────────────────────────────────────

#[test]
fn reset_equals_fresh_construction() {
    let mut used = term(10, 4, 100);
    feed(
        &mut used,
        b"\x1b[31mgarbage\x1b[?6h\x1b[2;3r\x1b(0\x1b[4h\x1b]0;t\x07stuff",
    );
    used.reset();
    let fresh = term(10, 4, 100);
    for y in 0..4 {
        for x in 0..10 {
            assert_eq!(used.cell(x, y), fresh.cell(x, y));
        }
    }
    assert_eq!(used.cursor(), fresh.cursor());
    assert_eq!(used.style(), fresh.style());
    assert_eq!(used.scrollback_len(), fresh.scrollback_len());
    assert_eq!(used.screen().modes, fresh.screen().modes);
}

// ── Title, bell and mouse through the public surface ────────────────

#[test]
fn title_event_from_osc() {
    let mut t = term(10, 2, 10);
    let titles = Rc::new(RefCell::new(Vec::new()));
    {
        let titles = titles.clone();
        t.subscribe(EventKind::Title, move |ev| {
            if let Event::Title(s) = ev {
                titles.borrow_mut().push(s.clone());
            }
        });
    }
    feed(&mut t, b"\x1b]0;first\x07\x1b]2;second\x1b\\");
    assert_eq!(&*titles.borrow(), &["first".to_string(), "second".to_string()]);
}

#[test]
fn sgr_mouse_full_loop() {
    let mut t = term(80, 24, 10);
    let sink = data_sink(&mut t);
    feed(&mut t, b"\x1b[?1000h\x1b[?1006h");
    t.mouse(
        MouseEventKind::Down,
        Some(MouseButton::Left),
        Modifiers::empty(),
        10,
        5,
    );
    // VT200 sends press and the immediate release.
    assert_eq!(&*sink.borrow(), b"\x1b[<0;11;6M\x1b[<0;11;6m");
}

#[test]
fn keyboard_to_bytes_through_engine() {
    let mut t = term(80, 24, 10);
    let sink = data_sink(&mut t);
    t.key_down(Key::F(5), Modifiers::empty());
    t.key_down(Key::Char('c'), Modifiers::CTRL);
    t.key_press('Z', Modifiers::empty());
    assert_eq!(&*sink.borrow(), b"\x1b[15~\x03Z");
}
