//! Input translation: keyboard and mouse events to wire bytes.
//!
//! The keyboard side maps logical keys plus modifiers to the byte sequences
//! an xterm-compatible application expects, honoring application-cursor and
//! application-keypad modes. The mouse side serializes `(button, x, y)` into
//! the default/X10, UTF-8 extended, SGR, urxvt, and VT300 encodings.
//!
//! Key and mouse schema types carry serde derives so hosts can record and
//! replay input streams deterministically.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::modes::{Modes, MouseEncoding, MouseProtocol};

bitflags! {
    /// Modifier keys held during an input event.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const META  = 0b1000;
    }
}

/// Logical key for `key_down`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    F(u8),
}

/// Result of translating a key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Send these bytes upstream.
    Emit(Vec<u8>),
    /// Scroll the view by whole rows instead of emitting.
    ScrollView(i32),
    /// Scroll the view by pages instead of emitting.
    ScrollPages(i32),
    /// Not handled here; the character arrives via `key_press`.
    Passthrough,
    /// No mapping exists for this combination.
    Unmapped,
}

/// Number of rows a wheel tick scrolls when no mouse protocol is active.
pub const WHEEL_SCROLL_LINES: i32 = 5;

/// Translate a `key_down` event.
pub fn translate_key(key: Key, mods: Modifiers, modes: &Modes) -> KeyAction {
    let shift = mods.contains(Modifiers::SHIFT);
    let ctrl = mods.contains(Modifiers::CTRL);
    let alt = mods.contains(Modifiers::ALT) || mods.contains(Modifiers::META);

    let action = match key {
        Key::Backspace => KeyAction::Emit(if shift { vec![0x08] } else { vec![0x7F] }),
        Key::Tab => KeyAction::Emit(if shift {
            b"\x1b[Z".to_vec()
        } else {
            vec![b'\t']
        }),
        Key::Enter => KeyAction::Emit(vec![b'\r']),
        Key::Escape => KeyAction::Emit(vec![0x1B]),
        Key::Up | Key::Down | Key::Left | Key::Right => {
            let letter = match key {
                Key::Up => b'A',
                Key::Down => b'B',
                Key::Right => b'C',
                _ => b'D',
            };
            if ctrl && shift && matches!(key, Key::Up | Key::Down) {
                return KeyAction::ScrollView(if key == Key::Up { -1 } else { 1 });
            }
            if ctrl {
                KeyAction::Emit(format!("\x1b[1;5{}", letter as char).into_bytes())
            } else if modes.application_cursor {
                KeyAction::Emit(vec![0x1B, b'O', letter])
            } else {
                KeyAction::Emit(vec![0x1B, b'[', letter])
            }
        }
        Key::Home => KeyAction::Emit(b"\x1bOH".to_vec()),
        Key::End => KeyAction::Emit(b"\x1bOF".to_vec()),
        Key::PageUp => {
            if shift {
                return KeyAction::ScrollPages(-1);
            }
            KeyAction::Emit(b"\x1b[5~".to_vec())
        }
        Key::PageDown => {
            if shift {
                return KeyAction::ScrollPages(1);
            }
            KeyAction::Emit(b"\x1b[6~".to_vec())
        }
        Key::Insert => KeyAction::Emit(b"\x1b[2~".to_vec()),
        Key::Delete => KeyAction::Emit(b"\x1b[3~".to_vec()),
        Key::F(n) => match function_key(n) {
            Some(seq) => KeyAction::Emit(seq),
            None => KeyAction::Unmapped,
        },
        Key::Char(c) => {
            if ctrl {
                match ctrl_char(c) {
                    Some(b) => KeyAction::Emit(vec![b]),
                    None => KeyAction::Unmapped,
                }
            } else if alt {
                let mut bytes = vec![0x1B];
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                return KeyAction::Emit(bytes);
            } else {
                // Plain printables arrive through key_press.
                KeyAction::Passthrough
            }
        }
    };

    // Alt prefixes the translated sequence with ESC (Char handled above).
    if alt {
        if let KeyAction::Emit(bytes) = action {
            let mut prefixed = vec![0x1B];
            prefixed.extend(bytes);
            return KeyAction::Emit(prefixed);
        }
    }
    action
}

/// Translate a `key_press` character.
#[must_use]
pub fn translate_keypress(ch: char, mods: Modifiers) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(5);
    if mods.contains(Modifiers::ALT) || mods.contains(Modifiers::META) {
        bytes.push(0x1B);
    }
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    bytes
}

fn function_key(n: u8) -> Option<Vec<u8>> {
    Some(match n {
        1 => b"\x1bOP".to_vec(),
        2 => b"\x1bOQ".to_vec(),
        3 => b"\x1bOR".to_vec(),
        4 => b"\x1bOS".to_vec(),
        5 => b"\x1b[15~".to_vec(),
        6 => b"\x1b[17~".to_vec(),
        7 => b"\x1b[18~".to_vec(),
        8 => b"\x1b[19~".to_vec(),
        9 => b"\x1b[20~".to_vec(),
        10 => b"\x1b[21~".to_vec(),
        11 => b"\x1b[23~".to_vec(),
        12 => b"\x1b[24~".to_vec(),
        _ => return None,
    })
}

/// Ctrl+key byte, if one exists.
fn ctrl_char(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a' + 1),
        'A'..='Z' => Some(c as u8 - b'A' + 1),
        ' ' => Some(0x00),
        '3'..='7' => Some(0x1B + (c as u8 - b'3')),
        '8' | '\\' => Some(0x7F),
        ']' => Some(0x1D),
        _ => None,
    }
}

// ── Mouse ───────────────────────────────────────────────────────────

/// Physical mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    fn code(self) -> u16 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
        }
    }
}

/// Mouse event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseEventKind {
    Down,
    Up,
    Move,
    WheelUp,
    WheelDown,
}

/// Encode a mouse event under the active protocol and encoding.
///
/// Returns `None` when the protocol suppresses the event (no reporting, X10
/// release, motion without the right tracking level). VT200 presses carry
/// their release immediately after, per the protocol's quirk.
pub fn encode_mouse_event(
    kind: MouseEventKind,
    button: Option<MouseButton>,
    mods: Modifiers,
    x: u16,
    y: u16,
    modes: &Modes,
) -> Option<Vec<u8>> {
    let proto = modes.mouse_protocol;
    if proto == MouseProtocol::None {
        return None;
    }

    match kind {
        MouseEventKind::Move => match proto {
            MouseProtocol::AnyEvent => {}
            MouseProtocol::ButtonEvent if button.is_some() => {}
            _ => return None,
        },
        MouseEventKind::Up => {
            // X10 never reports releases; VT200 already sent one with the press.
            if matches!(proto, MouseProtocol::X10 | MouseProtocol::Vt200) {
                return None;
            }
        }
        _ => {}
    }

    let motion = kind == MouseEventKind::Move;
    let with_mods = proto != MouseProtocol::X10;
    let value = button_value(kind, button, mods, motion, with_mods, modes.mouse_encoding);
    let press = kind != MouseEventKind::Up;
    let mut bytes = encode_report(value, x, y, press, modes.mouse_encoding)?;

    if proto == MouseProtocol::Vt200 && kind == MouseEventKind::Down {
        let release = button_value(
            MouseEventKind::Up,
            button,
            mods,
            false,
            with_mods,
            modes.mouse_encoding,
        );
        if let Some(tail) = encode_report(release, x, y, false, modes.mouse_encoding) {
            bytes.extend(tail);
        }
    }
    Some(bytes)
}

/// The button byte before coordinate packing: base button, wheel, release,
/// modifier bits, motion offset.
fn button_value(
    kind: MouseEventKind,
    button: Option<MouseButton>,
    mods: Modifiers,
    motion: bool,
    with_mods: bool,
    encoding: MouseEncoding,
) -> u16 {
    let base = match kind {
        MouseEventKind::WheelUp => 64,
        MouseEventKind::WheelDown => 65,
        // SGR releases name the real button; the legacy forms use 3.
        MouseEventKind::Up if encoding != MouseEncoding::Sgr => 3,
        _ => button.map_or(3, MouseButton::code),
    };
    let mut value = base;
    if with_mods {
        if mods.contains(Modifiers::SHIFT) {
            value += 4;
        }
        if mods.contains(Modifiers::META) {
            value += 8;
        }
        if mods.contains(Modifiers::CTRL) {
            value += 16;
        }
    }
    if motion {
        value += 32;
    }
    value
}

fn encode_report(
    value: u16,
    x: u16,
    y: u16,
    press: bool,
    encoding: MouseEncoding,
) -> Option<Vec<u8>> {
    match encoding {
        MouseEncoding::Default => {
            let mut out = b"\x1b[M".to_vec();
            for v in [value + 32, x + 1 + 32, y + 1 + 32] {
                push_legacy(&mut out, v);
            }
            Some(out)
        }
        MouseEncoding::Utf8 => {
            let mut out = b"\x1b[M".to_vec();
            for v in [value + 32, x + 1 + 32, y + 1 + 32] {
                push_utf8(&mut out, v);
            }
            Some(out)
        }
        MouseEncoding::Sgr => Some(
            format!(
                "\x1b[<{};{};{}{}",
                value,
                x + 1,
                y + 1,
                if press { 'M' } else { 'm' }
            )
            .into_bytes(),
        ),
        MouseEncoding::Urxvt => {
            Some(format!("\x1b[{};{};{}M", value + 32, x + 1, y + 1).into_bytes())
        }
        MouseEncoding::Vt300 => {
            let digit = match value & 3 {
                0 => '1',
                1 => '3',
                2 => '5',
                _ => return None,
            };
            Some(format!("\x1b[24{}~[{},{}]\r", digit, x + 1, y + 1).into_bytes())
        }
    }
}

/// Single-byte packing: 255 is unrepresentable (NUL marker), everything past
/// 127 clamps.
fn push_legacy(out: &mut Vec<u8>, v: u16) {
    if v == 255 {
        out.push(0);
    } else if v > 127 {
        out.push(127);
    } else {
        out.push(v as u8);
    }
}

/// UTF-8 variable-width packing extends the coordinate range to 2047.
fn push_utf8(out: &mut Vec<u8>, v: u16) {
    let v = v.min(2047);
    if v == 2047 {
        out.push(0);
    } else if v < 128 {
        out.push(v as u8);
    } else {
        out.push(0xC0 | (v >> 6) as u8);
        out.push(0x80 | (v & 0x3F) as u8);
    }
}

/// Decode an SGR mouse report. Returns `(button_value, x, y, press)` with
/// 0-based coordinates. Inverse of the SGR arm of [`encode_mouse_event`].
#[must_use]
pub fn decode_sgr_mouse(bytes: &[u8]) -> Option<(u16, u16, u16, bool)> {
    let rest = bytes.strip_prefix(b"\x1b[<")?;
    let (&last, body) = rest.split_last()?;
    let press = match last {
        b'M' => true,
        b'm' => false,
        _ => return None,
    };
    let text = core::str::from_utf8(body).ok()?;
    let mut parts = text.split(';');
    let value: u16 = parts.next()?.parse().ok()?;
    let x: u16 = parts.next()?.parse().ok()?;
    let y: u16 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || x == 0 || y == 0 {
        return None;
    }
    Some((value, x - 1, y - 1, press))
}
