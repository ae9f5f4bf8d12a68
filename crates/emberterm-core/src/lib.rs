#![forbid(unsafe_code)]

//! Host-agnostic VT/xterm terminal engine.
//!
//! `emberterm-core` is a byte-stream-driven terminal model: it consumes the
//! output of a character-cell application, maintains the screen (cells,
//! attributes, scrollback, modes, alternate buffer), and translates keyboard
//! and mouse input back into the byte sequences the application expects.
//! Rendering, clipboard, PTY transport and configuration live in hosts.
//!
//! # Primary responsibilities
//!
//! - **Cell / Style**: packed per-cell attributes with a 256-color palette.
//! - **Buffer**: viewport + scrollback in one row sequence, dirty tracking.
//! - **Screen**: cursor, scroll region, tab stops, charsets, alt buffer.
//! - **Parser**: incremental escape-sequence state machine.
//! - **Writer**: budgeted write chunking driven by a host scheduler.
//! - **Input**: key/mouse translation across the xterm reporting modes.
//! - **Events**: synchronous typed emissions; the engine performs no I/O.
//!
//! # Design principles
//!
//! - **No I/O**: bytes in via [`Terminal::write`], bytes out via events.
//! - **Best-effort decoding**: nothing the stream contains is an error.
//! - **Deterministic**: identical byte sequences produce identical state,
//!   regardless of how they are chunked.

pub mod buffer;
pub mod cell;
pub mod charset;
pub mod engine;
pub mod event;
pub mod input;
pub mod modes;
pub mod options;
pub mod palette;
pub mod parser;
pub mod screen;
pub mod writer;

pub use buffer::{Row, ScreenBuffer};
pub use cell::{apply_sgr, display_width, Cell, Style, StyleFlags, DEFAULT_BG, DEFAULT_FG};
pub use charset::Charset;
pub use engine::Terminal;
pub use event::{Emitter, Event, EventKind, ListenerId};
pub use input::{
    decode_sgr_mouse, translate_key, translate_keypress, Key, KeyAction, Modifiers, MouseButton,
    MouseEventKind,
};
pub use modes::{Modes, MouseEncoding, MouseProtocol};
pub use options::Options;
pub use palette::{Palette, Rgb};
pub use parser::{Action, CsiParams, Parser};
pub use screen::Screen;
pub use writer::{NullScheduler, PumpOutcome, Scheduler, WriteQueue};
