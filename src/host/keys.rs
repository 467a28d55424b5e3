//! Key mapping for terminal input
//!
//! Converts key events into the bytes a serial terminal would send.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Key mapper for converting key events to bytes
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent to console bytes; `None` for keys a
    /// line console has no use for (arrows, function keys, releases)
    pub fn map(event: &KeyEvent) -> Option<Vec<u8>> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        match event.code {
            KeyCode::Char(ch) => Some(Self::map_char(ch, event.modifiers)),
            // Enter sends CR like a serial terminal
            KeyCode::Enter => Some(vec![b'\r']),
            KeyCode::Tab => Some(vec![b'\t']),
            KeyCode::Backspace => Some(vec![0x08]),
            KeyCode::Esc => Some(vec![0x1B]),
            _ => None,
        }
    }

    /// Map a character with modifiers
    fn map_char(ch: char, mods: KeyModifiers) -> Vec<u8> {
        // Ctrl + letter = control character
        if mods.contains(KeyModifiers::CONTROL) && ch.is_ascii_alphabetic() {
            return vec![(ch.to_ascii_lowercase() as u8) - b'a' + 1];
        }
        let mut buf = [0u8; 4];
        ch.encode_utf8(&mut buf).as_bytes().to_vec()
    }

    /// Is this the interrupt key (Ctrl+C)?
    pub fn is_interrupt(event: &KeyEvent) -> bool {
        event.kind != KeyEventKind::Release
            && event.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(event.code, KeyCode::Char('c') | KeyCode::Char('C'))
    }
}
