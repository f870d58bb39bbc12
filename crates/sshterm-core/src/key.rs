//! Keyboard keys and their encoding for the remote terminal.

use crate::{Error, Result};

/// Keyboard key forwarded to the remote shell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Regular character
    Char(char),

    // Navigation
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Home key
    Home,
    /// End key
    End,
    /// Page Up
    PageUp,
    /// Page Down
    PageDown,

    // Editing
    /// Enter/Return key
    Enter,
    /// Tab key
    Tab,
    /// Shift+Tab
    BackTab,
    /// Escape key
    Escape,
    /// Backspace key
    Backspace,
    /// Delete key
    Delete,
    /// Insert key
    Insert,

    /// Function key F1-F12
    F(u8),

    /// Ctrl + character
    Ctrl(char),
    /// Alt + key
    Alt(Box<Key>),
}

impl Key {
    /// Parse key from string representation.
    ///
    /// Examples:
    /// - "a" -> Key::Char('a')
    /// - "Ctrl+c" -> Key::Ctrl('c')
    /// - "Alt+Left" -> Key::Alt(Box::new(Key::Left))
    /// - "Shift+Tab" -> Key::BackTab
    /// - "F5" -> Key::F(5)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(rest) = s.strip_prefix("Ctrl+") {
            let mut chars = rest.chars();
            return match (chars.next(), chars.next()) {
                (Some(ch), None) => Ok(Key::Ctrl(ch.to_ascii_lowercase())),
                _ => Err(Error::InvalidInput(format!("Invalid Ctrl+ key: {s}"))),
            };
        }

        if let Some(rest) = s.strip_prefix("Alt+") {
            if rest.is_empty() {
                return Err(Error::InvalidInput(format!("Invalid Alt+ key: {s}")));
            }
            return Ok(Key::Alt(Box::new(Key::parse(rest)?)));
        }

        if s == "Shift+Tab" {
            return Ok(Key::BackTab);
        }

        match s {
            "Enter" | "Return" => Ok(Key::Enter),
            "Tab" => Ok(Key::Tab),
            "BackTab" => Ok(Key::BackTab),
            "Escape" | "Esc" => Ok(Key::Escape),
            "Backspace" => Ok(Key::Backspace),
            "Delete" | "Del" => Ok(Key::Delete),
            "Space" => Ok(Key::Char(' ')),
            "Insert" | "Ins" => Ok(Key::Insert),
            "Up" => Ok(Key::Up),
            "Down" => Ok(Key::Down),
            "Left" => Ok(Key::Left),
            "Right" => Ok(Key::Right),
            "Home" => Ok(Key::Home),
            "End" => Ok(Key::End),
            "PageUp" | "PgUp" => Ok(Key::PageUp),
            "PageDown" | "PgDn" => Ok(Key::PageDown),
            _ => {
                if let Some(n) = s.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
                    if (1..=12).contains(&n) {
                        return Ok(Key::F(n));
                    }
                }

                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(Key::Char(ch)),
                    _ => Err(Error::InvalidInput(format!("Unknown key: {s}"))),
                }
            }
        }
    }

    /// Bytes a remote xterm expects for this key.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Key::Char(c) => c.to_string().into_bytes(),
            Key::Enter => vec![0x0D],
            Key::Tab => vec![0x09],
            Key::BackTab => b"\x1b[Z".to_vec(),
            Key::Escape => vec![0x1B],
            Key::Backspace => vec![0x7F],
            Key::Delete => b"\x1b[3~".to_vec(),
            Key::Insert => b"\x1b[2~".to_vec(),
            Key::Up => b"\x1b[A".to_vec(),
            Key::Down => b"\x1b[B".to_vec(),
            Key::Right => b"\x1b[C".to_vec(),
            Key::Left => b"\x1b[D".to_vec(),
            Key::Home => b"\x1b[H".to_vec(),
            Key::End => b"\x1b[F".to_vec(),
            Key::PageUp => b"\x1b[5~".to_vec(),
            Key::PageDown => b"\x1b[6~".to_vec(),
            Key::F(n) => match n {
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
                _ => Vec::new(),
            },
            Key::Ctrl(c) => match Self::control_code(*c) {
                Some(code) => vec![code],
                None => c.to_string().into_bytes(),
            },
            Key::Alt(inner) => {
                let mut seq = vec![0x1B];
                seq.extend(inner.encode());
                seq
            }
        }
    }

    /// C0 control code produced by Ctrl + `c`.
    fn control_code(c: char) -> Option<u8> {
        match c {
            'a'..='z' => Some(c as u8 - b'a' + 1),
            'A'..='Z' => Some(c as u8 - b'A' + 1),
            '@' | ' ' | '`' | '2' => Some(0x00),
            '[' | '3' => Some(0x1B),
            '\\' | '4' => Some(0x1C),
            ']' | '5' => Some(0x1D),
            '^' | '~' | '6' => Some(0x1E),
            '_' | '/' | '7' => Some(0x1F),
            '?' | '8' => Some(0x7F),
            _ => None,
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Char(' ') => write!(f, "Space"),
            Key::Char(c) => write!(f, "{c}"),
            Key::Up => write!(f, "Up"),
            Key::Down => write!(f, "Down"),
            Key::Left => write!(f, "Left"),
            Key::Right => write!(f, "Right"),
            Key::Home => write!(f, "Home"),
            Key::End => write!(f, "End"),
            Key::PageUp => write!(f, "PageUp"),
            Key::PageDown => write!(f, "PageDown"),
            Key::Enter => write!(f, "Enter"),
            Key::Tab => write!(f, "Tab"),
            Key::BackTab => write!(f, "Shift+Tab"),
            Key::Escape => write!(f, "Escape"),
            Key::Backspace => write!(f, "Backspace"),
            Key::Delete => write!(f, "Delete"),
            Key::Insert => write!(f, "Insert"),
            Key::F(n) => write!(f, "F{n}"),
            Key::Ctrl(c) => write!(f, "Ctrl+{c}"),
            Key::Alt(k) => write!(f, "Alt+{k}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parse_char() {
        assert_eq!(Key::parse("a").unwrap(), Key::Char('a'));
        assert_eq!(Key::parse("Z").unwrap(), Key::Char('Z'));
        assert_eq!(Key::parse("é").unwrap(), Key::Char('é'));
        assert_eq!(Key::parse("Space").unwrap(), Key::Char(' '));
    }

    #[test]
    fn test_key_parse_named() {
        assert_eq!(Key::parse("Enter").unwrap(), Key::Enter);
        assert_eq!(Key::parse("Return").unwrap(), Key::Enter);
        assert_eq!(Key::parse("Esc").unwrap(), Key::Escape);
        assert_eq!(Key::parse("PgDn").unwrap(), Key::PageDown);
        assert_eq!(Key::parse("F1").unwrap(), Key::F(1));
        assert_eq!(Key::parse("F12").unwrap(), Key::F(12));
        assert_eq!(Key::parse("Shift+Tab").unwrap(), Key::BackTab);
    }

    #[test]
    fn test_key_parse_modifiers() {
        assert_eq!(Key::parse("Ctrl+C").unwrap(), Key::Ctrl('c'));
        assert_eq!(
            Key::parse("Alt+Left").unwrap(),
            Key::Alt(Box::new(Key::Left))
        );
        assert_eq!(Key::parse("Alt+f").unwrap(), Key::Alt(Box::new(Key::Char('f'))));
    }

    #[test]
    fn test_key_parse_invalid() {
        assert!(Key::parse("InvalidKey").is_err());
        assert!(Key::parse("Ctrl+").is_err());
        assert!(Key::parse("Ctrl+ab").is_err());
        assert!(Key::parse("Alt+").is_err());
        assert!(Key::parse("F13").is_err());
    }

    #[test]
    fn test_encode_editing_keys() {
        assert_eq!(Key::Enter.encode(), vec![0x0D]);
        assert_eq!(Key::Tab.encode(), vec![0x09]);
        assert_eq!(Key::BackTab.encode(), b"\x1b[Z");
        assert_eq!(Key::Escape.encode(), vec![0x1B]);
        assert_eq!(Key::Backspace.encode(), vec![0x7F]);
        assert_eq!(Key::Delete.encode(), b"\x1b[3~");
    }

    #[test]
    fn test_encode_navigation() {
        assert_eq!(Key::Up.encode(), b"\x1b[A");
        assert_eq!(Key::Down.encode(), b"\x1b[B");
        assert_eq!(Key::Right.encode(), b"\x1b[C");
        assert_eq!(Key::Left.encode(), b"\x1b[D");
        assert_eq!(Key::Home.encode(), b"\x1b[H");
        assert_eq!(Key::PageUp.encode(), b"\x1b[5~");
    }

    #[test]
    fn test_encode_function_keys() {
        assert_eq!(Key::F(1).encode(), b"\x1bOP");
        assert_eq!(Key::F(5).encode(), b"\x1b[15~");
        assert_eq!(Key::F(12).encode(), b"\x1b[24~");
        assert!(Key::F(13).encode().is_empty());
    }

    #[test]
    fn test_encode_ctrl() {
        assert_eq!(Key::Ctrl('a').encode(), vec![0x01]);
        assert_eq!(Key::Ctrl('c').encode(), vec![0x03]);
        assert_eq!(Key::Ctrl('Z').encode(), vec![0x1A]);
        assert_eq!(Key::Ctrl('[').encode(), vec![0x1B]);
        assert_eq!(Key::Ctrl(' ').encode(), vec![0x00]);
        // no control code: sent as the plain character
        assert_eq!(Key::Ctrl('1').encode(), b"1");
    }

    #[test]
    fn test_encode_alt() {
        assert_eq!(Key::Alt(Box::new(Key::Char('f'))).encode(), b"\x1bf");
        assert_eq!(Key::Alt(Box::new(Key::Up)).encode(), b"\x1b\x1b[A");
    }

    #[test]
    fn test_encode_utf8_char() {
        assert_eq!(Key::Char('é').encode(), "é".as_bytes());
    }

    #[test]
    fn test_display_parses_back() {
        for key in [
            Key::Char('x'),
            Key::Char(' '),
            Key::Enter,
            Key::BackTab,
            Key::F(7),
            Key::Ctrl('d'),
            Key::Alt(Box::new(Key::Right)),
        ] {
            assert_eq!(Key::parse(&key.to_string()).unwrap(), key);
        }
    }
}
