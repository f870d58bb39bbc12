//! Colors, rendering attributes and the interpreter's output values.

use serde::{Deserialize, Serialize};

/// Terminal color: the terminal default or one of the 16 ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    /// Default terminal color
    #[default]
    Default,

    /// Standard ANSI colors (0-7)
    Black,
    /// ANSI Red
    Red,
    /// ANSI Green
    Green,
    /// ANSI Yellow
    Yellow,
    /// ANSI Blue
    Blue,
    /// ANSI Magenta
    Magenta,
    /// ANSI Cyan
    Cyan,
    /// ANSI White
    White,

    /// Bright ANSI colors (8-15)
    BrightBlack,
    /// Bright Red
    BrightRed,
    /// Bright Green
    BrightGreen,
    /// Bright Yellow
    BrightYellow,
    /// Bright Blue
    BrightBlue,
    /// Bright Magenta
    BrightMagenta,
    /// Bright Cyan
    BrightCyan,
    /// Bright White
    BrightWhite,
}

impl Color {
    /// ANSI palette index 0-15 to color.
    pub fn from_index(index: u8) -> Option<Self> {
        let color = match index {
            0 => Color::Black,
            1 => Color::Red,
            2 => Color::Green,
            3 => Color::Yellow,
            4 => Color::Blue,
            5 => Color::Magenta,
            6 => Color::Cyan,
            7 => Color::White,
            8 => Color::BrightBlack,
            9 => Color::BrightRed,
            10 => Color::BrightGreen,
            11 => Color::BrightYellow,
            12 => Color::BrightBlue,
            13 => Color::BrightMagenta,
            14 => Color::BrightCyan,
            15 => Color::BrightWhite,
            _ => return None,
        };
        Some(color)
    }

    /// Foreground color for an SGR code (30-37, 90-97).
    pub fn from_foreground_code(code: u16) -> Option<Self> {
        match code {
            30..=37 => Self::from_index((code - 30) as u8),
            90..=97 => Self::from_index((code - 90 + 8) as u8),
            _ => None,
        }
    }

    /// Background color for an SGR code (40-47).
    pub fn from_background_code(code: u16) -> Option<Self> {
        match code {
            40..=47 => Self::from_index((code - 40) as u8),
            _ => None,
        }
    }

    /// ANSI palette index, None for the default color.
    pub fn index(self) -> Option<u8> {
        let index = match self {
            Color::Default => return None,
            Color::Black => 0,
            Color::Red => 1,
            Color::Green => 2,
            Color::Yellow => 3,
            Color::Blue => 4,
            Color::Magenta => 5,
            Color::Cyan => 6,
            Color::White => 7,
            Color::BrightBlack => 8,
            Color::BrightRed => 9,
            Color::BrightGreen => 10,
            Color::BrightYellow => 11,
            Color::BrightBlue => 12,
            Color::BrightMagenta => 13,
            Color::BrightCyan => 14,
            Color::BrightWhite => 15,
        };
        Some(index)
    }

    /// Palette RGB value, None for the default color.
    pub fn rgb(self) -> Option<(u8, u8, u8)> {
        let rgb = match self {
            Color::Default => return None,
            Color::Black => (0, 0, 0),
            Color::Red => (205, 0, 0),
            Color::Green => (0, 205, 0),
            Color::Yellow => (205, 205, 0),
            Color::Blue => (0, 0, 238),
            Color::Magenta => (205, 0, 205),
            Color::Cyan => (0, 205, 205),
            Color::White => (229, 229, 229),
            Color::BrightBlack => (127, 127, 127),
            Color::BrightRed => (255, 0, 0),
            Color::BrightGreen => (0, 255, 0),
            Color::BrightYellow => (255, 255, 0),
            Color::BrightBlue => (92, 92, 255),
            Color::BrightMagenta => (255, 0, 255),
            Color::BrightCyan => (0, 255, 255),
            Color::BrightWhite => (255, 255, 255),
        };
        Some(rgb)
    }
}

/// Rendering attributes applied to plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Attributes {
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
}

impl Attributes {
    /// Attributes with the given foreground and background.
    pub fn new(fg: Color, bg: Color) -> Self {
        Self { fg, bg }
    }

    /// Check if attributes are the terminal defaults.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Apply a directive, returning the updated attributes.
    pub fn apply(self, directive: &ControlDirective) -> Self {
        match *directive {
            ControlDirective::SetForeground(fg) => Self { fg, ..self },
            ControlDirective::SetBackground(bg) => Self { bg, ..self },
            ControlDirective::Reset => Self::default(),
            ControlDirective::Ignored => self,
        }
    }
}

/// A contiguous span of decoded text sharing one attribute snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRun {
    /// Decoded text
    pub text: String,
    /// Attributes in effect when the run started
    pub attrs: Attributes,
}

impl StyledRun {
    /// Create a run.
    pub fn new(text: impl Into<String>, attrs: Attributes) -> Self {
        Self {
            text: text.into(),
            attrs,
        }
    }

    /// Create a run with default attributes.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Attributes::default())
    }
}

/// Non-text instruction extracted from a control sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlDirective {
    /// Change the foreground color
    SetForeground(Color),
    /// Change the background color
    SetBackground(Color),
    /// Restore default attributes
    Reset,
    /// Unrecognized parameter, no effect
    Ignored,
}

/// One element of the interpreter's ordered output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// Styled text
    Text(StyledRun),
    /// Attribute change
    Directive(ControlDirective),
}

impl Segment {
    /// The run, if this is a text segment.
    pub fn as_run(&self) -> Option<&StyledRun> {
        match self {
            Segment::Text(run) => Some(run),
            Segment::Directive(_) => None,
        }
    }
}

/// Concatenated text of all runs in `segments`.
pub fn plain_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .filter_map(Segment::as_run)
        .map(|run| run.text.as_str())
        .collect()
}
