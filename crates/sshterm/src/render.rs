//! Writes interpreted output to the local terminal.

use std::io::{self, Write};

use crossterm::style::{self, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::queue;

use sshterm_core::{Attributes, Color, Segment};

/// Renders segments, emitting color changes only when a run's attributes
/// differ from what the output already shows.
pub struct Renderer<W: Write> {
    out: W,
    current: Attributes,
}

impl<W: Write> Renderer<W> {
    /// Renderer writing to `out`, assumed to be at default colors.
    pub fn new(out: W) -> Self {
        Self {
            out,
            current: Attributes::default(),
        }
    }

    /// Render one batch of segments and flush.
    pub fn render(&mut self, segments: &[Segment]) -> io::Result<()> {
        for run in segments.iter().filter_map(Segment::as_run) {
            if run.text.is_empty() {
                continue;
            }
            self.set_attributes(run.attrs)?;
            queue!(self.out, Print(&run.text))?;
        }
        self.out.flush()
    }

    /// Restore the terminal's default colors.
    pub fn reset(&mut self) -> io::Result<()> {
        if !self.current.is_default() {
            queue!(self.out, ResetColor)?;
            self.current = Attributes::default();
        }
        self.out.flush()
    }

    /// Attributes currently in effect on the output.
    pub fn attributes(&self) -> Attributes {
        self.current
    }

    /// Consume the renderer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn set_attributes(&mut self, attrs: Attributes) -> io::Result<()> {
        if attrs == self.current {
            return Ok(());
        }
        if attrs.is_default() {
            queue!(self.out, ResetColor)?;
        } else {
            if attrs.fg != self.current.fg {
                queue!(self.out, SetForegroundColor(terminal_color(attrs.fg)))?;
            }
            if attrs.bg != self.current.bg {
                queue!(self.out, SetBackgroundColor(terminal_color(attrs.bg)))?;
            }
        }
        self.current = attrs;
        Ok(())
    }
}

/// Palette color as crossterm sees it; the default defers to the host terminal.
fn terminal_color(color: Color) -> style::Color {
    match color.rgb() {
        Some((r, g, b)) => style::Color::Rgb { r, g, b },
        None => style::Color::Reset,
    }
}
