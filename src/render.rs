//! In-place console rendering of a single progress line.
//!
//! A [`ConsoleRenderer`] is a per-line session. On its first render it asks the
//! [`Console`] for the cursor row and anchors there (the *baseline*). Every later render
//! blanks the rows the previous render used, jumps back to the baseline and writes the
//! new line, so shorter lines never leave stale characters behind.
//!
//! When the cursor cannot be queried (output piped to a file, a dumb terminal) the
//! session switches permanently to carriage-return overwrite: `\r<line>` followed by
//! enough spaces to mask the previous, possibly longer, line.
//!
//! Renderer state is owned by whoever drives it (normally the [monitor](mod@crate::monitor)
//! loop). Nothing here is global, so several sessions can coexist.

use std::io::{self, IsTerminal, Write};

use compact_str::{CompactString, format_compact};
use crossterm::{cursor, queue, terminal};
use tracing::debug;

/// Trailing spaces written after each overwrite-mode line.
const OVERWRITE_PADDING: usize = 4;

/// Width assumed when the terminal cannot report one.
const FALLBACK_WIDTH: u16 = 80;

/// A text sink that may support cursor positioning.
pub trait Console: Write {
    /// Returns the row the cursor is on.
    ///
    /// # Errors
    ///
    /// Returns an error if cursor positioning is unavailable. The renderer treats
    /// any error as "unsupported" and falls back to overwrite mode.
    fn cursor_row(&mut self) -> io::Result<u16>;

    /// Queues a move to the first column of `row`.
    ///
    /// # Errors
    ///
    /// Returns an error if the move cannot be written.
    fn move_to_row(&mut self, row: u16) -> io::Result<()>;

    /// Returns `(columns, rows)`.
    fn size(&self) -> (u16, u16);
}

/// The process's standard output, driven through `crossterm`.
pub struct Stdout {
    out: io::Stdout,
}

impl Default for Stdout {
    fn default() -> Self {
        Self { out: io::stdout() }
    }
}

impl Stdout {
    /// Creates a console over standard output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Write for Stdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Console for Stdout {
    fn cursor_row(&mut self) -> io::Result<u16> {
        if !self.out.is_terminal() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stdout is not a terminal",
            ));
        }
        self.out.flush()?;
        cursor::position().map(|(_, row)| row)
    }

    fn move_to_row(&mut self, row: u16) -> io::Result<()> {
        queue!(self.out, cursor::MoveTo(0, row))
    }

    fn size(&self) -> (u16, u16) {
        terminal::size().unwrap_or((FALLBACK_WIDTH, u16::MAX))
    }
}

/// A console over any writer, without cursor support.
///
/// Renderers over a `PlainConsole` always use overwrite mode. Useful for log files,
/// pipes and tests.
#[derive(Debug, Default)]
pub struct PlainConsole<W> {
    inner: W,
}

impl<W: Write> PlainConsole<W> {
    /// Wraps `inner`.
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Returns a reference to the wrapped writer.
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwraps the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for PlainConsole<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Console for PlainConsole<W> {
    fn cursor_row(&mut self) -> io::Result<u16> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "plain console has no cursor",
        ))
    }

    fn move_to_row(&mut self, _row: u16) -> io::Result<()> {
        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        (FALLBACK_WIDTH, u16::MAX)
    }
}

/// What goes into a rendered line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineOptions {
    /// Column width the description is padded to.
    pub description_width: usize,
    /// Append ` @<rate>/s`.
    pub show_rate: bool,
    /// Append `, <elapsed>s`.
    pub show_elapsed: bool,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            description_width: 24,
            show_rate: true,
            show_elapsed: true,
        }
    }
}

/// Joins a description, status and current item into one display line.
///
/// The description is right-aligned in a column of `options.description_width`.
#[must_use]
pub fn compose_line(
    description: &str,
    status: &str,
    item: &str,
    options: &LineOptions,
) -> CompactString {
    let width = options.description_width;
    let mut line = format_compact!("{description:>width$}: {status}");
    if !item.is_empty() {
        line.push(' ');
        line.push_str(item);
    }
    line
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Cursor support not yet probed.
    Unprobed,
    /// Redrawing relative to a baseline row.
    Cursor,
    /// Carriage-return overwrite for the rest of the session.
    Overwrite,
}

/// A stateful, single-line redraw session over a [`Console`].
pub struct ConsoleRenderer<C> {
    console: C,
    mode: Mode,
    baseline_row: Option<u16>,
    rows_used: u16,
    last_len: usize,
    pending_newline: bool,
}

impl Default for ConsoleRenderer<Stdout> {
    fn default() -> Self {
        Self::new(Stdout::new())
    }
}

impl<C: Console> ConsoleRenderer<C> {
    /// Starts a session on `console`.
    pub const fn new(console: C) -> Self {
        Self {
            console,
            mode: Mode::Unprobed,
            baseline_row: None,
            rows_used: 0,
            last_len: 0,
            pending_newline: false,
        }
    }

    /// Returns the console.
    pub const fn console(&self) -> &C {
        &self.console
    }

    /// Ends the session, returning the console.
    pub fn into_console(self) -> C {
        self.console
    }

    /// Whether the session has fallen back to carriage-return overwrite.
    pub fn is_overwrite_mode(&self) -> bool {
        self.mode == Mode::Overwrite
    }

    /// The anchor row, once a cursor-mode render has happened.
    pub const fn baseline_row(&self) -> Option<u16> {
        self.baseline_row
    }

    /// Asks the next render to end its line; see [`finalize`](Self::finalize).
    pub fn request_newline(&mut self) {
        self.pending_newline = true;
    }

    /// Redraws the line in place.
    ///
    /// If a newline was requested, the line is finalized instead.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to the console fails. A console without cursor
    /// support is not an error.
    pub fn render(&mut self, line: &str) -> io::Result<()> {
        if self.pending_newline {
            return self.finalize(line);
        }
        self.draw(line)?;
        self.console.flush()
    }

    /// Renders `line` one last time and ends it with a newline.
    ///
    /// The next render starts a fresh baseline below this one.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to the console fails.
    pub fn finalize(&mut self, line: &str) -> io::Result<()> {
        self.draw(line)?;
        self.console.write_all(b"\n")?;
        self.console.flush()?;

        self.pending_newline = false;
        self.baseline_row = None;
        self.rows_used = 0;
        self.last_len = 0;
        Ok(())
    }

    fn draw(&mut self, line: &str) -> io::Result<()> {
        let line = sanitize(line);

        if self.baseline_row.is_none() && self.mode != Mode::Overwrite {
            self.probe();
        }

        match (self.mode, self.baseline_row) {
            (Mode::Cursor, Some(baseline)) => self.draw_at(baseline, &line),
            _ => self.overwrite(&line),
        }
    }

    fn probe(&mut self) {
        match self.console.cursor_row() {
            Ok(row) => {
                self.mode = Mode::Cursor;
                self.baseline_row = Some(row);
                self.rows_used = 0;
            }
            Err(error) => {
                debug!(%error, "cursor position unavailable, using overwrite mode");
                self.mode = Mode::Overwrite;
            }
        }
    }

    fn overwrite(&mut self, line: &str) -> io::Result<()> {
        let len = line.chars().count();
        let padding = self.last_len.saturating_sub(len) + OVERWRITE_PADDING;
        write!(self.console, "\r{line}{:padding$}", "")?;
        self.last_len = len;
        Ok(())
    }

    fn draw_at(&mut self, baseline: u16, line: &str) -> io::Result<()> {
        let (columns, screen_rows) = self.console.size();
        let width = usize::from(columns.max(1));
        let blank = " ".repeat(width);

        for offset in 0..self.rows_used {
            self.console.move_to_row(baseline.saturating_add(offset))?;
            self.console.write_all(blank.as_bytes())?;
        }

        let rows = u16::try_from(line.chars().count().div_ceil(width).max(1)).unwrap_or(u16::MAX);

        self.console.move_to_row(baseline)?;
        self.console.write_all(line.as_bytes())?;

        // A line running past the bottom scrolls the screen up under the baseline.
        let scrolled = baseline.saturating_add(rows).saturating_sub(screen_rows);
        self.baseline_row = Some(baseline.saturating_sub(scrolled));
        self.rows_used = rows;
        self.last_len = line.chars().count();
        Ok(())
    }
}

/// Keeps the line on one logical row.
fn sanitize(line: &str) -> CompactString {
    line.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use super::{Console, ConsoleRenderer, LineOptions, PlainConsole, compose_line};

    /// A fake terminal that records row moves and writes.
    #[derive(Default)]
    struct FakeTerminal {
        row: u16,
        columns: u16,
        rows: u16,
        moves: Vec<u16>,
        out: Vec<u8>,
    }

    impl Write for FakeTerminal {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Console for FakeTerminal {
        fn cursor_row(&mut self) -> io::Result<u16> {
            Ok(self.row)
        }

        fn move_to_row(&mut self, row: u16) -> io::Result<()> {
            self.moves.push(row);
            Ok(())
        }

        fn size(&self) -> (u16, u16) {
            (self.columns, self.rows)
        }
    }

    fn terminal(row: u16) -> FakeTerminal {
        FakeTerminal {
            row,
            columns: 10,
            rows: 40,
            ..FakeTerminal::default()
        }
    }

    /// Line Composition
    #[test]
    fn test_compose_line() {
        let options = LineOptions {
            description_width: 8,
            ..LineOptions::default()
        };
        assert_eq!(compose_line("copy", "1/2", "", &options), "    copy: 1/2");
        assert_eq!(compose_line("copy", "1/2", "a.txt", &options), "    copy: 1/2 a.txt");
    }

    /// Fallback Mode
    /// No cursor support: carriage-return overwrite, never an error.
    #[test]
    fn test_overwrite_fallback() {
        let mut r = ConsoleRenderer::new(PlainConsole::new(Vec::new()));

        r.render("long line here").unwrap();
        assert!(r.is_overwrite_mode());
        r.render("short").unwrap();

        let out = String::from_utf8(r.into_console().into_inner()).unwrap();
        assert_eq!(out, format!("\rlong line here    \rshort{}", " ".repeat(13)));
    }

    /// Finalize ends each line with exactly one newline.
    #[test]
    fn test_finalize_single_newline() {
        let mut r = ConsoleRenderer::new(PlainConsole::new(Vec::new()));

        r.render("a\nb").unwrap();
        r.finalize("done").unwrap();
        r.finalize("second").unwrap();

        let out = String::from_utf8(r.into_console().into_inner()).unwrap();
        assert_eq!(out.matches('\n').count(), 2);
        assert!(out.ends_with("second    \n"));
        assert!(out.starts_with("\ra b    "), "newlines inside lines are flattened");
    }

    /// A requested newline is honoured by the next render.
    #[test]
    fn test_requested_newline() {
        let mut r = ConsoleRenderer::new(PlainConsole::new(Vec::new()));
        r.request_newline();
        r.render("x").unwrap();

        let out = String::from_utf8(r.into_console().into_inner()).unwrap();
        assert_eq!(out, "\rx    \n");
    }

    /// Cursor Mode
    /// Rows used by the previous render are blanked before the redraw.
    #[test]
    fn test_cursor_redraw_clears_previous_rows() {
        let mut r = ConsoleRenderer::new(terminal(5));

        r.render("0123456789abcde").unwrap(); // spans 2 rows
        assert_eq!(r.baseline_row(), Some(5));
        assert_eq!(r.console().moves, vec![5]);

        r.render("xy").unwrap();
        // Two blanking moves, then back to baseline.
        assert_eq!(r.console().moves, vec![5, 5, 6, 5]);

        let out = String::from_utf8(r.into_console().out).unwrap();
        assert!(out.ends_with(&format!("{}{}xy", " ".repeat(10), " ".repeat(10))));
    }

    /// Finalize drops the baseline; the next render anchors anew.
    #[test]
    fn test_cursor_finalize_rebases() {
        let mut r = ConsoleRenderer::new(terminal(3));
        r.render("first").unwrap();
        r.finalize("first done").unwrap();
        assert_eq!(r.baseline_row(), None);

        r.render("second").unwrap();
        assert_eq!(r.baseline_row(), Some(3), "fake cursor never moved");
        assert!(!r.is_overwrite_mode());
    }

    /// A wrapped line at the bottom of the screen is written at the cursor and the
    /// baseline follows the scroll, leaving earlier output above untouched.
    #[test]
    fn test_cursor_bottom_of_screen() {
        let mut t = terminal(39);
        t.rows = 40;
        let mut r = ConsoleRenderer::new(t);

        r.render("0123456789012345678901").unwrap(); // 3 rows
        assert_eq!(r.console().moves, vec![39]);
        assert_eq!(r.baseline_row(), Some(37));

        r.render("short").unwrap();
        assert_eq!(r.console().moves, vec![39, 37, 38, 39, 37]);
        assert_eq!(r.baseline_row(), Some(37));
    }
}
