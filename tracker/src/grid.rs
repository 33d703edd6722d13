//! Full-screen live table on the terminal.
//!
//! Raw mode is switched on first and the sink value exists from then on, so `Drop` restores
//! the terminal on every exit path, including a failure halfway through setup.

use crate::render::{format_row, header_line, table_width, DeviceRow, PresentationSink};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, queue, ExecutableCommand};
use std::io::{self, stdout, Stdout, Write};
use std::time::Duration;

const FIRST_ROW: u16 = 4;

/// Terminal raw-mode switch.
pub trait RawMode {
    fn enable(&mut self) -> io::Result<()>;
    fn disable(&mut self) -> io::Result<()>;
}

pub struct CrosstermRawMode;

impl RawMode for CrosstermRawMode {
    fn enable(&mut self) -> io::Result<()> {
        enable_raw_mode()
    }

    fn disable(&mut self) -> io::Result<()> {
        disable_raw_mode()
    }
}

pub struct GridSink<W: Write = Stdout, R: RawMode = CrosstermRawMode> {
    out: W,
    raw: R,
}

impl GridSink {
    pub fn new() -> io::Result<Self> {
        GridSink::with_parts(stdout(), CrosstermRawMode)
    }
}

impl<W: Write, R: RawMode> GridSink<W, R> {
    fn with_parts(out: W, mut raw: R) -> io::Result<Self> {
        raw.enable()?;
        let mut sink = GridSink { out, raw };
        sink.out.execute(EnterAlternateScreen)?;
        sink.out.execute(cursor::Hide)?;
        Ok(sink)
    }
}

fn is_quit(code: KeyCode, modifiers: KeyModifiers) -> bool {
    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        // raw mode swallows SIGINT
        KeyCode::Char('c') => modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

impl<W: Write, R: RawMode> PresentationSink for GridSink<W, R> {
    fn render(&mut self, rows: &[DeviceRow]) -> io::Result<()> {
        let (_, height) = terminal::size()?;
        queue!(
            self.out,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0),
            Print("[Press Q to quit]"),
            cursor::MoveTo(0, 1),
            Print("Connected Devices:"),
            cursor::MoveTo(0, 2),
            Print(header_line()),
            cursor::MoveTo(0, 3),
            Print("=".repeat(table_width()))
        )?;
        for (i, row) in rows.iter().enumerate() {
            let y = FIRST_ROW as usize + i;
            if y >= height as usize {
                break;
            }
            queue!(self.out, cursor::MoveTo(0, y as u16), Print(format_row(row)))?;
        }
        self.out.flush()
    }

    fn quit_requested(&mut self) -> bool {
        // Drain everything typed since the last cycle without blocking.
        while let Ok(true) = event::poll(Duration::ZERO) {
            match event::read() {
                Ok(Event::Key(k)) if k.kind == KeyEventKind::Press && is_quit(k.code, k.modifiers) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
        false
    }
}

impl<W: Write, R: RawMode> Drop for GridSink<W, R> {
    fn drop(&mut self) {
        let _ = self.out.execute(cursor::Show);
        let _ = self.out.execute(LeaveAlternateScreen);
        let _ = self.raw.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct CountingRaw {
        enabled: Rc<Cell<usize>>,
        disabled: Rc<Cell<usize>>,
    }

    impl RawMode for CountingRaw {
        fn enable(&mut self) -> io::Result<()> {
            self.enabled.set(self.enabled.get() + 1);
            Ok(())
        }

        fn disable(&mut self) -> io::Result<()> {
            self.disabled.set(self.disabled.get() + 1);
            Ok(())
        }
    }

    /// Accepts `budget` bytes, then fails every write.
    #[derive(Clone)]
    struct Screen {
        bytes: Rc<RefCell<Vec<u8>>>,
        budget: usize,
    }

    impl Write for Screen {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut bytes = self.bytes.borrow_mut();
            if bytes.len() + buf.len() > self.budget {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone"));
            }
            bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn quit_keys() {
        assert!(is_quit(KeyCode::Char('q'), KeyModifiers::NONE));
        assert!(is_quit(KeyCode::Char('Q'), KeyModifiers::SHIFT));
        assert!(is_quit(KeyCode::Esc, KeyModifiers::NONE));
        assert!(is_quit(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(!is_quit(KeyCode::Char('c'), KeyModifiers::NONE));
        assert!(!is_quit(KeyCode::Enter, KeyModifiers::NONE));
    }

    #[test]
    fn failed_setup_still_leaves_raw_mode() {
        let raw = CountingRaw::default();
        let screen = Screen { bytes: Rc::default(), budget: 0 };
        assert!(GridSink::with_parts(screen, raw.clone()).is_err());
        assert_eq!(raw.enabled.get(), 1);
        assert_eq!(raw.disabled.get(), 1);
    }

    #[test]
    fn drop_restores_screen_and_raw_mode() {
        let raw = CountingRaw::default();
        let screen = Screen { bytes: Rc::default(), budget: usize::MAX };
        let sink = GridSink::with_parts(screen.clone(), raw.clone()).unwrap();
        assert_eq!(raw.disabled.get(), 0);
        drop(sink);
        assert_eq!(raw.disabled.get(), 1);
        let text = String::from_utf8_lossy(&screen.bytes.borrow()).into_owned();
        assert!(text.contains("\x1b[?1049h"));
        assert!(text.contains("\x1b[?1049l"));
    }
}
