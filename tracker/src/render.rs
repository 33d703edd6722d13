//! Projection of the session table into display rows, and the line-oriented sinks.

use device_directory::DirectoryEntry;
use std::io::{self, Write};
use time::format_description::well_known::Rfc3339;
use wifitrack_core::{DeviceId, SessionRecord, Timestamp};

pub const UNKNOWN_NAME: &str = "Unknown";
pub const NOT_AVAILABLE: &str = "N/A";

/// Column widths of the live table: address, name, type, description, owner, port 443.
pub const WIDTHS: [usize; 6] = [18, 20, 18, 25, 15, 8];

/// Where rendered rows go. Implementations must not keep references into the rows.
pub trait PresentationSink {
    fn render(&mut self, rows: &[DeviceRow]) -> io::Result<()>;

    /// True once the operator asked to stop.
    fn quit_requested(&mut self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRow {
    pub device: String,
    /// Whether the directory knew this device.
    pub resolved: bool,
    pub name: String,
    pub device_type: String,
    pub description: String,
    pub owner: String,
    pub uses_https: bool,
    pub started: Timestamp,
    pub duration_secs: f64,
    pub services: Vec<String>,
}

/// Join a snapshot with directory metadata. Never fails; unknown devices get placeholders.
pub fn project<'a, F>(snapshot: &[(DeviceId, SessionRecord)], resolve: F) -> Vec<DeviceRow>
where
    F: Fn(&DeviceId) -> Option<&'a DirectoryEntry>,
{
    snapshot
        .iter()
        .map(|(id, rec)| {
            let (resolved, name, device_type, description, owner) = match resolve(id) {
                Some(e) => (true, e.name.clone(), e.device_type.clone(), e.description.clone(), e.owner.clone()),
                None => (
                    false,
                    UNKNOWN_NAME.to_string(),
                    NOT_AVAILABLE.to_string(),
                    NOT_AVAILABLE.to_string(),
                    NOT_AVAILABLE.to_string(),
                ),
            };
            DeviceRow {
                device: id.to_string(),
                resolved,
                name,
                device_type,
                description,
                owner,
                uses_https: rec.uses_port_443(),
                started: rec.first_seen,
                duration_secs: rec.duration_secs(),
                services: rec.services.iter().cloned().collect(),
            }
        })
        .collect()
}

/// Project `snapshot` and hand the rows to `sink`. Reads only; nothing is mutated.
pub fn render_snapshot<'a, F>(
    sink: &mut dyn PresentationSink,
    snapshot: &[(DeviceId, SessionRecord)],
    resolve: F,
) -> io::Result<()>
where
    F: Fn(&DeviceId) -> Option<&'a DirectoryEntry>,
{
    sink.render(&project(snapshot, resolve))
}

// Pad or cut to exactly `width` characters.
fn fit(s: &str, width: usize) -> String {
    let cut: String = s.chars().take(width).collect();
    format!("{:<width$}", cut, width = width)
}

fn columns(cells: [&str; 6]) -> String {
    let parts: Vec<String> = cells.iter().zip(WIDTHS).map(|(c, w)| fit(c, w)).collect();
    parts.join(" ")
}

pub fn header_line() -> String {
    columns(["MAC Address", "Device Name", "Type", "Description", "Owner", "Port 443"])
}

pub fn format_row(row: &DeviceRow) -> String {
    let https = if row.uses_https { "443" } else { "" };
    columns([&row.device, &row.name, &row.device_type, &row.description, &row.owner, https])
}

pub fn table_width() -> usize {
    WIDTHS.iter().sum::<usize>() + WIDTHS.len() - 1
}

fn format_time(t: Timestamp) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLayout {
    /// One block per device with its services listed.
    Summary,
    /// The fixed-width live table, redrawn every cycle.
    Table,
}

/// Line-oriented sink over any writer (stdout in the CLI).
pub struct TextSink<W: Write> {
    out: W,
    layout: TextLayout,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W, layout: TextLayout) -> Self {
        TextSink { out, layout }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_summary(&mut self, rows: &[DeviceRow]) -> io::Result<()> {
        writeln!(self.out, "\nConnected Devices:")?;
        for r in rows {
            if r.resolved {
                writeln!(
                    self.out,
                    "MAC Address: {}, Device Name: {}, Type: {}, Description: {}, Owner: {}",
                    r.device, r.name, r.device_type, r.description, r.owner
                )?;
            } else {
                writeln!(self.out, "MAC Address: {}", r.device)?;
            }
            writeln!(self.out, "Start Time: {}, Total Duration: {} seconds", format_time(r.started), r.duration_secs as u64)?;
            writeln!(self.out, "Applications: ")?;
            for s in &r.services {
                writeln!(self.out, "{}", s)?;
            }
            writeln!(self.out, "{}", "-".repeat(50))?;
        }
        Ok(())
    }

    fn write_table(&mut self, rows: &[DeviceRow]) -> io::Result<()> {
        writeln!(self.out, "Connected Devices:")?;
        writeln!(self.out, "{}", header_line())?;
        writeln!(self.out, "{}", "=".repeat(table_width()))?;
        for r in rows {
            writeln!(self.out, "{}", format_row(r))?;
        }
        writeln!(self.out)
    }
}

impl<W: Write> PresentationSink for TextSink<W> {
    fn render(&mut self, rows: &[DeviceRow]) -> io::Result<()> {
        match self.layout {
            TextLayout::Summary => self.write_summary(rows)?,
            TextLayout::Table => self.write_table(rows)?,
        }
        self.out.flush()
    }
}
