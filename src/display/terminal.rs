// SPDX-License-Identifier: GPL-3.0-only

//! Terminal display sink
//!
//! Renders each named window as a pane using Unicode half-block characters
//! for improved vertical resolution, with a status bar on the last line.

use super::visualization::{DisplayImage, Thumbnail};
use super::DisplaySink;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Widget},
};
use std::io::{self, Stdout, stdout};

struct Pane {
    name: String,
    thumbnail: Thumbnail,
}

/// Display sink drawing into the terminal's alternate screen
///
/// Raw mode and the alternate screen are entered on construction and
/// restored on drop.
pub struct TerminalSink {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    panes: Vec<Pane>,
    status: String,
    /// Terminal size seen by the last draw (columns, rows)
    viewport: (u16, u16),
}

impl TerminalSink {
    /// Take over the terminal with one pane per window name
    pub fn new(windows: &[&str]) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        let size = terminal.size()?;

        Ok(Self {
            terminal,
            panes: windows
                .iter()
                .map(|name| Pane {
                    name: name.to_string(),
                    thumbnail: Thumbnail::default(),
                })
                .collect(),
            status: String::new(),
            viewport: (size.width, size.height),
        })
    }

    /// Pixel budget of one pane: borders take a cell on each side and each
    /// cell shows two vertical pixels
    fn pane_pixels(&self) -> (u32, u32) {
        let panes = self.panes.len().max(1) as u16;
        let (cols, rows) = self.viewport;
        let width = (cols / panes).saturating_sub(2);
        let height = rows.saturating_sub(1).saturating_sub(2) * 2;
        (width as u32, height as u32)
    }
}

impl DisplaySink for TerminalSink {
    fn show(&mut self, name: &str, image: DisplayImage<'_>) {
        let (width, height) = self.pane_pixels();
        let thumbnail = Thumbnail::sample(&image, width, height);
        match self.panes.iter_mut().find(|pane| pane.name == name) {
            Some(pane) => pane.thumbnail = thumbnail,
            None => self.panes.push(Pane {
                name: name.to_string(),
                thumbnail,
            }),
        }
    }

    fn set_status(&mut self, status: &str) {
        self.status.clear();
        self.status.push_str(status);
    }

    fn flush(&mut self) -> io::Result<()> {
        let panes = &self.panes;
        let status = &self.status;

        let completed = self.terminal.draw(|f| {
            let area = f.area();
            let [body, status_area] =
                Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);

            let columns = Layout::horizontal(
                panes
                    .iter()
                    .map(|_| Constraint::Ratio(1, panes.len().max(1) as u32)),
            )
            .split(body);

            for (pane, column) in panes.iter().zip(columns.iter()) {
                let block = Block::bordered().title(pane.name.as_str());
                let inner = block.inner(*column);
                f.render_widget(block, *column);
                f.render_widget(PaneWidget(&pane.thumbnail), inner);
            }

            f.render_widget(StatusBar { message: status }, status_area);
        })?;

        self.viewport = (completed.area.width, completed.area.height);
        Ok(())
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Widget that renders a thumbnail using half-block characters
struct PaneWidget<'a>(&'a Thumbnail);

impl Widget for PaneWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let thumb = self.0;
        if thumb.pixels.is_empty() {
            let msg = "Waiting for sensor...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        }

        let cols = (thumb.width as u16).min(area.width);
        let rows = (thumb.height.div_ceil(2) as u16).min(area.height);
        let x_offset = area.x + (area.width - cols) / 2;
        let y_offset = area.y + (area.height - rows) / 2;

        // Upper half (▀) is the foreground, lower half the background
        for ty in 0..rows {
            for tx in 0..cols {
                let top = thumb.rgb_at(tx as u32, ty as u32 * 2);
                let bottom = thumb.rgb_at(tx as u32, ty as u32 * 2 + 1);
                let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) else {
                    continue;
                };
                cell.set_char('▀');
                cell.set_fg(to_color(top));
                cell.set_bg(to_color(bottom));
            }
        }
    }
}

fn to_color(rgb: Option<[u8; 3]>) -> Color {
    rgb.map_or(Color::Reset, |[r, g, b]| Color::Rgb(r, g, b))
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
