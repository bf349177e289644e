// SPDX-License-Identifier: GPL-3.0-only

//! Terminal front end for the booth
//!
//! Renders the live preview and review playback using Unicode half-block
//! characters for improved vertical resolution.

use crate::app::{AppState, Booth, Message, SaveStatus};
use crate::backends::camera::types::CameraFrame;
use crate::capture::{CaptureMode, CaptureProgress};
use crate::config::Config;
use crate::constants::timing;
use crate::media::sample_pixel_rgb;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use std::io::{self, stdout};
use std::time::Duration;
use tracing::info;

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Booth(Message),
    Quit,
}

/// Run the terminal booth
pub fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut booth = Booth::new(config)?;

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut booth);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(SaveStatus::Saving) = booth.save_status() {
        eprintln!("Finishing save...");
    }
    if let Some(SaveStatus::Saved(path)) = booth.wait_for_save() {
        eprintln!("Last saved: {}", path.display());
    }

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    booth: &mut Booth,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Terminal booth started");

    loop {
        booth.update(Message::Tick);

        let frame = booth.display_frame();
        let mirror = booth.mirror() && booth.state().is_capturing();
        terminal.draw(|f| {
            let area = f.area();
            let main_area = Rect {
                height: area.height.saturating_sub(1),
                ..area
            };
            let status_area = Rect {
                y: area.y + area.height.saturating_sub(1),
                height: 1,
                ..area
            };

            match booth.state() {
                AppState::Idle | AppState::Saved { .. } => {
                    f.render_widget(HomeScreen, main_area);
                }
                AppState::Capturing { mode, progress, .. } => {
                    f.render_widget(FrameWidget::new(frame.as_ref(), mirror), main_area);
                    if let Some(progress) = progress {
                        f.render_widget(CountdownOverlay::new(*mode, progress), main_area);
                    }
                }
                AppState::Reviewing { .. } => {
                    f.render_widget(FrameWidget::new(frame.as_ref(), false), main_area);
                }
                AppState::Error { message } => {
                    f.render_widget(ErrorDialog { message }, main_area);
                }
            }

            let message = status_text(booth.state(), booth.save_status());
            f.render_widget(StatusBar { message: &message }, status_area);
        })?;

        if event::poll(Duration::from_millis(timing::UI_POLL_MS))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key_action(booth.state(), key) {
                Some(Action::Quit) => break,
                Some(Action::Booth(message)) => booth.update(message),
                None => {}
            }
        }
    }

    booth.update(Message::Cancel);
    info!("Terminal booth stopped");
    Ok(())
}

/// Map a key press to an action for the current state
pub fn key_action(state: &AppState, key: KeyEvent) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }

    let message = match (state, key.code) {
        (AppState::Idle | AppState::Saved { .. }, KeyCode::Char('1')) => {
            Message::SelectMode(CaptureMode::Photo)
        }
        (AppState::Idle | AppState::Saved { .. }, KeyCode::Char('2')) => {
            Message::SelectMode(CaptureMode::Boomerang)
        }
        (AppState::Idle | AppState::Saved { .. }, KeyCode::Char('3')) => {
            Message::SelectMode(CaptureMode::Video)
        }
        (AppState::Idle | AppState::Saved { .. }, KeyCode::Char('q')) => return Some(Action::Quit),
        (AppState::Saved { .. }, KeyCode::Esc | KeyCode::Enter) => Message::Dismiss,

        (AppState::Capturing { .. }, KeyCode::Enter | KeyCode::Char(' ')) => Message::StopCapture,
        (AppState::Capturing { .. }, KeyCode::Esc | KeyCode::Char('c')) => Message::Cancel,

        (AppState::Reviewing { .. }, KeyCode::Char('a')) => Message::Accept,
        (AppState::Reviewing { .. }, KeyCode::Char('r')) => Message::Retake,
        (AppState::Reviewing { .. }, KeyCode::Char('c') | KeyCode::Esc) => Message::Cancel,

        (AppState::Error { .. }, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) => {
            Message::Dismiss
        }
        (AppState::Error { .. }, KeyCode::Char('q')) => return Some(Action::Quit),

        _ => return None,
    };
    Some(Action::Booth(message))
}

/// Status bar text for the current state
pub fn status_text(state: &AppState, save: Option<&SaveStatus>) -> String {
    match state {
        AppState::Idle => "'1' photo | '2' boomerang | '3' video | 'q' quit".to_string(),
        AppState::Saved { kind } => match save {
            Some(SaveStatus::Saving) | None => format!("Saving {}...", kind),
            Some(SaveStatus::Saved(path)) => format!("Saved: {}", path.display()),
            Some(SaveStatus::Failed(e)) => format!("Save failed: {}", e),
        },
        AppState::Capturing {
            mode: CaptureMode::Video,
            ..
        } => "Enter stop | Esc cancel".to_string(),
        AppState::Capturing { .. } => "Esc cancel".to_string(),
        AppState::Reviewing { review, .. } => {
            format!(
                "Review {}: 'a' accept | 'r' retake | 'c' cancel",
                review.artifact().kind()
            )
        }
        AppState::Error { .. } => "Enter dismiss | 'q' quit".to_string(),
    }
}

/// Mode menu shown while idle
struct HomeScreen;

impl Widget for HomeScreen {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lines = [
            "S E L F I E   Z O N E",
            "",
            "[1] Photo",
            "[2] Boomerang",
            "[3] Video",
        ];
        let top = area.y + area.height.saturating_sub(lines.len() as u16) / 2;
        for (i, line) in lines.iter().enumerate() {
            let y = top + i as u16;
            if y >= area.y + area.height {
                break;
            }
            let x = area.x + area.width.saturating_sub(line.chars().count() as u16) / 2;
            let style = if i == 0 {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            buf.set_string(x, y, line, style);
        }
    }
}

/// Countdown or recording timer over the preview
struct CountdownOverlay {
    text: String,
}

impl CountdownOverlay {
    fn new(mode: CaptureMode, progress: &CaptureProgress) -> Self {
        let text = if let Some(secs) = progress.countdown_secs() {
            format!(" {} in {} ", mode, secs)
        } else if let Some(secs) = progress.recording_secs() {
            format!(" ● REC {}s ", secs)
        } else {
            String::new()
        };
        Self { text }
    }
}

impl Widget for CountdownOverlay {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.text.is_empty() || area.height == 0 {
            return;
        }
        let width = self.text.chars().count() as u16;
        let x = area.x + area.width.saturating_sub(width) / 2;
        buf.set_string(
            x,
            area.y,
            &self.text,
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        );
    }
}

/// Centered camera error box
struct ErrorDialog<'a> {
    message: &'a str,
}

impl Widget for ErrorDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = area.width.min(60);
        let height = area.height.min(7);
        if width == 0 || height == 0 {
            return;
        }
        let dialog = Rect {
            x: area.x + area.width.saturating_sub(width) / 2,
            y: area.y + area.height.saturating_sub(height) / 2,
            width,
            height,
        };
        Clear.render(dialog, buf);
        Paragraph::new(self.message)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title(" Error "))
            .render(dialog, buf);
    }
}

/// Widget that renders a camera frame using half-block characters
struct FrameWidget<'a> {
    frame: Option<&'a CameraFrame>,
    mirror: bool,
}

impl<'a> FrameWidget<'a> {
    fn new(frame: Option<&'a CameraFrame>, mirror: bool) -> Self {
        Self { frame, mirror }
    }
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.filter(|f| f.width > 0 && f.height > 0) else {
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        // Each terminal cell displays 2 vertical pixels
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        // Upper half (▀) is the fg color, lower half the bg color
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let mut src_x = (tx as f64 * x_scale) as u32;
                if self.mirror {
                    src_x = frame.width.saturating_sub(1).saturating_sub(src_x);
                }
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

fn sample_pixel(frame: &CameraFrame, x: u32, y: u32) -> Color {
    let (r, g, b) = sample_pixel_rgb(frame, x, y);
    Color::Rgb(r, g, b)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use std::path::PathBuf;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_idle_keys_select_modes() {
        let idle = AppState::Idle;
        assert_eq!(
            key_action(&idle, press(KeyCode::Char('2'))),
            Some(Action::Booth(Message::SelectMode(CaptureMode::Boomerang)))
        );
        assert_eq!(key_action(&idle, press(KeyCode::Char('q'))), Some(Action::Quit));
        assert_eq!(key_action(&idle, press(KeyCode::Char('a'))), None);
    }

    #[test]
    fn test_ctrl_c_always_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let state = AppState::Error {
            message: "x".into(),
        };
        assert_eq!(key_action(&state, key), Some(Action::Quit));
    }

    #[test]
    fn test_saved_status_shows_path() {
        let state = AppState::Saved {
            kind: MediaKind::Image,
        };
        let status = SaveStatus::Saved(PathBuf::from("/tmp/saved_pictures/1.jpeg"));
        assert_eq!(
            status_text(&state, Some(&status)),
            "Saved: /tmp/saved_pictures/1.jpeg"
        );
        assert_eq!(status_text(&state, None), "Saving photo...");
    }

    #[test]
    fn test_mirrored_frame_render() {
        // Left pixel red, right pixel blue
        let row = [255, 0, 0, 255, 0, 0, 255, 255];
        let frame = CameraFrame::from_rgba(2, 2, [row, row].concat());
        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        FrameWidget::new(Some(&frame), true).render(area, &mut buf);
        assert_eq!(buf[(0, 0)].fg, Color::Rgb(0, 0, 255));
        assert_eq!(buf[(1, 0)].fg, Color::Rgb(255, 0, 0));
    }
}
