use std::io;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph};

use crate::domain::{DerivedRow, Metric, Selection};

const BAR_WIDTH: u16 = 3;
const BAR_GAP: u16 = 0;
const GROUP_GAP: u16 = 1;
const CORRECTION_COLOR: Color = Color::Yellow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Series {
    New,
    Cum,
}

impl Series {
    fn title(self) -> &'static str {
        match self {
            Series::New => "New Cases per Day",
            Series::Cum => "Cumulated Cases",
        }
    }
}

pub struct ChartView {
    selection: Selection,
    rows: Vec<DerivedRow>,
    metrics: Vec<Metric>,
    /// Index of the last visible date.
    end: usize,
}

impl ChartView {
    pub fn new(selection: Selection, rows: Vec<DerivedRow>, metrics: Vec<Metric>) -> Self {
        let end = rows.len();
        Self {
            selection,
            rows,
            metrics,
            end,
        }
    }

    pub fn run(mut self) -> miette::Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode().into_diagnostic()?;
        io::stdout().execute(LeaveAlternateScreen).into_diagnostic()?;
        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> miette::Result<()> {
        loop {
            terminal
                .draw(|frame| self.draw(frame))
                .into_diagnostic()?;

            if event::poll(Duration::from_millis(250)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if self.handle_key(key) {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Left => self.end = self.end.saturating_sub(1).max(1.min(self.rows.len())),
            KeyCode::Right => self.end = (self.end + 1).min(self.rows.len()),
            KeyCode::Home => self.end = 1.min(self.rows.len()),
            KeyCode::End => self.end = self.rows.len(),
            _ => {}
        }
        false
    }

    fn draw(&self, frame: &mut ratatui::Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Percentage(50),
                Constraint::Percentage(50),
                Constraint::Length(1),
            ])
            .split(frame.area());

        let header = Line::from(vec![
            Span::styled(
                "Case History of the Coronavirus (COVID-19): ",
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(self.selection.to_string()),
        ]);
        frame.render_widget(Paragraph::new(header), chunks[0]);

        if self.rows.is_empty() {
            let message = Paragraph::new("no data for this selection")
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(message, chunks[1]);
        } else {
            let window = self.visible_window(chunks[1]);
            frame.render_widget(self.chart(Series::New, window.clone()), chunks[1]);
            frame.render_widget(self.chart(Series::Cum, window), chunks[2]);
        }

        let mut legend = self
            .metrics
            .iter()
            .flat_map(|metric| {
                [
                    Span::styled("■ ", Style::default().fg(metric_color(*metric))),
                    Span::raw(format!("{}  ", metric.label())),
                ]
            })
            .collect::<Vec<_>>();
        legend.push(Span::styled(
            "■ ",
            Style::default().fg(CORRECTION_COLOR),
        ));
        legend.push(Span::raw("correction  "));
        legend.push(Span::styled(
            "←/→ scroll  Home/End  q quit",
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(Paragraph::new(Line::from(legend)), chunks[3]);
    }

    fn visible_window(&self, area: Rect) -> std::ops::Range<usize> {
        let bars = self.metrics.len().max(1) as u16;
        let group_width = bars * BAR_WIDTH + (bars - 1) * BAR_GAP + GROUP_GAP;
        let capacity = (area.width.saturating_sub(2) / group_width).max(1) as usize;
        let end = self.end.max(1).min(self.rows.len());
        end.saturating_sub(capacity)..end
    }

    fn chart(&self, series: Series, window: std::ops::Range<usize>) -> BarChart<'_> {
        let mut chart = BarChart::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(series.title()),
            )
            .bar_width(BAR_WIDTH)
            .bar_gap(BAR_GAP)
            .group_gap(GROUP_GAP);

        for row in &self.rows[window] {
            let bars = self
                .metrics
                .iter()
                .filter_map(|metric| {
                    let pair = row.get(*metric)?;
                    let value = match series {
                        Series::New => pair.new,
                        Series::Cum => pair.cum,
                    };
                    Some(bar(*metric, value))
                })
                .collect::<Vec<_>>();
            let group = BarGroup::default()
                .label(Line::from(row.date.format("%m/%d").to_string()))
                .bars(&bars);
            chart = chart.data(group);
        }
        chart
    }
}

// Negative deltas are downward corrections: drawn by magnitude, labelled with the sign.
fn bar(metric: Metric, value: i64) -> Bar<'static> {
    let bar = Bar::default().value(value.unsigned_abs());
    if value < 0 {
        bar.style(Style::default().fg(CORRECTION_COLOR))
            .text_value(value.to_string())
    } else {
        bar.style(Style::default().fg(metric_color(metric)))
    }
}

fn metric_color(metric: Metric) -> Color {
    match metric {
        Metric::Confirmed => Color::Rgb(100, 140, 240),
        Metric::Deaths => Color::Rgb(200, 30, 30),
        Metric::Recovered => Color::Rgb(30, 200, 30),
    }
}
