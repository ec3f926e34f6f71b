//! Result displays.
//!
//! - `TerminalDisplay`: ratatui panel (inline viewport on the device console)
//! - `LogDisplay`: one structured log event per result, for headless units

use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal, TerminalOptions, Viewport,
};

use crate::domain::{RiskTier, VitalSigns};
use crate::ports::{DisplayError, ResultDisplay};

/// Device panel palette.
pub struct PanelTheme;

impl PanelTheme {
    /// Deep teal
    pub const PRIMARY: Color = Color::Rgb(13, 148, 136); // #0D9488
    /// Light slate for borders
    pub const BORDER: Color = Color::Rgb(148, 163, 184); // #94A3B8
    pub const TEXT_PRIMARY: Color = Color::Rgb(248, 250, 252); // #F8FAFC
    pub const TEXT_SECONDARY: Color = Color::Rgb(148, 163, 184); // #94A3B8

    #[must_use]
    pub fn title() -> Style {
        Style::default()
            .fg(Self::TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn label() -> Style {
        Style::default().fg(Self::TEXT_SECONDARY)
    }

    #[must_use]
    pub fn value() -> Style {
        Style::default().fg(Self::TEXT_PRIMARY)
    }

    #[must_use]
    pub fn border() -> Style {
        Style::default().fg(Self::BORDER)
    }

    /// Tier colour, bold.
    #[must_use]
    pub fn tier(tier: RiskTier) -> Style {
        let (r, g, b) = tier.color();
        Style::default()
            .fg(Color::Rgb(r, g, b))
            .add_modifier(Modifier::BOLD)
    }
}

/// Screening panel rendered through any ratatui backend.
pub struct TerminalDisplay<B: Backend> {
    terminal: Terminal<B>,
    initialized: bool,
}

impl<B: Backend> TerminalDisplay<B> {
    /// # Errors
    /// Returns `DisplayError::Io` if the backend cannot report its size.
    pub fn new(backend: B) -> Result<Self, DisplayError> {
        Ok(Self {
            terminal: Terminal::new(backend)?,
            initialized: false,
        })
    }

    /// Panel drawn in an inline viewport of `height` rows below the cursor.
    ///
    /// # Errors
    /// Returns `DisplayError::Io` if the backend cannot report its size.
    pub fn inline(backend: B, height: u16) -> Result<Self, DisplayError> {
        let options = TerminalOptions {
            viewport: Viewport::Inline(height),
        };
        Ok(Self {
            terminal: Terminal::with_options(backend, options)?,
            initialized: false,
        })
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }
}

impl<B: Backend + Send> ResultDisplay for TerminalDisplay<B> {
    fn init(&mut self) -> Result<(), DisplayError> {
        self.terminal.clear()?;
        self.terminal.draw(render_waiting)?;
        self.initialized = true;
        Ok(())
    }

    fn show(
        &mut self,
        fused_risk: f64,
        vitals: &VitalSigns,
        tier: RiskTier,
    ) -> Result<(), DisplayError> {
        if !self.initialized {
            return Err(DisplayError::NotInitialized);
        }
        self.terminal.draw(|f| {
            let area = f.area();
            render_result(f, area, fused_risk, vitals, tier);
        })?;
        Ok(())
    }
}

fn panel() -> Block<'static> {
    Block::default()
        .title(Span::styled(" RetinalGuard ", PanelTheme::title()))
        .borders(Borders::ALL)
        .border_style(PanelTheme::border())
}

fn render_waiting(f: &mut Frame) {
    let text = Paragraph::new(Line::from(Span::styled(
        "Waiting for first screening...",
        PanelTheme::label(),
    )))
    .block(panel());
    f.render_widget(text, f.area());
}

fn render_result(f: &mut Frame, area: Rect, fused_risk: f64, vitals: &VitalSigns, tier: RiskTier) {
    let block = panel();
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Tier
            Constraint::Length(1), // Gauge
            Constraint::Min(0),    // Vitals
        ])
        .split(inner);

    let tier_line = Paragraph::new(Line::from(vec![
        Span::styled("CVD risk: ", PanelTheme::label()),
        Span::styled(tier.to_string(), PanelTheme::tier(tier)),
        Span::styled(format!("  {}", tier.description()), PanelTheme::label()),
    ]));
    f.render_widget(tier_line, chunks[0]);

    // Fused risk is not guaranteed to stay in [0, 1]; the gauge needs it to.
    let ratio = if fused_risk.is_finite() {
        fused_risk.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let gauge = Gauge::default()
        .gauge_style(PanelTheme::tier(tier))
        .ratio(ratio)
        .label(format!("{:.1}%", fused_risk * 100.0));
    f.render_widget(gauge, chunks[1]);

    let vitals_lines = vec![
        Line::from(vec![
            Span::styled("HR ", PanelTheme::label()),
            Span::styled(format!("{} bpm", vitals.heart_rate), PanelTheme::value()),
            Span::styled("  SpO2 ", PanelTheme::label()),
            Span::styled(format!("{:.1}%", vitals.blood_oxygen), PanelTheme::value()),
            Span::styled("  Temp ", PanelTheme::label()),
            Span::styled(format!("{:.1} C", vitals.temperature), PanelTheme::value()),
        ]),
        Line::from(Span::styled(
            vitals.sampled_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            Style::default().fg(PanelTheme::PRIMARY),
        )),
    ];
    f.render_widget(Paragraph::new(vitals_lines), chunks[2]);
}

/// Display that only emits a log event per result.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl ResultDisplay for LogDisplay {
    fn init(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }

    fn show(
        &mut self,
        fused_risk: f64,
        vitals: &VitalSigns,
        tier: RiskTier,
    ) -> Result<(), DisplayError> {
        tracing::info!(
            %tier,
            fused_risk,
            heart_rate = vitals.heart_rate,
            blood_oxygen = vitals.blood_oxygen,
            temperature = vitals.temperature,
            "Screening result"
        );
        Ok(())
    }
}
