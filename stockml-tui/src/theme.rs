//! Colour tokens for the four palettes.
//!
//! Every palette fills the same slots; widgets only ask for a role
//! (accent, positive, muted, ...) and never for a raw colour.

use ratatui::style::{Color, Modifier, Style};

use stockml_pipeline::Palette;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// Primary surface
    pub background: Color,
    /// Focus, highlights, the current step
    pub accent: Color,
    /// Completed steps, good scores
    pub positive: Color,
    /// Errors, poor scores
    pub negative: Color,
    pub warning: Color,
    /// Secondary info, section headers
    pub neutral: Color,
    /// Hints, locked steps
    pub muted: Color,
    pub text_primary: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::for_palette(Palette::default())
    }
}

impl Theme {
    pub fn for_palette(palette: Palette) -> Self {
        match palette {
            Palette::DefaultDark => Self {
                background: Color::Rgb(18, 18, 20),
                accent: Color::Rgb(0, 200, 255),
                positive: Color::Rgb(0, 220, 120),
                negative: Color::Rgb(255, 85, 85),
                warning: Color::Rgb(255, 170, 0),
                neutral: Color::Rgb(150, 130, 220),
                muted: Color::Rgb(120, 120, 130),
                text_primary: Color::White,
            },
            Palette::Cyberpunk => Self {
                background: Color::Rgb(13, 2, 33),
                accent: Color::Rgb(0, 255, 255),
                positive: Color::Rgb(57, 255, 20),
                negative: Color::Rgb(255, 20, 147),
                warning: Color::Rgb(255, 240, 31),
                neutral: Color::Rgb(190, 0, 255),
                muted: Color::Rgb(100, 149, 237),
                text_primary: Color::Rgb(240, 240, 255),
            },
            Palette::Blue => Self {
                background: Color::Rgb(10, 25, 47),
                accent: Color::Rgb(100, 181, 246),
                positive: Color::Rgb(129, 212, 250),
                negative: Color::Rgb(239, 83, 80),
                warning: Color::Rgb(255, 202, 40),
                neutral: Color::Rgb(121, 134, 203),
                muted: Color::Rgb(96, 125, 139),
                text_primary: Color::Rgb(227, 242, 253),
            },
            Palette::RedOrangeGrey => Self {
                background: Color::Rgb(33, 33, 33),
                accent: Color::Rgb(255, 112, 67),
                positive: Color::Rgb(255, 183, 77),
                negative: Color::Rgb(229, 57, 53),
                warning: Color::Rgb(255, 213, 79),
                neutral: Color::Rgb(189, 189, 189),
                muted: Color::Rgb(117, 117, 117),
                text_primary: Color::Rgb(238, 238, 238),
            },
        }
    }

    pub fn accent(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn accent_bold(&self) -> Style {
        self.accent().add_modifier(Modifier::BOLD)
    }

    pub fn positive(&self) -> Style {
        Style::default().fg(self.positive)
    }

    pub fn negative(&self) -> Style {
        Style::default().fg(self.negative)
    }

    pub fn warning(&self) -> Style {
        Style::default().fg(self.warning)
    }

    pub fn neutral(&self) -> Style {
        Style::default().fg(self.neutral)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn text(&self) -> Style {
        Style::default().fg(self.text_primary)
    }

    pub fn selected(&self) -> Style {
        self.accent().add_modifier(Modifier::REVERSED)
    }

    pub fn panel_border(&self, active: bool) -> Style {
        if active {
            self.accent()
        } else {
            self.muted()
        }
    }

    /// R² colouring: strong fits positive, weak ones muted, negative R² red.
    pub fn r2_style(&self, r2: f64) -> Style {
        match r2 {
            r if r >= 0.8 => self.positive(),
            r if r >= 0.5 => self.accent(),
            r if r >= 0.0 => self.muted(),
            _ => self.negative(),
        }
    }

    pub fn change_style(&self, change: f64) -> Style {
        if change >= 0.0 {
            self.positive()
        } else {
            self.negative()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palettes_differ() {
        let accents: Vec<Color> = Palette::ALL
            .iter()
            .map(|p| Theme::for_palette(*p).accent)
            .collect();
        for (i, a) in accents.iter().enumerate() {
            assert!(!accents[i + 1..].contains(a));
        }
    }

    #[test]
    fn r2_style_bands() {
        let theme = Theme::default();
        assert_eq!(theme.r2_style(0.95), theme.positive());
        assert_eq!(theme.r2_style(0.6), theme.accent());
        assert_eq!(theme.r2_style(0.1), theme.muted());
        assert_eq!(theme.r2_style(-0.3), theme.negative());
    }

    #[test]
    fn change_style_sign() {
        let theme = Theme::for_palette(Palette::Blue);
        assert_eq!(theme.change_style(1.0), theme.positive());
        assert_eq!(theme.change_style(-1.0), theme.negative());
    }
}
