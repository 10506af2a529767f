use iced::{Border, Color, Shadow, Theme};
use iced::widget::button::{StyleSheet, Appearance};

const LINK_COLOR: Color = Color { r: 0.1, g: 0.3, b: 0.7, a: 1.0 };

/// Flat, text-only button used for the list of discovered devices.
pub struct DeviceListButtonStyle;

impl DeviceListButtonStyle {
    fn appearance(text_color: Color, background: Option<Color>) -> Appearance {
        Appearance {
            shadow_offset: Default::default(),
            background: background.map(Into::into),
            text_color,
            border: Border {
                color: Color::TRANSPARENT,
                width: 0.0,
                radius: 4.0.into(),
            },
            shadow: Shadow::default(),
        }
    }
}

impl StyleSheet for DeviceListButtonStyle {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> Appearance {
        Self::appearance(LINK_COLOR, None)
    }

    fn hovered(&self, _style: &Self::Style) -> Appearance {
        Self::appearance(LINK_COLOR, Some(Color::from_rgba(0.1, 0.3, 0.7, 0.1)))
    }
}
