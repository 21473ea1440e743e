use askama::Template;
use std::collections::BTreeMap;
use tracing::error;

use crate::settings::PageSettings;
use crate::weather::WeatherSnapshot;

pub struct Tile {
    pub name: String,
    pub target: String,
}

/// Display strings for the weather panel.
pub struct WeatherPanel {
    pub valid: bool,
    pub temperature: String,
    pub condition: String,
    pub humidity: String,
    pub wind_speed: String,
    pub location: String,
    pub icon_url: Option<String>,
    pub captured_at: String,
}

impl From<&WeatherSnapshot> for WeatherPanel {
    fn from(snapshot: &WeatherSnapshot) -> Self {
        Self {
            valid: snapshot.valid,
            temperature: format!(
                "{:.0}{}",
                snapshot.temperature,
                snapshot.units.temperature_suffix()
            ),
            condition: snapshot.condition_text.clone(),
            humidity: format!("{}%", snapshot.humidity),
            wind_speed: format!("{:.1} {}", snapshot.wind_speed, snapshot.units.speed_suffix()),
            location: snapshot.location.clone(),
            icon_url: snapshot.icon_url(),
            captured_at: snapshot.captured_at.format("%H:%M UTC").to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub title: String,
    pub weather: WeatherPanel,
    pub links: Vec<Tile>,
    pub apps: Vec<Tile>,
    pub socials: Vec<Tile>,
}

impl HomeTemplate {
    pub fn page(page: &PageSettings, weather: &WeatherSnapshot) -> String {
        let template = HomeTemplate {
            title: page.title.clone(),
            weather: WeatherPanel::from(weather),
            links: tiles(&page.links),
            apps: tiles(&page.apps),
            socials: tiles(&page.socials),
        };

        template.render().unwrap_or_else(|e| {
            error!("Template rendering error: {}", e);
            format!("Template error: {}", e)
        })
    }
}

fn tiles(entries: &BTreeMap<String, String>) -> Vec<Tile> {
    entries
        .iter()
        .map(|(name, target)| Tile {
            name: name.clone(),
            target: target.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Units;
    use chrono::DateTime;

    fn page() -> PageSettings {
        let mut page = PageSettings {
            title: "Start".to_string(),
            ..PageSettings::default()
        };
        page.links
            .insert("GitHub".to_string(), "https://github.com".to_string());
        page.apps.insert("Terminal".to_string(), "xterm".to_string());
        page
    }

    #[test]
    fn test_renders_tiles_and_weather() {
        let snapshot = WeatherSnapshot {
            temperature: 10.4,
            condition_text: "Clear".to_string(),
            humidity: 61,
            wind_speed: 3.6,
            location: "Warsaw".to_string(),
            units: Units::Metric,
            valid: true,
            ..WeatherSnapshot::unavailable(DateTime::from_timestamp(0, 0).unwrap())
        };

        let html = HomeTemplate::page(&page(), &snapshot);

        assert!(html.contains("<title>Start</title>"));
        assert!(html.contains("github.com"));
        assert!(html.contains("/run/Terminal"));
        assert!(html.contains("10°C"));
        assert!(html.contains("Clear"));
        assert!(html.contains("Warsaw"));
    }

    #[test]
    fn test_renders_unavailable_weather() {
        let snapshot = WeatherSnapshot::unavailable(DateTime::from_timestamp(0, 0).unwrap());
        let html = HomeTemplate::page(&page(), &snapshot);
        assert!(html.contains("Weather unavailable"));
    }
}
