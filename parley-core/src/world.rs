//! World snapshot: what an agent can perceive while talking.
//!
//! The host fills one in per request; it feeds both the system prompt and
//! the `world` block of webhook payloads.

use serde::{Deserialize, Serialize};

/// Ticks in one in-world day.
pub const DAY_LENGTH: u64 = 24_000;

/// Coarse time of day reported to webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    /// 0..6000
    Morning,
    /// 6000..12000
    Day,
    /// 12000..18000
    Evening,
    /// 18000..24000
    Night,
}

impl TimeOfDay {
    /// Classify a day time; values past one day wrap.
    #[must_use]
    pub fn from_day_time(day_time: u64) -> Self {
        match day_time % DAY_LENGTH {
            0..6000 => Self::Morning,
            6000..12_000 => Self::Day,
            12_000..18_000 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Day => "day",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// Current weather.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    /// No precipitation.
    #[default]
    Clear,
    /// Rain or snow.
    Rain,
    /// Thunderstorm.
    Thunder,
}

impl Weather {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Rain => "rain",
            Self::Thunder => "thunder",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Rain => "rain",
            Self::Thunder => "thunderstorm",
        }
    }
}

/// Everything an agent can perceive about its surroundings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSnapshot {
    /// Biome id, e.g. `dark_forest`.
    pub biome: String,
    /// Dimension id, e.g. `minecraft:overworld`.
    pub dimension: String,
    /// Ticks into the current day.
    pub day_time: u64,
    /// Current weather.
    pub weather: Weather,
    /// Notable structures nearby.
    pub nearby_structures: Vec<String>,
    /// Name of the player being spoken to.
    pub player_name: String,
    /// Player health points (out of 20).
    pub player_health: u32,
    /// Player food level (out of 20).
    pub player_hunger: u32,
    /// Player is well below the surface.
    pub player_underground: bool,
    /// Light level at the agent (0..=15).
    pub light_level: u8,
    /// Item in the player's main hand.
    pub main_hand_item: Option<String>,
    /// Item in the player's off hand.
    pub off_hand_item: Option<String>,
}

impl Default for WorldSnapshot {
    fn default() -> Self {
        Self {
            biome: "plains".to_string(),
            dimension: "minecraft:overworld".to_string(),
            day_time: 0,
            weather: Weather::Clear,
            nearby_structures: Vec::new(),
            player_name: String::new(),
            player_health: 20,
            player_hunger: 20,
            player_underground: false,
            light_level: 15,
            main_hand_item: None,
            off_hand_item: None,
        }
    }
}

impl WorldSnapshot {
    /// Coarse time of day.
    #[must_use]
    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::from_day_time(self.day_time)
    }

    /// Bullet list for the "Current World State" prompt section.
    #[must_use]
    pub fn to_prompt_string(&self) -> String {
        let mut lines = vec![
            format!(
                "- Location: {} biome in {}",
                self.biome.replace('_', " "),
                dimension_label(&self.dimension)
            ),
            format!("- Time: {}", describe_day_time(self.day_time)),
            format!("- Weather: {}", self.weather.describe()),
        ];

        if self.light_level < 7 {
            lines.push("- It is quite dark here".to_string());
        }
        if !self.player_name.is_empty() {
            lines.push(format!("- Speaking with: {}", self.player_name));
        }
        if self.player_health <= 6 {
            lines.push("- The player looks badly wounded".to_string());
        } else if self.player_health <= 12 {
            lines.push("- The player appears somewhat injured".to_string());
        }
        if self.player_hunger <= 6 {
            lines.push("- The player looks famished".to_string());
        }
        if self.player_underground {
            lines.push("- You are deep underground".to_string());
        }
        if !self.nearby_structures.is_empty() {
            lines.push(format!("- Nearby: {}", self.nearby_structures.join(", ")));
        }
        match (&self.main_hand_item, &self.off_hand_item) {
            (Some(main), Some(off)) => lines.push(format!("- Player is holding: {main} and {off}")),
            (Some(main), None) => lines.push(format!("- Player is holding: {main}")),
            (None, Some(off)) => lines.push(format!("- Player is holding: {off} (off-hand)")),
            (None, None) => {}
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// Finer-grained label used in prompts.
fn describe_day_time(day_time: u64) -> &'static str {
    match day_time % DAY_LENGTH {
        0..1000 => "dawn",
        1000..6000 => "morning",
        6000..12_000 => "midday",
        12_000..13_000 => "afternoon",
        13_000..14_000 => "dusk",
        14_000..18_000 => "evening",
        18_000..22_000 => "night",
        _ => "late night",
    }
}

fn dimension_label(id: &str) -> String {
    let path = id.rsplit(':').next().unwrap_or(id);
    match path {
        "overworld" => "the Overworld".to_string(),
        "the_nether" => "the Nether".to_string(),
        "the_end" => "the End".to_string(),
        other => other.replace('_', " "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_day_time(0), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_day_time(5999), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_day_time(6000), TimeOfDay::Day);
        assert_eq!(TimeOfDay::from_day_time(12_000), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_day_time(18_000), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_day_time(23_999), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_day_time(24_000 + 7000), TimeOfDay::Day);
    }

    #[test]
    fn prompt_string_mentions_conditions() {
        let snapshot = WorldSnapshot {
            biome: "dark_forest".to_string(),
            dimension: "minecraft:the_nether".to_string(),
            day_time: 13_500,
            weather: Weather::Thunder,
            player_name: "Alex".to_string(),
            player_health: 5,
            player_hunger: 4,
            light_level: 3,
            off_hand_item: Some("Torch".to_string()),
            ..WorldSnapshot::default()
        };
        let text = snapshot.to_prompt_string();
        assert!(text.starts_with("- Location: dark forest biome in the Nether\n"));
        assert!(text.contains("- Time: dusk\n"));
        assert!(text.contains("- Weather: thunderstorm\n"));
        assert!(text.contains("- It is quite dark here\n"));
        assert!(text.contains("- The player looks badly wounded\n"));
        assert!(text.contains("- The player looks famished\n"));
        assert!(text.contains("- Player is holding: Torch (off-hand)\n"));
    }

    #[test]
    fn calm_snapshot_is_short() {
        let text = WorldSnapshot::default().to_prompt_string();
        assert_eq!(
            text,
            "- Location: plains biome in the Overworld\n- Time: dawn\n- Weather: clear\n"
        );
    }

    #[test]
    fn weather_wire_names() {
        assert_eq!(Weather::Thunder.as_str(), "thunder");
        assert_eq!(serde_json::to_string(&TimeOfDay::Evening).expect("encode"), "\"evening\"");
    }
}
