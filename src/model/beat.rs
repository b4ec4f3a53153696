use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the fifteen Save the Cat milestones, in story order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Beat {
    #[serde(rename = "opening-image", alias = "Opening Image")]
    OpeningImage,
    #[serde(rename = "theme-stated", alias = "Theme Stated")]
    ThemeStated,
    #[serde(rename = "set-up", alias = "Set-Up", alias = "Setup")]
    SetUp,
    #[serde(rename = "catalyst", alias = "Catalyst")]
    Catalyst,
    #[serde(rename = "debate", alias = "Debate")]
    Debate,
    #[serde(rename = "break-into-two", alias = "Break into Two")]
    BreakIntoTwo,
    #[serde(rename = "b-story", alias = "B Story")]
    BStory,
    #[serde(rename = "fun-and-games", alias = "Fun and Games")]
    FunAndGames,
    #[serde(rename = "midpoint", alias = "Midpoint")]
    Midpoint,
    #[serde(rename = "bad-guys-close-in", alias = "Bad Guys Close In")]
    BadGuysCloseIn,
    #[serde(rename = "all-is-lost", alias = "All Is Lost")]
    AllIsLost,
    #[serde(rename = "dark-night-of-the-soul", alias = "Dark Night of the Soul")]
    DarkNightOfTheSoul,
    #[serde(rename = "break-into-three", alias = "Break into Three")]
    BreakIntoThree,
    #[serde(rename = "finale", alias = "Finale")]
    Finale,
    #[serde(rename = "final-image", alias = "Final Image")]
    FinalImage,
}

impl Beat {
    /// All beats in story order
    pub const ALL: [Beat; 15] = [
        Beat::OpeningImage,
        Beat::ThemeStated,
        Beat::SetUp,
        Beat::Catalyst,
        Beat::Debate,
        Beat::BreakIntoTwo,
        Beat::BStory,
        Beat::FunAndGames,
        Beat::Midpoint,
        Beat::BadGuysCloseIn,
        Beat::AllIsLost,
        Beat::DarkNightOfTheSoul,
        Beat::BreakIntoThree,
        Beat::Finale,
        Beat::FinalImage,
    ];

    /// 1-based position in the beat sheet
    pub fn number(self) -> usize {
        Beat::ALL.iter().position(|b| *b == self).map_or(0, |i| i + 1)
    }

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            Beat::OpeningImage => "Opening Image",
            Beat::ThemeStated => "Theme Stated",
            Beat::SetUp => "Set-Up",
            Beat::Catalyst => "Catalyst",
            Beat::Debate => "Debate",
            Beat::BreakIntoTwo => "Break into Two",
            Beat::BStory => "B Story",
            Beat::FunAndGames => "Fun and Games",
            Beat::Midpoint => "Midpoint",
            Beat::BadGuysCloseIn => "Bad Guys Close In",
            Beat::AllIsLost => "All Is Lost",
            Beat::DarkNightOfTheSoul => "Dark Night of the Soul",
            Beat::BreakIntoThree => "Break into Three",
            Beat::Finale => "Finale",
            Beat::FinalImage => "Final Image",
        }
    }

    /// Stable key used in files and on the command line
    pub fn key(self) -> &'static str {
        match self {
            Beat::OpeningImage => "opening-image",
            Beat::ThemeStated => "theme-stated",
            Beat::SetUp => "set-up",
            Beat::Catalyst => "catalyst",
            Beat::Debate => "debate",
            Beat::BreakIntoTwo => "break-into-two",
            Beat::BStory => "b-story",
            Beat::FunAndGames => "fun-and-games",
            Beat::Midpoint => "midpoint",
            Beat::BadGuysCloseIn => "bad-guys-close-in",
            Beat::AllIsLost => "all-is-lost",
            Beat::DarkNightOfTheSoul => "dark-night-of-the-soul",
            Beat::BreakIntoThree => "break-into-three",
            Beat::Finale => "finale",
            Beat::FinalImage => "final-image",
        }
    }

    /// One-line reminder of what the beat is for
    pub fn guidance(self) -> &'static str {
        match self {
            Beat::OpeningImage => "A snapshot of the hero's world before the journey.",
            Beat::ThemeStated => "Someone states what the story is really about.",
            Beat::SetUp => "The hero's status quo, flaws, and what is missing.",
            Beat::Catalyst => "The life-changing event that knocks the hero off course.",
            Beat::Debate => "The hero resists or questions the call.",
            Beat::BreakIntoTwo => "The hero chooses to enter the upside-down world.",
            Beat::BStory => "A new relationship that carries the theme.",
            Beat::FunAndGames => "The promise of the premise, played out.",
            Beat::Midpoint => "A false victory or false defeat raises the stakes.",
            Beat::BadGuysCloseIn => "Internal and external pressure tightens.",
            Beat::AllIsLost => "The lowest point; something or someone dies.",
            Beat::DarkNightOfTheSoul => "The hero wallows before the final insight.",
            Beat::BreakIntoThree => "The A and B stories combine into a solution.",
            Beat::Finale => "The hero proves the lesson and defeats the problem.",
            Beat::FinalImage => "The mirror of the opening image, showing the change.",
        }
    }

    /// Parse a beat from its key, its label, or its 1-based number.
    pub fn parse_beat(s: &str) -> Option<Beat> {
        let s = s.trim();
        if let Ok(n) = s.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| Beat::ALL.get(i).copied());
        }
        let norm = normalize(s);
        Beat::ALL
            .iter()
            .copied()
            .find(|b| normalize(b.key()) == norm || normalize(b.label()) == norm)
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for Beat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_follow_story_order() {
        assert_eq!(Beat::OpeningImage.number(), 1);
        assert_eq!(Beat::Midpoint.number(), 9);
        assert_eq!(Beat::FinalImage.number(), 15);
    }

    #[test]
    fn test_parse_beat_forms() {
        assert_eq!(Beat::parse_beat("catalyst"), Some(Beat::Catalyst));
        assert_eq!(Beat::parse_beat("Break into Two"), Some(Beat::BreakIntoTwo));
        assert_eq!(Beat::parse_beat("dark-night-of-the-soul"), Some(Beat::DarkNightOfTheSoul));
        assert_eq!(Beat::parse_beat("3"), Some(Beat::SetUp));
        assert_eq!(Beat::parse_beat("0"), None);
        assert_eq!(Beat::parse_beat("16"), None);
        assert_eq!(Beat::parse_beat("prologue"), None);
    }

    #[test]
    fn test_serde_accepts_legacy_labels() {
        let beats: Vec<Beat> = serde_json::from_str(r#"["Opening Image", "b-story"]"#).unwrap();
        assert_eq!(beats, vec![Beat::OpeningImage, Beat::BStory]);
        assert_eq!(
            serde_json::to_string(&Beat::AllIsLost).unwrap(),
            "\"all-is-lost\""
        );
    }
}
