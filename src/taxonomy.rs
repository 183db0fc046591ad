// Closed vocabularies shared by styles, user preferences and filters.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! vocabulary {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| format!("Unknown {}: {}", stringify!($name), s))
            }
        }
    };
}

vocabulary!(Difficulty {
    Beginner => "Beginner",
    Intermediate => "Intermediate",
    Advanced => "Advanced",
});

vocabulary!(Occasion {
    Casual => "Casual",
    Formal => "Formal",
    Wedding => "Wedding",
    Office => "Office",
    Party => "Party",
    Religious => "Religious",
    Sport => "Sport",
});

vocabulary!(FaceShape {
    Round => "Round",
    Oval => "Oval",
    Square => "Square",
    Heart => "Heart",
    Long => "Long",
    Diamond => "Diamond",
});

vocabulary!(StyleStatus {
    Draft => "Draft",
    Published => "Published",
    Archived => "Archived",
});

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Beginner
    }
}

impl Default for StyleStatus {
    fn default() -> Self {
        StyleStatus::Published
    }
}
