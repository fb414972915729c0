//! Bin presets and the accepted-category set.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::detect::labels::{GENERAL_WASTE, RECYCLABLES, REUSABLE_CUPS};

/// Physical bins the sentinel can guard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinPreset {
    #[default]
    Yellow,
    Purple,
    Black,
}

impl BinPreset {
    pub const ALL: [BinPreset; 3] = [BinPreset::Yellow, BinPreset::Purple, BinPreset::Black];

    pub fn id(&self) -> &'static str {
        match self {
            BinPreset::Yellow => "yellow",
            BinPreset::Purple => "purple",
            BinPreset::Black => "black",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BinPreset::Yellow => {
                "packaging and recyclables: plastic bottles, cans, cardboard, paper"
            }
            BinPreset::Purple => "reusable cups that are washed and reused",
            BinPreset::Black => "general waste: food scraps, tissues, non-recyclables",
        }
    }

    pub fn default_categories(&self) -> &'static [&'static str] {
        match self {
            BinPreset::Yellow => &[RECYCLABLES],
            BinPreset::Purple => &[REUSABLE_CUPS],
            BinPreset::Black => &[GENERAL_WASTE],
        }
    }

    pub fn accepted(&self) -> AcceptedCategories {
        AcceptedCategories::from_iter(self.default_categories().iter().copied())
    }
}

impl FromStr for BinPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().trim_end_matches("-bin").to_lowercase();
        BinPreset::ALL
            .into_iter()
            .find(|bin| bin.id() == wanted)
            .ok_or_else(|| anyhow!("unknown bin '{}'; expected yellow, purple or black", s))
    }
}

impl fmt::Display for BinPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Categories the current bin permits. An empty set is valid and means every
/// close detection is rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedCategories(BTreeSet<String>);

impl AcceptedCategories {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.0.contains(category)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AcceptedCategories {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .map(|c: String| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }
}

impl fmt::Display for AcceptedCategories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(none)");
        }
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(", "))
    }
}
