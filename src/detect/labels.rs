//! Category vocabularies used by the built-in backends.
//!
//! The category vocabulary is open-ended: each backend decides which labels it
//! emits. The remote backend folds the external classifier's labels into the
//! three bin categories below.

pub const RECYCLABLES: &str = "recyclables";
pub const REUSABLE_CUPS: &str = "reusable-cups";
pub const GENERAL_WASTE: &str = "general-waste";

/// Classes emitted by the synthetic backend.
pub const SYNTHETIC_CATEGORIES: &[&str] = &[
    "cardboard",
    "glass",
    "metal",
    "paper",
    "plastic",
    "trash",
    "organic",
    "battery",
    "clothes",
    "shoes",
    "cups",
];

/// Output classes of the bundled local detection model, in score-column order.
pub const MODEL_CLASSES: &[&str] = &["cardboard", "glass", "metal", "paper", "plastic", "trash"];

const REMOTE_LABEL_MAP: &[(&str, &str)] = &[
    ("Battery", RECYCLABLES),
    ("Biological", GENERAL_WASTE),
    ("Cardboard", RECYCLABLES),
    ("Glass", RECYCLABLES),
    ("Metal", RECYCLABLES),
    ("Paper", RECYCLABLES),
    ("Plastic", RECYCLABLES),
    ("Trash", GENERAL_WASTE),
    ("Shoes", GENERAL_WASTE),
    ("Clothes", GENERAL_WASTE),
    ("Cups", REUSABLE_CUPS),
];

/// Map an external classifier label to an internal category.
/// Unknown labels land in the general waste bucket.
pub fn map_remote_label(label: &str) -> &'static str {
    REMOTE_LABEL_MAP
        .iter()
        .find(|(external, _)| *external == label)
        .map(|(_, category)| *category)
        .unwrap_or(GENERAL_WASTE)
}
