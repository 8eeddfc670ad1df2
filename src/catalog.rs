//! Attribute Catalog
//!
//! Single-letter codes used by the mushroom dataset, mapped to readable words.

/// feature -> [(code, word)]
const CATALOG: &[(&str, &[(&str, &str)])] = &[
    (
        "cap-shape",
        &[("b", "Bell"), ("c", "Conical"), ("x", "Convex"), ("f", "Flat"), ("k", "Knobbed"), ("s", "Sunken")],
    ),
    ("cap-surface", &[("f", "Fibrous"), ("g", "Grooves"), ("y", "Scaly"), ("s", "Smooth")]),
    (
        "cap-color",
        &[
            ("n", "Brown"), ("b", "Buff"), ("c", "Cinnamon"), ("g", "Gray"), ("r", "Green"),
            ("p", "Pink"), ("u", "Purple"), ("e", "Red"), ("w", "White"), ("y", "Yellow"),
        ],
    ),
    ("bruises", &[("t", "Bruises"), ("f", "No Bruises")]),
    (
        "odor",
        &[
            ("a", "Almond"), ("l", "Anise"), ("c", "Creosote"), ("y", "Fishy"), ("f", "Foul"),
            ("m", "Musty"), ("n", "None"), ("p", "Pungent"), ("s", "Spicy"),
        ],
    ),
    ("gill-attachment", &[("a", "Attached"), ("f", "Free")]),
    ("gill-spacing", &[("c", "Close"), ("w", "Crowded")]),
    ("gill-size", &[("b", "Broad"), ("n", "Narrow")]),
    (
        "gill-color",
        &[
            ("k", "Black"), ("n", "Brown"), ("b", "Buff"), ("h", "Chocolate"), ("g", "Gray"),
            ("r", "Green"), ("o", "Orange"), ("p", "Pink"), ("u", "Purple"), ("e", "Red"),
            ("w", "White"), ("y", "Yellow"),
        ],
    ),
    ("stalk-shape", &[("e", "Enlarging"), ("t", "Tapering")]),
    (
        "stalk-root",
        &[("b", "Bulbous"), ("c", "Club"), ("e", "Equal"), ("r", "Rooted"), ("?", "Missing")],
    ),
    (
        "stalk-surface-above-ring",
        &[("f", "Fibrous"), ("y", "Scaly"), ("k", "Silky"), ("s", "Smooth")],
    ),
    (
        "stalk-surface-below-ring",
        &[("f", "Fibrous"), ("y", "Scaly"), ("k", "Silky"), ("s", "Smooth")],
    ),
    (
        "stalk-color-above-ring",
        &[
            ("n", "Brown"), ("b", "Buff"), ("c", "Cinnamon"), ("g", "Gray"), ("o", "Orange"),
            ("p", "Pink"), ("e", "Red"), ("w", "White"), ("y", "Yellow"),
        ],
    ),
    (
        "stalk-color-below-ring",
        &[
            ("n", "Brown"), ("b", "Buff"), ("c", "Cinnamon"), ("g", "Gray"), ("o", "Orange"),
            ("p", "Pink"), ("e", "Red"), ("w", "White"), ("y", "Yellow"),
        ],
    ),
    ("veil-type", &[("p", "Partial")]),
    ("veil-color", &[("n", "Brown"), ("o", "Orange"), ("w", "White"), ("y", "Yellow")]),
    ("ring-number", &[("n", "None"), ("o", "One"), ("t", "Two")]),
    (
        "ring-type",
        &[("e", "Evanescent"), ("f", "Flaring"), ("l", "Large"), ("n", "None"), ("p", "Pendant")],
    ),
    (
        "spore-print-color",
        &[
            ("k", "Black"), ("n", "Brown"), ("b", "Buff"), ("h", "Chocolate"), ("r", "Green"),
            ("o", "Orange"), ("u", "Purple"), ("w", "White"), ("y", "Yellow"),
        ],
    ),
    (
        "population",
        &[
            ("a", "Abundant"), ("c", "Clustered"), ("n", "Numerous"), ("s", "Scattered"),
            ("v", "Several"), ("y", "Solitary"),
        ],
    ),
    (
        "habitat",
        &[
            ("g", "Grasses"), ("l", "Leaves"), ("m", "Meadows"), ("p", "Paths"), ("u", "Urban"),
            ("w", "Waste"), ("d", "Woods"),
        ],
    ),
];

fn values_for(feature: &str) -> Option<&'static [(&'static str, &'static str)]> {
    CATALOG
        .iter()
        .find(|(name, _)| *name == feature)
        .map(|(_, values)| *values)
}

/// Features the catalog knows about, in dataset column order.
pub fn known_features() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(name, _)| *name)
}

/// `cap-shape` -> `Cap Shape`
pub fn readable_feature(feature: &str) -> String {
    feature
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Word for a code, or the code itself when unmapped.
pub fn readable_value(feature: &str, code: &str) -> String {
    values_for(feature)
        .and_then(|values| values.iter().find(|(c, _)| *c == code))
        .map(|(_, word)| word.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Code for a word or code (case-insensitive). Unknown input is returned trimmed.
pub fn code_for(feature: &str, input: &str) -> String {
    let input = input.trim();
    if let Some(values) = values_for(feature) {
        if values.iter().any(|(code, _)| *code == input) {
            return input.to_string();
        }
        if let Some((code, _)) = values.iter().find(|(_, word)| word.eq_ignore_ascii_case(input)) {
            return code.to_string();
        }
    }
    input.to_string()
}

/// `odor_n` -> `Odor: None`. Names without `_` or with an unknown feature pass through.
pub fn decode_encoded_name(encoded: &str) -> String {
    match encoded.split_once('_') {
        Some((feature, code)) if values_for(feature).is_some() => {
            format!("{}: {}", readable_feature(feature), readable_value(feature, code))
        }
        _ => encoded.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_all_attributes() {
        assert_eq!(known_features().count(), 22);
    }

    #[test]
    fn test_readable_feature() {
        assert_eq!(readable_feature("cap-shape"), "Cap Shape");
        assert_eq!(readable_feature("odor"), "Odor");
        assert_eq!(readable_feature("stalk-surface-above-ring"), "Stalk Surface Above Ring");
    }

    #[test]
    fn test_value_lookup_both_ways() {
        assert_eq!(readable_value("odor", "f"), "Foul");
        assert_eq!(readable_value("stalk-root", "?"), "Missing");
        assert_eq!(readable_value("odor", "z"), "z");
        assert_eq!(readable_value("weight", "f"), "f");

        assert_eq!(code_for("odor", "Foul"), "f");
        assert_eq!(code_for("odor", "foul"), "f");
        assert_eq!(code_for("odor", "n"), "n");
        assert_eq!(code_for("bruises", "No Bruises"), "f");
        assert_eq!(code_for("odor", " Pleasant "), "Pleasant");
    }

    #[test]
    fn test_ambiguous_code_prefers_code() {
        assert_eq!(code_for("ring-number", "n"), "n");
        assert_eq!(code_for("ring-number", "None"), "n");
    }

    #[test]
    fn test_decode_encoded_name() {
        assert_eq!(decode_encoded_name("odor_n"), "Odor: None");
        assert_eq!(decode_encoded_name("spore-print-color_h"), "Spore Print Color: Chocolate");
        assert_eq!(decode_encoded_name("odor"), "odor");
        assert_eq!(decode_encoded_name("weight_x"), "weight_x");
    }
}
