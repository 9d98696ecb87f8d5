//! Collection name derivation.
//!
//! A model without an explicit collection name is stored in the plural of its
//! lower-cased type name. [`pluralize`] is a pure table-driven function: uncountable
//! words are returned unchanged, irregular words come from a fixed table, and every
//! other word falls through a short list of suffix rules.

const UNCOUNTABLE: &[&str] = &[
    "data",
    "deer",
    "equipment",
    "feedback",
    "fish",
    "information",
    "media",
    "metadata",
    "money",
    "moose",
    "news",
    "rice",
    "series",
    "sheep",
    "species",
    "staff",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("ox", "oxen"),
    ("datum", "data"),
    ("criterion", "criteria"),
    ("phenomenon", "phenomena"),
    ("index", "indices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
    ("analysis", "analyses"),
    ("crisis", "crises"),
    ("thesis", "theses"),
    ("cactus", "cacti"),
    ("focus", "foci"),
];

const F_TO_VES: &[(&str, &str)] = &[
    ("calf", "calves"),
    ("half", "halves"),
    ("knife", "knives"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("loaf", "loaves"),
    ("shelf", "shelves"),
    ("thief", "thieves"),
    ("wife", "wives"),
    ("wolf", "wolves"),
];

const O_TO_OES: &[&str] = &["echo", "hero", "potato", "tomato", "veto", "torpedo"];

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

/// Returns the plural form of a lower-case English word.
///
/// Irregular forms are matched on the whole word, so compound names such as
/// `salesperson` fall through to the regular suffix rules.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }

    if let Some((_, plural)) = IRREGULAR
        .iter()
        .chain(F_TO_VES)
        .find(|(singular, _)| *singular == word)
    {
        return plural.to_string();
    }

    if O_TO_OES.contains(&word) {
        return format!("{word}es");
    }

    if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| word.ends_with(suffix))
    {
        return format!("{word}es");
    }

    if let Some(stem) = word.strip_suffix('y') {
        if stem.chars().last().is_some_and(|c| !VOWELS.contains(&c)) {
            return format!("{stem}ies");
        }
    }

    format!("{word}s")
}

/// Derives the collection name for a model type name.
pub fn collection_name_for(model_name: &str) -> String {
    pluralize(&model_name.to_lowercase())
}
