//! Ideas for using up food before it goes to waste.

const MAX_SUGGESTIONS: usize = 5;

const GENERAL: &[&str] = &[
    "Freeze {} to extend its shelf life",
    "Consider donating {} if you can't use it soon",
    "Share {} with friends, family, or neighbors",
];

fn by_category(category: &str) -> &'static [&'static str] {
    match category {
        "Fruits" => &[
            "Make a smoothie with {}",
            "Use {} in a fruit salad",
            "Make jam or preserves with {}",
            "Use overripe {} for baking",
        ],
        "Vegetables" => &[
            "Add {} to a soup or stew",
            "Roast {} as a side dish",
            "Make a vegetable stock with {}",
            "Pickle {} to extend shelf life",
        ],
        "Dairy Products" => &[
            "Use {} in baking recipes",
            "Make a sauce or dip with {}",
            "Add {} to scrambled eggs",
            "Make a smoothie with {}",
        ],
        "Meat & Poultry" => &[
            "Cook and freeze {} in portions",
            "Use {} in a stir-fry",
            "Add {} to a casserole",
            "Make a stew with {}",
        ],
        "Seafood" => &[
            "Cook and freeze {} in portions",
            "Make a seafood pasta with {}",
            "Add {} to a soup",
            "Make a seafood salad with {}",
        ],
        "Grains & Cereals" => &[
            "Make a grain bowl with {}",
            "Use {} in a soup",
            "Make a breakfast porridge with {}",
            "Add {} to a salad",
        ],
        "Beverages" => &[
            "Use {} in a cocktail",
            "Make a smoothie with {}",
            "Add {} to a dessert",
            "Use {} in cooking",
        ],
        "Snacks" => &[
            "Share {} with friends",
            "Use {} in a trail mix",
            "Add {} to a dessert",
            "Use {} in a snack mix",
        ],
        "Frozen Foods" => &[
            "Cook {} in a new recipe",
            "Add {} to a stir-fry",
            "Use {} in a casserole",
            "Make a quick meal with {}",
        ],
        "Canned & Jarred Foods" => &[
            "Use {} in a soup",
            "Add {} to a pasta dish",
            "Make a quick meal with {}",
            "Use {} in a salad",
        ],
        "Condiments & Spices" => &[
            "Use {} in a marinade",
            "Add {} to a sauce",
            "Use {} in a new recipe",
            "Experiment with {} in cooking",
        ],
        "Baking & Cooking Ingredients" => &[
            "Use {} in a new recipe",
            "Make a dessert with {}",
            "Add {} to a sauce",
            "Experiment with {} in baking",
        ],
        "Ready-to-Eat / Prepared Foods" => &[
            "Enhance {} with additional ingredients",
            "Use {} as a base for a new dish",
            "Add {} to a salad",
            "Use {} in a quick meal",
        ],
        _ => &[],
    }
}

/// Up to five suggestions: category-specific ones first, then general ones.
pub fn suggestions_for(category: &str, name: &str) -> Vec<String> {
    by_category(category)
        .iter()
        .chain(GENERAL)
        .take(MAX_SUGGESTIONS)
        .map(|template| template.replace("{}", name))
        .collect()
}
