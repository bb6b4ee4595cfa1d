use std::collections::{HashMap, HashSet};

/// Service categories and the product each one rolls up to.
pub const CATEGORY_PRODUCTS: &[(&str, &str)] = &[
    ("KAI", "Broadband"),
    ("NET", "Broadband"),
    ("KAV", "Voice"),
    ("KAD", "TV"),
    ("GIGA", "GIGA"),
    ("VOD", "VOD"),
    ("HDW", "HDW"),
];

/// Category lookup with configured overrides and exclusions applied.
#[derive(Debug, Clone)]
pub struct CategoryMap {
    products: HashMap<String, String>,
    excluded: HashSet<String>,
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self {
            products: CATEGORY_PRODUCTS
                .iter()
                .map(|(category, product)| (category.to_string(), product.to_string()))
                .collect(),
            excluded: HashSet::new(),
        }
    }
}

impl CategoryMap {
    pub fn new(overrides: &HashMap<String, String>, excluded: &[String]) -> Self {
        let mut map = Self::default();
        for (category, product) in overrides {
            map.products
                .insert(category.trim().to_uppercase(), product.clone());
        }
        map.excluded = excluded.iter().map(|c| c.trim().to_uppercase()).collect();
        map
    }

    /// Product for a category, or `None` when the row should be dropped.
    pub fn product_for(&self, category: &str) -> Option<&str> {
        let category = category.trim().to_uppercase();
        if self.excluded.contains(&category) {
            return None;
        }
        self.products.get(&category).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_maps_known_categories() {
        let map = CategoryMap::default();
        assert_eq!(map.product_for("KAI"), Some("Broadband"));
        assert_eq!(map.product_for("net"), Some("Broadband"));
        assert_eq!(map.product_for("KAV"), Some("Voice"));
        assert_eq!(map.product_for("KAD"), Some("TV"));
        assert_eq!(map.product_for("HDW"), Some("HDW"));
    }

    #[test]
    fn unknown_categories_are_dropped() {
        assert_eq!(CategoryMap::default().product_for("MISC"), None);
    }

    #[test]
    fn exclusions_win_over_the_table() {
        let map = CategoryMap::new(&HashMap::new(), &["vod".to_string()]);
        assert_eq!(map.product_for("VOD"), None);
        assert_eq!(map.product_for("GIGA"), Some("GIGA"));
    }

    #[test]
    fn overrides_extend_and_replace() {
        let overrides = HashMap::from([
            ("rtr".to_string(), "Router".to_string()),
            ("HDW".to_string(), "Router".to_string()),
        ]);
        let map = CategoryMap::new(&overrides, &[]);
        assert_eq!(map.product_for("RTR"), Some("Router"));
        assert_eq!(map.product_for("HDW"), Some("Router"));
    }
}
