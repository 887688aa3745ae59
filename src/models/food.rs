use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodCategory {
    Snacks,
    Drinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: String,
    pub name: String,
    /// Цена за единицу в наирах.
    pub price: i64,
    pub category: FoodCategory,
}

impl FoodItem {
    fn new(id: &str, name: &str, price: i64, category: FoodCategory) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
            category,
        }
    }
}

/// Static concession catalog. Only `item id -> quantity` selections live in a
/// booking session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoodMenu {
    items: Vec<FoodItem>,
}

impl FoodMenu {
    pub fn new(items: Vec<FoodItem>) -> Self {
        Self { items }
    }

    pub fn standard() -> Self {
        use FoodCategory::*;
        Self::new(vec![
            FoodItem::new("popcorn-small", "Small Popcorn", 1500, Snacks),
            FoodItem::new("popcorn-large", "Large Popcorn", 2500, Snacks),
            FoodItem::new("nachos", "Nachos with Cheese", 2000, Snacks),
            FoodItem::new("hotdog", "Hot Dog", 1800, Snacks),
            FoodItem::new("coke-small", "Small Coke", 800, Drinks),
            FoodItem::new("coke-large", "Large Coke", 1200, Drinks),
            FoodItem::new("water", "Bottled Water", 500, Drinks),
            FoodItem::new("juice", "Fresh Juice", 1000, Drinks),
        ])
    }

    pub fn items(&self) -> &[FoodItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&FoodItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn price_of(&self, id: &str) -> Option<i64> {
        self.get(id).map(|item| item.price)
    }

    pub fn by_category(&self, category: FoodCategory) -> impl Iterator<Item = &FoodItem> {
        self.items.iter().filter(move |item| item.category == category)
    }
}

impl Default for FoodMenu {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_menu_prices() {
        let menu = FoodMenu::standard();
        assert_eq!(menu.items().len(), 8);
        assert_eq!(menu.price_of("popcorn-small"), Some(1500));
        assert_eq!(menu.price_of("juice"), Some(1000));
        assert_eq!(menu.price_of("caviar"), None);
        assert_eq!(menu.by_category(FoodCategory::Snacks).count(), 4);
        assert_eq!(menu.by_category(FoodCategory::Drinks).count(), 4);
    }
}
