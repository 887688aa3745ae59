//! Pricing calculator.
//!
//! Totals are whole naira in integer arithmetic. Unknown food ids contribute
//! nothing instead of failing.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::FoodMenu;

/// Цена одного места.
pub const SEAT_PRICE: i64 = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PriceBreakdown {
    pub tickets: i64,
    pub food: i64,
    pub total: i64,
}

pub fn breakdown(seat_count: usize, food: &BTreeMap<String, u32>, menu: &FoodMenu) -> PriceBreakdown {
    let tickets = seat_count as i64 * SEAT_PRICE;
    let food = food_total(food, menu);
    PriceBreakdown {
        tickets,
        food,
        total: tickets + food,
    }
}

/// `seat_count * SEAT_PRICE + Σ quantity * unit price`.
pub fn total(seat_count: usize, food: &BTreeMap<String, u32>, menu: &FoodMenu) -> i64 {
    breakdown(seat_count, food, menu).total
}

pub fn food_total(food: &BTreeMap<String, u32>, menu: &FoodMenu) -> i64 {
    food.iter()
        .filter_map(|(id, qty)| menu.price_of(id).map(|price| price * i64::from(*qty)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn food(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs.iter().map(|(id, q)| (id.to_string(), *q)).collect()
    }

    #[test]
    fn two_seats_and_two_small_popcorns() {
        let menu = FoodMenu::standard();
        assert_eq!(total(2, &BTreeMap::new(), &menu), 5000);
        assert_eq!(total(2, &food(&[("popcorn-small", 2)]), &menu), 8000);
    }

    #[test]
    fn unknown_items_are_ignored() {
        let menu = FoodMenu::standard();
        let b = breakdown(1, &food(&[("caviar", 3), ("water", 2)]), &menu);
        assert_eq!(b, PriceBreakdown { tickets: 2500, food: 1000, total: 3500 });
    }

    #[test]
    fn nothing_selected_is_free() {
        assert_eq!(total(0, &BTreeMap::new(), &FoodMenu::standard()), 0);
    }

    proptest! {
        #[test]
        fn total_matches_formula(
            seats in 0usize..=96,
            quantities in proptest::collection::vec(0u32..20, 8),
        ) {
            let menu = FoodMenu::standard();
            let selection: BTreeMap<String, u32> = menu
                .items()
                .iter()
                .zip(quantities.iter())
                .map(|(item, q)| (item.id.clone(), *q))
                .collect();
            let expected = 2500 * seats as i64
                + menu
                    .items()
                    .iter()
                    .zip(quantities.iter())
                    .map(|(item, q)| item.price * i64::from(*q))
                    .sum::<i64>();
            prop_assert_eq!(total(seats, &selection, &menu), expected);
        }
    }
}
