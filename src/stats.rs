use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::loot_log::LootEvent;
use crate::lookup::{CategoryLookup, PriceLookup};

const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_MINUTE: f64 = 60.0;
const MIN_ELAPSED_SECONDS: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStats {
    pub name: String,
    pub quantity: u64,
    pub per_hour: u64,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub interval_start: NaiveDateTime,
    pub interval_end: NaiveDateTime,
    pub elapsed_hours: f64,
    pub elapsed_minutes: f64,
    pub event_count: usize,
    pub currency_total: u64,
    pub currency_per_hour: u64,
    pub currency_per_minute: u64,
    pub item_total: u64,
    pub items_per_hour: u64,
    pub item_value_total: u64,
    pub item_value_per_hour: u64,
    pub items: Vec<ItemStats>,
    pub category_counts: BTreeMap<String, u64>,
    pub total_category_count: u64,
}

#[derive(Debug, Default)]
struct ItemBuckets {
    quantities: Vec<(String, u64)>,
    positions: HashMap<String, usize>,
}

impl ItemBuckets {
    fn add(&mut self, item_name: &str, quantity: u64) {
        if let Some(&position) = self.positions.get(item_name) {
            let slot = &mut self.quantities[position].1;
            *slot = slot.saturating_add(quantity);
            return;
        }

        self.positions
            .insert(item_name.to_string(), self.quantities.len());
        self.quantities.push((item_name.to_string(), quantity));
    }
}

/// Rates round half away from zero over an elapsed span of at least one
/// second. Equal quantities keep first-seen order.
pub fn compute_stats<'a, I>(
    events: I,
    prices: &dyn PriceLookup,
    categories: &dyn CategoryLookup,
) -> Option<StatsSnapshot>
where
    I: IntoIterator<Item = &'a LootEvent>,
{
    let mut interval: Option<(NaiveDateTime, NaiveDateTime)> = None;
    let mut event_count = 0_usize;
    let mut currency_total = 0_u64;
    let mut buckets = ItemBuckets::default();
    let mut category_counts: BTreeMap<String, u64> = BTreeMap::new();

    for event in events {
        event_count += 1;
        interval = Some(match interval {
            Some((start, end)) => (start.min(event.timestamp), end.max(event.timestamp)),
            None => (event.timestamp, event.timestamp),
        });

        if event.is_currency() {
            currency_total = currency_total.saturating_add(event.quantity);
            continue;
        }

        buckets.add(&event.item_name, event.quantity);
        if let Some(category) = categories.category_of(&event.item_name) {
            let count = category_counts.entry(category).or_insert(0);
            *count = count.saturating_add(event.quantity);
        }
    }

    let (interval_start, interval_end) = interval?;
    let elapsed_seconds = (interval_end - interval_start)
        .num_seconds()
        .max(MIN_ELAPSED_SECONDS) as f64;
    let elapsed_hours = elapsed_seconds / SECONDS_PER_HOUR;
    let elapsed_minutes = elapsed_seconds / SECONDS_PER_MINUTE;

    let mut item_total = 0_u64;
    let mut item_value_total = 0_u64;
    let mut items: Vec<ItemStats> = buckets
        .quantities
        .into_iter()
        .map(|(name, quantity)| {
            let value = quantity.saturating_mul(prices.unit_price(&name));
            item_total = item_total.saturating_add(quantity);
            item_value_total = item_value_total.saturating_add(value);
            ItemStats {
                per_hour: rounded_rate(quantity, elapsed_hours),
                name,
                quantity,
                value,
            }
        })
        .collect();
    items.sort_by(|left, right| right.quantity.cmp(&left.quantity));

    let total_category_count = category_counts
        .values()
        .fold(0_u64, |total, count| total.saturating_add(*count));

    Some(StatsSnapshot {
        interval_start,
        interval_end,
        elapsed_hours,
        elapsed_minutes,
        event_count,
        currency_total,
        currency_per_hour: rounded_rate(currency_total, elapsed_hours),
        currency_per_minute: rounded_rate(currency_total, elapsed_minutes),
        item_total,
        items_per_hour: rounded_rate(item_total, elapsed_hours),
        item_value_total,
        item_value_per_hour: rounded_rate(item_value_total, elapsed_hours),
        items,
        category_counts,
        total_category_count,
    })
}

fn rounded_rate(quantity: u64, elapsed_units: f64) -> u64 {
    (quantity as f64 / elapsed_units).round() as u64
}

#[cfg(test)]
mod tests {
    use super::{compute_stats, ItemStats};
    use crate::loot_log::{parse_loot_line, LootEvent};
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use std::collections::HashMap;

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid test timestamp")
    }

    fn event(seconds: i64, quantity: u64, item_name: &str) -> LootEvent {
        LootEvent {
            timestamp: base_time() + TimeDelta::seconds(seconds),
            quantity,
            item_name: item_name.to_string(),
        }
    }

    fn no_prices() -> HashMap<String, u64> {
        HashMap::new()
    }

    fn no_categories() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn empty_window_produces_no_snapshot() {
        let events: Vec<LootEvent> = Vec::new();
        assert_eq!(compute_stats(&events, &no_prices(), &no_categories()), None);
    }

    #[test]
    fn currency_rate_over_two_hours() {
        let events = vec![
            event(0, 400, "Yang"),
            event(3_600, 100, "Yang"),
            event(7_200, 500, "Yang"),
        ];

        let snapshot =
            compute_stats(&events, &no_prices(), &no_categories()).expect("snapshot expected");
        assert_eq!(snapshot.elapsed_hours, 2.0);
        assert_eq!(snapshot.elapsed_minutes, 120.0);
        assert_eq!(snapshot.currency_total, 1000);
        assert_eq!(snapshot.currency_per_hour, 500);
        assert_eq!(snapshot.currency_per_minute, 8);
        assert!(snapshot.items.is_empty());
    }

    #[test]
    fn values_items_with_the_price_table() {
        let events = vec![event(0, 3, "Shard"), event(10, 4, "Pebble")];
        let prices = HashMap::from([("Shard".to_string(), 1000_u64)]);

        let snapshot = compute_stats(&events, &prices, &no_categories()).expect("snapshot expected");
        let shard = snapshot
            .items
            .iter()
            .find(|item| item.name == "Shard")
            .expect("shard row");
        let pebble = snapshot
            .items
            .iter()
            .find(|item| item.name == "Pebble")
            .expect("pebble row");

        assert_eq!(shard.value, 3000);
        assert_eq!(pebble.value, 0);
        assert_eq!(snapshot.item_value_total, 3000);
        assert_eq!(snapshot.item_total, 7);
    }

    #[test]
    fn rolls_chest_quantities_into_categories() {
        let events = vec![
            event(0, 2, "Truhe des Razador"),
            event(60, 900, "Yang"),
            event(120, 5, "Truhe des Razador"),
            event(180, 1, "Shard"),
        ];
        let categories = HashMap::from([(
            "Truhe des Razador".to_string(),
            "Razador".to_string(),
        )]);

        let snapshot = compute_stats(&events, &no_prices(), &categories).expect("snapshot expected");
        assert_eq!(snapshot.category_counts.get("Razador"), Some(&7));
        assert_eq!(snapshot.category_counts.len(), 1);
        assert_eq!(snapshot.total_category_count, 7);
    }

    #[test]
    fn currency_is_never_categorized() {
        let events = vec![event(0, 10, "Yang")];
        let categories = HashMap::from([("Yang".to_string(), "Money".to_string())]);

        let snapshot = compute_stats(&events, &no_prices(), &categories).expect("snapshot expected");
        assert!(snapshot.category_counts.is_empty());
        assert_eq!(snapshot.total_category_count, 0);
    }

    #[test]
    fn two_line_log_scenario() {
        let events: Vec<LootEvent> = [
            "[01/01/25] [00:00:00]: You receive 100 Yang.",
            "[01/01/25] [01:00:00]: You receive 50 Shard.",
        ]
        .iter()
        .filter_map(|line| parse_loot_line(line))
        .collect();
        let prices = HashMap::from([("Shard".to_string(), 1000_u64)]);

        let snapshot = compute_stats(&events, &prices, &no_categories()).expect("snapshot expected");
        assert_eq!(snapshot.currency_total, 100);
        assert_eq!(snapshot.elapsed_hours, 1.0);
        assert_eq!(snapshot.currency_per_hour, 100);
        assert_eq!(
            snapshot.items,
            vec![ItemStats {
                name: "Shard".to_string(),
                quantity: 50,
                per_hour: 50,
                value: 50_000,
            }]
        );
        assert_eq!(snapshot.item_value_per_hour, 50_000);
    }

    #[test]
    fn single_timestamp_uses_one_second_floor() {
        let events = vec![event(0, 2, "Yang"), event(0, 0, "Shard")];

        let snapshot =
            compute_stats(&events, &no_prices(), &no_categories()).expect("snapshot expected");
        assert_eq!(snapshot.elapsed_minutes, 1.0 / 60.0);
        assert_eq!(snapshot.currency_per_hour, 7_200);
        assert_eq!(snapshot.currency_per_minute, 120);
        assert_eq!(snapshot.items[0].quantity, 0);
        assert_eq!(snapshot.items[0].per_hour, 0);
        assert_eq!(snapshot.interval_start, snapshot.interval_end);
    }

    #[test]
    fn orders_items_by_quantity_then_first_appearance() {
        let events = vec![
            event(0, 5, "Pebble"),
            event(10, 9, "Shard"),
            event(20, 5, "Feather"),
            event(30, 5, "Acorn"),
        ];

        let snapshot =
            compute_stats(&events, &no_prices(), &no_categories()).expect("snapshot expected");
        let names: Vec<&str> = snapshot.items.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Shard", "Pebble", "Feather", "Acorn"]);
    }

    #[test]
    fn merges_repeated_items() {
        let events = vec![event(0, 2, "Shard"), event(1_800, 3, "Shard")];

        let snapshot =
            compute_stats(&events, &no_prices(), &no_categories()).expect("snapshot expected");
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].quantity, 5);
        assert_eq!(snapshot.items[0].per_hour, 10);
        assert_eq!(snapshot.event_count, 2);
    }

    #[test]
    fn rounds_half_rates_up() {
        let events = vec![event(0, 1, "Yang"), event(7_200, 2, "Yang")];

        let snapshot =
            compute_stats(&events, &no_prices(), &no_categories()).expect("snapshot expected");
        assert_eq!(snapshot.currency_per_hour, 2);
    }

    #[test]
    fn recomputing_an_unchanged_window_is_identical() {
        let events = vec![
            event(0, 1250, "Yang"),
            event(95, 3, "Shard"),
            event(411, 1, "Truhe des Razador"),
            event(5_003, 7, "Pebble"),
        ];
        let prices = HashMap::from([("Shard".to_string(), 333_u64)]);
        let categories = HashMap::from([(
            "Truhe des Razador".to_string(),
            "Razador".to_string(),
        )]);

        let first = compute_stats(&events, &prices, &categories);
        let second = compute_stats(&events, &prices, &categories);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn interval_covers_out_of_order_events() {
        let events = vec![event(600, 1, "Yang"), event(0, 1, "Yang"), event(300, 1, "Yang")];

        let snapshot =
            compute_stats(&events, &no_prices(), &no_categories()).expect("snapshot expected");
        assert_eq!(snapshot.interval_start, base_time());
        assert_eq!(snapshot.interval_end, base_time() + TimeDelta::seconds(600));
    }
}
