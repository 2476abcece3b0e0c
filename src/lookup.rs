use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Unit price per item name. Unknown items are worth 0.
pub trait PriceLookup: Send + Sync {
    fn unit_price(&self, item_name: &str) -> u64;

    // `visit` sees one version of the table from start to finish.
    fn visit_prices(&self, visit: &mut dyn FnMut(&dyn PriceLookup));
}

pub trait CategoryLookup: Send + Sync {
    fn category_of(&self, item_name: &str) -> Option<String>;

    fn visit_categories(&self, visit: &mut dyn FnMut(&dyn CategoryLookup));
}

impl PriceLookup for HashMap<String, u64> {
    fn unit_price(&self, item_name: &str) -> u64 {
        self.get(item_name).copied().unwrap_or(0)
    }

    fn visit_prices(&self, visit: &mut dyn FnMut(&dyn PriceLookup)) {
        visit(self)
    }
}

impl CategoryLookup for HashMap<String, String> {
    fn category_of(&self, item_name: &str) -> Option<String> {
        self.get(item_name).cloned()
    }

    fn visit_categories(&self, visit: &mut dyn FnMut(&dyn CategoryLookup)) {
        visit(self)
    }
}

// Writers swap in a new map; readers clone the current `Arc` and keep using
// that version for as long as they hold it.
#[derive(Debug, Clone)]
pub struct SharedLookupTable<V> {
    entries: Arc<RwLock<Arc<HashMap<String, V>>>>,
}

impl<V> Default for SharedLookupTable<V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Arc::new(HashMap::new()))),
        }
    }
}

impl<V: Clone> SharedLookupTable<V> {
    pub fn new(entries: HashMap<String, V>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Arc::new(entries))),
        }
    }

    pub fn current(&self) -> Arc<HashMap<String, V>> {
        match self.entries.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, entries: HashMap<String, V>) {
        match self.entries.write() {
            Ok(mut guard) => *guard = Arc::new(entries),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(entries),
        }
    }

    pub fn insert(&self, name: impl Into<String>, value: V) {
        let mut guard = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::make_mut(&mut guard).insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<V> {
        self.current().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PriceLookup for SharedLookupTable<u64> {
    fn unit_price(&self, item_name: &str) -> u64 {
        self.get(item_name).unwrap_or(0)
    }

    fn visit_prices(&self, visit: &mut dyn FnMut(&dyn PriceLookup)) {
        let prices = self.current();
        visit(&*prices)
    }
}

impl CategoryLookup for SharedLookupTable<String> {
    fn category_of(&self, item_name: &str) -> Option<String> {
        self.get(item_name)
    }

    fn visit_categories(&self, visit: &mut dyn FnMut(&dyn CategoryLookup)) {
        let categories = self.current();
        visit(&*categories)
    }
}

pub type SharedPriceTable = SharedLookupTable<u64>;
pub type SharedCategoryTable = SharedLookupTable<String>;
