//! Page-scoped filter state, owned by the render loop and passed by reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::predicate::{ColumnDomain, WidgetValue};

/// A dashboard section with its own filter scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Page {
    CustomerExplorer,
    FlightsExplorer,
    Insights,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::CustomerExplorer, Page::FlightsExplorer, Page::Insights];

    pub fn title(self) -> &'static str {
        match self {
            Self::CustomerExplorer => "Customer Explorer",
            Self::FlightsExplorer => "Flights Explorer",
            Self::Insights => "Insights & Graphs",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::CustomerExplorer => 0,
            Self::FlightsExplorer => 1,
            Self::Insights => 2,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl From<flightdeck_cli::StartPage> for Page {
    fn from(page: flightdeck_cli::StartPage) -> Self {
        match page {
            flightdeck_cli::StartPage::Customers => Self::CustomerExplorer,
            flightdeck_cli::StartPage::Flights => Self::FlightsExplorer,
            flightdeck_cli::StartPage::Insights => Self::Insights,
        }
    }
}

/// Stored state of one control. `Default` is resolved against the column's
/// current domain on every read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Default,
    Set(WidgetValue),
}

/// Current filter values keyed by (page, column), in registration order per page.
#[derive(Debug, Clone, Default)]
pub struct FilterStateStore {
    pages: BTreeMap<Page, Vec<(String, Slot)>>,
}

impl FilterStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_mut(&mut self, page: Page, column: &str) -> Option<&mut Slot> {
        self.pages
            .get_mut(&page)?
            .iter_mut()
            .find(|(name, _)| name == column)
            .map(|(_, slot)| slot)
    }

    pub fn slot(&self, page: Page, column: &str) -> Option<&Slot> {
        self.pages
            .get(&page)?
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, slot)| slot)
    }

    /// Insert a default slot the first time a control is rendered. Returns true if inserted.
    pub fn register(&mut self, page: Page, column: &str) -> bool {
        if self.slot(page, column).is_some() {
            return false;
        }
        self.pages
            .entry(page)
            .or_default()
            .push((column.to_string(), Slot::Default));
        true
    }

    /// The value a control shows: what the user set, or the no-constraint default
    /// computed from `domain` (empty selection or full observed range).
    pub fn get(&self, page: Page, column: &str, domain: &ColumnDomain) -> Option<WidgetValue> {
        match self.slot(page, column) {
            Some(Slot::Set(value)) => Some(value.clone()),
            Some(Slot::Default) | None => domain.default_value(),
        }
    }

    pub fn set(&mut self, page: Page, column: &str, value: WidgetValue) {
        match self.slot_mut(page, column) {
            Some(slot) => *slot = Slot::Set(value),
            None => self
                .pages
                .entry(page)
                .or_default()
                .push((column.to_string(), Slot::Set(value))),
        }
    }

    /// Restore every key under `page` to its default. Keys are kept.
    /// Returns how many slots held a value.
    pub fn reset_page(&mut self, page: Page) -> usize {
        let Some(slots) = self.pages.get_mut(&page) else {
            return 0;
        };
        let mut cleared = 0;
        for (_, slot) in slots.iter_mut() {
            if matches!(slot, Slot::Set(_)) {
                cleared += 1;
            }
            *slot = Slot::Default;
        }
        cleared
    }

    /// Restore a single key to its default. Returns true if it held a value.
    pub fn reset_column(&mut self, page: Page, column: &str) -> bool {
        match self.slot_mut(page, column) {
            Some(slot) => matches!(std::mem::replace(slot, Slot::Default), Slot::Set(_)),
            None => false,
        }
    }

    /// Registered columns of a page, in registration order.
    pub fn columns(&self, page: Page) -> Vec<&str> {
        self.pages
            .get(&page)
            .map(|slots| slots.iter().map(|(name, _)| name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Columns whose slot holds a user value.
    pub fn active_columns(&self, page: Page) -> Vec<&str> {
        self.pages
            .get(&page)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|(_, slot)| matches!(slot, Slot::Set(_)))
                    .map(|(name, _)| name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// JSON rendering of a page's state, for debug logging.
    pub fn snapshot(&self, page: Page) -> serde_json::Result<String> {
        let slots: BTreeMap<&str, &Slot> = self
            .pages
            .get(&page)
            .map(|slots| slots.iter().map(|(name, slot)| (name.as_str(), slot)).collect())
            .unwrap_or_default();
        serde_json::to_string(&slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn income_domain() -> ColumnDomain {
        ColumnDomain::Numeric {
            min: 10000.0,
            max: 90000.0,
        }
    }

    #[test]
    fn test_get_defaults_to_full_range() {
        let mut store = FilterStateStore::new();
        assert!(store.register(Page::CustomerExplorer, "Income"));
        assert!(!store.register(Page::CustomerExplorer, "Income"));
        assert_eq!(
            store.get(Page::CustomerExplorer, "Income", &income_domain()),
            Some(WidgetValue::NumberRange(Some(10000.0), Some(90000.0)))
        );
    }

    #[test]
    fn test_pages_do_not_collide() {
        let mut store = FilterStateStore::new();
        store.set(
            Page::CustomerExplorer,
            "Income",
            WidgetValue::NumberRange(Some(20000.0), Some(30000.0)),
        );
        assert_eq!(
            store.get(Page::Insights, "Income", &income_domain()),
            Some(WidgetValue::NumberRange(Some(10000.0), Some(90000.0)))
        );
        assert_eq!(store.active_columns(Page::CustomerExplorer), vec!["Income"]);
        assert!(store.active_columns(Page::Insights).is_empty());
    }

    #[test]
    fn test_reset_page_keeps_keys() {
        let mut store = FilterStateStore::new();
        let categories = ColumnDomain::Categories(vec!["F".to_string(), "M".to_string()]);
        for column in ["Gender", "Education", "Income"] {
            store.register(Page::CustomerExplorer, column);
        }
        store.set(
            Page::CustomerExplorer,
            "Gender",
            WidgetValue::Selection(vec!["F".to_string()]),
        );
        store.set(
            Page::CustomerExplorer,
            "Income",
            WidgetValue::NumberRange(Some(20000.0), Some(30000.0)),
        );
        store.set(
            Page::FlightsExplorer,
            "DistanceKM",
            WidgetValue::NumberRange(Some(1.0), Some(2.0)),
        );

        assert_eq!(store.reset_page(Page::CustomerExplorer), 2);
        assert_eq!(
            store.columns(Page::CustomerExplorer),
            vec!["Gender", "Education", "Income"]
        );
        assert!(store.active_columns(Page::CustomerExplorer).is_empty());
        assert_eq!(
            store.get(Page::CustomerExplorer, "Gender", &categories),
            Some(WidgetValue::Selection(Vec::new()))
        );
        assert_eq!(store.active_columns(Page::FlightsExplorer), vec!["DistanceKM"]);
    }

    #[test]
    fn test_reset_column() {
        let mut store = FilterStateStore::new();
        store.set(
            Page::FlightsExplorer,
            "Year",
            WidgetValue::NumberRange(Some(2021.0), Some(2021.0)),
        );
        assert!(store.reset_column(Page::FlightsExplorer, "Year"));
        assert!(!store.reset_column(Page::FlightsExplorer, "Year"));
        assert_eq!(store.slot(Page::FlightsExplorer, "Year"), Some(&Slot::Default));
    }

    #[test]
    fn test_degenerate_domain_has_no_default() {
        let store = FilterStateStore::new();
        assert_eq!(
            store.get(Page::Insights, "Salary", &ColumnDomain::Degenerate),
            None
        );
    }

    #[test]
    fn test_snapshot_is_json() {
        let mut store = FilterStateStore::new();
        store.register(Page::Insights, "Education");
        store.set(
            Page::Insights,
            "Gender",
            WidgetValue::Selection(vec!["female".to_string()]),
        );
        let json = store.snapshot(Page::Insights).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["Education"], "default");
        assert_eq!(parsed["Gender"]["set"]["Selection"][0], "female");
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Insights.next(), Page::CustomerExplorer);
        assert_eq!(Page::CustomerExplorer.prev(), Page::Insights);
    }
}
