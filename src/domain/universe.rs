//! The fixed set of tradable products for one evaluation run.

use std::collections::BTreeSet;

/// Ordered, deduplicated product identifiers. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Universe {
    products: Vec<String>,
}

impl Universe {
    pub fn new<I, S>(products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = products.into_iter().map(Into::into).collect();
        Universe {
            products: set.into_iter().collect(),
        }
    }

    pub fn products(&self) -> &[String] {
        &self.products
    }

    pub fn contains(&self, product: &str) -> bool {
        self.products
            .binary_search_by(|p| p.as_str().cmp(product))
            .is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.products.iter().map(String::as_str)
    }

    pub fn count(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sorts_and_dedups() {
        let universe = Universe::new(["ZED", "ABC", "ZED", "MID"]);
        assert_eq!(universe.products(), ["ABC", "MID", "ZED"]);
        assert_eq!(universe.count(), 3);
    }

    #[test]
    fn contains_uses_exact_match() {
        let universe = Universe::new(["James_Fund_007", "INTERESTingProduct"]);
        assert!(universe.contains("James_Fund_007"));
        assert!(!universe.contains("james_fund_007"));
        assert!(!universe.contains("Clock"));
    }

    #[test]
    fn empty_universe() {
        let universe = Universe::default();
        assert!(universe.is_empty());
        assert_eq!(universe.iter().count(), 0);
    }
}
