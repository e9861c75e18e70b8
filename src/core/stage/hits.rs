use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// 阶段已命中的物品。只增不减，同一标识在同一集合里最多命中一次。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HitSet {
    Flat(BTreeSet<String>),
    /// 按子类别分开计数，如 立绘 / 图标 / 分享
    Categorized(BTreeMap<String, BTreeSet<String>>),
}

impl HitSet {
    pub fn flat() -> Self {
        HitSet::Flat(BTreeSet::new())
    }

    /// 预先登记所有类别，报告里没有命中的类别也会出现
    pub fn categorized<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HitSet::Categorized(
            categories
                .into_iter()
                .map(|c| (c.into(), BTreeSet::new()))
                .collect(),
        )
    }

    pub fn contains(&self, category: Option<&str>, item: &str) -> bool {
        match (self, category) {
            (HitSet::Flat(set), _) => set.contains(item),
            (HitSet::Categorized(map), Some(category)) => {
                map.get(category).is_some_and(|set| set.contains(item))
            }
            (HitSet::Categorized(_), None) => false,
        }
    }

    /// 返回是否为新命中
    pub fn insert(&mut self, category: Option<&str>, item: &str) -> bool {
        match (self, category) {
            (HitSet::Flat(set), _) => set.insert(item.to_string()),
            (HitSet::Categorized(map), Some(category)) => map
                .entry(category.to_string())
                .or_default()
                .insert(item.to_string()),
            (HitSet::Categorized(_), None) => false,
        }
    }

    /// (类别, 命中集合)；平铺集合的类别为 None
    pub fn groups(&self) -> Vec<(Option<&str>, &BTreeSet<String>)> {
        match self {
            HitSet::Flat(set) => vec![(None, set)],
            HitSet::Categorized(map) => map
                .iter()
                .map(|(category, set)| (Some(category.as_str()), set))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HitSet::Flat(set) => set.len(),
            HitSet::Categorized(map) => map.values().map(BTreeSet::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_insert_once() {
        let mut hits = HitSet::flat();
        assert!(hits.insert(None, "Sword"));
        assert!(!hits.insert(None, "Sword"));
        assert!(hits.contains(None, "Sword"));
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_categories_are_independent() {
        let mut hits = HitSet::categorized(["illustration", "icon"]);
        assert!(hits.is_empty());
        assert!(hits.insert(Some("icon"), "Sword"));
        assert!(hits.insert(Some("illustration"), "Sword"));
        assert!(!hits.insert(Some("icon"), "Sword"));
        assert!(!hits.contains(Some("share"), "Sword"));
        assert_eq!(hits.len(), 2);

        let groups = hits.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, Some("icon"));
    }

    #[test]
    fn test_categorized_without_category_is_noop() {
        let mut hits = HitSet::categorized(["icon"]);
        assert!(!hits.insert(None, "Sword"));
        assert!(hits.is_empty());
    }

    #[test]
    fn test_monotonic_under_repeated_inserts() {
        let mut hits = HitSet::flat();
        let mut previous = 0;
        for name in ["A", "B", "A", "C", "B", "A"] {
            hits.insert(None, name);
            assert!(hits.len() >= previous);
            previous = hits.len();
        }
        assert_eq!(previous, 3);
    }
}
