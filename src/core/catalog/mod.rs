//! 物品数值表
//!
//! 按声明顺序从初始余额依次扣除兑换数量，得到两张映射：
//! 兑换前余额 → 物品、兑换后余额 → 物品。界面只显示剩余碎片数时，
//! 阶段可以直接用读到的数字反推刚兑换的物品。

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::text::clean;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read catalog {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Catalog JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Catalog is empty")]
    Empty,
    #[error("Item name {0:?} is empty after normalization")]
    BlankName(String),
    #[error("Balance {balance} maps to both {first:?} and {second:?} in the {side} map")]
    BalanceCollision {
        side: &'static str,
        balance: i64,
        first: String,
        second: String,
    },
    #[error("Balance overflows i64 at item {item:?}")]
    BalanceOverflow { item: String },
}

/// 数值表中的一行。兼容原表格导出的中文字段名。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(rename = "物品名称", alias = "itemName", alias = "name")]
    pub name: String,
    #[serde(rename = "兑换数量", alias = "exchangeCost", alias = "cost")]
    pub exchange_cost: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BalanceMaps {
    pub before: BTreeMap<i64, String>,
    pub after: BTreeMap<i64, String>,
}

impl BalanceMaps {
    /// before[b] = name; b -= cost; after[b] = name
    pub fn build(items: &[CatalogItem], initial_balance: i64) -> Result<Self, CatalogError> {
        let mut maps = BalanceMaps::default();
        let mut balance = initial_balance;

        for item in items {
            insert_unique(&mut maps.before, "before", balance, &item.name)?;
            balance = balance.checked_sub(item.exchange_cost).ok_or_else(|| {
                CatalogError::BalanceOverflow {
                    item: item.name.clone(),
                }
            })?;
            insert_unique(&mut maps.after, "after", balance, &item.name)?;
        }
        Ok(maps)
    }
}

fn insert_unique(
    map: &mut BTreeMap<i64, String>,
    side: &'static str,
    balance: i64,
    name: &str,
) -> Result<(), CatalogError> {
    if let Some(existing) = map.get(&balance) {
        return Err(CatalogError::BalanceCollision {
            side,
            balance,
            first: existing.clone(),
            second: name.to_string(),
        });
    }
    map.insert(balance, name.to_string());
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    names: BTreeSet<String>,
    balances: BalanceMaps,
    initial_balance: i64,
}

impl Catalog {
    pub fn load(path: &Path, initial_balance: i64) -> Result<Self, CatalogError> {
        info!("📋 Loading catalog: {:?}", path);
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, initial_balance)
    }

    pub fn from_json(raw: &str, initial_balance: i64) -> Result<Self, CatalogError> {
        let items: Vec<CatalogItem> = serde_json::from_str(raw)?;
        Self::from_items(items, initial_balance)
    }

    /// 名称按 OCR 文本同样的规则清洗，保证匹配口径一致
    pub fn from_items(items: Vec<CatalogItem>, initial_balance: i64) -> Result<Self, CatalogError> {
        if items.is_empty() {
            return Err(CatalogError::Empty);
        }

        let items: Vec<CatalogItem> = items
            .into_iter()
            .map(|item| {
                let cleaned = clean(&item.name);
                if cleaned.is_empty() {
                    Err(CatalogError::BlankName(item.name))
                } else {
                    Ok(CatalogItem {
                        name: cleaned,
                        exchange_cost: item.exchange_cost,
                    })
                }
            })
            .collect::<Result<_, _>>()?;

        let mut names = BTreeSet::new();
        for item in &items {
            if !names.insert(item.name.clone()) {
                warn!("⚠️ Duplicate catalog item: {}", item.name);
            }
        }

        let balances = BalanceMaps::build(&items, initial_balance)?;
        info!(
            "📋 Catalog ready: {} items, initial balance {}",
            items.len(),
            initial_balance
        );

        Ok(Self {
            items,
            names,
            balances,
            initial_balance,
        })
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// 不同物品名的数量
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn balances(&self) -> &BalanceMaps {
        &self.balances
    }

    pub fn initial_balance(&self) -> i64 {
        self.initial_balance
    }

    pub fn item_for_after_balance(&self, balance: i64) -> Option<&str> {
        self.balances.after.get(&balance).map(String::as_str)
    }

    pub fn item_for_before_balance(&self, balance: i64) -> Option<&str> {
        self.balances.before.get(&balance).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, cost: i64) -> CatalogItem {
        CatalogItem {
            name: name.to_string(),
            exchange_cost: cost,
        }
    }

    #[test]
    fn test_balance_walk() {
        let catalog = Catalog::from_items(vec![item("A", 400), item("B", 600)], 10000).unwrap();
        let maps = catalog.balances();

        let before: Vec<(i64, &str)> = maps.before.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let after: Vec<(i64, &str)> = maps.after.iter().map(|(k, v)| (*k, v.as_str())).collect();
        assert_eq!(before, vec![(9600, "B"), (10000, "A")]);
        assert_eq!(after, vec![(9000, "B"), (9600, "A")]);

        assert_eq!(catalog.item_for_after_balance(9600), Some("A"));
        assert_eq!(catalog.item_for_before_balance(9600), Some("B"));
        assert_eq!(catalog.item_for_after_balance(1234), None);
    }

    #[test]
    fn test_balance_overflow_is_an_error() {
        let err = Catalog::from_items(vec![item("A", i64::MAX), item("B", i64::MAX)], -10)
            .unwrap_err();
        assert!(matches!(err, CatalogError::BalanceOverflow { ref item } if item == "A"));
    }

    #[test]
    fn test_maps_reconstruct_catalog_order() {
        let items: Vec<CatalogItem> = (0..20)
            .map(|i| item(&format!("物品{}", i), 50 + i * 7))
            .collect();
        let expected: Vec<String> = items.iter().map(|i| i.name.clone()).collect();
        let catalog = Catalog::from_items(items, 100_000).unwrap();

        let maps = catalog.balances();
        assert_eq!(maps.before.len(), 20);
        assert_eq!(maps.after.len(), 20);

        let from_before: Vec<String> = maps.before.values().rev().cloned().collect();
        let from_after: Vec<String> = maps.after.values().rev().cloned().collect();
        assert_eq!(from_before, expected);
        assert_eq!(from_after, expected);
    }

    #[test]
    fn test_collision_rejected() {
        let err = Catalog::from_items(vec![item("A", 100), item("B", 0)], 1000).unwrap_err();
        match err {
            CatalogError::BalanceCollision {
                side,
                balance,
                first,
                second,
            } => {
                assert_eq!(side, "after");
                assert_eq!(balance, 900);
                assert_eq!(first, "A");
                assert_eq!(second, "B");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_localized_json_fields_and_normalization() {
        let raw = r#"[
            {"物品名称": "龙之剑 (限定)", "兑换数量": 400, "备注": "ignored"},
            {"itemName": "Shield", "exchangeCost": 600}
        ]"#;
        let catalog = Catalog::from_json(raw, 10000).unwrap();

        assert!(catalog.contains("龙之剑限定"));
        assert!(catalog.contains("Shield"));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.items()[0].exchange_cost, 400);
    }

    #[test]
    fn test_empty_and_unparsable() {
        assert!(matches!(Catalog::from_json("[]", 0), Err(CatalogError::Empty)));
        assert!(matches!(Catalog::from_json("{oops", 0), Err(CatalogError::Json(_))));
        assert!(matches!(
            Catalog::from_items(vec![item("()", 1)], 0),
            Err(CatalogError::BlankName(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Catalog::load(Path::new("/no/such/catalog.json"), 0).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
