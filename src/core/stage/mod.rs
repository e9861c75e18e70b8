//! 阶段检测
//!
//! 每个阶段对应游戏里的一个界面：先用锚点文字判断界面是否在显示，
//! 再从本帧文本记录中找出新出现的目录物品。

pub mod config;
pub mod evidence;
pub mod hits;
pub mod pipeline;

pub use config::{BalanceSide, StageConfig, StageKindConfig};
pub use evidence::{EvidenceError, EvidenceKey, EvidenceStore, FsEvidenceStore, MemoryEvidenceStore};
pub use hits::HitSet;
pub use pipeline::{FrameReport, PipelineState, StagePipeline};

use serde::Serialize;

use crate::core::catalog::Catalog;
use crate::core::config::ConfigError;
use crate::core::ocr::TextRecord;
use crate::core::text::{clean, LevelSuffix, PositionTag};

#[derive(Debug, Clone)]
pub enum StageKind {
    /// 锚点出现后，在若干方位里找物品名
    AnchorGatedScan {
        anchor: String,
        positions: Vec<PositionTag>,
        level_suffix: Option<LevelSuffix>,
    },
    /// 锚点出现后，只看一个方位
    PositionRestrictedScan {
        anchor: String,
        position: PositionTag,
    },
    /// 界面只显示剩余数量，用余额表反推物品
    NumericInferenceScan {
        anchor: Option<String>,
        balance: BalanceSide,
    },
    /// 按附加锚点把命中分到不同类别
    MultiBranchCategorizedScan {
        anchor: String,
        secondary_anchor: String,
        secondary_category: String,
        default_category: String,
        alternate: Option<(String, String)>,
    },
}

#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    kind: StageKind,
}

/// 一次新命中
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageHit {
    pub item: String,
    pub category: Option<String>,
    /// 数值反推命中时读到的余额
    pub balance: Option<i64>,
    /// 触发命中的 OCR 文本（清洗后）
    pub source_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// 锚点不在画面上
    Inactive,
    Active { hits: Vec<StageHit> },
}

impl StageOutcome {
    pub fn hits(&self) -> &[StageHit] {
        match self {
            StageOutcome::Inactive => &[],
            StageOutcome::Active { hits } => hits,
        }
    }
}

fn has_text(records: &[TextRecord], text: &str) -> bool {
    records.iter().any(|r| r.cleaned_text == text)
}

impl Stage {
    /// 锚点按 OCR 文本同样的规则清洗后再比较
    pub fn compile(config: &StageConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let kind = match &config.kind {
            StageKindConfig::AnchorGatedScan {
                anchor,
                positions,
                level_unit,
            } => {
                let level_suffix = match level_unit {
                    Some(unit) => Some(LevelSuffix::new(unit).map_err(|e| {
                        ConfigError::Invalid(format!(
                            "stage {:?}: bad level_unit {:?}: {}",
                            config.name, unit, e
                        ))
                    })?),
                    None => None,
                };
                StageKind::AnchorGatedScan {
                    anchor: clean(anchor),
                    positions: positions.clone(),
                    level_suffix,
                }
            }
            StageKindConfig::PositionRestrictedScan { anchor, position } => {
                StageKind::PositionRestrictedScan {
                    anchor: clean(anchor),
                    position: *position,
                }
            }
            StageKindConfig::NumericInferenceScan { anchor, balance } => {
                StageKind::NumericInferenceScan {
                    anchor: anchor.as_deref().map(clean),
                    balance: *balance,
                }
            }
            StageKindConfig::MultiBranchCategorizedScan {
                anchor,
                secondary_anchor,
                secondary_category,
                default_category,
                alternate_anchor,
                alternate_category,
            } => StageKind::MultiBranchCategorizedScan {
                anchor: clean(anchor),
                secondary_anchor: clean(secondary_anchor),
                secondary_category: secondary_category.clone(),
                default_category: default_category.clone(),
                alternate: alternate_anchor
                    .as_deref()
                    .map(|a| (clean(a), alternate_category.clone())),
            },
        };

        Ok(Self {
            name: config.name.clone(),
            kind,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    /// 空的命中集合，分类阶段预先登记全部类别
    pub fn empty_hits(&self) -> HitSet {
        match &self.kind {
            StageKind::MultiBranchCategorizedScan {
                secondary_category,
                default_category,
                alternate,
                ..
            } => {
                let mut categories = vec![secondary_category.clone(), default_category.clone()];
                if let Some((_, category)) = alternate {
                    categories.push(category.clone());
                }
                HitSet::categorized(categories)
            }
            _ => HitSet::flat(),
        }
    }

    /// 评估一帧。除了往 `hits` 里追加新命中外没有副作用。
    pub fn evaluate(
        &self,
        records: &[TextRecord],
        catalog: &Catalog,
        hits: &mut HitSet,
    ) -> StageOutcome {
        match &self.kind {
            StageKind::AnchorGatedScan {
                anchor,
                positions,
                level_suffix,
            } => {
                if !has_text(records, anchor) {
                    return StageOutcome::Inactive;
                }
                let mut found = Vec::new();
                for record in records.iter().filter(|r| positions.contains(&r.position)) {
                    let candidate = if catalog.contains(&record.cleaned_text) {
                        Some(record.cleaned_text.clone())
                    } else {
                        level_suffix
                            .as_ref()
                            .map(|suffix| suffix.strip(&record.cleaned_text))
                            .filter(|stripped| catalog.contains(stripped))
                    };
                    if let Some(item) = candidate {
                        if hits.insert(None, &item) {
                            found.push(StageHit {
                                item,
                                category: None,
                                balance: None,
                                source_text: record.cleaned_text.clone(),
                            });
                        }
                    }
                }
                StageOutcome::Active { hits: found }
            }

            StageKind::PositionRestrictedScan { anchor, position } => {
                if !has_text(records, anchor) {
                    return StageOutcome::Inactive;
                }
                let mut found = Vec::new();
                for record in records.iter().filter(|r| r.position == *position) {
                    if catalog.contains(&record.cleaned_text)
                        && hits.insert(None, &record.cleaned_text)
                    {
                        found.push(StageHit {
                            item: record.cleaned_text.clone(),
                            category: None,
                            balance: None,
                            source_text: record.cleaned_text.clone(),
                        });
                    }
                }
                StageOutcome::Active { hits: found }
            }

            StageKind::NumericInferenceScan { anchor, balance } => {
                if let Some(anchor) = anchor {
                    if !has_text(records, anchor) {
                        return StageOutcome::Inactive;
                    }
                }
                let mut found = Vec::new();
                for record in records {
                    let Ok(value) = record.cleaned_text.parse::<i64>() else {
                        continue;
                    };
                    let item = match balance {
                        BalanceSide::After => catalog.item_for_after_balance(value),
                        BalanceSide::Before => catalog.item_for_before_balance(value),
                    };
                    if let Some(item) = item {
                        if hits.insert(None, item) {
                            found.push(StageHit {
                                item: item.to_string(),
                                category: None,
                                balance: Some(value),
                                source_text: record.cleaned_text.clone(),
                            });
                        }
                    }
                }
                StageOutcome::Active { hits: found }
            }

            StageKind::MultiBranchCategorizedScan {
                anchor,
                secondary_anchor,
                secondary_category,
                default_category,
                alternate,
            } => {
                let category = if has_text(records, anchor) {
                    if has_text(records, secondary_anchor) {
                        secondary_category
                    } else {
                        default_category
                    }
                } else {
                    match alternate {
                        Some((alt_anchor, alt_category)) if has_text(records, alt_anchor) => {
                            alt_category
                        }
                        _ => return StageOutcome::Inactive,
                    }
                };

                let mut found = Vec::new();
                for record in records {
                    if catalog.contains(&record.cleaned_text)
                        && hits.insert(Some(category.as_str()), &record.cleaned_text)
                    {
                        found.push(StageHit {
                            item: record.cleaned_text.clone(),
                            category: Some(category.clone()),
                            balance: None,
                            source_text: record.cleaned_text.clone(),
                        });
                    }
                }
                StageOutcome::Active { hits: found }
            }
        }
    }
}
