use serde::{Deserialize, Serialize};

use crate::core::config::ConfigError;
use crate::core::text::{clean, PositionTag};

/// 数值反推使用哪一张余额表
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSide {
    /// 界面显示的是兑换后的剩余碎片
    #[default]
    After,
    Before,
}

/// 配置文件中的一个阶段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: StageKindConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageKindConfig {
    AnchorGatedScan {
        anchor: String,
        positions: Vec<PositionTag>,
        #[serde(default)]
        level_unit: Option<String>,
    },
    PositionRestrictedScan {
        anchor: String,
        position: PositionTag,
    },
    NumericInferenceScan {
        #[serde(default)]
        anchor: Option<String>,
        #[serde(default)]
        balance: BalanceSide,
    },
    MultiBranchCategorizedScan {
        anchor: String,
        secondary_anchor: String,
        #[serde(default = "default_secondary_category")]
        secondary_category: String,
        #[serde(default = "default_category")]
        default_category: String,
        #[serde(default)]
        alternate_anchor: Option<String>,
        #[serde(default = "default_alternate_category")]
        alternate_category: String,
    },
}

fn default_secondary_category() -> String {
    "illustration".to_string()
}

fn default_category() -> String {
    "icon".to_string()
}

fn default_alternate_category() -> String {
    "share".to_string()
}

impl StageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("stage name must not be empty".to_string()));
        }

        let check_anchor = |field: &str, value: &str| {
            if clean(value).is_empty() {
                Err(ConfigError::Invalid(format!(
                    "stage {:?}: {} {:?} is empty after normalization",
                    self.name, field, value
                )))
            } else {
                Ok(())
            }
        };

        match &self.kind {
            StageKindConfig::AnchorGatedScan {
                anchor, positions, ..
            } => {
                check_anchor("anchor", anchor)?;
                if positions.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "stage {:?}: positions must not be empty",
                        self.name
                    )));
                }
            }
            StageKindConfig::PositionRestrictedScan { anchor, .. } => {
                check_anchor("anchor", anchor)?;
            }
            StageKindConfig::NumericInferenceScan { anchor, .. } => {
                if let Some(anchor) = anchor {
                    check_anchor("anchor", anchor)?;
                }
            }
            StageKindConfig::MultiBranchCategorizedScan {
                anchor,
                secondary_anchor,
                secondary_category,
                default_category,
                alternate_anchor,
                alternate_category,
            } => {
                check_anchor("anchor", anchor)?;
                check_anchor("secondary_anchor", secondary_anchor)?;
                if let Some(alternate) = alternate_anchor {
                    check_anchor("alternate_anchor", alternate)?;
                }
                for category in [secondary_category, default_category, alternate_category] {
                    if category.trim().is_empty() {
                        return Err(ConfigError::Invalid(format!(
                            "stage {:?}: category names must not be empty",
                            self.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
