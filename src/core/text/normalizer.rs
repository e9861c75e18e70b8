//! 文本清洗：只保留中文、英文字母、数字

use once_cell::sync::Lazy;
use regex::Regex;

static NON_CANONICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-Z0-9\x{4e00}-\x{9fff}]").expect("static regex")
});

/// 删除所有不在白名单内的字符。不做大小写折叠，幂等。
pub fn clean(raw: &str) -> String {
    NON_CANONICAL.replace_all(raw, "").into_owned()
}

/// 可升级道具去掉末尾的「数字+等级单位」，如 `剑10级` → `剑`
pub fn strip_level_suffix(text: &str, level_unit: &str) -> String {
    LevelSuffix::new(level_unit)
        .map(|suffix| suffix.strip(text))
        .unwrap_or_else(|_| text.to_string())
}

/// 预编译的等级后缀匹配器，阶段配置加载时构建一次
#[derive(Debug, Clone)]
pub struct LevelSuffix {
    unit: String,
    re: Regex,
}

impl LevelSuffix {
    pub fn new(unit: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!(r"\d+(?:{})?$", regex::escape(unit)))?;
        Ok(Self {
            unit: unit.to_string(),
            re,
        })
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn strip(&self, text: &str) -> String {
        self.re.replace(text, "").trim_end().to_string()
    }
}
