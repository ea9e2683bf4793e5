//! 严重度分级
//!
//! 纯函数，根据置信度与相对面积给出固定阈值的严重度，按优先级顺序判定。

use serde::Serialize;

/// 严重度等级，有序：low < medium < high < critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// 风险评分权重
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 3,
            Severity::High => 7,
            Severity::Critical => 15,
        }
    }
}

/// 根据置信度和相对面积（检测框面积 / 整帧面积）判定严重度
///
/// 阈值为严格大于，边界值 (0.80, 0.10) 不会判为 critical。
pub fn severity(confidence: f32, relative_area: f32) -> Severity {
    if confidence > 0.8 && relative_area > 0.1 {
        Severity::Critical
    } else if confidence > 0.7 || relative_area > 0.05 {
        Severity::High
    } else if confidence > 0.6 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_requires_both() {
        assert_eq!(severity(0.85, 0.12), Severity::Critical);
        // 只满足其中一个条件时是 high
        assert_eq!(severity(0.85, 0.01), Severity::High);
        assert_eq!(severity(0.3, 0.12), Severity::High);
    }

    #[test]
    fn test_boundary_values_are_exclusive() {
        // 边界值不取等号
        assert_eq!(severity(0.80, 0.10), Severity::High);
        assert_eq!(severity(0.801, 0.101), Severity::Critical);
        assert_eq!(severity(0.70, 0.05), Severity::Medium);
        assert_eq!(severity(0.60, 0.0), Severity::Low);
    }

    #[test]
    fn test_high_is_or_condition() {
        assert_eq!(severity(0.71, 0.0), Severity::High);
        assert_eq!(severity(0.0, 0.051), Severity::High);
    }

    #[test]
    fn test_medium_and_low() {
        assert_eq!(severity(0.61, 0.0), Severity::Medium);
        assert_eq!(severity(0.5, 0.01), Severity::Low);
        assert_eq!(severity(0.0, 0.0), Severity::Low);
    }

    #[test]
    fn test_monotone_in_both_arguments() {
        let confs = [0.0, 0.3, 0.6, 0.61, 0.7, 0.71, 0.8, 0.81, 0.95];
        let areas = [0.0, 0.01, 0.05, 0.051, 0.1, 0.101, 0.3];

        for (i, &c) in confs.iter().enumerate() {
            for (j, &a) in areas.iter().enumerate() {
                let base = severity(c, a);
                for &c2 in &confs[i..] {
                    assert!(severity(c2, a) >= base);
                }
                for &a2 in &areas[j..] {
                    assert!(severity(c, a2) >= base);
                }
            }
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_weights() {
        assert_eq!(Severity::Low.weight(), 1);
        assert_eq!(Severity::Medium.weight(), 3);
        assert_eq!(Severity::High.weight(), 7);
        assert_eq!(Severity::Critical.weight(), 15);
    }
}
