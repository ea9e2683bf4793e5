//! 描述与建议模板
//!
//! 按缺陷族和严重度确定性查表，给用户看的文案固定不变，
//! 未知的服务端类别标签退回通用描述。

use crate::core::detect::DefectKind;
use crate::core::severity::Severity;

/// 人类可读的检测描述
pub fn description(kind: DefectKind, label: Option<&str>, confidence: f32) -> String {
    let pct = (confidence * 100.0) as u32;
    match kind {
        DefectKind::Mold => mold_description(label, pct),
        DefectKind::Crack => format!("Potential structural crack detected (confidence: {}%)", pct),
        DefectKind::WaterDamage => format!(
            "Potential water damage or staining detected (confidence: {}%)",
            pct
        ),
        DefectKind::PaintIssue => format!(
            "Deteriorated paint surface detected (confidence: {}%)",
            pct
        ),
    }
}

fn mold_description(label: Option<&str>, pct: u32) -> String {
    match label.map(|l| l.to_ascii_lowercase()).as_deref() {
        Some("mold") => format!("Mold growth detected with {}% confidence", pct),
        Some("mouldy") => format!("Moldy surface identified with {}% confidence", pct),
        Some("fungal") => format!("Fungal growth observed with {}% confidence", pct),
        // 未知类别走通用模板
        _ => format!("Mold-like substance detected with {}% confidence", pct),
    }
}

const MOLD_BASE: &[&str] = &[
    "Identify and eliminate moisture source",
    "Improve ventilation in affected area",
    "Monitor for spread to adjacent areas",
];

const MOLD_CRITICAL: &[&str] = &[
    "IMMEDIATE professional mold remediation required",
    "Evacuate area until professional assessment",
    "Contact certified mold remediation specialist",
    "Consider temporary relocation if extensive",
];

const MOLD_HIGH: &[&str] = &[
    "Professional mold remediation recommended",
    "Wear protective equipment when in area",
    "Schedule professional air quality testing",
    "Document extent for insurance purposes",
];

const MOLD_MEDIUM: &[&str] = &[
    "Professional assessment recommended",
    "Clean with appropriate mold removal products",
    "Increase air circulation and dehumidification",
    "Monitor closely for expansion",
];

const MOLD_LOW: &[&str] = &[
    "Clean affected area with mold removal solution",
    "Ensure proper ventilation",
    "Regular monitoring recommended",
    "Address any moisture issues promptly",
];

const CRACK: &[&str] = &[
    "Monitor crack for expansion over time",
    "Consider professional structural assessment",
    "Seal crack to prevent water intrusion",
];

const WATER_DAMAGE: &[&str] = &[
    "Investigate source of moisture",
    "Check for active leaks in area",
    "Consider professional water damage assessment",
    "Monitor for mold development",
];

const PAINT_ISSUE: &[&str] = &[
    "Scrape and repaint affected surface",
    "Check for underlying moisture before repainting",
    "Monitor for continued peeling or flaking",
];

/// 高严重度的非霉斑缺陷统一追加的紧急建议
const URGENT: &str = "Arrange professional inspection as soon as possible";

/// 处理建议，按缺陷族和严重度查表
pub fn recommendations(kind: DefectKind, severity: Severity) -> Vec<String> {
    let mut items: Vec<String> = match kind {
        DefectKind::Mold => {
            let specific = match severity {
                Severity::Critical => MOLD_CRITICAL,
                Severity::High => MOLD_HIGH,
                Severity::Medium => MOLD_MEDIUM,
                Severity::Low => MOLD_LOW,
            };
            MOLD_BASE.iter().chain(specific.iter()).map(|s| s.to_string()).collect()
        }
        DefectKind::Crack => CRACK.iter().map(|s| s.to_string()).collect(),
        DefectKind::WaterDamage => WATER_DAMAGE.iter().map(|s| s.to_string()).collect(),
        DefectKind::PaintIssue => PAINT_ISSUE.iter().map(|s| s.to_string()).collect(),
    };

    if kind != DefectKind::Mold && severity >= Severity::Critical {
        items.insert(0, URGENT.to_string());
    }

    items
}
