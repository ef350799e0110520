//! Routing model: タイトルのプレフィックスから capability を決める。
//!
//! ルールは上から順に評価され、最初にマッチしたものが勝ちます。
//! マッチは ASCII の大文字小文字を区別しない部分文字列一致です。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Executor category a task is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Research,
    SiteBuild,
    FeatureBuild,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Research,
        Capability::SiteBuild,
        Capability::FeatureBuild,
    ];

    /// 成功後に publish（commit + push）するか
    pub fn publishes(self) -> bool {
        matches!(self, Capability::SiteBuild | Capability::FeatureBuild)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Research => "research",
            Capability::SiteBuild => "site-build",
            Capability::FeatureBuild => "feature-build",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One routing rule: any of `markers` → `capability`.
#[derive(Debug, Clone, Copy)]
pub struct RouteRule {
    pub markers: &'static [&'static str],
    pub capability: Capability,
}

/// 評価順がそのまま優先順位
pub const ROUTE_RULES: [RouteRule; 3] = [
    RouteRule {
        markers: &["RESEARCH:"],
        capability: Capability::Research,
    },
    RouteRule {
        markers: &["WEB:", "SITE:"],
        capability: Capability::SiteBuild,
    },
    RouteRule {
        markers: &["SYSTEM:", "BUILD:", "CODE:"],
        capability: Capability::FeatureBuild,
    },
];

/// Classify a title. `None` means unroutable.
pub fn classify(title: &str) -> Option<Capability> {
    ROUTE_RULES
        .iter()
        .find(|rule| rule.markers.iter().any(|m| find_marker(title, m).is_some()))
        .map(|rule| rule.capability)
}

/// Title without its routing marker, for prompts and file names.
pub fn strip_marker(title: &str) -> &str {
    for marker in ROUTE_RULES.iter().flat_map(|rule| rule.markers.iter()) {
        if let Some(pos) = find_marker(title, marker) {
            return title[pos + marker.len()..].trim();
        }
    }
    title.trim()
}

/// ASCII のみ大文字小文字を無視して探す。返す位置は `title` の char 境界。
fn find_marker(title: &str, marker: &str) -> Option<usize> {
    title.char_indices().map(|(i, _)| i).find(|&i| {
        title
            .get(i..i + marker.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(marker))
    })
}
