//! Keyword tables for the content policy.

use crate::model::Severity;

use super::ViolationCategory;

pub(super) struct CategoryRule {
    pub category: ViolationCategory,
    pub severity: Severity,
    pub keywords: &'static [&'static str],
    pub reason: &'static str,
    pub suggestion: &'static str,
}

pub(super) const RULES: &[CategoryRule] = &[
    CategoryRule {
        category: ViolationCategory::Violence,
        severity: Severity::High,
        keywords: &[
            "kill", "murder", "blood", "gore", "weapon", "gun", "knife", "knives", "bomb",
            "attack", "war", "destroy", "massacre", "torture", "shoot", "stab", "杀", "暴力",
            "武器", "殺", "血",
        ],
        reason: "Prompt contains violent content",
        suggestion: "Focus on peaceful or constructive scenarios instead of violence.",
    },
    CategoryRule {
        category: ViolationCategory::Adult,
        severity: Severity::High,
        keywords: &[
            "nude", "naked", "porn", "sexual", "sexually", "explicit", "nsfw", "erotic", "色情",
            "裸", "ヌード",
        ],
        reason: "Prompt contains adult content",
        suggestion: "Keep the scene family friendly and remove explicit content.",
    },
    CategoryRule {
        category: ViolationCategory::Harassment,
        severity: Severity::Medium,
        keywords: &[
            "idiot", "stupid", "loser", "worthless", "hate you", "kill yourself", "白痴", "傻瓜",
            "バカ",
        ],
        reason: "Prompt contains harassing or insulting language",
        suggestion: "Describe your idea without insulting or targeting anyone.",
    },
    CategoryRule {
        category: ViolationCategory::Misinformation,
        severity: Severity::Medium,
        keywords: &[
            "fake news", "hoax", "flat earth", "vaccines cause", "election was stolen",
            "miracle cure", "假新闻", "谣言", "デマ",
        ],
        reason: "Prompt may spread misinformation",
        suggestion: "Frame speculative ideas as clearly fictional \"what if\" scenarios.",
    },
];

/// Phrases that make a violence keyword harmless ("water gun", "pillow fight").
pub(super) const INNOCENT_CONTEXT: &[&str] = &[
    "robot vacuum", "vacuum", "floating", "float", "floats", "living room", "toy", "toys",
    "cartoon", "pillow fight", "video game", "water gun", "nerf", "snowball", "lego",
    "board game", "chess",
];

/// Words that mark violence as intended even in an innocent context.
pub(super) const EXPLICIT_INTENT: &[&str] = &[
    "violently", "violent", "brutally", "brutal", "bloody", "murder", "kill", "massacre",
    "torture", "gore", "slaughter",
];

pub(super) const SPAM_REASON: &str = "Prompt looks like spam or repeated filler";
pub(super) const SPAM_SUGGESTION: &str = "Write a clear, specific idea instead of repeated words.";

/// Appended to the recommendations whenever anything was flagged.
pub(super) const GENERIC_TIPS: &[&str] = &[
    "Try rephrasing your idea with a positive, creative focus.",
    "Review the community guidelines for acceptable content.",
];
