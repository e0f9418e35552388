//! Behavioral properties of validation, language detection, policy and
//! summaries, exercised through the public API.

use std::sync::Arc;

use whatif::config::{PlannerConfig, PolicyConfig};
use whatif::policy::ViolationCategory;
use whatif::provider::StubTextModel;
use whatif::{
    detect_language, generate_prompt_summary, GenerationType, Language, PolicyEnforcer,
    PromptPlanner, Resolution, Severity,
};

fn planner() -> PromptPlanner {
    PromptPlanner::new(Arc::new(StubTextModel::new()), PlannerConfig::default())
}

fn policy() -> PolicyEnforcer {
    PolicyEnforcer::new(PolicyConfig::default())
}

const MEDIA_TYPES: [GenerationType; 2] = [GenerationType::Image, GenerationType::Video];

#[tokio::test]
async fn test_short_prompts_fail_for_every_media_type() {
    let planner = planner();
    for media_type in MEDIA_TYPES {
        for prompt in ["", "  ", "ab", " a  "] {
            let err = planner.plan_generation(prompt, media_type).await.unwrap_err();
            assert!(
                err.errors.iter().any(|e| e.contains("too short")),
                "{:?} / {:?}: {:?}",
                prompt,
                media_type,
                err.errors
            );
        }
    }
}

#[tokio::test]
async fn test_overlong_prompts_fail() {
    let planner = planner();
    let prompt = "what if ".repeat(300);
    assert!(prompt.chars().count() > 2000);
    for media_type in MEDIA_TYPES {
        let err = planner.plan_generation(&prompt, media_type).await.unwrap_err();
        assert!(err
            .errors
            .iter()
            .any(|e| e.contains("cannot exceed 2000 characters")));
    }
}

#[tokio::test]
async fn test_ambiguous_prompts_fail() {
    let planner = planner();
    for prompt in ["something", "make it", "maybe a cat", "THIS one"] {
        let err = planner
            .plan_generation(prompt, GenerationType::Image)
            .await
            .unwrap_err();
        assert!(
            err.errors.iter().any(|e| e.contains("ambiguous")),
            "{:?}: {:?}",
            prompt,
            err.errors
        );
    }

    // Four tokens is enough context even with a vague word.
    assert!(planner
        .plan_generation("make it rain frogs", GenerationType::Image)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_valid_prompt_is_enhanced() {
    let plan = planner()
        .plan_generation("  what if whales could fly over Tokyo ", GenerationType::Video)
        .await
        .unwrap();
    assert_eq!(plan.original_prompt, "what if whales could fly over Tokyo");
    assert!(plan.enhanced_prompt.starts_with("what if whales could fly over Tokyo"));
    assert_eq!(plan.language, Language::En);
    assert!((0.0..=1.0).contains(&plan.confidence));
}

#[test]
fn test_language_detection_is_total_and_deterministic() {
    let cases = [
        ("what if cats ruled the world", Language::En),
        ("如果猫统治世界", Language::ZhCn),
        ("もしも猫が世界を支配したら", Language::Ja),
        ("ねこ", Language::Ja),
        ("猫が空を飛ぶ", Language::Ja),
        ("12345 !!!", Language::Unknown),
        ("", Language::Unknown),
        ("café au lait", Language::Unknown),
    ];
    for (text, expected) in cases {
        assert_eq!(detect_language(text), expected, "{:?}", text);
        assert_eq!(detect_language(text), detect_language(text));
    }
}

#[test]
fn test_innocent_prompt_allowed() {
    let check = policy().check_prompt("what if a robot vacuum makes chairs float", "u1");
    assert!(check.allowed);
    assert!(check.violations.is_empty());
}

#[test]
fn test_explicit_intent_overrides_innocent_context() {
    let check = policy().check_prompt("a robot vacuum arrives and destroys the room violently", "u1");
    assert!(!check.allowed);
    assert!(check
        .violations
        .iter()
        .any(|v| v.category == ViolationCategory::Violence && v.severity == Severity::High));
}

#[test]
fn test_violent_prompt_blocked_by_default() {
    let check = policy().check_prompt("kill the soldiers in the war", "u1");
    assert!(!check.allowed);
    let violation = check
        .violations
        .iter()
        .find(|v| v.category == ViolationCategory::Violence)
        .expect("violence violation");
    assert_eq!(violation.severity, Severity::High);
    assert_eq!(violation.resolution, Resolution::Blocked);
    assert!(!check.recommendations.is_empty());
}

#[test]
fn test_summary_truncates_at_word_boundary() {
    let summary = generate_prompt_summary("A very long prompt that exceeds the maximum length", 30);
    assert_eq!(summary, "A very long prompt that...");
    assert!(summary.chars().count() <= 30);

    assert_eq!(generate_prompt_summary("short one", 30), "short one");
}
