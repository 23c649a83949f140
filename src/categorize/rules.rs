//! Prioritized rule engine for render failures.
//!
//! Rules carry explicit priorities and are sorted once when the categorizer
//! is built. Evaluation walks the sorted list and the first match wins; a
//! message matching several rules always lands in the highest-priority one.

use std::collections::BTreeSet;

use super::ecosystem::{Ecosystem, EcosystemIdentifier};
use super::stack::DependencyExtractor;
use super::ErrorCategory;

/// Evidence about one failure, normalised once before rule evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub message: String,
    pub stack: String,
    pub normalized_message: String,
    pub normalized_stack: String,
    pub stack_deps: BTreeSet<String>,
}

impl ErrorContext {
    /// Build the context, extracting dependency names from the stack.
    pub fn new(message: &str, stack: Option<&str>, extractor: &dyn DependencyExtractor) -> Self {
        let stack = stack.unwrap_or_default();
        Self {
            message: message.to_string(),
            stack: stack.to_string(),
            normalized_message: message.to_lowercase(),
            normalized_stack: stack.to_lowercase(),
            stack_deps: extractor.extract(stack),
        }
    }

    fn message_has(&self, needle: &str) -> bool {
        self.normalized_message.contains(needle)
    }

    fn message_has_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.message_has(n))
    }

    fn stack_has(&self, ecosystem: Ecosystem, ecosystems: &EcosystemIdentifier) -> bool {
        self.stack_deps
            .iter()
            .any(|dep| ecosystems.is_member(ecosystem, dep))
    }
}

/// Predicate variants, one per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatcher {
    ModuleImport,
    HookUsage,
    StateProvider,
    RouterProvider,
    ThemeProvider,
    TranslationProvider,
    PortalRoot,
    ContextProvider,
    ComponentRender,
}

impl RuleMatcher {
    /// Evaluate the predicate against a prepared context.
    pub fn matches(&self, ctx: &ErrorContext, ecosystems: &EcosystemIdentifier) -> bool {
        match self {
            RuleMatcher::ModuleImport => ctx.message_has_any(&[
                "cannot find module",
                "module not found",
                "cannot resolve module",
            ]),
            RuleMatcher::HookUsage => ctx.message_has_any(&[
                "invalid hook call",
                "rendered more hooks",
                "hooks can only be called inside",
            ]),
            RuleMatcher::StateProvider => {
                ctx.stack_has(Ecosystem::StateManagement, ecosystems)
                    && ctx.message_has_any(&["context", "undefined", "null"])
            }
            RuleMatcher::RouterProvider => {
                ctx.stack_has(Ecosystem::Router, ecosystems)
                    || ctx.message_has_any(&["usenavigate", "router"])
            }
            RuleMatcher::ThemeProvider => {
                (ctx.stack_has(Ecosystem::Styling, ecosystems)
                    && ctx.message_has_any(&["theme", "undefined"]))
                    || ctx.message_has("usetheme")
                    || (ctx.message_has("theme") && ctx.message_has("provider"))
            }
            RuleMatcher::TranslationProvider => {
                ctx.stack_has(Ecosystem::I18n, ecosystems)
                    || ctx.message_has_any(&["i18n", "translation", "locale"])
            }
            RuleMatcher::PortalRoot => {
                ctx.message_has("portal")
                    && ctx.message_has_any(&["container", "root"])
                    && ctx.message_has_any(&["null", "not found"])
            }
            RuleMatcher::ContextProvider => {
                ctx.message_has("usecontext") && ctx.message_has_any(&["null", "undefined"])
            }
            RuleMatcher::ComponentRender => ctx.message_has_any(&[
                "cannot read",
                "undefined is not a function",
                "render",
            ]),
        }
    }
}

/// A category, its priority and the predicate that selects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorizationRule {
    pub category: ErrorCategory,
    pub priority: u32,
    pub matcher: RuleMatcher,
}

impl CategorizationRule {
    pub const fn new(category: ErrorCategory, priority: u32, matcher: RuleMatcher) -> Self {
        Self {
            category,
            priority,
            matcher,
        }
    }
}

/// The built-in rule set. Higher priority is evaluated first.
pub fn default_rules() -> Vec<CategorizationRule> {
    vec![
        CategorizationRule::new(ErrorCategory::ModuleImportError, 100, RuleMatcher::ModuleImport),
        CategorizationRule::new(ErrorCategory::HookUsageError, 90, RuleMatcher::HookUsage),
        CategorizationRule::new(ErrorCategory::MissingStateProvider, 80, RuleMatcher::StateProvider),
        CategorizationRule::new(ErrorCategory::MissingRouterProvider, 70, RuleMatcher::RouterProvider),
        CategorizationRule::new(ErrorCategory::MissingThemeProvider, 60, RuleMatcher::ThemeProvider),
        CategorizationRule::new(
            ErrorCategory::MissingTranslationProvider,
            50,
            RuleMatcher::TranslationProvider,
        ),
        CategorizationRule::new(ErrorCategory::MissingPortalRoot, 40, RuleMatcher::PortalRoot),
        CategorizationRule::new(ErrorCategory::MissingProvider, 30, RuleMatcher::ContextProvider),
        CategorizationRule::new(ErrorCategory::ComponentRenderError, 10, RuleMatcher::ComponentRender),
    ]
}

/// Sort rules by descending priority; equal priorities keep their order.
pub fn sort_rules(mut rules: Vec<CategorizationRule>) -> Vec<CategorizationRule> {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::stack::DepsPathExtractor;

    fn ctx(message: &str, stack: Option<&str>) -> ErrorContext {
        ErrorContext::new(message, stack, &DepsPathExtractor::default())
    }

    #[test]
    fn test_context_normalizes_and_extracts() {
        let context = ctx(
            "Cannot READ x",
            Some("at a (/node_modules/.vite/deps/zustand.js?v=1:1:1)"),
        );
        assert_eq!(context.normalized_message, "cannot read x");
        assert!(context.normalized_stack.contains("zustand"));
        assert!(context.stack_deps.contains("zustand"));
    }

    #[test]
    fn test_missing_stack_is_empty() {
        let context = ctx("boom", None);
        assert!(context.stack.is_empty());
        assert!(context.stack_deps.is_empty());
    }

    #[test]
    fn test_state_provider_requires_stack_evidence() {
        let ecosystems = EcosystemIdentifier::default();
        let without = ctx("could not find react-redux context value", None);
        assert!(!RuleMatcher::StateProvider.matches(&without, &ecosystems));

        let with = ctx(
            "could not find react-redux context value",
            Some("at useStore (/node_modules/.vite/deps/react-redux.js?v=1:10:3)"),
        );
        assert!(RuleMatcher::StateProvider.matches(&with, &ecosystems));
    }

    #[test]
    fn test_portal_requires_all_three_signals() {
        let ecosystems = EcosystemIdentifier::default();
        assert!(RuleMatcher::PortalRoot.matches(
            &ctx("Portal container element not found", None),
            &ecosystems
        ));
        assert!(!RuleMatcher::PortalRoot.matches(&ctx("Portal container missing", None), &ecosystems));
    }

    #[test]
    fn test_sort_rules_orders_by_priority() {
        let shuffled = vec![
            CategorizationRule::new(ErrorCategory::ComponentRenderError, 10, RuleMatcher::ComponentRender),
            CategorizationRule::new(ErrorCategory::ModuleImportError, 100, RuleMatcher::ModuleImport),
            CategorizationRule::new(ErrorCategory::MissingProvider, 30, RuleMatcher::ContextProvider),
        ];
        let sorted = sort_rules(shuffled);
        let priorities: Vec<u32> = sorted.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![100, 30, 10]);
    }

    #[test]
    fn test_default_rules_have_unique_priorities() {
        let rules = default_rules();
        let unique: BTreeSet<u32> = rules.iter().map(|r| r.priority).collect();
        assert_eq!(unique.len(), rules.len());
    }
}
