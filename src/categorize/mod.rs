//! Root-cause categorization of story render failures.
//!
//! Two independent evidence channels feed the rules: the free-text error
//! message and the set of dependencies fingerprinted from the stack trace.
//! Classification is heuristic; anything no rule recognises is reported as
//! [`ErrorCategory::UnknownError`].

pub mod ecosystem;
pub mod rules;
pub mod stack;

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use ecosystem::{Ecosystem, EcosystemIdentifier, PackagePattern};
pub use rules::{default_rules, CategorizationRule, ErrorContext, RuleMatcher};
pub use stack::{DependencyExtractor, DepsPathExtractor};

/// Maximum number of example messages kept per category.
pub const MAX_EXAMPLES: usize = 3;

/// Maximum length, in characters, of an example message.
pub const MAX_EXAMPLE_LENGTH: usize = 100;

/// Root-cause category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    ModuleImportError,
    HookUsageError,
    MissingStateProvider,
    MissingRouterProvider,
    MissingThemeProvider,
    MissingTranslationProvider,
    MissingPortalRoot,
    MissingProvider,
    ComponentRenderError,
    UnknownError,
}

impl ErrorCategory {
    /// Human-readable description of the category.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::ModuleImportError => "A module could not be found or resolved",
            ErrorCategory::HookUsageError => "React hooks were called incorrectly",
            ErrorCategory::MissingStateProvider => {
                "Component needs a state management provider (store) to render"
            }
            ErrorCategory::MissingRouterProvider => "Component needs a router context to render",
            ErrorCategory::MissingThemeProvider => "Component needs a theme provider to render",
            ErrorCategory::MissingTranslationProvider => {
                "Component needs an i18n or translation provider to render"
            }
            ErrorCategory::MissingPortalRoot => "Component renders into a portal root that does not exist",
            ErrorCategory::MissingProvider => "Component reads a React context with no provider",
            ErrorCategory::ComponentRenderError => "Component threw while rendering",
            ErrorCategory::UnknownError => "Error could not be categorized",
        }
    }

    /// Ecosystem whose packages are reported as matched dependencies.
    pub fn ecosystem(&self) -> Option<Ecosystem> {
        match self {
            ErrorCategory::MissingStateProvider => Some(Ecosystem::StateManagement),
            ErrorCategory::MissingRouterProvider => Some(Ecosystem::Router),
            ErrorCategory::MissingThemeProvider => Some(Ecosystem::Styling),
            ErrorCategory::MissingTranslationProvider => Some(Ecosystem::I18n),
            _ => None,
        }
    }
}

/// Classification of a single failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Categorization {
    pub category: ErrorCategory,
    pub matched_dependencies: Vec<String>,
}

/// Failures sharing a category, aggregated over one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedError {
    pub category: ErrorCategory,
    pub description: String,
    pub count: usize,
    pub examples: Vec<String>,
    pub matched_dependencies: Vec<String>,
}

/// Rule engine mapping error text and stack traces to categories.
pub struct ErrorCategorizer {
    rules: Vec<CategorizationRule>,
    ecosystems: EcosystemIdentifier,
    extractor: Box<dyn DependencyExtractor>,
}

impl Default for ErrorCategorizer {
    fn default() -> Self {
        Self::new(
            default_rules(),
            EcosystemIdentifier::default(),
            Box::new(DepsPathExtractor::default()),
        )
    }
}

impl ErrorCategorizer {
    /// Build a categorizer; rules are sorted by priority here, once.
    pub fn new(
        rules: Vec<CategorizationRule>,
        ecosystems: EcosystemIdentifier,
        extractor: Box<dyn DependencyExtractor>,
    ) -> Self {
        Self {
            rules: rules::sort_rules(rules),
            ecosystems,
            extractor,
        }
    }

    /// Replace the stack dependency extractor.
    pub fn with_extractor(mut self, extractor: Box<dyn DependencyExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[CategorizationRule] {
        &self.rules
    }

    /// Classify one failure. The first matching rule wins.
    pub fn categorize(&self, message: &str, stack: Option<&str>) -> Categorization {
        let ctx = ErrorContext::new(message, stack, self.extractor.as_ref());

        let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(&ctx, &self.ecosystems))
        else {
            debug!(message = %first_line(message), "no categorization rule matched");
            return Categorization {
                category: ErrorCategory::UnknownError,
                matched_dependencies: Vec::new(),
            };
        };

        let matched_dependencies = rule
            .category
            .ecosystem()
            .map(|eco| self.ecosystems.members(eco, &ctx.stack_deps))
            .unwrap_or_default();

        Categorization {
            category: rule.category,
            matched_dependencies,
        }
    }

    /// Classify a batch of `(message, stack)` failures and group by category.
    ///
    /// Groups are ordered by descending count, ties broken by rule priority.
    pub fn aggregate<'a, I>(&self, failures: I) -> Vec<CategorizedError>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut groups: Vec<CategorizedError> = Vec::new();
        let mut index: HashMap<ErrorCategory, usize> = HashMap::new();

        for (message, stack) in failures {
            let result = self.categorize(message, stack);
            let slot = *index.entry(result.category).or_insert_with(|| {
                groups.push(CategorizedError {
                    category: result.category,
                    description: result.category.description().to_string(),
                    count: 0,
                    examples: Vec::new(),
                    matched_dependencies: Vec::new(),
                });
                groups.len() - 1
            });

            let group = &mut groups[slot];
            group.count += 1;

            let example = truncate_chars(first_line(message), MAX_EXAMPLE_LENGTH);
            if !example.is_empty()
                && group.examples.len() < MAX_EXAMPLES
                && !group.examples.contains(&example)
            {
                group.examples.push(example);
            }
            for dep in result.matched_dependencies {
                if !group.matched_dependencies.contains(&dep) {
                    group.matched_dependencies.push(dep);
                }
            }
        }

        for group in &mut groups {
            group.matched_dependencies.sort();
        }
        groups.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| self.priority_of(b.category).cmp(&self.priority_of(a.category)))
        });
        groups
    }

    fn priority_of(&self, category: ErrorCategory) -> u32 {
        self.rules
            .iter()
            .find(|r| r.category == category)
            .map(|r| r.priority)
            .unwrap_or(0)
    }
}

/// Shared categorizer with the built-in rules.
pub fn default_categorizer() -> &'static ErrorCategorizer {
    static CATEGORIZER: OnceLock<ErrorCategorizer> = OnceLock::new();
    CATEGORIZER.get_or_init(ErrorCategorizer::default)
}

/// Classify a failure with the built-in rules.
pub fn categorize_error(message: &str, stack: Option<&str>) -> Categorization {
    default_categorizer().categorize(message, stack)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
