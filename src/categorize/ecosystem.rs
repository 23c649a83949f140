//! Ecosystem package identification.
//!
//! Packages are grouped into the provider-bearing ecosystems the error rules
//! care about. Membership is decided by glob-style patterns where `*` matches
//! any run of characters and the whole name must match.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Package ecosystems that usually require a provider around components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ecosystem {
    StateManagement,
    Router,
    Styling,
    I18n,
}

impl Ecosystem {
    /// All ecosystems in declaration order.
    pub const ALL: [Ecosystem; 4] = [
        Ecosystem::StateManagement,
        Ecosystem::Router,
        Ecosystem::Styling,
        Ecosystem::I18n,
    ];

    /// Curated package patterns for this ecosystem.
    pub fn default_patterns(&self) -> &'static [&'static str] {
        match self {
            Ecosystem::StateManagement => &[
                "redux",
                "react-redux",
                "@reduxjs/*",
                "zustand",
                "jotai",
                "jotai-*",
                "recoil",
                "mobx",
                "mobx-react*",
                "valtio",
                "xstate",
                "@xstate/*",
                "effector*",
                "@tanstack/*query*",
                "react-query",
                "@apollo/client",
                "urql",
                "swr",
            ],
            Ecosystem::Router => &[
                "react-router",
                "react-router-dom",
                "react-router-native",
                "@tanstack/*router*",
                "@reach/router",
                "wouter",
                "next/router",
                "next/navigation",
                "vue-router",
            ],
            Ecosystem::Styling => &[
                "styled-components",
                "@emotion/*",
                "@mui/*",
                "@material-ui/*",
                "@chakra-ui/*",
                "@mantine/*",
                "@stitches/*",
                "theme-ui",
                "@theme-ui/*",
                "@vanilla-extract/*",
                "antd",
                "@fluentui/*",
                "styled-system",
            ],
            Ecosystem::I18n => &[
                "i18next",
                "react-i18next",
                "next-i18next",
                "react-intl",
                "@formatjs/*",
                "@lingui/*",
                "next-intl",
                "vue-i18n",
                "@inlang/*",
                "typesafe-i18n",
            ],
        }
    }
}

/// A compiled glob-style package pattern.
#[derive(Debug, Clone)]
pub struct PackagePattern {
    pattern: String,
    regex: Regex,
}

impl PackagePattern {
    /// Compile `pattern`, treating `*` as a wildcard and everything else literally.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{body}$"))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Whether the full package name matches.
    pub fn matches(&self, package: &str) -> bool {
        self.regex.is_match(package)
    }
}

/// Maps package names to the ecosystems they belong to.
#[derive(Debug, Clone)]
pub struct EcosystemIdentifier {
    categories: Vec<(Ecosystem, Vec<PackagePattern>)>,
}

impl Default for EcosystemIdentifier {
    fn default() -> Self {
        let categories = Ecosystem::ALL
            .iter()
            .map(|eco| {
                let patterns = eco
                    .default_patterns()
                    .iter()
                    .filter_map(|p| PackagePattern::new(p).ok())
                    .collect();
                (*eco, patterns)
            })
            .collect();
        Self { categories }
    }
}

impl EcosystemIdentifier {
    /// Add extra patterns to an ecosystem.
    pub fn with_patterns<I, S>(mut self, ecosystem: Ecosystem, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| PackagePattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some((_, existing)) = self.categories.iter_mut().find(|(e, _)| *e == ecosystem) {
            existing.extend(compiled);
        }
        Ok(self)
    }

    /// Whether `package` belongs to `ecosystem`.
    pub fn is_member(&self, ecosystem: Ecosystem, package: &str) -> bool {
        self.patterns(ecosystem).iter().any(|p| p.matches(package))
    }

    /// Ecosystems `package` belongs to.
    pub fn identify(&self, package: &str) -> Vec<Ecosystem> {
        self.categories
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|p| p.matches(package)))
            .map(|(eco, _)| *eco)
            .collect()
    }

    /// The subset of `packages` belonging to `ecosystem`, in input order.
    pub fn members<'a, I>(&self, ecosystem: Ecosystem, packages: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        packages
            .into_iter()
            .filter(|p| self.is_member(ecosystem, p))
            .cloned()
            .collect()
    }

    fn patterns(&self, ecosystem: Ecosystem) -> &[PackagePattern] {
        self.categories
            .iter()
            .find(|(e, _)| *e == ecosystem)
            .map(|(_, p)| p.as_slice())
            .unwrap_or(&[])
    }
}
