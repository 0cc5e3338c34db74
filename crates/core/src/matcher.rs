//! Scores files against the rule table using five independent signals.
//!
//! For a rule, each signal (name, extension, content, path, size) that fires
//! contributes `confidence × weight`. The sum is divided by the number of
//! signals that fired (or by their summed weights under
//! [`Averaging::MatchedWeights`]) and capped at 1.0.

use crate::config::{Averaging, MatchingConfig};
use crate::error::ConfigError;
use crate::models::{FileInfo, MatchResult, SignalKind, SignalMatch};
use crate::rules::{Category, ClassificationRule, RuleDef, RuleTable};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.3;

const CONTENT_SCALE: f64 = 1000.0;
const DIRECTORY_CONFIDENCE: f64 = 0.4;
const FULL_PATH_CONFIDENCE: f64 = 0.3;
const SIZE_CONFIDENCE: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct PatternMatcher {
    rules: RuleTable,
    averaging: Averaging,
    require_pattern_signal: bool,
    globs: HashMap<String, Regex>,
    content: Vec<(Category, Vec<Regex>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatcherStatistics {
    pub total_rules: usize,
    pub enabled_rules: usize,
    pub disabled_rules: usize,
    pub by_category: Vec<(String, usize)>,
}

impl PatternMatcher {
    pub fn new(rules: RuleTable, matching: &MatchingConfig) -> Result<Self, ConfigError> {
        let mut content = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let compiled = category
                .content_patterns()
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|source| ConfigError::Pattern {
                        pattern: p.to_string(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            content.push((category, compiled));
        }

        let mut matcher = Self {
            rules: RuleTable::new(),
            averaging: matching.averaging,
            require_pattern_signal: matching.require_pattern_signal,
            globs: HashMap::new(),
            content,
        };
        for rule in rules.rules() {
            matcher.compile_patterns(&rule.patterns)?;
        }
        matcher.rules = rules;
        Ok(matcher)
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn averaging(&self) -> Averaging {
        self.averaging
    }

    /// Highest-priority match; confidence breaks priority ties, table order breaks the rest.
    pub fn find_best_match(&self, file: &FileInfo) -> Option<MatchResult> {
        let mut candidates = self.matching_rules(file, self.rules.rules());
        candidates.sort_by(|a, b| {
            b.rule
                .priority
                .cmp(&a.rule.priority)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });
        candidates.into_iter().next()
    }

    /// Every match at or above `min_confidence`, most confident first.
    pub fn find_all_matches(&self, file: &FileInfo, min_confidence: f64) -> Vec<MatchResult> {
        let mut matches: Vec<MatchResult> = self
            .matching_rules(file, self.rules.rules())
            .into_iter()
            .filter(|m| m.confidence >= min_confidence)
            .collect();
        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        matches
    }

    pub fn match_category(&self, file: &FileInfo, category: Category) -> Option<MatchResult> {
        let mut best: Option<MatchResult> = None;
        for candidate in self.matching_rules(file, self.rules.rules_in(category)) {
            let better = best
                .as_ref()
                .map_or(true, |current| candidate.confidence > current.confidence);
            if better {
                best = Some(candidate);
            }
        }
        best
    }

    fn matching_rules<'a>(
        &self,
        file: &FileInfo,
        rules: impl Iterator<Item = &'a ClassificationRule>,
    ) -> Vec<MatchResult> {
        rules
            .filter(|r| r.enabled)
            .map(|r| self.evaluate_rule(file, r))
            .filter(|m| m.matched)
            .collect()
    }

    pub fn evaluate_rule(&self, file: &FileInfo, rule: &ClassificationRule) -> MatchResult {
        let mut signals = Vec::new();
        let mut matched_pattern = None;

        if let Some((confidence, pattern)) = self.match_name(file, rule) {
            signals.push(SignalMatch {
                kind: SignalKind::Name,
                confidence,
            });
            matched_pattern = Some(pattern);
        }
        if let Some(confidence) = match_extension(file, rule) {
            signals.push(SignalMatch {
                kind: SignalKind::Extension,
                confidence,
            });
        }
        if let Some(confidence) = self.match_content(file, rule.category) {
            signals.push(SignalMatch {
                kind: SignalKind::Content,
                confidence,
            });
        }
        if let Some(confidence) = self.match_path(file, rule) {
            signals.push(SignalMatch {
                kind: SignalKind::Path,
                confidence,
            });
        }
        if let Some(confidence) = match_size(file, rule.category) {
            signals.push(SignalMatch {
                kind: SignalKind::Size,
                confidence,
            });
        }

        let rule_id = format!("{}.{}", rule.category, rule.name);
        let pattern_backed = signals.iter().any(|s| s.kind.is_pattern_based());
        if signals.is_empty() || (self.require_pattern_signal && !pattern_backed) {
            return MatchResult {
                matched: false,
                confidence: 0.0,
                reason: format!("{rule_id}: no qualifying signal"),
                matched_pattern: None,
                signals,
                rule: rule.clone(),
            };
        }

        let weighted: f64 = signals.iter().map(|s| s.confidence * s.kind.weight()).sum();
        let divisor = match self.averaging {
            Averaging::MatchedSignals => signals.len() as f64,
            Averaging::MatchedWeights => signals.iter().map(|s| s.kind.weight()).sum(),
        };
        let confidence = (weighted / divisor).min(1.0);

        let fired: Vec<String> = signals
            .iter()
            .map(|s| format!("{:?}({:.2})", s.kind, s.confidence).to_lowercase())
            .collect();
        debug!(rule = %rule_id, file = %file.name, confidence, "rule evaluated");

        MatchResult {
            matched: true,
            confidence,
            reason: format!("{rule_id} matched by {}", fired.join(", ")),
            matched_pattern,
            signals,
            rule: rule.clone(),
        }
    }

    fn match_name(&self, file: &FileInfo, rule: &ClassificationRule) -> Option<(f64, String)> {
        let mut best: Option<(f64, String)> = None;
        for pattern in &rule.patterns {
            let Some(re) = self.globs.get(pattern) else {
                continue;
            };
            let confidence = pattern_confidence(re, pattern, &file.name);
            if confidence > best.as_ref().map_or(0.0, |(c, _)| *c) {
                best = Some((confidence, pattern.clone()));
            }
        }
        best
    }

    fn match_content(&self, file: &FileInfo, category: Category) -> Option<f64> {
        let content = file.content.as_deref().filter(|c| !c.is_empty())?;
        let (_, patterns) = self.content.iter().find(|(c, _)| *c == category)?;
        let hits: usize = patterns.iter().map(|re| re.find_iter(content).count()).sum();
        if hits == 0 {
            return None;
        }
        let length = content.chars().count() as f64;
        Some((0.5 + hits as f64 / length * CONTENT_SCALE).min(1.0))
    }

    fn match_path(&self, file: &FileInfo, rule: &ClassificationRule) -> Option<f64> {
        let directory = Path::new(&file.path)
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mut best = 0.0_f64;
        for pattern in &rule.patterns {
            let stripped = pattern.replace('*', "").to_lowercase();
            if !stripped.is_empty() && directory.contains(&stripped) {
                best = best.max(DIRECTORY_CONFIDENCE);
            } else if let Some(re) = self.globs.get(pattern) {
                if pattern_confidence(re, pattern, &file.path) > 0.0 {
                    best = best.max(FULL_PATH_CONFIDENCE);
                }
            }
        }
        (best > 0.0).then_some(best)
    }

    pub fn add_rule(
        &mut self,
        category: Category,
        name: impl Into<String>,
        def: RuleDef,
    ) -> Result<(), ConfigError> {
        if def.patterns.is_empty() {
            return Err(ConfigError::Invalid("rule needs at least one pattern".to_string()));
        }
        self.compile_patterns(&def.patterns)?;
        let rule = ClassificationRule::new(category, name, def);
        debug!(category = %rule.category, rule = %rule.name, "rule added");
        self.rules.insert(rule);
        Ok(())
    }

    pub fn remove_rule(&mut self, category: Category, name: &str) -> bool {
        self.rules.remove(category, name).is_some()
    }

    pub fn toggle_rule(&mut self, category: Category, name: &str, enabled: bool) -> bool {
        match self.rules.get_mut(category, name) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn statistics(&self) -> MatcherStatistics {
        let total_rules = self.rules.len();
        let enabled_rules = self.rules.rules().filter(|r| r.enabled).count();
        MatcherStatistics {
            total_rules,
            enabled_rules,
            disabled_rules: total_rules - enabled_rules,
            by_category: self
                .rules
                .categories()
                .iter()
                .map(|c| (c.category.to_string(), c.rules.len()))
                .collect(),
        }
    }

    /// Confidence a single glob pattern assigns to `file_name`.
    pub fn test_pattern(&self, pattern: &str, file_name: &str) -> Result<f64, ConfigError> {
        let re = match self.globs.get(pattern) {
            Some(re) => re.clone(),
            None => glob_to_regex(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?,
        };
        Ok(pattern_confidence(&re, pattern, file_name))
    }

    fn compile_patterns(&mut self, patterns: &[String]) -> Result<(), ConfigError> {
        for pattern in patterns {
            if self.globs.contains_key(pattern) {
                continue;
            }
            let re = glob_to_regex(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            self.globs.insert(pattern.clone(), re);
        }
        Ok(())
    }
}

fn match_extension(file: &FileInfo, rule: &ClassificationRule) -> Option<f64> {
    rule.patterns
        .iter()
        .filter_map(|p| {
            if let Some(rest) = p.strip_prefix('*') {
                rest.starts_with('.').then_some(rest)
            } else {
                p.starts_with('.').then_some(p.as_str())
            }
        })
        .any(|ext| ext.eq_ignore_ascii_case(&file.extension))
        .then_some(1.0)
}

fn match_size(file: &FileInfo, category: Category) -> Option<f64> {
    let (min, max) = category.size_range();
    (min..=max).contains(&file.size).then_some(SIZE_CONFIDENCE)
}

/// Anchored, case-insensitive regex for a glob: `*` → `.*`, `?` → `.`.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    RegexBuilder::new(&format!("^{body}$"))
        .case_insensitive(true)
        .build()
}

/// 1.0 exact, 0.8 literal prefix, 0.7 literal suffix, 0.6 other match, 0.0 no match.
pub fn pattern_confidence(re: &Regex, pattern: &str, text: &str) -> f64 {
    if !re.is_match(text) {
        return 0.0;
    }
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();
    if text == pattern.replace('*', "") {
        return 1.0;
    }
    let wildcards = ['*', '?'];
    if pattern.contains(wildcards) {
        let prefix = pattern.split(wildcards).next().unwrap_or("");
        if !prefix.is_empty() && text.starts_with(prefix) {
            return 0.8;
        }
        let suffix = pattern.rsplit(wildcards).next().unwrap_or("");
        if !suffix.is_empty() && text.ends_with(suffix) {
            return 0.7;
        }
    }
    0.6
}
