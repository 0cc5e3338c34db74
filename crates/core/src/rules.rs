//! Rule table: category → rule name → patterns and priority.
//!
//! Categories and rules keep the order they were loaded in; that order is the
//! final tie-break when two candidates share priority and confidence.

use crate::models::FileType;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Scripts,
    Docs,
    Config,
    Tests,
    Temp,
    Archive,
    Security,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Scripts,
        Category::Docs,
        Category::Config,
        Category::Tests,
        Category::Temp,
        Category::Archive,
        Category::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Scripts => "scripts",
            Category::Docs => "docs",
            Category::Config => "config",
            Category::Tests => "tests",
            Category::Temp => "temp",
            Category::Archive => "archive",
            Category::Security => "security",
        }
    }

    /// Keyword regexes tested against file content, independent of rule patterns.
    pub fn content_patterns(&self) -> &'static [&'static str] {
        match self {
            Category::Scripts => &[
                r"#!/bin/(ba|z)?sh",
                r"#!/usr/bin/env\s+(ba|z)?sh",
                r"\bset\s+-e",
                r"\becho\b",
                r"\bexport\s+\w+=",
            ],
            Category::Docs => &[r"(?m)^#{1,6}\s", r"\*\*[^*]+\*\*", r"\[[^\]]+\]\([^)]+\)", r"(?m)^\s*[-*]\s"],
            Category::Config => &[
                r#""[\w-]+"\s*:"#,
                r"(?m)^[\w.-]+\s*[=:]",
                r"module\.exports",
                r"export\s+default",
            ],
            Category::Tests => &[
                r"\bdescribe\(",
                r"\bit\(",
                r"\btest\(",
                r"\bexpect\(",
                r"\bassert",
            ],
            Category::Temp => &[
                r"\b(ERROR|WARN|INFO|DEBUG)\b",
                r"\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}",
            ],
            Category::Archive => &[r"(?i)\bdeprecated\b", r"(?i)\bobsolete\b", r"(?i)\blegacy\b"],
            Category::Security => &[
                r"-----BEGIN [A-Z ]*PRIVATE KEY-----",
                r"(?i)password\s*[=:]",
                r"(?i)secret\s*[=:]",
                r"(?i)api[_-]?key\s*[=:]",
                r"AKIA[0-9A-Z]{16}",
            ],
        }
    }

    /// Inclusive byte range a typical file of this category falls into.
    pub fn size_range(&self) -> (u64, u64) {
        match self {
            Category::Scripts => (10, 1024 * 1024),
            Category::Docs => (10, 10 * 1024 * 1024),
            Category::Config => (2, 1024 * 1024),
            Category::Tests => (10, 5 * 1024 * 1024),
            Category::Temp => (0, 100 * 1024 * 1024),
            Category::Archive => (0, 100 * 1024 * 1024),
            Category::Security => (0, 100 * 1024),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(category, rule name) → FileType`. Pairs absent here classify as `Unknown`.
const RULE_FILE_TYPES: &[(Category, &str, FileType)] = &[
    (Category::Scripts, "deployment", FileType::ScriptDeployment),
    (Category::Scripts, "setup", FileType::ScriptSetup),
    (Category::Scripts, "testing", FileType::ScriptTesting),
    (Category::Scripts, "utility", FileType::ScriptUtility),
    (Category::Scripts, "maintenance", FileType::ScriptMaintenance),
    (Category::Docs, "readme", FileType::DocReadme),
    (Category::Docs, "guide", FileType::DocGuide),
    (Category::Docs, "api", FileType::DocApi),
    (Category::Docs, "report", FileType::DocReport),
    (Category::Docs, "changelog", FileType::DocChangelog),
    (Category::Config, "build", FileType::ConfigBuild),
    (Category::Config, "environment", FileType::ConfigEnvironment),
    (Category::Config, "deployment", FileType::ConfigDeployment),
    (Category::Config, "application", FileType::ConfigApplication),
    (Category::Tests, "unit", FileType::TestUnit),
    (Category::Tests, "integration", FileType::TestIntegration),
    (Category::Tests, "data", FileType::TestData),
    (Category::Temp, "logs", FileType::TempLog),
    (Category::Temp, "cache", FileType::TempCache),
    (Category::Temp, "backup", FileType::TempBackup),
    (Category::Archive, "old", FileType::ArchiveOld),
    (Category::Archive, "deprecated", FileType::ArchiveDeprecated),
    (Category::Security, "keys", FileType::SecurityKeys),
    (Category::Security, "secrets", FileType::SecuritySecrets),
];

pub fn file_type_for(category: Category, rule_name: &str) -> FileType {
    RULE_FILE_TYPES
        .iter()
        .find(|(c, name, _)| *c == category && *name == rule_name)
        .map(|(_, _, file_type)| *file_type)
        .unwrap_or(FileType::Unknown)
}

/// Rule body as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    pub patterns: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRule {
    pub name: String,
    pub category: Category,
    pub patterns: Vec<String>,
    pub priority: i32,
    pub enabled: bool,
}

impl ClassificationRule {
    pub fn new(category: Category, name: impl Into<String>, def: RuleDef) -> Self {
        Self {
            name: name.into(),
            category,
            patterns: def.patterns,
            priority: def.priority,
            enabled: def.enabled,
        }
    }

    pub fn file_type(&self) -> FileType {
        file_type_for(self.category, &self.name)
    }

    fn to_def(&self) -> RuleDef {
        RuleDef {
            patterns: self.patterns.clone(),
            priority: self.priority,
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRules {
    pub category: Category,
    pub rules: Vec<ClassificationRule>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTable {
    categories: Vec<CategoryRules>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> &[CategoryRules] {
        &self.categories
    }

    pub fn rules(&self) -> impl Iterator<Item = &ClassificationRule> {
        self.categories.iter().flat_map(|c| c.rules.iter())
    }

    pub fn rules_in(&self, category: Category) -> impl Iterator<Item = &ClassificationRule> {
        self.categories
            .iter()
            .filter(move |c| c.category == category)
            .flat_map(|c| c.rules.iter())
    }

    pub fn get(&self, category: Category, name: &str) -> Option<&ClassificationRule> {
        self.rules_in(category).find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.rules.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a rule, or replaces the rule of the same name in place.
    pub fn insert(&mut self, rule: ClassificationRule) {
        let group = match self
            .categories
            .iter_mut()
            .position(|c| c.category == rule.category)
        {
            Some(idx) => &mut self.categories[idx],
            None => {
                self.categories.push(CategoryRules {
                    category: rule.category,
                    rules: Vec::new(),
                });
                let last = self.categories.len() - 1;
                &mut self.categories[last]
            }
        };
        match group.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => group.rules.push(rule),
        }
    }

    pub fn remove(&mut self, category: Category, name: &str) -> Option<ClassificationRule> {
        let group = self.categories.iter_mut().find(|c| c.category == category)?;
        let idx = group.rules.iter().position(|r| r.name == name)?;
        Some(group.rules.remove(idx))
    }

    pub fn get_mut(&mut self, category: Category, name: &str) -> Option<&mut ClassificationRule> {
        self.categories
            .iter_mut()
            .filter(|c| c.category == category)
            .flat_map(|c| c.rules.iter_mut())
            .find(|r| r.name == name)
    }
}

impl Serialize for RuleTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for group in &self.categories {
            map.serialize_entry(&group.category, &OrderedRules(&group.rules))?;
        }
        map.end()
    }
}

struct OrderedRules<'a>(&'a [ClassificationRule]);

impl Serialize for OrderedRules<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for rule in self.0 {
            map.serialize_entry(&rule.name, &rule.to_def())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RuleTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RuleTableVisitor)
    }
}

struct RuleTableVisitor;

impl<'de> Visitor<'de> for RuleTableVisitor {
    type Value = RuleTable;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of category to rule tables")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RuleTable, A::Error> {
        let mut table = RuleTable::new();
        while let Some(category) = access.next_key::<Category>()? {
            let rules: RuleList = access.next_value()?;
            for (name, def) in rules.0 {
                if def.patterns.is_empty() {
                    return Err(de::Error::custom(format!(
                        "rule {category}.{name} has no patterns"
                    )));
                }
                table.insert(ClassificationRule::new(category, name, def));
            }
        }
        Ok(table)
    }
}

/// Rule name → definition, in document order.
struct RuleList(Vec<(String, RuleDef)>);

impl<'de> Deserialize<'de> for RuleList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RuleListVisitor;

        impl<'de> Visitor<'de> for RuleListVisitor {
            type Value = RuleList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of rule name to rule definition")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RuleList, A::Error> {
                let mut rules = Vec::new();
                while let Some(entry) = access.next_entry::<String, RuleDef>()? {
                    rules.push(entry);
                }
                Ok(RuleList(rules))
            }
        }

        deserializer.deserialize_map(RuleListVisitor)
    }
}
