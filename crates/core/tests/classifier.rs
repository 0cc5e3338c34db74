use chrono::{DateTime, Duration, TimeZone, Utc};
use flatsort_core::classifier::{failed_placeholder, FileClassifier, RULE_ERROR, RULE_IGNORE, RULE_PRESERVE, RULE_UNKNOWN};
use flatsort_core::config::{Averaging, ClassificationConfig, MatchingConfig};
use flatsort_core::error::ClassificationError;
use flatsort_core::models::{Environment, FileInfo, FileType};
use flatsort_core::rules::{Category, ClassificationRule, RuleDef, RuleTable};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn file(path: &str, size: u64) -> FileInfo {
    FileInfo::new(path, size, Environment::Local).with_last_modified(now())
}

fn deployment_only(averaging: Averaging) -> FileClassifier {
    let mut table = RuleTable::new();
    table.insert(ClassificationRule::new(
        Category::Scripts,
        "deployment",
        RuleDef {
            patterns: vec!["deploy*.sh".to_string()],
            priority: 10,
            enabled: true,
        },
    ));
    let cfg = ClassificationConfig {
        classification_rules: table,
        matching: MatchingConfig {
            averaging,
            ..MatchingConfig::default()
        },
        ..ClassificationConfig::default()
    };
    FileClassifier::new(&cfg).unwrap()
}

fn default_classifier() -> FileClassifier {
    FileClassifier::new(&ClassificationConfig::default()).unwrap()
}

fn strict_classifier() -> FileClassifier {
    let cfg = ClassificationConfig::default();
    FileClassifier::new(&ClassificationConfig {
        matching: MatchingConfig {
            require_pattern_signal: true,
            ..cfg.matching.clone()
        },
        ..cfg
    })
    .unwrap()
}

fn deploy_script() -> FileInfo {
    file("/home/dev/project/deploy-prod.sh", 120)
        .with_permissions("755")
        .with_content("#!/bin/bash\nset -e\necho deploying\n")
}

#[test]
fn deployment_script_under_signal_count_averaging() {
    let classifier = deployment_only(Averaging::MatchedSignals);
    let result = classifier.classify_file_at(&deploy_script(), now()).unwrap();

    assert_eq!(result.file_type, FileType::ScriptDeployment);
    assert_eq!(result.target_path, "development/scripts/deployment/deploy-prod.sh");
    assert_eq!(result.applied_rule, "scripts.deployment");
    assert!((result.confidence - 0.30).abs() < 1e-9);
    // Below the review threshold, so flagged despite the clean match.
    assert!(result.requires_review);
    assert_eq!(result.reasoning.last().unwrap(), "classification: SCRIPT_DEPLOYMENT");
    assert!(classifier.validate_classification(&result.file, &result));
}

#[test]
fn deployment_script_under_weight_averaging() {
    let classifier = deployment_only(Averaging::MatchedWeights);
    let result = classifier.classify_file_at(&deploy_script(), now()).unwrap();

    assert_eq!(result.file_type, FileType::ScriptDeployment);
    assert_eq!(result.target_path, "development/scripts/deployment/deploy-prod.sh");
    assert!(result.confidence > 0.7);
    assert!(!result.requires_review);
}

#[test]
fn private_key_with_loose_permissions() {
    let classifier = default_classifier();
    let key = file("/home/dev/project/id_rsa.pem", 1700).with_permissions("644");

    assert!(classifier.is_sensitive_file(&key));
    let result = classifier.classify_file_at(&key, now()).unwrap();
    assert!(result.requires_review);
    assert_eq!(result.file_type, FileType::SecurityKeys);
    assert_eq!(result.target_path, "security/keys/id_rsa.pem");
    assert!(result.reasoning.iter().any(|r| r == "sensitive file"));

    assert!(!classifier.validate_classification(&key, &result));
    let errors = classifier.validation_errors(&key, &result);
    assert!(errors.iter().any(|e| e.contains("600")));

    let locked = key.clone().with_permissions("600");
    let result = classifier.classify_file_at(&locked, now()).unwrap();
    assert!(classifier.validate_classification(&locked, &result));
}

#[test]
fn empty_file_penalty() {
    let classifier = default_classifier();
    let empty = file("/srv/app/config.json", 0);
    let adjusted = classifier.adjust_confidence(0.9, &empty, FileType::ConfigApplication, now());
    assert!((adjusted - 0.72).abs() < 1e-9);
}

#[test]
fn extension_and_staleness_penalties() {
    let classifier = default_classifier();

    let python = file("/srv/app/tool.py", 100);
    let adjusted = classifier.adjust_confidence(0.9, &python, FileType::ScriptUtility, now());
    assert!((adjusted - 0.54).abs() < 1e-9);

    let stale = file("/srv/app/tool.sh", 100).with_last_modified(now() - Duration::days(400));
    let adjusted = classifier.adjust_confidence(0.9, &stale, FileType::ScriptUtility, now());
    assert!((adjusted - 0.81).abs() < 1e-9);

    // Unconstrained families never take the extension penalty.
    let blob = file("/srv/app/blob.bin", 100);
    assert_eq!(
        classifier.adjust_confidence(0.5, &blob, FileType::TempCache, now()),
        0.5
    );
}

#[test]
fn ignore_short_circuits_matching() {
    let classifier = default_classifier();
    let result = classifier
        .classify_file_at(&file("/home/dev/project/.DS_Store", 6148), now())
        .unwrap();
    assert_eq!(result.applied_rule, RULE_IGNORE);
    assert_eq!(result.file_type, FileType::Unknown);
    assert_eq!(result.target_path, "");
    assert_eq!(result.confidence, 1.0);
    assert!(!result.requires_review);
}

#[test]
fn preserved_files_stay_in_place() {
    let classifier = default_classifier();
    let readme = file("/home/dev/project/README.md", 2048);
    let result = classifier.classify_file_at(&readme, now()).unwrap();
    assert_eq!(result.applied_rule, RULE_PRESERVE);
    assert_eq!(result.target_path, readme.path);
    assert_eq!(result.confidence, 1.0);
    assert!(!result.requires_review);
}

#[test]
fn unmatched_files_fall_back_to_unknown() {
    let classifier = default_classifier();
    // Outside every category size range and no pattern hit.
    let huge = file("/x/huge.bin", 200 * 1024 * 1024);
    let result = classifier.classify_file_at(&huge, now()).unwrap();
    assert_eq!(result.file_type, FileType::Unknown);
    assert_eq!(result.applied_rule, RULE_UNKNOWN);
    assert_eq!(result.confidence, 0.1);
    assert!(result.requires_review);
    assert_eq!(result.target_path, "tmp/unclassified/huge.bin");

    // Any file inside a priority-10 size range is claimed by size alone.
    let notes = file("/srv/app/notes.xyz", 500);
    let result = classifier.classify_file_at(&notes, now()).unwrap();
    assert_eq!(result.applied_rule, "scripts.deployment");
    assert!(result.requires_review);

    let strict = strict_classifier();
    let result = strict.classify_file_at(&notes, now()).unwrap();
    assert_eq!(result.applied_rule, RULE_UNKNOWN);
    assert_eq!(result.confidence, 0.1);
}

#[test]
fn large_files_require_review() {
    let classifier = default_classifier();
    let big = file("/srv/app/server.log", 20 * 1024 * 1024);
    let result = classifier.classify_file_at(&big, now()).unwrap();
    assert_eq!(result.file_type, FileType::TempLog);
    assert!(result.requires_review);
    assert!(result.reasoning.iter().any(|r| r == "large file"));
}

#[test]
fn review_invariant_holds_across_files() {
    let classifier = default_classifier();
    let files = [
        deploy_script(),
        file("/srv/app/.env.production", 80).with_content("PASSWORD=hunter2\n"),
        file("/srv/app/docker-compose.yml", 700),
        file("/srv/app/user.test.ts", 1500).with_content("describe('x', () => { it('y', () => expect(1).toBe(1)) })"),
        file("/srv/app/notes-old.txt", 30),
        file("/srv/app/api-guide.md", 4000).with_content("# API\n\n- [link](http://x)\n"),
    ];
    for f in &files {
        let first = classifier.classify_file_at(f, now()).unwrap();
        let second = classifier.classify_file_at(f, now()).unwrap();
        assert_eq!(first, second);
        assert!((0.0..=1.0).contains(&first.confidence));
        if first.confidence < 0.5 {
            assert!(first.requires_review, "{} should need review", f.name);
        }
        if classifier.is_sensitive_file(f) {
            assert!(first.requires_review);
        }
    }
}

#[test]
fn malformed_files_fail_without_aborting_the_batch() {
    let classifier = default_classifier();
    let broken = FileInfo::new("/srv/app/", 10, Environment::Ec2);
    assert!(broken.name.is_empty());

    match classifier.classify_file(&broken) {
        Err(ClassificationError::Failed { environment, .. }) => {
            assert_eq!(environment, Environment::Ec2)
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let batch = classifier.classify_files(&[
        file("/srv/app/deploy.sh", 100),
        broken.clone(),
        file("/srv/app/app.log", 100),
    ]);
    assert_eq!(batch.results.len(), 2);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.results[0].file.name, "deploy.sh");
    assert_eq!(batch.results[1].file.name, "app.log");

    let placeholder = failed_placeholder(&broken, &batch.failures[0], now());
    assert_eq!(placeholder.applied_rule, RULE_ERROR);
    assert_eq!(placeholder.file_type, FileType::Unknown);
    assert_eq!(placeholder.confidence, 0.0);
    assert!(placeholder.requires_review);
}

#[test]
fn validation_reports_every_problem() {
    let classifier = default_classifier();
    let script = file("/srv/app/deploy.sh", 100);
    let mut result = classifier.classify_file_at(&script, now()).unwrap();
    assert_eq!(result.file_type, FileType::ScriptDeployment);

    // 644 is not executable.
    let errors = classifier.validation_errors(&script, &result);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("not executable"));

    let executable = script.clone().with_permissions("rwxr-xr-x");
    assert!(classifier.validate_classification(&executable, &result));

    result.target_path = "elsewhere/../deploy.sh".to_string();
    result.confidence = 1.5;
    let errors = classifier.validation_errors(&executable, &result);
    assert!(errors.iter().any(|e| e.contains("outside [0, 1]")));
    assert!(errors.iter().any(|e| e.contains("not normalized")));
    assert!(errors.iter().any(|e| e.contains("required directories")));

    result.target_path = String::new();
    result.confidence = 0.9;
    let errors = classifier.validation_errors(&executable, &result);
    assert!(errors.iter().any(|e| e.contains("empty")));
}

#[test]
fn extension_family_mismatch_fails_validation() {
    let classifier = default_classifier();
    let doc = file("/srv/app/guide.pdf", 100);
    let mut result = classifier.classify_file_at(&doc, now()).unwrap();
    result.file_type = FileType::DocGuide;
    result.target_path = "documentation/guides/guide.pdf".to_string();
    let errors = classifier.validation_errors(&doc, &result);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("does not fit DOC_GUIDE"));
}

#[test]
fn statistics_buckets_and_rates() {
    let classifier = default_classifier();
    let mut results = vec![
        classifier
            .classify_file_at(&file("/p/.DS_Store", 10), now())
            .unwrap(),
        classifier
            .classify_file_at(&file("/p/README.md", 10), now())
            .unwrap(),
        classifier
            .classify_file_at(&file("/x/huge.bin", 200 * 1024 * 1024), now())
            .unwrap(),
    ];
    let mut mid = results[0].clone();
    mid.confidence = 0.6;
    mid.file_type = FileType::TempLog;
    results.push(mid);

    let stats = classifier.generate_classification_statistics(&results);
    assert_eq!(stats.by_confidence.high, 2);
    assert_eq!(stats.by_confidence.medium, 1);
    assert_eq!(stats.by_confidence.low, 1);
    assert_eq!(stats.requires_review, 1);
    assert_eq!(stats.by_file_type.get(&FileType::Unknown), Some(&3));
    assert_eq!(stats.by_file_type.get(&FileType::TempLog), Some(&1));
    assert!((stats.average_confidence - (1.0 + 1.0 + 0.1 + 0.6) / 4.0).abs() < 1e-9);
    assert!((stats.success_rate - 0.75).abs() < 1e-9);

    let empty = classifier.generate_classification_statistics(&[]);
    assert_eq!(empty.average_confidence, 0.0);
    assert_eq!(empty.success_rate, 0.0);
}
