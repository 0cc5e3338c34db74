use flatsort_cli::wiring;
use flatsort_core::config;
use flatsort_core::models::{Environment, FileInfo, FileType};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn toml_path(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}

#[tokio::test]
async fn test_full_classification() {
    // 1. Local project tree and remote manifests
    let temp = tempdir().unwrap();
    let project = temp.path().join("project");
    let reports = temp.path().join("reports");
    fs::create_dir_all(project.join("nested")).unwrap();

    fs::write(project.join("deploy.sh"), "#!/bin/bash\nset -e\necho deploying\n").unwrap();
    fs::write(project.join("server.log"), "2024-01-01 10:00:00 INFO started\n").unwrap();
    fs::write(project.join("README.md"), "# Project\n").unwrap();
    fs::write(project.join(".DS_Store"), "junk").unwrap();
    fs::write(project.join("nested").join("skip.sh"), "echo nested\n").unwrap();

    let remote_project = vec![FileInfo::new("/srv/app/docker-compose.yml", 700, Environment::Ec2)];
    let remote_home = vec![
        FileInfo::new("/home/ubuntu/id_rsa.pem", 1700, Environment::Ec2).with_permissions("600"),
    ];
    let project_manifest = temp.path().join("ec2-project.json");
    let home_manifest = temp.path().join("ec2-home.json");
    fs::write(&project_manifest, serde_json::to_string(&remote_project).unwrap()).unwrap();
    fs::write(&home_manifest, serde_json::to_string(&remote_home).unwrap()).unwrap();

    // 2. User config layered over the defaults
    let config_path = temp.path().join("flatsort.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[matching]
require_pattern_signal = true

[scan]
local_root = "{root}"
ec2_project_manifest = "{project_manifest}"
ec2_home_manifest = "{home_manifest}"

[reports]
dir = "{reports}"
"#,
            root = toml_path(&project),
            project_manifest = toml_path(&project_manifest),
            home_manifest = toml_path(&home_manifest),
            reports = toml_path(&reports),
        ),
    )
    .unwrap();
    let cfg = config::load(Some(config_path.to_str().unwrap())).unwrap();

    // 3. Run
    let report = wiring::classify(&cfg, None).await.unwrap();

    // 4. Local results: nested files are not flat files
    let local = &report.environment_results[&Environment::Local];
    assert!(local.errors.is_empty());
    assert_eq!(local.total_files, 4);
    let by_name = |name: &str| {
        report
            .all_classifications()
            .find(|c| c.file.name == name)
            .unwrap()
            .clone()
    };
    assert_eq!(by_name("deploy.sh").file_type, FileType::ScriptDeployment);
    assert_eq!(
        by_name("deploy.sh").target_path,
        "development/scripts/deployment/deploy.sh"
    );
    assert_eq!(by_name("server.log").file_type, FileType::TempLog);
    assert_eq!(by_name("README.md").applied_rule, "preserve");
    assert_eq!(by_name(".DS_Store").applied_rule, "ignore");

    // 5. Remote results from both manifests, project first
    let ec2 = &report.environment_results[&Environment::Ec2];
    assert!(ec2.errors.is_empty());
    let names: Vec<&str> = ec2.classifications.iter().map(|c| c.file.name.as_str()).collect();
    assert_eq!(names, vec!["docker-compose.yml", "id_rsa.pem"]);
    assert_eq!(by_name("id_rsa.pem").file_type, FileType::SecurityKeys);
    assert_eq!(by_name("docker-compose.yml").file_type, FileType::ConfigDeployment);

    // 6. Both report files written
    let json_report = reports.join(format!("{}.json", report.report_id));
    let csv_report = reports.join(format!("{}.csv", report.report_id));
    assert!(json_report.exists());
    let csv = fs::read_to_string(csv_report).unwrap();
    assert_eq!(csv.lines().count(), 1 + 6);
}

#[tokio::test]
async fn missing_remote_source_is_reported() {
    let temp = tempdir().unwrap();
    let project = temp.path().join("project");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("notes.md"), "# Notes\n\n- item\n").unwrap();
    let reports = temp.path().join("reports");

    let config_path = temp.path().join("flatsort.toml");
    fs::write(
        &config_path,
        format!(
            "[scan]\nlocal_root = \"{}\"\n\n[reports]\ndir = \"{}\"\nwrite_json = false\nwrite_csv = false\n",
            toml_path(&project),
            toml_path(&reports),
        ),
    )
    .unwrap();
    let cfg = config::load(Some(config_path.to_str().unwrap())).unwrap();

    let report = wiring::classify(&cfg, None).await.unwrap();
    let ec2 = &report.environment_results[&Environment::Ec2];
    assert_eq!(ec2.total_files, 0);
    assert!(ec2.errors[0].contains("no scanner configured"));

    let local = &report.environment_results[&Environment::Local];
    assert!(local.errors.is_empty());
    let notes = local
        .classifications
        .iter()
        .find(|c| c.file.name == "notes.md")
        .unwrap();
    // Shipped defaults keep size-only matches, so a priority-10 rule claims it with low confidence.
    assert_eq!(notes.applied_rule, "scripts.deployment");
    assert!(notes.requires_review);
    assert!(!reports.exists());
}

#[tokio::test]
async fn mounted_remote_tree_is_scanned_as_ec2() {
    let temp = tempdir().unwrap();
    let local_root = temp.path().join("local");
    let mount = temp.path().join("mnt-project");
    let mount_home = temp.path().join("mnt-home");
    for dir in [&local_root, &mount, &mount_home] {
        fs::create_dir_all(dir).unwrap();
    }
    fs::write(mount.join("backup-db.sh"), "#!/bin/sh\necho backup\n").unwrap();
    fs::write(mount_home.join("app.log"), "INFO ok\n").unwrap();

    let config_path = temp.path().join("flatsort.toml");
    fs::write(
        &config_path,
        format!(
            "[matching]\nrequire_pattern_signal = true\n\n[scan]\nlocal_root = \"{}\"\nec2_mount_root = \"{}\"\nec2_mount_home = \"{}\"\n\n[reports]\ndir = \"{}\"\nwrite_json = false\nwrite_csv = false\n",
            toml_path(&local_root),
            toml_path(&mount),
            toml_path(&mount_home),
            toml_path(&temp.path().join("reports")),
        ),
    )
    .unwrap();
    let cfg = config::load(Some(config_path.to_str().unwrap())).unwrap();

    let report = wiring::classify(&cfg, None).await.unwrap();
    let ec2 = &report.environment_results[&Environment::Ec2];
    assert!(ec2.errors.is_empty());
    assert_eq!(ec2.total_files, 2);
    assert!(ec2.classifications.iter().all(|c| c.file.environment == Environment::Ec2));
    assert_eq!(ec2.classifications[0].file_type, FileType::ScriptMaintenance);
    assert_eq!(ec2.classifications[1].file_type, FileType::TempLog);
    assert_eq!(report.environment_results[&Environment::Local].total_files, 0);
}

#[tokio::test]
async fn explicit_csv_path_overrides_settings() {
    let temp = tempdir().unwrap();
    let reports = temp.path().join("reports");
    let config_path = temp.path().join("flatsort.toml");
    fs::write(
        &config_path,
        format!(
            "[scan]\nlocal_root = \"{}\"\n\n[reports]\ndir = \"{}\"\nwrite_json = false\nwrite_csv = false\n",
            toml_path(temp.path()),
            toml_path(&reports),
        ),
    )
    .unwrap();
    let cfg = config::load(Some(config_path.to_str().unwrap())).unwrap();

    let out = temp.path().join("exports").join("run.csv");
    let report = wiring::classify(&cfg, Some(out.clone())).await.unwrap();
    assert!(out.exists());
    assert_eq!(wiring::csv_path(&cfg, &report, None), None);
    assert_eq!(wiring::csv_path(&cfg, &report, Some(out.clone())), Some(out));
}

#[tokio::test]
async fn csv_export_failure_keeps_the_report() {
    let temp = tempdir().unwrap();
    let project = temp.path().join("project");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("deploy.sh"), "#!/bin/bash\necho hi\n").unwrap();
    let blocker = temp.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();

    let config_path = temp.path().join("flatsort.toml");
    fs::write(
        &config_path,
        format!(
            "[scan]\nlocal_root = \"{}\"\n\n[reports]\ndir = \"{}\"\nwrite_json = false\nwrite_csv = false\n",
            toml_path(&project),
            toml_path(&temp.path().join("reports")),
        ),
    )
    .unwrap();
    let cfg = config::load(Some(config_path.to_str().unwrap())).unwrap();

    let out = blocker.join("out.csv");
    let report = wiring::classify(&cfg, Some(out.clone())).await.unwrap();
    assert!(!out.exists());
    assert_eq!(report.environment_results[&Environment::Local].total_files, 1);
    assert_eq!(
        report.all_classifications().next().unwrap().file_type,
        FileType::ScriptDeployment
    );
}
