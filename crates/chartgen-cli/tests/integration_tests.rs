//! Integration tests for the chartgen binary

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn chartgen(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chartgen"))
        .args(args)
        .env_remove("CHARTGEN_LOG")
        .env_remove("CHARTGEN_DEBUG")
        .env("CHARTGEN_REPOSITORY_CONFIG", "/nonexistent/chartgen/repositories.yaml")
        .output()
        .expect("Failed to execute chartgen")
}

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures")
}

fn document(name: &str) -> String {
    fixtures_path()
        .join("documents")
        .join(name)
        .display()
        .to_string()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn assert_failed_cleanly(output: &Output) {
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(output));
    assert!(output.stdout.is_empty(), "stdout must stay empty on failure");
    assert!(stderr(output).contains("Error:"));
}

mod arguments {
    use super::*;

    #[test]
    fn test_no_arguments() {
        let output = chartgen(&[]);
        assert_eq!(output.status.code(), Some(1));
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_too_many_arguments() {
        let output = chartgen(&[&document("mocha.yaml"), &document("mocha.yaml")]);
        assert_eq!(output.status.code(), Some(1));
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_unknown_option() {
        let output = chartgen(&["--frobnicate", &document("mocha.yaml")]);
        assert_eq!(output.status.code(), Some(1));
    }

    #[test]
    fn test_invalid_git_timeout() {
        let output = chartgen(&["--git-timeout", "soon", &document("mocha.yaml")]);
        assert_eq!(output.status.code(), Some(1));
    }

    #[test]
    fn test_help() {
        let output = chartgen(&["--help"]);
        assert_eq!(output.status.code(), Some(0));
        assert!(stdout(&output).contains("FILE"));
    }
}

mod generate {
    use super::*;

    #[test]
    fn test_primary_manifest_then_hook() {
        let output = chartgen(&[&document("mocha.yaml")]);
        assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

        let out = stdout(&output);
        assert!(out.starts_with("---\n# Source: mocha/templates/pod.yaml\napiVersion: v1\nkind: Pod\n"));
        assert!(out.contains("  name: mocha\n  namespace: dog\n"));
        assert!(out.contains("    app.kubernetes.io/managed-by: chartgen\n"));
        assert!(out.contains("      image: rancher/rancher:stable\n"));

        let (primary, hook) = out.split_once("\n\n---\n").expect("hook separator");
        assert!(!primary.contains("kind: Job"));
        assert!(hook.starts_with("apiVersion: batch/v1\nkind: Job\nmetadata:\n  name: mocha-post-install\n"));
        assert!(hook.ends_with("image: rancher/pause"));

        assert!(!out.contains("installed."), "NOTES.txt is not rendered");
        assert!(!out.contains("macro"), "helpers are not rendered");
    }

    #[test]
    fn test_inline_override_changes_one_line() {
        let base = stdout(&chartgen(&[&document("mocha.yaml")]));
        let output = chartgen(&[&document("mocha-inline.yaml")]);
        assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
        let changed = stdout(&output);

        let diff: Vec<_> = base
            .lines()
            .zip(changed.lines())
            .filter(|(a, b)| a != b)
            .collect();
        assert_eq!(
            diff,
            vec![("      image: rancher/rancher:stable", "      image: rancher/rancher:latest")]
        );
        assert_eq!(base.lines().count(), changed.lines().count());
    }

    #[test]
    fn test_value_files_then_inline_string() {
        let output = chartgen(&[&document("mocha-layered.yaml")]);
        assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

        let out = stdout(&output);
        assert!(out.contains("  name: latte\n"), "releaseName overrides metadata.name");
        assert!(out.contains("      image: registry.example.com/rancher:2.8.5\n"));
        assert!(out.ends_with("image: rancher/pause:3.9"));
    }

    #[cfg(unix)]
    #[test]
    fn test_encrypted_values_win() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sops = dir.path().join("fake-sops");
        std::fs::write(
            &sops,
            "#!/bin/sh\nfor last; do :; done\nsed 's/^ENC //' \"$last\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&sops, std::fs::Permissions::from_mode(0o755)).unwrap();

        std::fs::write(dir.path().join("plain.yaml"), "image:\n  tag: from-file\n").unwrap();
        std::fs::write(dir.path().join("secrets.yaml"), "ENC image:\nENC   tag: from-sops\n")
            .unwrap();
        let doc = dir.path().join("doc.yaml");
        std::fs::write(
            &doc,
            format!(
                "apiVersion: p1.dsop.io/v1beta1\nkind: HelmChart\nmetadata:\n  name: mocha\nchart:\n  path: {}\nvalueFiles: [plain.yaml]\nvalues:\n  image:\n    tag: from-inline\nsopsValueFiles: [secrets.yaml]\n",
                fixtures_path().join("charts/mocha").display()
            ),
        )
        .unwrap();

        let output = chartgen(&[
            "--sops-binary",
            &sops.display().to_string(),
            &doc.display().to_string(),
        ]);
        assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
        assert!(stdout(&output).contains("      image: rancher/rancher:from-sops\n"));
        assert!(stdout(&output).contains("  namespace: default\n"));
    }

    #[test]
    fn test_debug_logs_go_to_stderr() {
        let output = chartgen(&["--debug", &document("mocha.yaml")]);
        assert_eq!(output.status.code(), Some(0));
        assert!(stdout(&output).starts_with("---\n# Source: "));
        assert!(stderr(&output).contains("generating manifests"));
    }
}

mod failures {
    use super::*;

    #[test]
    fn test_missing_document() {
        let output = chartgen(&[&document("nope.yaml")]);
        assert_failed_cleanly(&output);
    }

    #[test]
    fn test_wrong_kind() {
        let output = chartgen(&[&document("wrong-kind.yaml")]);
        assert_failed_cleanly(&output);
        assert!(stderr(&output).contains("Kustomization"));
    }

    #[test]
    fn test_multiple_chart_sources() {
        let output = chartgen(&[&document("two-sources.yaml")]);
        assert_failed_cleanly(&output);
        assert!(stderr(&output).contains("mutually exclusive"));
    }

    #[test]
    fn test_missing_chart() {
        let output = chartgen(&[&document("missing-chart.yaml")]);
        assert_failed_cleanly(&output);
        assert!(stderr(&output).contains("Cannot acquire chart"));
    }

    #[test]
    fn test_missing_value_file() {
        let output = chartgen(&[&document("missing-values.yaml")]);
        assert_failed_cleanly(&output);
        assert!(stderr(&output).contains("does-not-exist.yaml"));
    }

    #[test]
    fn test_template_error() {
        let output = chartgen(&[&document("broken.yaml")]);
        assert_failed_cleanly(&output);
        assert!(stderr(&output).contains("templates/cm.yaml"));
    }

    #[test]
    fn test_unrepairable_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let chart = dir.path().join("app");
        std::fs::create_dir_all(chart.join("templates")).unwrap();
        std::fs::write(
            chart.join("Chart.yaml"),
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n  - name: redis\n    version: ^2\n",
        )
        .unwrap();
        std::fs::write(chart.join("templates/cm.yaml"), "kind: ConfigMap\n").unwrap();
        let doc = dir.path().join("doc.yaml");
        std::fs::write(
            &doc,
            "apiVersion: p1.dsop.io/v1beta1\nkind: HelmChart\nmetadata:\n  name: app\nchart:\n  path: app\n",
        )
        .unwrap();

        let output = chartgen(&[&doc.display().to_string()]);
        assert_failed_cleanly(&output);
        assert!(stderr(&output).contains("redis"));
    }
}

mod dependencies {
    use super::*;

    #[test]
    fn test_local_dependency_is_repaired_once() {
        let dir = tempfile::tempdir().unwrap();
        let write = |path: &str, content: &str| {
            let path = dir.path().join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        };

        write(
            "app/Chart.yaml",
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n  - name: cache\n    version: ^1\n    repository: file://../cache\n",
        );
        write("app/values.yaml", "cache:\n  size: 64\n");
        write(
            "app/templates/cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{ release.name }}\n",
        );
        write("cache/Chart.yaml", "apiVersion: v2\nname: cache\nversion: 1.2.0\n");
        write("cache/values.yaml", "size: 16\n");
        write(
            "cache/templates/cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{ release.name }}-cache\ndata:\n  size: \"{{ values.size }}\"\n",
        );
        write(
            "doc.yaml",
            "apiVersion: p1.dsop.io/v1beta1\nkind: HelmChart\nmetadata:\n  name: shop\nchart:\n  path: app\n",
        );

        let output = chartgen(&[&dir.path().join("doc.yaml").display().to_string()]);
        assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

        let out = stdout(&output);
        assert!(out.contains("# Source: app/charts/cache/templates/cm.yaml\n"));
        assert!(out.contains("  size: \"64\""));
        assert!(dir.path().join("app/charts/cache-1.2.0.tgz").is_file());

        let log = stderr(&output);
        assert!(log.contains("WARN"), "repair is logged: {log}");
        assert!(!log.contains('\u{1b}'), "no colour codes on a pipe: {log:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_interrupt_during_repair() {
        use std::net::TcpListener;
        use std::process::Stdio;
        use std::time::{Duration, Instant};

        // Accepts connections into the backlog and never answers
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let dir = tempfile::tempdir().unwrap();
        let chart = dir.path().join("app");
        std::fs::create_dir_all(chart.join("templates")).unwrap();
        std::fs::write(
            chart.join("Chart.yaml"),
            format!(
                "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n  - name: redis\n    version: ^2\n    repository: http://127.0.0.1:{port}\n"
            ),
        )
        .unwrap();
        std::fs::write(chart.join("templates/cm.yaml"), "kind: ConfigMap\n").unwrap();
        let doc = dir.path().join("doc.yaml");
        std::fs::write(
            &doc,
            "apiVersion: p1.dsop.io/v1beta1\nkind: HelmChart\nmetadata:\n  name: app\nchart:\n  path: app\n",
        )
        .unwrap();

        let mut child = Command::new(env!("CARGO_BIN_EXE_chartgen"))
            .arg(&doc)
            .env_remove("CHARTGEN_LOG")
            .env_remove("CHARTGEN_DEBUG")
            .env("CHARTGEN_REPOSITORY_CONFIG", "/nonexistent/chartgen/repositories.yaml")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        std::thread::sleep(Duration::from_millis(1500));
        let status = Command::new("kill")
            .args(["-INT", &child.id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let deadline = Instant::now() + Duration::from_secs(10);
        while child.try_wait().unwrap().is_none() {
            if Instant::now() > deadline {
                child.kill().unwrap();
                panic!("chartgen kept running after SIGINT");
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        let output = child.wait_with_output().unwrap();
        assert_failed_cleanly(&output);
        assert!(stderr(&output).contains("Operation cancelled"));
        drop(listener);
    }
}
