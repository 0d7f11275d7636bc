//! Integration tests for CLI commands

use std::process::Command;

/// Helper to run helmsync command
fn helmsync(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_helmsync"))
        .args(args)
        .env("RUST_LOG", "warn")
        .env_remove("HELMSYNC_KUBECTL")
        .output()
        .expect("Failed to execute helmsync")
}

/// Get the fixtures path
fn fixtures_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures")
}

fn fixture(name: &str) -> String {
    format!("{}/{}", fixtures_path(), name)
}

mod validate_command {
    use super::*;

    #[test]
    fn test_validate_valid_state() {
        let output = helmsync(&["--no-color", "validate", "-f", &fixture("basic.yaml")]);

        assert!(output.status.success(), "Expected success for valid state");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("is valid"));
        assert!(stdout.contains("1 apps"));
    }

    #[test]
    fn test_validate_toml_state() {
        let output = helmsync(&["validate", "-f", &fixture("basic.toml")]);
        assert!(output.status.success(), "Expected success for TOML state");
    }

    #[test]
    fn test_validate_missing_certificate() {
        let output = helmsync(&["validate", "-f", &fixture("missing-cert.yaml")]);

        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("caCrt"), "stderr: {stderr}");
    }

    #[test]
    fn test_validate_no_apps_is_success() {
        let output = helmsync(&["validate", "-f", &fixture("no-apps.yaml")]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("declares no apps"));
    }

    #[test]
    fn test_validate_unknown_field() {
        let output = helmsync(&["validate", "-f", &fixture("unknown-field.yaml")]);

        assert_eq!(output.status.code(), Some(4));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("kubeContxt"), "stderr: {stderr}");
    }

    #[test]
    fn test_validate_ns_override_moves_app() {
        let output = helmsync(&[
            "validate",
            "-f",
            &fixture("basic.yaml"),
            "--ns-override",
            "sandbox",
        ]);
        assert!(output.status.success());
    }

    #[test]
    fn test_validate_missing_file() {
        let output = helmsync(&["validate", "-f", &fixture("nope.yaml")]);
        assert!(!output.status.success());
    }
}

mod show_command {
    use super::*;

    #[test]
    fn test_show_resolved_state() {
        let output = helmsync(&["--no-color", "show", "-f", &fixture("basic.yaml")]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("myapp"));
        assert!(stdout.contains("prod"));
        assert!(stdout.contains("stable"));
        assert!(!stdout.contains("secret"), "password must not be printed");
    }

    #[test]
    fn test_show_without_default_repos() {
        let output = helmsync(&[
            "--no-color",
            "show",
            "-f",
            &fixture("basic.yaml"),
            "--no-default-repos",
        ]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(!stdout.contains("incubator"));
    }
}

#[cfg(unix)]
mod reconcile_command {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// A kubectl that succeeds at everything and lists nothing
    fn fake_kubectl(dir: &std::path::Path) -> String {
        let path = dir.join("kubectl");
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_reconcile_with_fake_kubectl() {
        let dir = tempfile::tempdir().unwrap();
        let kubectl = fake_kubectl(dir.path());
        let work = dir.path().join("work");

        let output = helmsync(&[
            "--no-color",
            "reconcile",
            "-f",
            &fixture("basic.yaml"),
            "--kubectl",
            &kubectl,
            "--work-dir",
            &work.display().to_string(),
        ]);

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(output.status.success(), "stderr: {stderr}");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Connected to kube context test"));
        assert!(stdout.contains("Namespace prod created"));
        assert!(stdout.contains("No helmsync-managed releases found"));
        assert!(work.join("ca.crt").is_file());
    }

    #[test]
    fn test_reconcile_failing_kubectl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubectl");
        std::fs::write(&path, "#!/bin/sh\necho 'error: permission denied' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let output = helmsync(&[
            "reconcile",
            "-f",
            &fixture("basic.yaml"),
            "--kubectl",
            &path.display().to_string(),
            "--work-dir",
            &dir.path().join("work").display().to_string(),
        ]);

        assert_eq!(output.status.code(), Some(6));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("denied"), "stderr: {stderr}");
    }
}
