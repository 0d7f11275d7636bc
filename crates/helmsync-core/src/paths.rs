//! Resolution of state-file-relative paths
//!
//! Every relative reference in a desired-state document is relative to the
//! directory of the document itself. After resolution the model only holds
//! absolute paths, repository-qualified chart names, or bucket URIs.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::location::is_request_uri;
use crate::state::{App, DesiredState};
use crate::subst::Substitutor;

/// Make `relative` absolute against `dir`, lexically removing `.` and `..`.
pub fn absolutize(dir: &Path, relative: &str) -> String {
    let joined = dir.join(relative);
    let absolute = std::path::absolute(&joined).unwrap_or(joined);
    clean(&absolute).to_string_lossy().into_owned()
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Directory containing the state file
pub fn state_dir(state_file: &Path) -> PathBuf {
    match state_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Resolve values/secrets files, local charts, the bearer token path and
/// certificate paths against the state file's directory.
pub fn resolve_paths(state: &mut DesiredState, state_file: &Path, subst: &Substitutor<'_>) {
    let dir = state_dir(state_file);

    let repo_charts: BTreeSet<String> = state
        .apps
        .iter()
        .filter(|(_, app)| state.chart_repository(&app.chart).is_some())
        .map(|(label, _)| label.clone())
        .collect();

    for (label, app) in state.apps.iter_mut() {
        for file in value_files_mut(app) {
            *file = absolutize(&dir, file);
        }

        if !app.chart.is_empty() && !repo_charts.contains(label) {
            // Not repository-qualified, so a local chart directory.
            let chart = subst.expand_env(&app.chart);
            app.chart = if Path::new(&chart).is_absolute() {
                chart
            } else {
                absolutize(&dir, &chart)
            };
        }
    }

    let token_path = &mut state.settings.bearer_token_path;
    if !token_path.is_empty() && !is_request_uri(token_path) {
        *token_path = absolutize(&dir, token_path);
    }

    for value in state.certificates.values_mut() {
        if !is_request_uri(value) {
            *value = absolutize(&dir, value);
        }
    }
}

/// Substitute variables inside every referenced values/secrets file and
/// point the model at the rewritten copies under `scratch`.
///
/// References to files that do not exist are left alone so validation can
/// report them against the owning app.
pub fn rewrite_value_files(
    state: &mut DesiredState,
    subst: &Substitutor<'_>,
    scratch: &Path,
) -> Result<()> {
    let mut index = 0usize;
    for app in state.apps.values_mut() {
        for file in value_files_mut(app) {
            let source = Path::new(file.as_str());
            if !source.is_file() {
                continue;
            }
            let copy = substitute_into(source, subst, &scratch.join(format!("tmp{index}")))?;
            *file = copy;
            index += 1;
        }
    }
    Ok(())
}

fn substitute_into(source: &Path, subst: &Substitutor<'_>, dir: &Path) -> Result<String> {
    tracing::debug!(file = %source.display(), "substituting variables in values file");

    let content = fs::read_to_string(source).map_err(|e| CoreError::ReadState {
        path: source.display().to_string(),
        source: e,
    })?;
    let content = subst.substitute_values(&content)?;

    fs::create_dir_all(dir)?;
    let target = match source.file_name() {
        Some(name) => dir.join(name),
        None => dir.join("values.yaml"),
    };
    fs::write(&target, content)?;
    Ok(target.to_string_lossy().into_owned())
}

/// Every non-empty values/secrets file reference of an app
fn value_files_mut(app: &mut App) -> impl Iterator<Item = &mut String> {
    std::iter::once(&mut app.values_file)
        .chain(app.values_files.iter_mut())
        .chain(std::iter::once(&mut app.secrets_file))
        .chain(app.secrets_files.iter_mut())
        .filter(|f| !f.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subst::{ParameterStore, SubstitutionConfig};

    struct NoParams;

    impl ParameterStore for NoParams {
        fn get(&self, name: &str, _with_decryption: bool) -> Result<String> {
            Err(CoreError::Parameter {
                name: name.to_string(),
                message: "unexpected lookup".to_string(),
            })
        }
    }

    fn env(name: &str) -> Option<String> {
        (name == "CHARTS").then(|| "/opt/charts".to_string())
    }

    fn app(chart: &str) -> App {
        App {
            chart: chart.to_string(),
            ..App::default()
        }
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(absolutize(Path::new("/srv/state"), "certs/ca.crt"), "/srv/state/certs/ca.crt");
        assert_eq!(absolutize(Path::new("/srv/state"), "../charts/app"), "/srv/charts/app");
        assert_eq!(absolutize(Path::new("/srv/state"), "./values.yaml"), "/srv/state/values.yaml");
    }

    #[test]
    fn test_chart_resolution() {
        let store = NoParams;
        let subst = Substitutor::new(SubstitutionConfig::default(), &store).with_env(env);

        let mut state = DesiredState::default();
        state
            .helm_repos
            .insert("stable".to_string(), "https://charts.example.com".to_string());
        state.preconfigured_helm_repos.push("private".to_string());
        state.apps.insert("repo".to_string(), app("stable/nginx"));
        state.apps.insert("preconfigured".to_string(), app("private/api"));
        state.apps.insert("local".to_string(), app("charts/web"));
        state.apps.insert("env".to_string(), app("$CHARTS/worker"));
        state.apps.insert("absolute".to_string(), app("/abs/chart"));

        resolve_paths(&mut state, Path::new("/srv/state/desired.yaml"), &subst);

        assert_eq!(state.apps["repo"].chart, "stable/nginx");
        assert_eq!(state.apps["preconfigured"].chart, "private/api");
        assert_eq!(state.apps["local"].chart, "/srv/state/charts/web");
        assert_eq!(state.apps["env"].chart, "/opt/charts/worker");
        assert_eq!(state.apps["absolute"].chart, "/abs/chart");
    }

    #[test]
    fn test_local_dir_named_like_repo_is_repository_chart() {
        let store = NoParams;
        let subst = Substitutor::new(SubstitutionConfig::default(), &store);

        let mut state = DesiredState::default();
        state
            .helm_repos
            .insert("charts".to_string(), "https://charts.example.com".to_string());
        state.apps.insert("web".to_string(), app("charts/web"));

        resolve_paths(&mut state, Path::new("/srv/state/desired.yaml"), &subst);

        assert_eq!(state.apps["web"].chart, "charts/web");
    }

    #[test]
    fn test_certificates_and_token_resolution() {
        let store = NoParams;
        let subst = Substitutor::new(SubstitutionConfig::default(), &store);

        let mut state = DesiredState::default();
        state.settings.bearer_token_path = "secrets/token".to_string();
        state
            .certificates
            .insert("caCrt".to_string(), "s3://bucket/ca.crt".to_string());
        state
            .certificates
            .insert("caKey".to_string(), "certs/ca.key".to_string());
        state
            .certificates
            .insert("caClient".to_string(), "/etc/client.crt".to_string());

        resolve_paths(&mut state, Path::new("/srv/state/desired.toml"), &subst);

        assert_eq!(state.settings.bearer_token_path, "/srv/state/secrets/token");
        assert_eq!(state.certificates["caCrt"], "s3://bucket/ca.crt");
        assert_eq!(state.certificates["caKey"], "/srv/state/certs/ca.key");
        assert_eq!(state.certificates["caClient"], "/etc/client.crt");
    }

    #[test]
    fn test_rewrite_value_files() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("values.yaml"), "image: ${CHARTS}/img\n").unwrap();
        std::fs::write(dir.path().join("extra.yaml"), "replicas: 2\n").unwrap();

        let store = NoParams;
        let subst = Substitutor::new(SubstitutionConfig::default(), &store).with_env(env);

        let mut state = DesiredState::default();
        let mut web = app("stable/web");
        web.values_file = "values.yaml".to_string();
        web.values_files = vec!["extra.yaml".to_string(), "missing.yaml".to_string()];
        state.apps.insert("web".to_string(), web);

        let state_file = dir.path().join("desired.yaml");
        resolve_paths(&mut state, &state_file, &subst);
        rewrite_value_files(&mut state, &subst, scratch.path()).unwrap();

        let web = &state.apps["web"];
        assert!(web.values_file.starts_with(&*scratch.path().to_string_lossy()));
        assert!(web.values_file.ends_with("values.yaml"));
        assert_eq!(
            std::fs::read_to_string(&web.values_file).unwrap(),
            "image: /opt/charts/img\n"
        );
        assert_eq!(std::fs::read_to_string(&web.values_files[0]).unwrap(), "replicas: 2\n");
        // untouched so validation can name it
        assert!(web.values_files[1].ends_with("missing.yaml"));
        assert!(!web.values_files[1].starts_with(&*scratch.path().to_string_lossy()));
        // the source file is left as written
        assert_eq!(
            std::fs::read_to_string(dir.path().join("values.yaml")).unwrap(),
            "image: ${CHARTS}/img\n"
        );
    }
}
