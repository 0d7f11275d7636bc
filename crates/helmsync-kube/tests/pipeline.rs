//! End-to-end runs of the load, validate and cluster stages against the
//! shared fixtures and a scripted kubectl.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use helmsync_core::{
    AwsCliParameterStore, LoadOptions, LoadedState, SubstitutionConfig, Substitutor,
    ValidateOptions, Validation, validate,
};
use helmsync_kube::{
    BootstrapStage, ClusterSession, CommandExecutor, CommandOutput, KubeError, MockExecutor,
    SessionOptions,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(name)
}

fn load(name: &str) -> LoadedState {
    let params = AwsCliParameterStore::default();
    let subst = Substitutor::new(SubstitutionConfig::default(), &params).with_env(|_| None);
    LoadedState::load(&fixture(name), &subst, &LoadOptions::default()).unwrap()
}

fn session(mock: &MockExecutor) -> (tempfile::TempDir, ClusterSession) {
    let work = tempfile::tempdir().unwrap();
    let options = SessionOptions {
        work_dir: Some(work.path().to_path_buf()),
        ..Default::default()
    };
    let session = ClusterSession::new(Arc::new(mock.clone()), options).unwrap();
    (work, session)
}

#[tokio::test]
async fn test_basic_state_end_to_end() {
    let mut loaded = load("basic.yaml");
    let outcome = validate(&mut loaded.state, &ValidateOptions::default()).unwrap();
    assert_eq!(outcome, Validation::Valid);

    let mock = MockExecutor::new();
    let (work, session) = session(&mock);
    let report = session.run(&mut loaded.state).await.unwrap();

    assert_eq!(report.context, "test");
    assert_eq!(report.stage, BootstrapStage::Done);
    assert_eq!(mock.calls_matching(&["create", "namespace"]).len(), 1);
    assert_eq!(mock.calls_matching(&["label"]).len(), 1);
    assert_eq!(
        mock.calls_matching(&["label"])[0].args,
        vec!["label", "--overwrite", "namespace/prod", "team=infra"]
    );
    assert!(report.owned.is_empty());

    assert!(work.path().join("ca.crt").is_file());
    assert!(work.path().join("ca.key").is_file());
}

#[tokio::test]
async fn test_toml_state_matches_yaml() {
    let yaml = load("basic.yaml");
    let toml = load("basic.toml");

    assert_eq!(yaml.state.settings, toml.state.settings);
    assert_eq!(yaml.state.apps["myapp"].chart, toml.state.apps["myapp"].chart);
    assert_eq!(
        yaml.state.namespaces["prod"].labels,
        toml.state.namespaces["prod"].labels
    );
}

#[tokio::test]
async fn test_second_reconcile_tolerates_existing_namespace() {
    let mut loaded = load("basic.yaml");
    validate(&mut loaded.state, &ValidateOptions::default()).unwrap();

    let mock = MockExecutor::new();
    mock.respond(
        &["create", "namespace"],
        CommandOutput::failed(1, "Error from server (AlreadyExists): namespaces \"prod\" already exists"),
    );
    mock.respond_once(&["create", "namespace"], CommandOutput::ok("namespace/prod created"));
    let (_work, session) = session(&mock);

    let first = session.reconcile_namespaces(&mut loaded.state).await.unwrap();
    let second = session.reconcile_namespaces(&mut loaded.state).await.unwrap();

    assert_eq!(first.created, vec!["prod"]);
    assert_eq!(second.existing, vec!["prod"]);
    assert_eq!(mock.calls_matching(&["label"]).len(), 2);
}

#[tokio::test]
async fn test_managed_release_discovered_once() {
    let mut loaded = load("basic.yaml");
    validate(&mut loaded.state, &ValidateOptions::default()).unwrap();

    let mock = MockExecutor::new();
    mock.respond(
        &["get", "secret"],
        CommandOutput::ok("NAME       TYPE                 DATA   AGE\nmyapp.v1   helm.sh/release.v1   1      2d\nmyapp.v2   helm.sh/release.v1   1      1d\n"),
    );
    let (_work, session) = session(&mock);

    let owned = session.discover_owned(&loaded.state).await.unwrap();

    assert_eq!(owned.len(), 1);
    assert!(owned.is_owned("prod", "myapp"));
}

#[tokio::test]
async fn test_bootstrap_failure_stops_pipeline() {
    let mut loaded = load("basic.yaml");
    validate(&mut loaded.state, &ValidateOptions::default()).unwrap();

    let mock = MockExecutor::new();
    mock.respond(
        &["config", "set-credentials"],
        CommandOutput::failed(1, "error: cannot write kubeconfig"),
    );
    let (_work, session) = session(&mock);

    let err = session.run(&mut loaded.state).await.unwrap_err();

    assert!(err.to_string().contains("[ test ]"));
    assert!(mock.calls_matching(&["create"]).is_empty());
    assert!(mock.calls_matching(&["get"]).is_empty());
}

/// Executor whose programs can never be started
struct MissingBinary;

#[async_trait]
impl CommandExecutor for MissingBinary {
    async fn exec(&self, program: &str, _args: &[String]) -> helmsync_kube::Result<CommandOutput> {
        Err(KubeError::Spawn {
            program: program.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        })
    }
}

#[tokio::test]
async fn test_unstartable_kubectl_names_context() {
    let mut loaded = load("basic.yaml");
    validate(&mut loaded.state, &ValidateOptions::default()).unwrap();
    let work = tempfile::tempdir().unwrap();
    let options = SessionOptions {
        work_dir: Some(work.path().to_path_buf()),
        ..Default::default()
    };
    let session = ClusterSession::new(Arc::new(MissingBinary), options).unwrap();

    let err = session.connect(&mut loaded.state).await.unwrap_err();

    match &err {
        KubeError::ContextSetup { context, stage, message } => {
            assert_eq!(context, "test");
            assert_eq!(*stage, BootstrapStage::CertsFetched);
            assert!(message.contains("No such file"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("[ test ]"));
}

#[tokio::test]
async fn test_registered_context_outlives_scratch_dir() {
    let mut loaded = load("basic.yaml");
    validate(&mut loaded.state, &ValidateOptions::default()).unwrap();

    let mock = MockExecutor::new();
    let session = ClusterSession::new(Arc::new(mock.clone()), SessionOptions::default()).unwrap();
    let scratch = session.work_dir().to_path_buf();
    session.connect(&mut loaded.state).await.unwrap();
    drop(session);
    assert!(!scratch.exists());

    let registrations: Vec<_> = mock
        .calls()
        .into_iter()
        .filter(|call| {
            call.args
                .iter()
                .any(|arg| arg.contains(&*scratch.to_string_lossy()))
        })
        .collect();
    assert_eq!(registrations.len(), 2);
    for call in registrations {
        assert!(
            call.args.contains(&"--embed-certs=true".to_string()),
            "file reference without embedding: {:?}",
            call.args
        );
    }
}
