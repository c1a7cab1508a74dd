//! CLI argument parsing and plan inspection commands.

mod common;

use clap::Parser;
use std::path::PathBuf;

use swarmcore::cli::commands::{ready, status, validate};
use swarmcore::cli::{Cli, Commands};
use swarmcore::domain::models::{Config, TodoStatus};
use swarmcore::infrastructure::PlanStore;

use common::graph_with;

#[test]
fn test_parse_validate() {
    let cli = Cli::try_parse_from(["swarmcore", "validate", "plan.yaml"]).unwrap();

    match cli.command {
        Commands::Validate(args) => assert_eq!(args.plan, PathBuf::from("plan.yaml")),
        other => panic!("Wrong command: {other:?}"),
    }
    assert!(!cli.json);
}

#[test]
fn test_global_options() {
    let cli = Cli::try_parse_from([
        "swarmcore",
        "status",
        "plan.json",
        "--json",
        "--config",
        "custom.yaml",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    assert!(matches!(cli.command, Commands::Status(_)));
}

#[test]
fn test_missing_plan_argument_is_rejected() {
    assert!(Cli::try_parse_from(["swarmcore", "ready"]).is_err());
}

#[tokio::test]
async fn test_commands_run_against_saved_plan() {
    let dir = tempfile::tempdir().unwrap();
    let plan = dir.path().join("plan.json");
    let graph = graph_with(&[("a", &[], &["a1"]), ("b", &["a"], &["b1"])]).await;
    let todo = graph.todos("a").await.unwrap()[0].id;
    graph
        .set_todo_status("a", todo, TodoStatus::Completed)
        .await
        .unwrap();
    PlanStore::new(&plan).unwrap().save_graph(&graph).await.unwrap();

    validate::execute(validate::ValidateArgs { plan: plan.clone() }, true)
        .await
        .unwrap();
    ready::execute(ready::ReadyArgs { plan: plan.clone() }, false)
        .await
        .unwrap();
    status::execute(status::StatusArgs { plan }, &Config::default(), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_validate_reports_unknown_dependency() {
    let dir = tempfile::tempdir().unwrap();
    let plan = dir.path().join("plan.yaml");
    tokio::fs::write(
        &plan,
        "groups:\n  - group_id: a\n    dependencies: [ghost]\n",
    )
    .await
    .unwrap();

    let err = validate::execute(validate::ValidateArgs { plan }, false)
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("ghost"));
}
