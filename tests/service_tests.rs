mod common;

use agentforge::db::{PersistenceGateway, TursoClient};
use agentforge::types::{AppError, Caller};
use agentforge::workflows::{
    parse, DataTransformer, TransformMappings, WorkflowConfig, WorkflowConfigService,
};
use common::mocks::{RecordingGateway, StaticSniffer};
use std::sync::Arc;

const V1: &str = r#"
workflows:
  - superagent:
      name: Support
      llm: gpt-4-0613
      prompt: p1
      tools:
        - browser:
            name: web
"#;

const V2: &str = r#"
workflows:
  - superagent:
      name: Support
      llm: gpt-4-0613
      prompt: p2
      tools:
        - browser:
            name: web
"#;

fn service() -> (Arc<RecordingGateway>, WorkflowConfigService) {
    let gateway = Arc::new(RecordingGateway::new());
    let transformer =
        DataTransformer::new(TransformMappings::default(), Arc::new(StaticSniffer::default()));
    let service = WorkflowConfigService::new(gateway.clone(), transformer);
    (gateway, service)
}

#[tokio::test]
async fn test_malformed_yaml_makes_no_gateway_calls() {
    let (gateway, service) = service();
    let caller = Caller::new("user-1");
    let config = service.create(&caller, None).await.unwrap();
    gateway.clear_calls();

    let err = service
        .reconcile(&config.id, "workflows: [unclosed", &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Parse(_)));

    let err = service
        .reconcile(&config.id, "workflows:\n  - superagent:\n      name: x\n", &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_reconcile_records_history_and_uses_it_as_baseline() {
    let (gateway, service) = service();
    let caller = Caller::new("user-1");
    let config = service.create(&caller, Some("support")).await.unwrap();
    gateway.clear_calls();

    let first = service.reconcile(&config.id, V1, &caller).await.unwrap();
    assert!(first.success);
    assert_eq!(first.report.agents.created, 1);
    assert_eq!(
        gateway.calls(),
        [
            "create_agent:Support",
            "create_tool:Support/web",
            "attach_tool:Support/web",
            "create_history",
            "set_latest_history",
        ]
    );

    gateway.clear_calls();
    let second = service.reconcile(&config.id, V2, &caller).await.unwrap();
    assert_eq!(
        gateway.calls(),
        ["update_agent:Support", "create_history", "set_latest_history"]
    );
    assert_eq!(second.report.agents.updated, 1);

    let record = service.load(&config.id, &caller).await.unwrap();
    assert_eq!(record.latest_history_id.as_deref(), Some(second.history_id.as_str()));

    let latest = service.latest_config(&record).await.unwrap();
    assert_eq!(latest, Some(parse(V2).unwrap()));

    let history = service.history(&config.id, &caller).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.history_id);
    assert_eq!(history[1].id, first.history_id);
    assert_eq!(
        WorkflowConfig::from_json(&history[1].config_file).unwrap(),
        parse(V1).unwrap()
    );
}

#[tokio::test]
async fn test_reapplying_same_config_only_appends_history() {
    let (gateway, service) = service();
    let caller = Caller::new("user-1");
    let config = service.create(&caller, None).await.unwrap();
    service.reconcile(&config.id, V1, &caller).await.unwrap();
    gateway.clear_calls();

    let outcome = service.reconcile(&config.id, V1, &caller).await.unwrap();

    assert_eq!(outcome.report.mutations(), 0);
    assert_eq!(gateway.calls(), ["create_history", "set_latest_history"]);
}

#[tokio::test]
async fn test_failed_run_writes_no_history() {
    let (gateway, service) = service();
    let caller = Caller::new("user-1");
    let config = service.create(&caller, None).await.unwrap();
    gateway.fail_on("create_tool");

    let err = service.reconcile(&config.id, V1, &caller).await.unwrap_err();

    assert!(matches!(err, AppError::Gateway(_)));
    assert!(!gateway.calls().iter().any(|c| c == "create_history"));
    assert_eq!(gateway.agents().len(), 1);

    let record = service.load(&config.id, &caller).await.unwrap();
    assert_eq!(record.latest_history_id, None);
}

const WITH_DOCS: &str = r#"
workflows:
  - superagent:
      name: Support
      llm: gpt-4-0613
      prompt: p1
      tools:
        - browser:
            name: web
      data:
        urls:
          - https://example.com/a.pdf
"#;

fn docs_transformer() -> DataTransformer {
    let sniffer = StaticSniffer::new([("https://example.com/a.pdf", "application/pdf")]);
    DataTransformer::new(TransformMappings::default(), Arc::new(sniffer))
}

#[tokio::test]
async fn test_rerun_after_failure_reuses_leftover_records() {
    let gateway = Arc::new(RecordingGateway::new());
    let service = WorkflowConfigService::new(gateway.clone(), docs_transformer());
    let caller = Caller::new("user-1");
    let config = service.create(&caller, None).await.unwrap();

    let err = service
        .reconcile(&config.id, WITH_DOCS, &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingVectorDatabaseProvider(_)));

    gateway.seed_vector_database("user-1", "pinecone");
    gateway.clear_calls();
    let outcome = service
        .reconcile(&config.id, WITH_DOCS, &caller)
        .await
        .unwrap();

    assert_eq!(
        gateway.calls(),
        [
            "update_agent:Support",
            "update_tool:Support/web",
            "attach_tool:Support/web",
            "create_datasource:Support/https://example.com/a.pdf",
            "attach_datasource:Support/https://example.com/a.pdf",
            "create_history",
            "set_latest_history",
        ]
    );
    assert_eq!(outcome.report.agents.created, 0);
    assert_eq!(outcome.report.agents.updated, 1);
    assert_eq!(gateway.agents().len(), 1);
    assert_eq!(gateway.tools().len(), 1);
    assert_eq!(gateway.datasources().len(), 1);
}

#[tokio::test]
async fn test_rerun_after_failure_converges_in_database() {
    let turso = Arc::new(TursoClient::new_memory().await.unwrap());
    let service = WorkflowConfigService::new(turso.clone(), docs_transformer());
    let caller = Caller::new("user-1");
    let config = service.create(&caller, None).await.unwrap();

    service
        .reconcile(&config.id, WITH_DOCS, &caller)
        .await
        .unwrap_err();

    turso
        .create_vector_database("user-1", "pinecone", &Default::default())
        .await
        .unwrap();
    service
        .reconcile(&config.id, WITH_DOCS, &caller)
        .await
        .unwrap();
    // A second successful run diffs against history and changes nothing
    let outcome = service
        .reconcile(&config.id, WITH_DOCS, &caller)
        .await
        .unwrap();
    assert_eq!(outcome.report.mutations(), 0);

    let agents = turso.list_agents(&config.id).await.unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(turso.agent_tools(&agents[0].id).await.unwrap().len(), 1);
    assert_eq!(turso.agent_datasources(&agents[0].id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_foreign_workflow_config_is_not_found() {
    let (gateway, service) = service();
    let owner = Caller::new("user-1");
    let intruder = Caller::new("user-2");
    let config = service.create(&owner, None).await.unwrap();
    gateway.clear_calls();

    let err = service.reconcile(&config.id, V1, &intruder).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = service.history(&config.id, &intruder).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_workflow_config_is_not_found() {
    let (_, service) = service();

    let err = service
        .reconcile("missing", V1, &Caller::new("user-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}
