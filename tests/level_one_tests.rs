mod common;

use async_trait::async_trait;
use common::*;
use insightgraph::prompts::LEVEL_ONE_SUFFIX;
use insightgraph::reasoning::ContentItem;
use insightgraph::store::NodeStore;
use insightgraph::{EventHandler, GraphError, GraphEvent};
use std::sync::{Arc, Mutex};

fn three_candidates() -> ScriptedReasoning {
    ScriptedReasoning::new().on(INITIAL, "Here you go: ~Prompt A~ ~Prompt B~ ~Prompt C~")
}

#[tokio::test]
async fn test_create_hub_seeds_identity_and_root_context() {
    let reasoning = Arc::new(ScriptedReasoning::new());
    let (builder, store) = engine(reasoning.clone(), Arc::new(ScriptedSearch::default()), fast_config());

    let seed = builder.create_hub("weather.csv", b"temp,rain\n20,1".to_vec()).await.unwrap();

    assert_eq!(seed.hub.file_name, "weather.csv");
    assert_eq!(seed.hub.identity_id, "asst_test");
    assert_eq!(seed.root_context, "thread_1");
    assert_eq!(store.get_hub(&seed.hub.id).await.unwrap(), Some(seed.hub.clone()));
}

#[tokio::test]
async fn test_failing_branch_does_not_stop_siblings() {
    let reasoning = Arc::new(three_candidates().fail_on("Prompt B"));
    let config = fast_config().with_candidate_prompt_count(3);
    let (builder, store) = engine(reasoning.clone(), Arc::new(ScriptedSearch::default()), config);

    let seed = builder.create_hub("weather.csv", vec![1, 2, 3]).await.unwrap();
    let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();

    assert_eq!(report.created.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].branch, 1);
    match &report.failures[0].error {
        GraphError::ServiceExhausted { prompt, attempts } => {
            assert!(prompt.starts_with("Prompt B"));
            assert_eq!(*attempts, 5);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(reasoning.runs_for("Prompt B"), 5);

    for node in &report.created {
        assert_eq!(node.hub_id, seed.hub.id);
        assert!(node.is_root());
    }
    let prompts: Vec<_> = report.created.iter().map(|n| n.prompt.clone()).collect();
    assert_eq!(
        prompts,
        vec![
            format!("Prompt A{}", LEVEL_ONE_SUFFIX),
            format!("Prompt C{}", LEVEL_ONE_SUFFIX)
        ]
    );
    assert_eq!(store.nodes_for_hub(&seed.hub.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_branch_persists_title_questions_and_images() {
    let reasoning = Arc::new(
        ScriptedReasoning::new()
            .on(INITIAL, "~Prompt A~")
            .on_items(
                LEVEL_ONE,
                None,
                vec![
                    ContentItem::Text("Rain tracks humidity.".into()),
                    ContentItem::Artifact("file-chart".into()),
                    ContentItem::Text("r = 0.82".into()),
                ],
            )
            .on(TITLE, r#"{"title": "Humidity predicts rain", "surprising": 7}"#)
            .on(QUESTIONS, "~Is it causal?~\n~What about wind?~\n~Which season?~")
            .with_artifact("file-chart", vec![0x89, 0x50, 0x4e, 0x47]),
    );
    let config = fast_config().with_candidate_prompt_count(1);
    let (builder, _store) = engine(reasoning.clone(), Arc::new(ScriptedSearch::default()), config);

    let seed = builder.create_hub("weather.csv", vec![]).await.unwrap();
    let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();
    let node = &report.created[0];

    assert_eq!(node.text, "Rain tracks humidity.\nr = 0.82");
    assert_eq!(node.title, "Humidity predicts rain");
    let questions: Vec<_> = node.questions.iter().map(|q| q.content.as_str()).collect();
    assert_eq!(questions, vec!["Is it causal?", "What about wind?", "Which season?"]);
    assert!(node.questions.iter().all(|q| q.node_id == node.id));

    assert_eq!(node.images.len(), 1);
    assert!(node.images[0].url.starts_with("http://localhost:8001/images/"));
    let image = builder.image(&node.images[0].id).await.unwrap();
    assert_eq!(image.data, vec![0x89, 0x50, 0x4e, 0x47]);

    // The branch ran entirely on its own context.
    assert_ne!(node.context_id, seed.root_context);
    let history = reasoning.prompts_on(&node.context_id);
    assert_eq!(history.len(), 3);
    assert!(history[1].contains(TITLE));
    assert!(history[2].contains(QUESTIONS));
}

#[tokio::test]
async fn test_every_branch_gets_its_own_context() {
    let reasoning = Arc::new(three_candidates());
    let config = fast_config().with_candidate_prompt_count(3);
    let (builder, _store) = engine(reasoning.clone(), Arc::new(ScriptedSearch::default()), config);

    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();

    let mut contexts: Vec<_> = report.created.iter().map(|n| n.context_id.clone()).collect();
    contexts.push(seed.root_context.clone());
    contexts.sort();
    contexts.dedup();
    assert_eq!(contexts.len(), 4);
}

#[tokio::test]
async fn test_candidate_count_mismatch_is_tolerated() {
    // Fewer candidates than asked for.
    let reasoning = Arc::new(ScriptedReasoning::new().on(INITIAL, "~Prompt A~~Prompt B~"));
    let (builder, _store) = engine(reasoning, Arc::new(ScriptedSearch::default()), fast_config());
    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();
    assert_eq!(report.created.len(), 2);
    assert!(report.failures.is_empty());

    // More candidates than asked for.
    let reasoning = Arc::new(three_candidates());
    let config = fast_config().with_candidate_prompt_count(2);
    let (builder, _store) = engine(reasoning, Arc::new(ScriptedSearch::default()), config);
    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();
    assert_eq!(report.branches(), 2);
    assert_eq!(report.created.len(), 2);
}

#[tokio::test]
async fn test_surprise_gate_suppresses_low_scores_only_when_enabled() {
    let script = || {
        ScriptedReasoning::new()
            .on(INITIAL, "~Prompt A~~Prompt B~")
            .on_within(TITLE, "Prompt A", r#"{"title": "Rows exist", "surprising": 2}"#)
            .on_within(TITLE, "Prompt B", r#"{"title": "Rain lags humidity", "surprising": 9}"#)
    };

    let config = fast_config().with_candidate_prompt_count(2).with_surprise_gate(true);
    let (builder, store) = engine(Arc::new(script()), Arc::new(ScriptedSearch::default()), config);
    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();

    assert_eq!(report.suppressed, vec![(0, 2)]);
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].title, "Rain lags humidity");
    assert_eq!(store.nodes_for_hub(&seed.hub.id).await.unwrap().len(), 1);

    let config = fast_config().with_candidate_prompt_count(2);
    let (builder, _store) = engine(Arc::new(script()), Arc::new(ScriptedSearch::default()), config);
    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();

    assert!(report.suppressed.is_empty());
    assert_eq!(report.created.len(), 2);
}

#[tokio::test]
async fn test_unrecoverable_title_fails_only_that_branch() {
    let reasoning = Arc::new(
        ScriptedReasoning::new()
            .on(INITIAL, "~Prompt A~~Prompt B~")
            .on_within(TITLE, "Prompt B", "   "),
    );
    let config = fast_config().with_candidate_prompt_count(2);
    let (builder, _store) = engine(reasoning, Arc::new(ScriptedSearch::default()), config);

    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();

    assert_eq!(report.created.len(), 1);
    assert!(matches!(report.failures[0].error, GraphError::Parse(_)));
}

#[tokio::test]
async fn test_root_exchange_failure_aborts_the_build() {
    let reasoning = Arc::new(ScriptedReasoning::new().fail_on(INITIAL));
    let (builder, store) = engine(reasoning.clone(), Arc::new(ScriptedSearch::default()), fast_config());

    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    let err = builder
        .build_initial_graph(&seed.hub, &seed.root_context)
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::ServiceExhausted { attempts: 5, .. }));
    assert_eq!(reasoning.runs.load(std::sync::atomic::Ordering::SeqCst), 5);
    assert!(store.nodes_for_hub(&seed.hub.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_spawned_build_can_be_awaited() {
    let reasoning = Arc::new(ScriptedReasoning::new().on(INITIAL, "~Prompt A~"));
    let (builder, store) = engine(reasoning, Arc::new(ScriptedSearch::default()), fast_config());

    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    let handle = builder.spawn_initial_graph(seed.hub.clone(), seed.root_context.clone());
    let report = handle.await.unwrap().unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(builder.hub_nodes(&seed.hub.id).await.unwrap(), report.created);
    assert_eq!(store.nodes_for_hub(&seed.hub.id).await.unwrap().len(), 1);
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<GraphEvent>>,
}

#[async_trait]
impl EventHandler for Recorder {
    async fn on_graph_event(&self, event: &GraphEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[tokio::test]
async fn test_fan_out_events() {
    let recorder = Arc::new(Recorder::default());
    let reasoning = Arc::new(three_candidates().fail_on("Prompt C"));
    let config = fast_config().with_candidate_prompt_count(3);
    let (builder, _store) = engine(reasoning, Arc::new(ScriptedSearch::default()), config);
    let builder = builder.with_event_handler(recorder.clone());

    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();

    let events = recorder.events.lock().unwrap();
    assert!(matches!(events.first(), Some(GraphEvent::FanOutStarted { branches: 3, anchor_id: None, .. })));
    assert!(matches!(
        events.last(),
        Some(GraphEvent::FanOutCompleted { created: 2, suppressed: 0, failed: 1, .. })
    ));
    let started = events.iter().filter(|e| matches!(e, GraphEvent::BranchStarted { .. })).count();
    let persisted = events.iter().filter(|e| matches!(e, GraphEvent::NodePersisted { .. })).count();
    assert_eq!(started, 3);
    assert_eq!(persisted, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, GraphEvent::BranchFailed { branch: 2, .. })));
}

#[tokio::test]
async fn test_blank_candidates_are_skipped() {
    let reasoning = Arc::new(ScriptedReasoning::new().on(INITIAL, "~Prompt A~ ~~ ~Prompt B~"));
    let config = fast_config().with_candidate_prompt_count(3);
    let (builder, store) = engine(reasoning, Arc::new(ScriptedSearch::default()), config);

    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();

    assert_eq!(report.branches(), 2);
    assert_eq!(report.created.len(), 2);
    assert!(report.created.iter().all(|n| n.prompt != LEVEL_ONE_SUFFIX));
    assert_eq!(report.created[1].prompt, format!("Prompt B{}", LEVEL_ONE_SUFFIX));
    assert_eq!(store.nodes_for_hub(&seed.hub.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_branch_outcome_follows_its_own_node() {
    let recorder = Arc::new(Recorder::default());
    let reasoning = Arc::new(three_candidates().fail_on("Prompt B"));
    let config = fast_config().with_candidate_prompt_count(3).with_max_workers(1);
    let (builder, _store) = engine(reasoning, Arc::new(ScriptedSearch::default()), config);
    let builder = builder.with_event_handler(recorder.clone());

    let seed = builder.create_hub("d.csv", vec![]).await.unwrap();
    builder.build_initial_graph(&seed.hub, &seed.root_context).await.unwrap();

    let events = recorder.events.lock().unwrap();
    let position = |wanted: &dyn Fn(&GraphEvent) -> bool| events.iter().position(|e| wanted(e)).unwrap();
    let started = |b: usize| position(&|e| matches!(e, GraphEvent::BranchStarted { branch, .. } if *branch == b));
    let completed = |b: usize| position(&|e| matches!(e, GraphEvent::BranchCompleted { branch, .. } if *branch == b));
    let failed = position(&|e| matches!(e, GraphEvent::BranchFailed { branch: 1, .. }));
    let first_persisted = position(&|e| matches!(e, GraphEvent::NodePersisted { .. }));
    let fan_out_done = position(&|e| matches!(e, GraphEvent::FanOutCompleted { .. }));

    // One worker: each branch reports its outcome before the next one starts.
    assert!(started(0) < first_persisted);
    assert!(first_persisted < completed(0));
    assert!(completed(0) < started(1));
    assert!(started(1) < failed);
    assert!(failed < started(2));
    assert!(started(2) < completed(2));
    assert!(completed(2) < fan_out_done);
}
