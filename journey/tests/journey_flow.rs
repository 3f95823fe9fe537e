//! End-to-end journeys over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use flowpath::layout::{column_for_index, Anchor, Column};
use flowpath::{BlockType, ContentBlock, LearningNode, NodeStatus};
use journey::{FlowJourney, JourneyConfig, JourneyEvent, MockStore, NodeEntry, XpOutcome};
use playback::{ManualTimer, Playback, PlaybackError, Step};

fn text(id: &str, order: u32) -> ContentBlock {
    ContentBlock::new(id, order, BlockType::Text, json!({"content": "Read me"}))
}

fn mcq(id: &str, order: u32, correct: usize) -> ContentBlock {
    ContentBlock::new(
        id,
        order,
        BlockType::Mcq,
        json!({
            "question": "Which one?",
            "options": ["zero", "one", "two"],
            "correctAnswerIndex": correct,
            "explanation": "Because."
        }),
    )
}

fn video(id: &str, order: u32) -> ContentBlock {
    ContentBlock::new(id, order, BlockType::Video, json!({"videoUrl": "https://cdn.example.com/clip.mp4"}))
}

fn flow() -> Vec<LearningNode> {
    vec![
        LearningNode::new("n1", "Basics", 0)
            .with_status(NodeStatus::Current)
            .with_xp(10)
            .with_block(text("n1-b1", 1))
            .with_block(mcq("n1-b2", 2, 1)),
        LearningNode::new("n2", "Watch", 1)
            .with_xp(15)
            .with_block(text("n2-b1", 1))
            .with_block(video("n2-b2", 2))
            .with_block(text("n2-b3", 3)),
        LearningNode::new("n3", "Wrap up", 2)
            .with_xp(20)
            .with_block(text("n3-b1", 1)),
    ]
}

async fn load(store: Arc<MockStore>, timer: Arc<ManualTimer>) -> FlowJourney {
    assert_ok!(FlowJourney::load(store, timer, JourneyConfig::default(), "learner-1", "flow-1").await)
}

fn enter(journey: &FlowJourney, node_id: &str) -> Playback {
    match assert_ok!(journey.open_node(node_id)) {
        NodeEntry::Ready(playback) => playback,
        NodeEntry::Locked { message } => panic!("{} unexpectedly locked: {}", node_id, message),
    }
}

fn assert_progression_invariant(journey: &FlowJourney) {
    let nodes = journey.nodes();
    let current = nodes.iter().filter(|n| n.status == NodeStatus::Current).count();
    assert!(current <= 1, "more than one current node");

    if let Some(first_locked) = nodes.iter().position(|n| n.status == NodeStatus::Locked) {
        for node in &nodes[first_locked..] {
            assert!(
                !matches!(node.status, NodeStatus::Available | NodeStatus::Current),
                "{} reachable past a locked node",
                node.id
            );
        }
    }
}

#[tokio::test]
async fn test_example_node_scenario() {
    let store = Arc::new(MockStore::new().with_flow("flow-1", flow()));
    let timer = Arc::new(ManualTimer::new());
    let mut journey = load(store.clone(), timer.clone()).await;

    let mut playback = enter(&journey, "n1");
    timer.advance_secs(8);
    assert_eq!(assert_ok!(playback.acknowledge()), Step::Advanced { index: 1 });

    assert_ok!(playback.select_option(0));
    let wrong = assert_ok!(playback.submit_answer());
    assert!(!wrong.feedback.correct);
    assert_eq!(wrong.feedback.explanation.as_deref(), Some("Because."));
    assert_eq!(playback.progress().current_index, 1);

    timer.advance_secs(4);
    assert_ok!(playback.select_option(1));
    let right = assert_ok!(playback.submit_answer());
    let completion = right.step.completion().cloned().expect("node should complete");
    assert_eq!(completion.blocks_completed, 2);
    assert_eq!(completion.time_spent_seconds, 12);

    let report = assert_ok!(journey.finish_playback(&playback).await);
    assert!(report.persisted());
    assert_eq!(report.xp, XpOutcome::Awarded(10));
    assert_eq!(journey.snapshot().current().map(|n| n.id.as_str()), Some("n2"));
    assert_eq!(store.progress_calls(), 1);
    assert_progression_invariant(&journey);
}

#[tokio::test]
async fn test_full_flow_walkthrough() {
    let store = Arc::new(MockStore::new().with_flow("flow-1", flow()));
    let timer = Arc::new(ManualTimer::new());
    let mut journey = load(store.clone(), timer.clone()).await;
    let mut events = journey.events().subscribe();

    // n1
    let mut playback = enter(&journey, "n1");
    assert_ok!(playback.advance());
    assert_ok!(playback.select_option(1));
    assert_ok!(playback.submit_answer());
    assert_ok!(journey.finish_playback(&playback).await);
    assert_progression_invariant(&journey);

    // n2, with a video gate in the middle
    let mut playback = enter(&journey, "n2");
    assert_ok!(playback.acknowledge());
    timer.advance(Duration::from_millis(2999));
    assert_eq!(
        assert_err!(playback.acknowledge()),
        PlaybackError::VideoNotReady { remaining_ms: 1 }
    );
    timer.advance(Duration::from_millis(1));
    assert_eq!(assert_ok!(playback.acknowledge()), Step::Advanced { index: 2 });
    assert!(matches!(assert_ok!(playback.acknowledge()), Step::NodeComplete(_)));
    assert_ok!(journey.finish_playback(&playback).await);
    assert_progression_invariant(&journey);

    // n3
    let mut playback = enter(&journey, "n3");
    assert_ok!(playback.acknowledge());
    let report = assert_ok!(journey.finish_playback(&playback).await);
    assert!(report.transition.flow_complete);
    assert!(journey.snapshot().current().is_none());

    let progress = journey.progress();
    assert_eq!(progress.completed, 3);
    assert_eq!(progress.percent, 100);
    assert_eq!(progress.xp_earned, 45);
    assert_eq!(store.xp_awards().await.iter().map(|(_, xp)| xp).sum::<u32>(), 45);

    let mut saw_flow_completed = false;
    while let Ok(event) = events.try_recv() {
        if let JourneyEvent::FlowCompleted { flow_id } = event {
            assert_eq!(flow_id, "flow-1");
            saw_flow_completed = true;
        }
    }
    assert!(saw_flow_completed);
}

#[tokio::test]
async fn test_locked_node_cannot_start_playback() {
    let store = Arc::new(MockStore::new().with_flow("flow-1", flow()));
    let journey = load(store, Arc::new(ManualTimer::new())).await;

    assert!(matches!(
        assert_ok!(journey.open_node("n3")),
        NodeEntry::Locked { .. }
    ));
    assert_err!(journey.open_node("missing"));
}

#[tokio::test]
async fn test_exit_mid_node_saves_nothing() {
    let store = Arc::new(MockStore::new().with_flow("flow-1", flow()));
    let timer = Arc::new(ManualTimer::new());
    let journey = load(store.clone(), timer.clone()).await;

    let mut playback = enter(&journey, "n1");
    assert_ok!(playback.acknowledge());
    let abandoned = playback.exit();
    assert_eq!(abandoned.blocks_passed, 1);
    assert_eq!(store.progress_calls(), 0);
    assert_eq!(journey.snapshot().status("n1"), Some(NodeStatus::Current));
}

#[tokio::test]
async fn test_persistence_failure_then_recovery() {
    let store = Arc::new(MockStore::new().with_flow("flow-1", flow()).with_failing_progress(true));
    let timer = Arc::new(ManualTimer::new());
    let mut journey = load(store.clone(), timer).await;

    let mut playback = enter(&journey, "n1");
    assert_ok!(playback.acknowledge());
    assert_ok!(playback.select_option(1));
    assert_ok!(playback.submit_answer());
    let report = assert_ok!(journey.finish_playback(&playback).await);
    assert!(!report.persisted());
    assert_eq!(store.xp_calls(), 0);

    // learner keeps going even though the save failed
    store.set_fail_progress(false);
    let mut playback = enter(&journey, "n2");
    assert_ok!(playback.acknowledge());
    assert!(playback.video_ready() == Some(false));
    assert_progression_invariant(&journey);
}

#[tokio::test]
async fn test_layout_follows_column_pattern() {
    let nodes: Vec<LearningNode> = (0..14)
        .map(|i| LearningNode::new(format!("n{}", i), format!("Node {}", i), i))
        .collect();
    let store = Arc::new(MockStore::new().with_flow("flow-1", nodes));
    let journey = load(store, Arc::new(ManualTimer::new())).await;

    let first = journey.layout();
    let second = journey.layout();
    assert_eq!(first, second);

    let expected = [
        Column::Center,
        Column::Right,
        Column::Center,
        Column::Left,
        Column::Center,
        Column::Right,
        Column::Center,
        Column::Left,
        Column::Center,
        Column::Right,
        Column::Center,
        Column::Left,
    ];
    for (i, node) in first.positioned.iter().enumerate() {
        assert_eq!(node.column, expected[i % 12]);
        assert_eq!(node.column, column_for_index(i));
    }

    // center -> right leaves from the right edge and lands on the top edge
    let connector = &first.connectors[0];
    assert_eq!(connector.start, first.positioned[0].anchor(Anchor::Right));
    assert_eq!(connector.end, first.positioned[1].anchor(Anchor::Top));
    assert_eq!(first.connector_paths().len(), 13);
}
