use std::path::PathBuf;

use keepsake_core::{
    load_config, parse_config, FlowConfig, FlowError, GalleryConfig, ScreenFlowController,
};
use keepsake_schema::{CompletionCause, FlowEvent, MemoryGroup, QuestionId, RotationCause, ScreenId};
use tokio::time::{Duration, Instant};

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn fixture() -> FlowConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/flow.yaml");
    load_config(&path).unwrap()
}

fn short_gallery(mut config: FlowConfig) -> FlowConfig {
    config.gallery = Some(GalleryConfig {
        groups: vec![
            MemoryGroup::new("A"),
            MemoryGroup::new("B"),
            MemoryGroup::new("C"),
        ],
        period_ms: 1_000,
        deadline_ms: Some(3_500),
        captions: vec![],
    });
    config
}

fn started(config: FlowConfig) -> ScreenFlowController {
    let mut flow = ScreenFlowController::new(config).unwrap();
    flow.start();
    flow
}

fn feeling_before() -> QuestionId {
    QuestionId::new("feeling-before")
}

fn feeling_after() -> QuestionId {
    QuestionId::new("feeling-after")
}

#[test]
fn worried_answer_branches_to_video_after_delay() {
    let mut flow = started(fixture());
    let t0 = Instant::now();
    flow.advance(t0).unwrap();

    let target = flow
        .submit_answer(&feeling_before(), "A little worried", t0)
        .unwrap();
    assert_eq!(target, ScreenId::Video(0));

    flow.poll(t0 + flow.answer_delay()).unwrap();
    assert_eq!(flow.current_screen(), ScreenId::Video(0));
    assert_eq!(flow.current_video(), Some("birthday-message"));
}

#[test]
fn unmatched_answer_takes_default_route() {
    let yaml = r#"
questions:
  - id: feeling
    prompt: "How do you feel?"
    options: [good, worried]
routes:
  - { from: welcome, to: "question:0" }
  - { from: "question:0", when: { equals: worried }, to: "video:0" }
  - { from: "question:0", when: { equals: good }, to: reassurance_text }
  - { from: "question:0", to: reassurance_text }
  - { from: "video:0", to: reassurance_text }
  - { from: reassurance_text, to: surprise }
videos: [birthday-message]
"#;
    let config = parse_config(yaml).unwrap();
    let question = QuestionId::new("feeling");

    let mut flow = started(config.clone());
    let t0 = Instant::now();
    flow.advance(t0).unwrap();
    assert_eq!(flow.submit_answer(&question, "worried", t0).unwrap(), ScreenId::Video(0));
    flow.poll(t0 + ms(500)).unwrap();
    assert_eq!(flow.current_screen(), ScreenId::Video(0));

    let mut flow = started(config);
    flow.advance(t0).unwrap();
    assert_eq!(
        flow.submit_answer(&question, "unknown", t0).unwrap(),
        ScreenId::ReassuranceText
    );
    flow.poll(t0 + ms(500)).unwrap();
    assert_eq!(flow.current_screen(), ScreenId::ReassuranceText);
}

#[test]
fn gallery_deadline_scenario_through_controller() {
    let mut flow = started(short_gallery(fixture()));
    let t0 = Instant::now();
    flow.advance(t0).unwrap();
    flow.submit_answer(&feeling_before(), "Good, honestly", t0).unwrap();
    flow.poll(t0 + ms(500)).unwrap();
    assert_eq!(flow.current_screen(), ScreenId::ReassuranceText);

    let g0 = t0 + ms(1_000);
    flow.acknowledge(g0).unwrap();
    assert_eq!(flow.current_screen(), ScreenId::Gallery);
    flow.take_events();

    let expected = [(1_000, "B"), (2_000, "C"), (3_000, "A")];
    assert_eq!(flow.current_group().unwrap().id.as_str(), "A");
    for (offset, group) in expected {
        flow.poll(g0 + ms(offset)).unwrap();
        assert_eq!(flow.current_group().unwrap().id.as_str(), group);
    }

    flow.poll(g0 + ms(3_499)).unwrap();
    assert_eq!(flow.current_screen(), ScreenId::Gallery);
    flow.poll(g0 + ms(3_500)).unwrap();
    assert_eq!(flow.current_screen(), ScreenId::Question(1));

    let events = flow.take_events();
    let indices: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            FlowEvent::CarouselIndexChanged {
                index,
                cause: RotationCause::Tick,
                ..
            } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(indices, vec![1, 2, 0]);
    let completions = events
        .iter()
        .filter(|event| {
            matches!(
                event,
                FlowEvent::GalleryCompleted {
                    cause: CompletionCause::Deadline,
                    ..
                }
            )
        })
        .count();
    assert_eq!(completions, 1);
}

#[test]
fn restart_neutralizes_every_pending_timer() {
    let mut flow = started(short_gallery(fixture()));
    let t0 = Instant::now();
    flow.advance(t0).unwrap();
    flow.submit_answer(&feeling_before(), "Neutral", t0).unwrap();
    flow.poll(t0 + ms(500)).unwrap();
    flow.acknowledge(t0 + ms(600)).unwrap();
    flow.poll(t0 + ms(1_600)).unwrap();
    assert_eq!(flow.carousel().unwrap().index(), 1);

    flow.restart();
    flow.take_events();
    assert_eq!(flow.current_screen(), ScreenId::Welcome);
    assert!(flow.answers().is_empty());
    assert_eq!(flow.next_deadline(), None);

    for offset in [2_600, 4_100, 60_000] {
        flow.poll(t0 + ms(offset)).unwrap();
    }
    assert_eq!(flow.current_screen(), ScreenId::Welcome);
    assert!(flow.take_events().is_empty());
}

#[test]
fn full_walk_reaches_surprise_with_matching_closing() {
    let mut flow = started(fixture());
    let mut now = Instant::now();

    flow.advance(now).unwrap();
    assert_eq!(flow.progress().unwrap().percent(), 50);
    flow.submit_answer(&feeling_before(), "A little worried", now).unwrap();
    now += ms(500);
    flow.poll(now).unwrap();

    assert_eq!(flow.acknowledge(now).unwrap(), ScreenId::ReassuranceText);
    assert_eq!(flow.acknowledge(now).unwrap(), ScreenId::Gallery);
    assert_eq!(flow.current_group().unwrap().id.as_str(), "family-picnic-2015");

    flow.next_memory(now).unwrap();
    assert_eq!(flow.current_group().unwrap().id.as_str(), "first-birthday");
    assert_eq!(flow.on_gallery_complete(now).unwrap(), ScreenId::Question(1));
    assert_eq!(flow.progress().unwrap().percent(), 100);

    flow.submit_answer(&feeling_after(), "Good!", now).unwrap();
    now += ms(500);
    flow.poll(now).unwrap();
    assert_eq!(flow.current_screen(), ScreenId::Affirmation);
    assert_eq!(flow.acknowledge(now).unwrap(), ScreenId::FinalClosure);
    assert_eq!(flow.acknowledge(now).unwrap(), ScreenId::Surprise);

    assert_eq!(
        flow.closing_message(),
        "See, Mum? 60 looks absolutely radiant on you!"
    );
    assert_eq!(flow.answers().len(), 2);

    let err = flow.acknowledge(now).unwrap_err();
    assert!(matches!(
        err,
        FlowError::InvalidTransition {
            from: ScreenId::Surprise,
            ..
        }
    ));
}

#[test]
fn worried_after_gets_reassuring_closing() {
    let mut flow = started(fixture());
    let now = Instant::now();

    flow.advance(now).unwrap();
    flow.submit_answer(&feeling_before(), "Good, honestly", now).unwrap();
    flow.poll(now + ms(500)).unwrap();
    flow.acknowledge(now + ms(500)).unwrap();
    flow.on_gallery_complete(now + ms(500)).unwrap();
    flow.submit_answer(&feeling_after(), "Still a little worried", now + ms(500))
        .unwrap();
    flow.poll(now + ms(1_000)).unwrap();

    assert_eq!(flow.current_screen(), ScreenId::FinalClosure);
    assert!(flow.closing_message().starts_with("It's okay to feel a little unsure."));
}
