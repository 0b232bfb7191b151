use crate::engine::raw::{AUTO_CAPITALIZE_PROPERTY, MODULE_NAME, OPTION_AUTO_CAPITALIZE};
use crate::engine::{Callback, EngineContext, EngineHost, EngineInstance, ModuleRegistry};
use crate::error::engine::EngineError;
use crate::session::InstanceId;

use models::{IseInfo, IseMode, KeyEvent, key_event::mask};

use async_trait::async_trait;

/// Records emitted callbacks and answers queries from a fixed text.
#[derive(Default)]
struct FakeContext {
    emitted: Vec<Callback>,
    surrounding: Option<(String, u32)>,
    queries: usize,
}

#[async_trait]
impl EngineContext for FakeContext {
    fn emit(&mut self, callback: Callback) {
        self.emitted.push(callback);
    }

    async fn surrounding_text(
        &mut self,
        _max_before: u32,
        _max_after: u32,
    ) -> Option<(String, u32)> {
        self.queries += 1;
        self.surrounding.clone()
    }

    async fn selection(&mut self) -> Option<String> {
        None
    }
}

fn raw_info(uuid: &str, option: u32) -> IseInfo {
    IseInfo {
        name: "Raw".to_string(),
        uuid: uuid.to_string(),
        module: MODULE_NAME.to_string(),
        language: "en".to_string(),
        icon: String::new(),
        mode: IseMode::Keyboard,
        option,
        locales: vec!["en_US.UTF-8".to_string()],
        description: String::new(),
    }
}

fn host_with(infos: &[IseInfo]) -> EngineHost {
    let mut host = EngineHost::new(ModuleRegistry::default());
    host.load_factories(infos);
    host
}

fn instance(option: u32) -> Box<dyn EngineInstance> {
    let mut host = host_with(&[raw_info("raw", option)]);
    let id = host.new_instance("raw", "UTF-8").unwrap();
    host.take_instance(id).unwrap()
}

/// **VALUE**: Verifies a printable key is committed and consumed.
///
/// **WHY THIS MATTERS**: This is the whole job of the built-in engine.
///
/// **BUG THIS CATCHES**: Would catch the commit being emitted without reporting the key
/// as consumed, which makes the client insert it twice.
#[tokio::test]
async fn given_printable_key_when_processed_then_committed_and_consumed() {
    // GIVEN: A raw instance without auto-capitalisation
    let mut engine = instance(0);
    let mut ctx = FakeContext::default();

    // WHEN: Processing 'a'
    let consumed = engine.process_key_event(&KeyEvent::from_char('a'), &mut ctx).await;

    // THEN: Consumed, committed as typed, no query made
    assert!(consumed);
    assert_eq!(ctx.emitted, vec![Callback::CommitString("a".to_string())]);
    assert_eq!(ctx.queries, 0);
}

/// **VALUE**: Verifies releases and modified keys pass through untouched.
///
/// **WHY THIS MATTERS**: Shortcuts like Ctrl+C must reach the application.
///
/// **BUG THIS CATCHES**: Would catch the modifier check being dropped.
#[tokio::test]
async fn given_release_or_control_key_when_processed_then_not_consumed() {
    let mut engine = instance(0);
    let mut ctx = FakeContext::default();
    let mut release = KeyEvent::from_char('a');
    release.mask |= mask::RELEASE;
    let mut control = KeyEvent::from_char('c');
    control.mask |= mask::CONTROL;

    assert!(!engine.process_key_event(&release, &mut ctx).await);
    assert!(!engine.process_key_event(&control, &mut ctx).await);
    assert!(ctx.emitted.is_empty());
}

/// **VALUE**: Verifies sentence-start capitalisation asks the client and applies the answer.
///
/// **WHY THIS MATTERS**: This is the path that exercises a continuation query from inside
/// an engine call.
///
/// **BUG THIS CATCHES**: Would catch the caret offset being ignored and the whole
/// surrounding text inspected.
#[tokio::test]
async fn given_auto_capitalize_when_after_full_stop_then_uppercased() {
    // GIVEN: Caret right after "Done. " with text continuing after it
    let mut engine = instance(OPTION_AUTO_CAPITALIZE);
    let mut ctx = FakeContext {
        surrounding: Some(("Done. next".to_string(), 6)),
        ..FakeContext::default()
    };

    // WHEN: Typing 'n'
    engine.process_key_event(&KeyEvent::from_char('n'), &mut ctx).await;

    // THEN: One query, upper-case commit
    assert_eq!(ctx.queries, 1);
    assert_eq!(ctx.emitted, vec![Callback::CommitString("N".to_string())]);
}

/// **VALUE**: Verifies mid-sentence letters and unanswered queries commit as typed.
///
/// **WHY THIS MATTERS**: A client that cannot answer must still get its keystroke.
///
/// **BUG THIS CATCHES**: Would catch a missing answer dropping the key.
#[tokio::test]
async fn given_auto_capitalize_when_mid_sentence_or_unanswered_then_as_typed() {
    let mut engine = instance(OPTION_AUTO_CAPITALIZE);

    let mut mid = FakeContext {
        surrounding: Some(("hello wor".to_string(), 9)),
        ..FakeContext::default()
    };
    engine.process_key_event(&KeyEvent::from_char('l'), &mut mid).await;
    assert_eq!(mid.emitted, vec![Callback::CommitString("l".to_string())]);

    let mut silent = FakeContext::default();
    assert!(engine.process_key_event(&KeyEvent::from_char('d'), &mut silent).await);
    assert_eq!(silent.emitted, vec![Callback::CommitString("d".to_string())]);
}

/// **VALUE**: Verifies triggering the property toggles it and reports the new state.
///
/// **WHY THIS MATTERS**: The panel shows the property button from these updates.
///
/// **BUG THIS CATCHES**: Would catch the update carrying the state from before the toggle.
#[tokio::test]
async fn given_property_trigger_when_handled_then_state_toggled() {
    let mut engine = instance(0);
    let mut ctx = FakeContext::default();

    engine.trigger_property(AUTO_CAPITALIZE_PROPERTY, &mut ctx).await;

    match ctx.emitted.as_slice() {
        [Callback::UpdateProperty(property)] => assert!(property.active),
        other => panic!("unexpected callbacks {other:?}"),
    }
}

/// **VALUE**: Verifies instance ids increase and unknown factories are refused.
///
/// **WHY THIS MATTERS**: Ids are what clients and the ownership repository key on.
///
/// **BUG THIS CATCHES**: Would catch an id reused after deletion.
#[test]
fn given_host_when_creating_instances_then_ids_unique_and_unknown_uuid_rejected() {
    // GIVEN: A host with one raw factory
    let mut host = host_with(&[raw_info("raw", 0)]);

    // WHEN: Creating, deleting and creating again
    let first = host.new_instance("raw", "UTF-8").unwrap();
    assert!(host.delete_instance(first));
    let second = host.new_instance("raw", "utf-8").unwrap();

    // THEN: Ids differ; unknown uuid and unsupported encoding fail
    assert_eq!(first, InstanceId::new(1));
    assert_eq!(second, InstanceId::new(2));
    assert!(matches!(
        host.new_instance("missing", "UTF-8"),
        Err(EngineError::UnknownFactory { .. })
    ));
    assert!(matches!(
        host.new_instance("raw", "ISO-8859-1"),
        Err(EngineError::InstanceCreation { .. })
    ));
}

/// **VALUE**: Verifies entries for unavailable modules and helper entries get no factory.
///
/// **WHY THIS MATTERS**: The catalogue lists every installed ISE, but only keyboard
/// entries with a built-in module can run in the broker.
///
/// **BUG THIS CATCHES**: Would catch one bad entry aborting the whole factory load.
#[test]
fn given_mixed_catalogue_when_loading_factories_then_only_buildable_keyboards_loaded() {
    let mut missing = raw_info("other", 0);
    missing.module = "not-built-in".to_string();
    let mut helper = raw_info("helper", 0);
    helper.mode = IseMode::Helper;

    let host = host_with(&[raw_info("raw", 0), missing, helper]);

    assert_eq!(host.factory_uuids(""), vec!["raw"]);
    assert_eq!(host.factory_count(), 1);
}
