use crate::proxy_tests::helpers::{
    CAPS_UUID, RAW_UUID, RecordingCallbacks, proxy_settings, start_server, test_config, test_dir,
};

use panel_core::error::proxy::ProxyError;
use panel_core::proxy::{NoCallbacks, ProxySettings, RemoteEngineProxy};

use models::KeyEvent;
use models::key_event::mask;

use tokio::sync::oneshot;

/// **VALUE**: Verifies a proxy lists factories from the broker's catalogue and drives an
/// instance end to end.
///
/// **WHY THIS MATTERS**: This is how an application embeds remote keyboards.
///
/// **BUG THIS CATCHES**: Would catch callbacks not being routed back to the local handle,
/// or the language filter matching helper entries.
#[tokio::test]
async fn given_running_broker_when_proxy_drives_instance_then_callbacks_delivered() {
    // GIVEN: A broker serving the raw keyboards
    let dir = test_dir();
    let config = test_config(dir.path());
    let server = start_server(&config, dir.path()).await;
    let settings = proxy_settings(&config);
    let (stop, stopped) = oneshot::channel::<()>();

    // WHEN: A proxy connects, creates an instance and types 'q'
    let client = async move {
        let mut proxy = RemoteEngineProxy::connect(settings).await.unwrap();
        let mut callbacks = RecordingCallbacks::default();
        let handle = proxy.create_instance(RAW_UUID, "UTF-8").await.unwrap();
        let consumed = proxy
            .process_key_event(handle, &KeyEvent::from_char('q'), &mut callbacks)
            .await
            .unwrap();
        let german = proxy.factory_list("de");
        let name = proxy.factory_name(RAW_UUID).map(str::to_string);
        stop.send(()).unwrap();
        (handle, consumed, callbacks, german, name)
    };
    let (served, (handle, consumed, callbacks, german, name)) = tokio::join!(
        server.run(async move {
            let _ = stopped.await;
        }),
        client
    );

    // THEN: Consumed, one commit for our handle, metadata from the catalogue
    served.unwrap();
    assert!(consumed);
    assert_eq!(callbacks.commits(), vec!["q"]);
    assert_eq!(callbacks.received[0].0, handle);
    assert_eq!(german, vec!["raw-de".to_string()]);
    assert_eq!(name.as_deref(), Some("Raw English"));
}

/// **VALUE**: Verifies a key the engine declines comes back as `Ok(false)`, not an error.
///
/// **WHY THIS MATTERS**: Applications run their own shortcut handling for declined keys
/// and their error handling for failed requests.
///
/// **BUG THIS CATCHES**: Would catch a declined key surfacing as `ProxyError::Rejected`.
#[tokio::test]
async fn given_shortcut_key_when_sent_through_proxy_then_not_consumed() {
    let dir = test_dir();
    let config = test_config(dir.path());
    let server = start_server(&config, dir.path()).await;
    let settings = proxy_settings(&config);
    let (stop, stopped) = oneshot::channel::<()>();

    let client = async move {
        let mut proxy = RemoteEngineProxy::connect(settings).await.unwrap();
        let mut callbacks = RecordingCallbacks::default();
        let handle = proxy.create_instance(RAW_UUID, "UTF-8").await.unwrap();
        let consumed = proxy
            .process_key_event(
                handle,
                &KeyEvent::new(u32::from('c'), mask::CONTROL),
                &mut callbacks,
            )
            .await;
        stop.send(()).unwrap();
        (consumed, callbacks)
    };
    let (served, (consumed, callbacks)) = tokio::join!(
        server.run(async move {
            let _ = stopped.await;
        }),
        client
    );

    served.unwrap();
    assert!(!consumed.unwrap());
    assert!(callbacks.commits().is_empty());
}

/// **VALUE**: Verifies the proxy answers a continuation query through its callbacks.
///
/// **WHY THIS MATTERS**: Without an answer the broker times out and drops the whole
/// connection.
///
/// **BUG THIS CATCHES**: Would catch the proxy treating `Continue` as an unexpected
/// opcode.
#[tokio::test]
async fn given_capitalising_instance_when_key_sent_then_proxy_answers_query() {
    let dir = test_dir();
    let config = test_config(dir.path());
    let server = start_server(&config, dir.path()).await;
    let mut settings = proxy_settings(&config);
    settings.cache_path = Some(config.modules.cache_path.clone());
    let (stop, stopped) = oneshot::channel::<()>();

    let client = async move {
        let mut proxy = RemoteEngineProxy::connect(settings).await.unwrap();
        let mut callbacks = RecordingCallbacks {
            surrounding: Some(("It works. ".to_string(), 10)),
            ..RecordingCallbacks::default()
        };
        let handle = proxy.create_instance(CAPS_UUID, "UTF-8").await.unwrap();
        proxy
            .process_key_event(handle, &KeyEvent::from_char('s'), &mut callbacks)
            .await
            .unwrap();
        stop.send(()).unwrap();
        callbacks
    };
    let (served, callbacks) = tokio::join!(
        server.run(async move {
            let _ = stopped.await;
        }),
        client
    );

    served.unwrap();
    assert_eq!(callbacks.queries, 1);
    assert_eq!(callbacks.commits(), vec!["S"]);
}

/// **VALUE**: Verifies that after a broker restart the in-flight call fails, the proxy
/// reconnects, and instances are recreated under their old handles.
///
/// **WHY THIS MATTERS**: Applications hold handles for their whole lifetime; a broker
/// restart must not invalidate them.
///
/// **BUG THIS CATCHES**: Would catch the failed call being silently replayed, or handles
/// still pointing at ids from the old broker.
#[tokio::test]
async fn given_broker_restart_when_calling_then_error_then_instances_recreated() {
    // GIVEN: A proxy on broker A whose surviving handle maps to remote id 2
    let dir = test_dir();
    let config = test_config(dir.path());
    let server_a = start_server(&config, dir.path()).await;
    let settings = proxy_settings(&config);
    let (stop_a, stopped_a) = oneshot::channel::<()>();

    let phase_one = async move {
        let mut proxy = RemoteEngineProxy::connect(settings).await.unwrap();
        let discarded = proxy.create_instance(RAW_UUID, "UTF-8").await.unwrap();
        let kept = proxy.create_instance(RAW_UUID, "UTF-8").await.unwrap();
        proxy.delete_instance(discarded, &mut NoCallbacks).await.unwrap();
        stop_a.send(()).unwrap();
        (proxy, kept)
    };
    let (served_a, (mut proxy, kept)) = tokio::join!(
        server_a.run(async move {
            let _ = stopped_a.await;
        }),
        phase_one
    );
    served_a.unwrap();
    assert_eq!(proxy.remote_id(kept), Some(2));
    assert!(!config.socket.path.exists());

    // WHEN: Broker B takes over the socket and the proxy calls twice
    let server_b = start_server(&config, dir.path()).await;
    let (stop_b, stopped_b) = oneshot::channel::<()>();
    let phase_two = async move {
        let mut callbacks = RecordingCallbacks::default();
        let first = proxy
            .process_key_event(kept, &KeyEvent::from_char('x'), &mut callbacks)
            .await;
        let remote_after = proxy.remote_id(kept);
        let second = proxy
            .process_key_event(kept, &KeyEvent::from_char('y'), &mut callbacks)
            .await;
        let connected = proxy.is_connected();
        stop_b.send(()).unwrap();
        (first, remote_after, second, connected, callbacks)
    };
    let (served_b, (first, remote_after, second, connected, callbacks)) = tokio::join!(
        server_b.run(async move {
            let _ = stopped_b.await;
        }),
        phase_two
    );

    // THEN: First call failed with a transport error and was not replayed; the handle
    // now maps to B's first instance and works
    served_b.unwrap();
    assert!(matches!(first, Err(ProxyError::Transport { .. })));
    assert!(connected);
    assert_eq!(remote_after, Some(1));
    assert!(second.unwrap());
    assert_eq!(callbacks.commits(), vec!["y"]);
}

/// **VALUE**: Verifies connecting to a socket nobody listens on fails fast with a
/// transport error.
///
/// **WHY THIS MATTERS**: Applications start before the broker and retry on this error.
///
/// **BUG THIS CATCHES**: Would catch a missing socket surfacing as a protocol error.
#[tokio::test]
async fn given_no_broker_when_connecting_then_transport_error() {
    let dir = test_dir();

    let settings = ProxySettings::new(dir.path().join("absent.sock"));
    let result = RemoteEngineProxy::connect(settings).await;

    assert!(matches!(result, Err(ProxyError::Transport { .. })));
}
