//! Test helpers for driving a dispatcher directly.
//!
//! A [`TestBroker`] owns a dispatcher over temporary module directories.
//! Clients talk to it over socket pairs; the test calls
//! [`Dispatcher::step`] to let it handle one event at a time, so every
//! interleaving is explicit.

use panel_core::config::ConfigStore;
use panel_core::dispatch::Dispatcher;
use panel_core::engine::{EngineHost, ModuleRegistry};
use panel_core::observer::LoggingObserver;
use panel_core::session::{ConnectionId, Role, open_connection};
use panel_core::supervisor::{LaunchSettings, Supervisor, SupervisorSettings};
use panel_core::transaction::{FrameLimits, Opcode, Transaction};

use common::SessionKey;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::UnixStream;

/// Keyboard ISE of the built-in raw engine without auto-capitalisation.
pub const RAW_UUID: &str = "raw-en";
/// Same engine with auto-capitalisation, which queries surrounding text.
pub const CAPS_UUID: &str = "raw-caps";
pub const HELPER_UUID: &str = "helper-hw";

const RAW_MANIFEST: &str = r#"
[[ise]]
name = "Raw English"
uuid = "raw-en"
language = "en"
locales = ["en_US.UTF-8"]

[[ise]]
name = "Raw English (capitalising)"
uuid = "raw-caps"
language = "en"
option = 1
"#;

/// Socket timeout of every test broker. Continuation timeout tests wait this
/// long.
pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

pub fn test_limits() -> FrameLimits {
    FrameLimits::new(TEST_TIMEOUT, 1024 * 1024)
}

/// Options of the test broker's supervisor.
pub struct BrokerOptions {
    pub launcher: PathBuf,
    pub helper_option: u32,
    pub max_restarts: u32,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            launcher: PathBuf::from("true"),
            helper_option: 0,
            max_restarts: 3,
        }
    }
}

pub struct TestBroker {
    pub dir: TempDir,
    pub dispatcher: Dispatcher,
}

impl TestBroker {
    pub fn new() -> Self {
        Self::with_options(BrokerOptions::default())
    }

    pub fn with_options(options: BrokerOptions) -> Self {
        let dir = TempDir::new().unwrap();
        let keyboard_dir = dir.path().join("keyboards");
        let helper_dir = dir.path().join("helpers");
        std::fs::create_dir_all(&keyboard_dir).unwrap();
        std::fs::create_dir_all(&helper_dir).unwrap();
        std::fs::write(keyboard_dir.join("raw.ise"), RAW_MANIFEST).unwrap();
        std::fs::write(
            helper_dir.join("handwriting.ise"),
            format!(
                "[[ise]]\nname = \"Handwriting\"\nuuid = \"{HELPER_UUID}\"\noption = {}\n",
                options.helper_option
            ),
        )
        .unwrap();

        let supervisor = Supervisor::start(SupervisorSettings {
            keyboard_dir,
            helper_dir,
            cache_path: dir.path().join("ise-info.cache"),
            launch: LaunchSettings {
                launcher: options.launcher,
                config_module: "simple".to_string(),
                display: ":0".to_string(),
            },
            max_restarts: options.max_restarts,
            restart_window: Duration::from_secs(60),
        });
        let store = ConfigStore::open(dir.path().join("store.json")).unwrap();
        let dispatcher = Dispatcher::new(
            test_limits(),
            EngineHost::new(ModuleRegistry::default()),
            supervisor,
            store,
            Box::new(LoggingObserver),
        )
        .unwrap();

        Self { dir, dispatcher }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A raw stream the broker has accepted but which has not handshaken.
    pub fn accept_raw(&mut self) -> (ConnectionId, UnixStream) {
        let (client, server) = UnixStream::pair().unwrap();
        let id = self.dispatcher.accept(server);
        (id, client)
    }

    /// Accept a stream and complete the handshake as `role`.
    pub async fn connect(&mut self, role: Role) -> Client {
        let (id, mut stream) = self.accept_raw();
        let limits = test_limits();
        let (_, key) = tokio::join!(
            self.dispatcher.step(),
            open_connection(&mut stream, role, &limits)
        );
        Client {
            id,
            stream,
            key: key.unwrap(),
            limits,
        }
    }

    /// Send `request`, let the broker handle it, and return the reply
    /// positioned after its `Reply` marker.
    pub async fn call(&mut self, client: &mut Client, request: &Transaction) -> Transaction {
        client.send(request).await;
        self.dispatcher.step().await;
        client.recv_reply().await
    }

    /// `NewInstance` for `uuid`, returning the broker's instance id.
    pub async fn new_instance(&mut self, client: &mut Client, uuid: &str) -> u32 {
        let mut request = client.request();
        request.put_command(Opcode::NewInstance).put(uuid).put("UTF-8");
        let mut reply = self.call(client, &request).await;
        assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
        reply.get::<u32>().unwrap()
    }
}

/// One handshaken client connection.
pub struct Client {
    pub id: ConnectionId,
    pub stream: UnixStream,
    pub key: SessionKey,
    pub limits: FrameLimits,
}

impl Client {
    pub fn request(&self) -> Transaction {
        Transaction::request(&self.key)
    }

    pub async fn send(&mut self, trans: &Transaction) {
        trans.write_to(&mut self.stream, &self.limits).await.unwrap();
    }

    pub async fn recv(&mut self) -> Transaction {
        Transaction::read_from(&mut self.stream, &self.limits)
            .await
            .unwrap()
    }

    pub async fn recv_reply(&mut self) -> Transaction {
        let mut reply = self.recv().await;
        assert_eq!(reply.get_command().unwrap(), Opcode::Reply);
        reply
    }

    /// `None` when nothing arrives within `wait`.
    pub async fn recv_within(&mut self, wait: Duration) -> Option<Transaction> {
        tokio::time::timeout(wait, Transaction::read_from(&mut self.stream, &self.limits))
            .await
            .ok()
            .map(|result| result.unwrap())
    }

    /// True once the broker has closed its end.
    pub async fn is_closed(&mut self) -> bool {
        Transaction::read_from(&mut self.stream, &self.limits)
            .await
            .is_err()
    }
}

/// `[Request][key][ProcessKeyEvent][instance][key event]` for a typed char.
pub fn key_request(client: &Client, instance: u32, ch: char) -> Transaction {
    let mut request = client.request();
    request
        .put_command(Opcode::ProcessKeyEvent)
        .put(&instance)
        .put(&models::KeyEvent::from_char(ch));
    request
}
