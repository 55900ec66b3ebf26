// Shared test helpers
#![allow(dead_code)]

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use hostpulse::broadcaster::{Broadcaster, BroadcasterDeps};
use hostpulse::config::{FileConfig, InspectorConfig};
use hostpulse::models::Event;
use hostpulse::registry::SubscriptionRegistry;
use hostpulse::services::{CommandError, CommandOutput, CommandRunner, ServiceInspector};
use hostpulse::sysinfo_repo::SysinfoRepo;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Canned reply for one command line.
#[derive(Clone)]
pub enum Reply {
    Output(CommandOutput),
    /// Never completes; exercises caller-side timeouts.
    Hang,
    Fail(String),
}

/// CommandRunner that answers from a table keyed by the joined argument list.
#[derive(Default)]
pub struct FakeRunner {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, args: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(args.to_string(), reply);
    }

    pub fn stdout(&self, args: &str, stdout: &str) {
        self.reply(
            args,
            Reply::Output(CommandOutput {
                success: true,
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
        );
    }

    /// Scripts `is-active` and `show` for one unit.
    pub fn service(&self, name: &str, active_state: &str, description: &str) {
        self.stdout(&format!("is-active {}", name), &format!("{}\n", active_state));
        self.stdout(
            &format!("show {} --no-pager", name),
            &format!(
                "Id={name}\nDescription={description}\nActiveState={active_state}\nActiveEnterTimestamp=Mon 2024-03-04 08:15:00 UTC\nMemoryCurrent=4096\n"
            ),
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
    ) -> BoxFuture<'static, Result<CommandOutput, CommandError>> {
        let key = args.join(" ");
        self.calls.lock().unwrap().push(format!("{} {}", program, key));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or(Reply::Output(CommandOutput::default()));
        let program = program.to_string();
        async move {
            match reply {
                Reply::Output(output) => Ok(output),
                Reply::Hang => std::future::pending().await,
                Reply::Fail(msg) => Err(CommandError::Spawn {
                    program,
                    source: std::io::Error::other(msg),
                }),
            }
        }
        .boxed()
    }
}

pub fn inspector_config(timeout_ms: u64) -> InspectorConfig {
    InspectorConfig {
        command_timeout_ms: timeout_ms,
        log_timeout_ms: timeout_ms,
        ..InspectorConfig::default()
    }
}

pub fn file_config(name: &str, path: &Path) -> FileConfig {
    FileConfig {
        name: name.to_string(),
        path: path.to_string_lossy().into_owned(),
        expand: true,
    }
}

/// Metrics sampling without the CPU wait, so tests stay fast.
pub fn fast_sysinfo_repo() -> Arc<SysinfoRepo> {
    Arc::new(SysinfoRepo::new("/", Duration::ZERO))
}

pub fn test_broadcaster(
    runner: Arc<FakeRunner>,
    services: &[&str],
    files: Vec<FileConfig>,
) -> Arc<Broadcaster> {
    let inspector = Arc::new(ServiceInspector::new(runner, &inspector_config(200)));
    Arc::new(Broadcaster::new(
        BroadcasterDeps {
            sysinfo_repo: fast_sysinfo_repo(),
            inspector,
            registry: Arc::new(SubscriptionRegistry::new(16)),
        },
        services.iter().map(|s| s.to_string()).collect(),
        files,
    ))
}

/// Writes `lines` numbered lines to `path`.
pub fn write_lines(path: &Path, lines: usize) {
    let text: String = (1..=lines).map(|i| format!("line {}\n", i)).collect();
    std::fs::write(path, text).unwrap();
}

/// Sets the file's mtime explicitly, so tests do not depend on filesystem timestamp granularity.
pub fn set_mtime(path: &Path, mtime: SystemTime) {
    let f = std::fs::File::options().write(true).open(path).unwrap();
    f.set_modified(mtime).unwrap();
}

pub async fn next_event(events: &mut tokio::sync::mpsc::Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}
