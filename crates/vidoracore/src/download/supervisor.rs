//! Concurrent download task supervision.
//!
//! The supervisor owns every in-flight download: it validates
//! preconditions, spawns yt-dlp child processes, multiplexes their output
//! into the per-task parser, classifies the outcome on exit, and
//! guarantees each task is retired exactly once.
//!
//! Concurrency model: per-task reader tasks forward raw output chunks and
//! a per-task driver owns the child handle, but all parsing and exit
//! handling is serialized through a single dispatcher task; no two
//! callbacks for different tasks run concurrently, so per-task mutable
//! state needs no locking. Only the small registry used by `cancel_all`
//! sits behind a mutex.

use std::collections::{HashMap, VecDeque};
use std::ffi::OsString;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config::{SupervisorConfig, STDERR_TAIL_LINES};
use crate::core::error::{SubmitError, SubmitResult};
use crate::core::process::run_with_timeout;
use crate::download::classifier::classify;
use crate::download::command::build_args;
use crate::download::cookies::{CookieStore, FirefoxCookieStore};
use crate::download::events::{DownloadEvent, StatusUpdate};
use crate::download::outcome::{classify_exit, title_from_url};
use crate::download::parser::{decode_chunk, LineEvent, OutputParser};
use crate::download::platform::{profile_for, Browser, Platform, PlatformProfile};
use crate::download::task::{DownloadRequest, DownloadTask, TaskId, TaskState};

/// Registry entry kept per running task, just enough for `cancel_all`.
struct TaskHandle {
    cancel: CancellationToken,
    url: String,
    platform: Platform,
    /// Mirror of the locked title, so cancellation can report it.
    title: Arc<Mutex<Option<String>>>,
}

/// Dispatcher-owned state for one running task. Touched only by the
/// dispatcher, never concurrently.
struct TaskRuntime {
    task: DownloadTask,
    profile: PlatformProfile,
    parser: OutputParser,
    stderr_tail: VecDeque<String>,
    shared_title: Arc<Mutex<Option<String>>>,
}

struct RegisterTask {
    task: DownloadTask,
    profile: PlatformProfile,
    shared_title: Arc<Mutex<Option<String>>>,
}

/// Internal messages funneled through the dispatcher, in arrival order.
enum Dispatch {
    Register(Box<RegisterTask>),
    Chunk {
        id: TaskId,
        bytes: Vec<u8>,
        from_stderr: bool,
    },
    Exited {
        id: TaskId,
        exit_code: i32,
    },
    Cancelled {
        id: TaskId,
    },
}

/// Supervises concurrent yt-dlp download tasks and pushes typed events to
/// the caller.
pub struct DownloadSupervisor {
    config: Arc<SupervisorConfig>,
    cookies: Arc<dyn CookieStore>,
    registry: Arc<Mutex<HashMap<TaskId, TaskHandle>>>,
    events: mpsc::UnboundedSender<DownloadEvent>,
    dispatch: mpsc::UnboundedSender<Dispatch>,
    next_task_id: AtomicU64,
}

impl DownloadSupervisor {
    /// Create a supervisor with the default Firefox cookie store.
    ///
    /// Must be called inside a tokio runtime; the dispatcher task is
    /// spawned immediately.
    pub fn new(config: SupervisorConfig) -> (Self, mpsc::UnboundedReceiver<DownloadEvent>) {
        Self::with_cookie_store(config, Arc::new(FirefoxCookieStore))
    }

    /// Create a supervisor with a caller-provided cookie store.
    pub fn with_cookie_store(
        config: SupervisorConfig,
        cookies: Arc<dyn CookieStore>,
    ) -> (Self, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Mutex::new(HashMap::new()));
        let config = Arc::new(config);

        tokio::spawn(dispatcher(
            dispatch_rx,
            Arc::clone(&registry),
            events_tx.clone(),
            Arc::clone(&config),
        ));

        (
            Self {
                config,
                cookies,
                registry,
                events: events_tx,
                dispatch: dispatch_tx,
                next_task_id: AtomicU64::new(0),
            },
            events_rx,
        )
    }

    /// Submit a URL for download.
    ///
    /// Validates all preconditions without spawning anything; only a
    /// passing submission starts a child process. Returns as soon as the
    /// child is spawned; progress arrives through the event channel.
    pub async fn submit(&self, request: DownloadRequest) -> SubmitResult<TaskId> {
        let classification = classify(&request.url, &self.config.platforms);
        let profile = profile_for(classification.platform, &self.config.platforms);

        if classification.is_collection && !profile.supports_profile_batch {
            log::warn!(
                "Rejecting collection URL on {}: {}",
                profile.platform.as_str(),
                request.url
            );
            return Err(SubmitError::CollectionUnsupported(
                profile.platform.display_name().to_string(),
            ));
        }

        let browser = if profile.requires_cookies {
            let browser = request
                .browser
                .or(profile.default_browser)
                .ok_or(SubmitError::CookiesNotFound)?;
            if browser != Browser::Firefox {
                return Err(SubmitError::BrowserUnsupported(
                    browser.display_name().to_string(),
                ));
            }
            if !self.cookies.is_available(browser) {
                return Err(SubmitError::CookiesNotFound);
            }
            Some(browser)
        } else {
            log::debug!(
                "Platform {} needs no cookies, downloading directly",
                profile.platform.as_str()
            );
            request.browser
        };

        if !self.tool_available().await {
            return Err(SubmitError::ToolUnavailable);
        }

        std::fs::create_dir_all(&request.output_dir)?;

        let args = build_args(
            &self.config,
            &profile,
            &classification.normalized_url,
            &request.output_dir,
            &request.format_options,
            browser,
        );
        log::debug!("Running: {} {}", self.config.tool_bin.display(), args.join(" "));

        let mut child = Command::new(&self.config.tool_bin)
            .args(&args)
            .env("PATH", prefixed_path(&self.config.bin_dir))
            .current_dir(&request.output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let id = self.next_task_id.fetch_add(1, Ordering::Relaxed) + 1;
        let task = DownloadTask {
            id,
            url: request.url.clone(),
            normalized_url: classification.normalized_url,
            platform: classification.platform,
            output_dir: request.output_dir,
            format_options: request.format_options,
            browser,
            state: TaskState::Running,
            title: None,
            title_locked: false,
        };

        let token = CancellationToken::new();
        let shared_title = Arc::new(Mutex::new(None));
        lock(&self.registry).insert(
            id,
            TaskHandle {
                cancel: token.clone(),
                url: request.url.clone(),
                platform: task.platform,
                title: Arc::clone(&shared_title),
            },
        );
        let _ = self.dispatch.send(Dispatch::Register(Box::new(RegisterTask {
            task,
            profile,
            shared_title,
        })));

        let out_reader = child
            .stdout
            .take()
            .map(|stream| spawn_reader(id, stream, false, self.dispatch.clone()));
        let err_reader = child
            .stderr
            .take()
            .map(|stream| spawn_reader(id, stream, true, self.dispatch.clone()));

        tokio::spawn(drive_child(
            id,
            child,
            token,
            out_reader,
            err_reader,
            self.dispatch.clone(),
        ));

        log::info!("Task {} started for {}", id, request.url);
        Ok(id)
    }

    /// Forcibly terminate every tracked download and clear the registry.
    ///
    /// Each drained task gets a `Cancelled` status and a terminal
    /// `Finished` event before this call returns. Idempotent when no
    /// tasks are running. A `submit` racing a cancel is not arbitrated
    /// here; callers serialize their submit/cancel intent.
    pub fn cancel_all(&self) {
        let drained: Vec<(TaskId, TaskHandle)> = lock(&self.registry).drain().collect();
        if drained.is_empty() {
            log::debug!("cancel_all: no running tasks");
            return;
        }

        log::info!("Cancelling {} running task(s)", drained.len());
        for (id, handle) in drained {
            handle.cancel.cancel();
            let title = lock(&handle.title)
                .clone()
                .unwrap_or_else(|| title_from_url(&handle.url, handle.platform));
            let _ = self.events.send(DownloadEvent::StatusChanged {
                task_id: id,
                status: StatusUpdate::Cancelled,
            });
            let _ = self.events.send(DownloadEvent::Finished {
                task_id: id,
                success: false,
                message: "Cancelled".to_string(),
                title,
            });
        }
    }

    /// Number of currently tracked (running) tasks.
    pub fn active_tasks(&self) -> usize {
        lock(&self.registry).len()
    }

    /// One-shot availability probe: run the tool with `--version` and a
    /// bounded wait. Gates every submission.
    async fn tool_available(&self) -> bool {
        let mut cmd = Command::new(&self.config.tool_bin);
        cmd.arg("--version")
            .env("PATH", prefixed_path(&self.config.bin_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match run_with_timeout(&mut cmd, self.config.probe_timeout).await {
            Ok(Some(output)) => output.status.success(),
            Ok(None) => {
                log::error!("Downloader version probe timed out");
                false
            }
            Err(e) => {
                log::error!("Downloader unavailable: {}", e);
                false
            }
        }
    }
}

impl Drop for DownloadSupervisor {
    fn drop(&mut self) {
        // No orphaned children: dropping the supervisor kills everything
        // it was tracking.
        self.cancel_all();
    }
}

/// Recover from a poisoned lock instead of propagating the panic; the
/// supervisor must stay serviceable for the remaining tasks.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The child's `PATH` with the bundled binary directory in front.
fn prefixed_path(bin_dir: &Path) -> OsString {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let mut paths = vec![bin_dir.to_path_buf()];
    paths.extend(std::env::split_paths(&current));
    std::env::join_paths(paths).unwrap_or(current)
}

/// Forward raw output chunks to the dispatcher until EOF.
fn spawn_reader<R>(
    id: TaskId,
    mut stream: R,
    from_stderr: bool,
    dispatch: mpsc::UnboundedSender<Dispatch>,
) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 8192];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = Dispatch::Chunk {
                        id,
                        bytes: buf[..n].to_vec(),
                        from_stderr,
                    };
                    if dispatch.send(chunk).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Own the child handle: wait for exit or cancellation, then notify the
/// dispatcher. Reader tasks are drained first so every output chunk is
/// queued ahead of the exit notice.
async fn drive_child(
    id: TaskId,
    mut child: Child,
    token: CancellationToken,
    out_reader: Option<JoinHandle<()>>,
    err_reader: Option<JoinHandle<()>>,
    dispatch: mpsc::UnboundedSender<Dispatch>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = token.cancelled() => {
            // Abrupt termination; no graceful handshake with yt-dlp.
            let _ = child.start_kill();
            let _ = child.wait().await;
            if let Some(handle) = out_reader {
                let _ = handle.await;
            }
            if let Some(handle) = err_reader {
                let _ = handle.await;
            }
            let _ = dispatch.send(Dispatch::Cancelled { id });
            return;
        }
    };

    if let Some(handle) = out_reader {
        let _ = handle.await;
    }
    if let Some(handle) = err_reader {
        let _ = handle.await;
    }

    let exit_code = match status {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            log::error!("Task {}: failed to collect exit status: {}", id, e);
            -1
        }
    };
    let _ = dispatch.send(Dispatch::Exited { id, exit_code });
}

/// Single-threaded event loop: handles one callback at a time across all
/// tasks. A fault while handling one task's output converts into a failed
/// `Finished` for that task instead of taking the dispatcher down.
async fn dispatcher(
    mut rx: mpsc::UnboundedReceiver<Dispatch>,
    registry: Arc<Mutex<HashMap<TaskId, TaskHandle>>>,
    events: mpsc::UnboundedSender<DownloadEvent>,
    config: Arc<SupervisorConfig>,
) {
    let mut tasks: HashMap<TaskId, TaskRuntime> = HashMap::new();

    while let Some(message) = rx.recv().await {
        match message {
            Dispatch::Register(registration) => {
                let RegisterTask {
                    task,
                    profile,
                    shared_title,
                } = *registration;
                let parser = OutputParser::new(config.title_max_len);
                tasks.insert(
                    task.id,
                    TaskRuntime {
                        task,
                        profile,
                        parser,
                        stderr_tail: VecDeque::new(),
                        shared_title,
                    },
                );
            }
            Dispatch::Chunk {
                id,
                bytes,
                from_stderr,
            } => {
                let handled = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    if let Some(runtime) = tasks.get_mut(&id) {
                        handle_chunk(runtime, &config, &events, &bytes, from_stderr);
                    }
                }));
                if handled.is_err() {
                    log::error!("Task {}: fault while handling output", id);
                    finish_with_fault(&mut tasks, &registry, &events, id, "Internal error while handling output");
                }
            }
            Dispatch::Exited { id, exit_code } => {
                let handled = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    handle_exit(&mut tasks, &registry, &events, id, exit_code);
                }));
                if handled.is_err() {
                    log::error!("Task {}: fault while finishing", id);
                    finish_with_fault(&mut tasks, &registry, &events, id, "Internal error while finishing task");
                }
            }
            Dispatch::Cancelled { id } => {
                // Registry entry and terminal event were handled by
                // cancel_all; only the parser state remains.
                tasks.remove(&id);
                log::debug!("Task {} cancelled and cleaned up", id);
            }
        }
    }
}

/// Decode one chunk and turn its lines into events.
fn handle_chunk(
    runtime: &mut TaskRuntime,
    config: &SupervisorConfig,
    events: &mpsc::UnboundedSender<DownloadEvent>,
    bytes: &[u8],
    from_stderr: bool,
) {
    let text = decode_chunk(bytes, &config.encoding_fallbacks);
    let id = runtime.task.id;

    if from_stderr {
        for line in text.split(['\n', '\r']).filter(|line| !line.trim().is_empty()) {
            if runtime.stderr_tail.len() >= STDERR_TAIL_LINES {
                runtime.stderr_tail.pop_front();
            }
            runtime.stderr_tail.push_back(line.to_string());
        }
    }

    for parsed in runtime.parser.feed(&text) {
        let _ = events.send(DownloadEvent::RawLog {
            task_id: id,
            line: parsed.raw,
        });

        match parsed.event {
            Some(LineEvent::Title(title)) => {
                runtime.task.title = Some(title.clone());
                runtime.task.title_locked = true;
                *lock(&runtime.shared_title) = Some(title.clone());
                log::debug!("Task {}: title locked: '{}'", id, title);
                let _ = events.send(DownloadEvent::TitleSet { task_id: id, title });
            }
            Some(LineEvent::Progress(progress)) => {
                let _ = events.send(DownloadEvent::Progress {
                    task_id: id,
                    progress,
                });
            }
            Some(LineEvent::Status(status)) => {
                if status == StatusUpdate::Merging && !runtime.task.state.is_terminal() {
                    runtime.task.state = TaskState::Merging;
                }
                let _ = events.send(DownloadEvent::StatusChanged {
                    task_id: id,
                    status,
                });
            }
            None => {}
        }
    }
}

/// Classify the exit and retire the task; exactly once.
fn handle_exit(
    tasks: &mut HashMap<TaskId, TaskRuntime>,
    registry: &Mutex<HashMap<TaskId, TaskHandle>>,
    events: &mpsc::UnboundedSender<DownloadEvent>,
    id: TaskId,
    exit_code: i32,
) {
    let Some(mut runtime) = tasks.remove(&id) else {
        return;
    };

    // A concurrent cancel_all already retired the task and emitted its
    // terminal event.
    if lock(registry).remove(&id).is_none() {
        return;
    }

    let stderr_text = runtime
        .stderr_tail
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    let outcome = classify_exit(exit_code, &stderr_text, &runtime.profile, &runtime.task.normalized_url);

    runtime.task.state = if outcome.success {
        TaskState::Completed
    } else {
        TaskState::Failed
    };

    let title = runtime
        .task
        .title
        .clone()
        .unwrap_or_else(|| title_from_url(&runtime.task.url, runtime.task.platform));

    log::info!(
        "Task {} finished (exit code {}, success: {})",
        id,
        exit_code,
        outcome.success
    );
    let _ = events.send(DownloadEvent::Finished {
        task_id: id,
        success: outcome.success,
        message: outcome.message,
        title,
    });
}

/// Containment path: convert an unexpected internal fault into a failed
/// `Finished` event so the supervisor stays serviceable.
fn finish_with_fault(
    tasks: &mut HashMap<TaskId, TaskRuntime>,
    registry: &Mutex<HashMap<TaskId, TaskHandle>>,
    events: &mpsc::UnboundedSender<DownloadEvent>,
    id: TaskId,
    message: &str,
) {
    let runtime = tasks.remove(&id);
    let Some(handle) = lock(registry).remove(&id) else {
        return;
    };
    handle.cancel.cancel();

    let title = runtime
        .as_ref()
        .and_then(|rt| rt.task.title.clone())
        .unwrap_or_else(|| title_from_url(&handle.url, handle.platform));

    let _ = events.send(DownloadEvent::Finished {
        task_id: id,
        success: false,
        message: message.to_string(),
        title,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::task::FormatOptions;
    use std::path::PathBuf;

    struct StaticCookieStore(bool);

    impl CookieStore for StaticCookieStore {
        fn is_available(&self, browser: Browser) -> bool {
            browser == Browser::Firefox && self.0
        }
    }

    fn test_config() -> SupervisorConfig {
        SupervisorConfig {
            tool_bin: PathBuf::from("/nonexistent/yt-dlp"),
            ffmpeg_bin: PathBuf::from("/nonexistent/ffmpeg"),
            bin_dir: PathBuf::from("/nonexistent"),
            ..SupervisorConfig::from_env()
        }
    }

    fn request(url: &str, browser: Option<Browser>) -> DownloadRequest {
        DownloadRequest {
            url: url.to_string(),
            output_dir: std::env::temp_dir(),
            format_options: FormatOptions::default(),
            browser,
        }
    }

    #[test]
    fn test_prefixed_path_puts_bin_dir_first() {
        let path = prefixed_path(Path::new("/opt/vidora/bin"));
        let first = std::env::split_paths(&path).next();
        assert_eq!(first, Some(PathBuf::from("/opt/vidora/bin")));
    }

    #[tokio::test]
    async fn test_collection_url_rejected_without_spawning() {
        let (supervisor, _events) =
            DownloadSupervisor::with_cookie_store(test_config(), Arc::new(StaticCookieStore(true)));
        let result = supervisor
            .submit(request("https://www.xiaohongshu.com/user/profile/5af1a1b2", None))
            .await;
        assert!(matches!(result, Err(SubmitError::CollectionUnsupported(_))));
        assert_eq!(supervisor.active_tasks(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_browser_rejected() {
        let (supervisor, _events) =
            DownloadSupervisor::with_cookie_store(test_config(), Arc::new(StaticCookieStore(true)));
        let result = supervisor
            .submit(request(
                "https://www.youtube.com/watch?v=abc123",
                Some(Browser::Chrome),
            ))
            .await;
        assert!(matches!(result, Err(SubmitError::BrowserUnsupported(_))));
    }

    #[tokio::test]
    async fn test_missing_cookies_rejected() {
        let (supervisor, _events) =
            DownloadSupervisor::with_cookie_store(test_config(), Arc::new(StaticCookieStore(false)));
        let result = supervisor
            .submit(request(
                "https://www.youtube.com/watch?v=abc123",
                Some(Browser::Firefox),
            ))
            .await;
        assert!(matches!(result, Err(SubmitError::CookiesNotFound)));
    }

    #[tokio::test]
    async fn test_missing_tool_rejected() {
        let (supervisor, _events) =
            DownloadSupervisor::with_cookie_store(test_config(), Arc::new(StaticCookieStore(true)));
        let result = supervisor.submit(request("https://example.com/clip", None)).await;
        assert!(matches!(result, Err(SubmitError::ToolUnavailable)));
        assert_eq!(supervisor.active_tasks(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all_idempotent_when_empty() {
        let (supervisor, _events) =
            DownloadSupervisor::with_cookie_store(test_config(), Arc::new(StaticCookieStore(true)));
        supervisor.cancel_all();
        supervisor.cancel_all();
        assert_eq!(supervisor.active_tasks(), 0);
    }
}
