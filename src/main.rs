//! Model viewer desktop app: one event loop, two WebView windows (viewer and
//! config editor), embedded UI, typed IPC, live cross-window config sync.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod bridge;
mod config;
mod context;
mod event_loop;
mod ipc;
mod paths;
mod protocol;
mod storage;
mod store;
mod sync;
mod transport;
mod window;
mod window_state;

#[cfg(test)]
mod protocol_tests;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tao::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use tao::event_loop::EventLoopBuilder;

use crate::config::{
    CONFIG_HEIGHT, CONFIG_LABEL, CONFIG_WIDTH, ENV_DEVTOOLS, IPC_WORKER_POOL_SIZE,
    MAX_PENDING_IPC, SHOW_WINDOW_FALLBACK_SECS, UI, VIEWER_HEIGHT, VIEWER_LABEL, VIEWER_WIDTH,
    WINDOW_MIN_HEIGHT, WINDOW_MIN_WIDTH,
};
use crate::context::WindowContext;
use crate::event_loop::{run_event_loop, UserEvent, WindowShell};
use crate::ipc::{handle_command, is_blocking_command, parse_message, IpcResponse};
use crate::protocol::ServeResult;
use crate::storage::Storage;
use crate::sync::SyncOptions;
use crate::transport::EventHub;
use crate::window::{init_script, window_icon};

type IpcQueue = Arc<Mutex<Vec<(String, String)>>>;

/// Exits the process with code 1 after logging. Use for unrecoverable startup failures.
fn exit_fatal(msg: &str) -> ! {
    log::error!("{}", msg);
    std::process::exit(1);
}

/// Pushes one IPC response JSON to the queue and sends `IpcFlush` only when
/// this is the first item (so the loop is woken once per batch). Recovers
/// from mutex poison so a panicking thread cannot leave the queue locked.
fn push_ipc_and_wake(
    proxy: &tao::event_loop::EventLoopProxy<UserEvent>,
    queue: &Mutex<Vec<(String, String)>>,
    label: &str,
    json: String,
) {
    let was_first = {
        let mut q = queue.lock().unwrap_or_else(|e| {
            log::error!("IPC queue mutex was poisoned, recovering");
            e.into_inner()
        });
        q.push((label.to_string(), json));
        q.len() == 1
    };
    if was_first {
        let _ = proxy.send_event(UserEvent::IpcFlush);
    }
}

struct ShellSpec {
    label: &'static str,
    title: &'static str,
    size: (f64, f64),
    page: &'static str,
    /// Shown on first page load; the config window stays hidden until asked for.
    show_on_load: bool,
}

#[allow(clippy::too_many_arguments)]
fn build_shell(
    spec: &ShellSpec,
    event_loop: &tao::event_loop::EventLoop<UserEvent>,
    proxy: &tao::event_loop::EventLoopProxy<UserEvent>,
    hub: &Arc<EventHub>,
    storage: &Arc<Storage>,
    ipc_pool: &Arc<rayon::ThreadPool>,
    pending_ipc: &Arc<AtomicUsize>,
    ipc_queue: &IpcQueue,
) -> WindowShell {
    let label = spec.label;

    let window = {
        let mut b = tao::window::WindowBuilder::new()
            .with_title(spec.title)
            .with_inner_size(LogicalSize::new(spec.size.0, spec.size.1))
            .with_min_inner_size(LogicalSize::new(WINDOW_MIN_WIDTH, WINDOW_MIN_HEIGHT))
            .with_visible(false);
        if let Some(icon) = window_icon() {
            b = b.with_window_icon(Some(icon));
        }
        if let Some(bounds) = storage.load_window_bounds(label) {
            b = b
                .with_position(PhysicalPosition::new(bounds.x, bounds.y))
                .with_inner_size(PhysicalSize::new(bounds.width, bounds.height));
        }
        b.build(event_loop)
            .unwrap_or_else(|e| exit_fatal(&format!("Failed to create window '{label}': {e}")))
    };

    let context = WindowContext::new(hub, label, storage, SyncOptions::default());

    // Focus requests from the peer window's context land here.
    let focus_proxy = proxy.clone();
    hub.register_window(
        label,
        Arc::new(move || {
            let _ = focus_proxy.send_event(UserEvent::FocusWindow(label.to_string()));
        }),
    );

    // Every state change (local or inbound) repaints this window's page.
    let push_proxy = proxy.clone();
    context.store.set_change_notifier(Arc::new(move |state| {
        match serde_json::to_string(state) {
            Ok(json) => {
                let _ = push_proxy.send_event(UserEvent::PushState {
                    label: label.to_string(),
                    json,
                });
            }
            Err(e) => log::warn!("Failed to serialize pushed state: {e}"),
        }
    }));

    let ipc_ctx = Arc::clone(&context);
    let ipc_proxy = proxy.clone();
    let ipc_pending = Arc::clone(pending_ipc);
    let ipc_queue_handler = Arc::clone(ipc_queue);
    let worker_pool = Arc::clone(ipc_pool);
    let ipc_handler = move |req: wry::http::Request<String>| {
        let Some(envelope) = parse_message(req.body()) else {
            return;
        };

        if is_blocking_command(&envelope.command) {
            if ipc_pending.load(Ordering::Relaxed) >= MAX_PENDING_IPC {
                log::warn!("IPC backpressure: dropping blocking request (id={})", envelope.id);
                return;
            }
            ipc_pending.fetch_add(1, Ordering::Relaxed);
            let ctx = Arc::clone(&ipc_ctx);
            let proxy = ipc_proxy.clone();
            let pending = Arc::clone(&ipc_pending);
            let queue = Arc::clone(&ipc_queue_handler);
            worker_pool.spawn(move || {
                let resp = match handle_command(&ctx, &envelope.command) {
                    Ok(data) => IpcResponse::ok(envelope.id, data),
                    Err(e) => IpcResponse::err(envelope.id, e),
                };
                if let Ok(json) = serde_json::to_string(&resp) {
                    push_ipc_and_wake(&proxy, &queue, label, json);
                } else {
                    pending.fetch_sub(1, Ordering::Relaxed);
                }
            });
            return;
        }

        let resp = match handle_command(&ipc_ctx, &envelope.command) {
            Ok(data) => IpcResponse::ok(envelope.id, data),
            Err(e) => IpcResponse::err(envelope.id, e),
        };
        if let Ok(json) = serde_json::to_string(&resp) {
            if ipc_pending.load(Ordering::Relaxed) >= MAX_PENDING_IPC {
                log::warn!("IPC backpressure: dropping response (id={})", resp.id);
                return;
            }
            ipc_pending.fetch_add(1, Ordering::Relaxed);
            push_ipc_and_wake(&ipc_proxy, &ipc_queue_handler, label, json);
        }
    };

    let protocol_handler = move |_: wry::WebViewId<'_>, request: wry::http::Request<Vec<u8>>| {
        let path = request.uri().path();
        match protocol::serve(&UI, path) {
            ServeResult::Found { body, mime_type } => protocol::response(200, body, mime_type),
            ServeResult::NotFound => protocol::response(
                404,
                std::borrow::Cow::Borrowed(b"Not Found".as_slice()),
                "text/plain",
            ),
        }
    };

    let navigation_allow =
        move |url: String| url.starts_with("app://") || url.contains("app.localhost");

    let shown = Arc::new(AtomicUsize::new(0));
    let show_on_load = spec.show_on_load;
    let load_proxy = proxy.clone();
    let load_shown = Arc::clone(&shown);
    let on_page_load = move |_event: wry::PageLoadEvent, _url: String| {
        if show_on_load && load_shown.fetch_add(1, Ordering::Relaxed) == 0 {
            let _ = load_proxy.send_event(UserEvent::ShowWindow(label.to_string()));
        }
    };
    if show_on_load {
        let fallback_proxy = proxy.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(SHOW_WINDOW_FALLBACK_SECS));
            if shown.fetch_add(1, Ordering::Relaxed) == 0 {
                let _ = fallback_proxy.send_event(UserEvent::ShowWindow(label.to_string()));
            }
        });
    }

    build_webview_shell(
        spec,
        window,
        context,
        ipc_handler,
        protocol_handler,
        navigation_allow,
        on_page_load,
    )
}

fn build_webview_shell<I, P, N, L>(
    spec: &ShellSpec,
    window: tao::window::Window,
    context: Arc<WindowContext>,
    ipc_handler: I,
    protocol_handler: P,
    navigation_allow: N,
    on_page_load: L,
) -> WindowShell
where
    I: Fn(wry::http::Request<String>) + 'static,
    P: Fn(wry::WebViewId<'_>, wry::http::Request<Vec<u8>>) -> wry::http::Response<std::borrow::Cow<'static, [u8]>>
        + 'static,
    N: Fn(String) -> bool + 'static,
    L: Fn(wry::PageLoadEvent, String) + 'static,
{
    // Each window gets its own engine profile dir; sharing one trips profile
    // locks on some platforms.
    let mut web_context = wry::WebContext::new(Some(paths::user_data_dir().join(spec.label)));
    let devtools = std::env::var(ENV_DEVTOOLS).as_deref() == Ok("1");

    let builder = wry::WebViewBuilder::new_with_web_context(&mut web_context)
        .with_custom_protocol("app".to_string(), protocol_handler)
        .with_url(format!("app://localhost/{}", spec.page))
        .with_ipc_handler(ipc_handler)
        .with_initialization_script(init_script())
        .with_navigation_handler(navigation_allow)
        .with_on_page_load_handler(on_page_load)
        .with_devtools(devtools);

    #[cfg(any(target_os = "windows", target_os = "macos"))]
    let webview = builder
        .build(&window)
        .unwrap_or_else(|e| exit_fatal(&format!("Failed to build webview '{}': {e}", spec.label)));

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let webview = {
        use tao::platform::unix::WindowExtUnix;
        use wry::WebViewBuilderExtUnix;
        let vbox = window
            .default_vbox()
            .unwrap_or_else(|| exit_fatal("Failed to get GTK vbox"));
        builder
            .build_gtk(vbox)
            .unwrap_or_else(|e| exit_fatal(&format!("Failed to build webview '{}': {e}", spec.label)))
    };

    WindowShell {
        label: spec.label,
        window,
        webview,
        context,
        web_context,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    let proxy = event_loop.create_proxy();
    let pending_ipc = Arc::new(AtomicUsize::new(0));
    let ipc_queue: IpcQueue = Arc::new(Mutex::new(Vec::new()));
    let ipc_pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(IPC_WORKER_POOL_SIZE)
            .build()
            .unwrap_or_else(|e| exit_fatal(&format!("IPC worker pool: {e}"))),
    );

    let hub = EventHub::new();
    let storage = Arc::new(Storage::new(paths::user_data_dir()));

    let specs = [
        ShellSpec {
            label: VIEWER_LABEL,
            title: "Modelview",
            size: (VIEWER_WIDTH, VIEWER_HEIGHT),
            page: "index.html",
            show_on_load: true,
        },
        ShellSpec {
            label: CONFIG_LABEL,
            title: "Model Configuration",
            size: (CONFIG_WIDTH, CONFIG_HEIGHT),
            page: "config.html",
            show_on_load: false,
        },
    ];

    let shells: Vec<WindowShell> = specs
        .iter()
        .map(|spec| {
            build_shell(
                spec,
                &event_loop,
                &proxy,
                &hub,
                &storage,
                &ipc_pool,
                &pending_ipc,
                &ipc_queue,
            )
        })
        .collect();

    // The viewer seeds its state from the persisted record; the config window
    // catches up from the viewer when it is first shown and focused.
    if let Some(viewer) = shells.iter().find(|s| s.label == VIEWER_LABEL)
        && !viewer.context.store.load_from_storage()
    {
        log::info!("No persisted model config; starting from defaults");
    }

    run_event_loop(event_loop, shells, storage, proxy, pending_ipc, ipc_queue);
}
