//! Event loop and user events for the two windows.
//!
//! Owns `UserEvent`, `run_event_loop`, and the JSON escape helper used when
//! dispatching IPC responses and pushed config state back to a WebView.
//! IPC responses are batched: producers push `(label, json)` to a queue and
//! send `IpcFlush`; the loop drains the queue and delivers each window's
//! batch in one `evaluate_script`.
//!
//! Closing the config window hides it (its state and listeners stay live, so
//! reopening from the tray needs no catch-up); closing the viewer exits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::{CONFIG_LABEL, VIEWER_LABEL};
use crate::context::WindowContext;
use crate::storage::{Storage, WindowBounds};

/// User-defined events sent from background threads or IPC into the main loop.
pub enum UserEvent {
    /// Wake to drain the IPC response queue and deliver batches.
    IpcFlush,
    /// Show a window by label (after first page load or fallback timeout).
    ShowWindow(String),
    /// Show and focus a window by label (tray, `ShowConfigWindow`).
    FocusWindow(String),
    /// Push a config state JSON into one window's page.
    PushState { label: String, json: String },
    /// Exit the application.
    Quit,
}

/// One window with its WebView and sync context.
pub struct WindowShell {
    pub label: &'static str,
    pub window: tao::window::Window,
    pub webview: wry::WebView,
    pub context: Arc<WindowContext>,
    // Kept alive for the webview's lifetime.
    #[allow(dead_code)]
    pub web_context: wry::WebContext,
}

/// Escapes a JSON string for safe embedding inside a JS string (backslash,
/// quote, newline, carriage return). Avoids allocation when the string
/// contains none of these characters.
#[must_use]
pub fn escape_json_for_js(s: &str) -> std::borrow::Cow<'_, str> {
    if !s.contains(['\\', '"', '\n', '\r']) {
        return std::borrow::Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    std::borrow::Cow::Owned(out)
}

fn lock_queue(queue: &Mutex<Vec<(String, String)>>) -> std::sync::MutexGuard<'_, Vec<(String, String)>> {
    queue.lock().unwrap_or_else(|e| {
        log::error!("IPC queue mutex was poisoned, recovering");
        e.into_inner()
    })
}

/// Drains the IPC queue and runs one script per window to deliver that
/// window's responses. Returns true if anything was delivered.
fn drain_ipc_queue_and_deliver(
    queue: &Mutex<Vec<(String, String)>>,
    pending_ipc: &AtomicUsize,
    shells: &[WindowShell],
) -> bool {
    let batch: Vec<(String, String)> = std::mem::take(&mut *lock_queue(queue));
    let n = batch.len();
    if n == 0 {
        return false;
    }
    let to_sub = n.min(pending_ipc.load(Ordering::Relaxed));
    pending_ipc.fetch_sub(to_sub, Ordering::Relaxed);

    let mut per_window: HashMap<&str, String> = HashMap::new();
    for (label, response_json) in &batch {
        let script = per_window
            .entry(label.as_str())
            .or_insert_with(|| String::from("if (window.__resolveIpc) { "));
        let escaped = escape_json_for_js(response_json);
        script.push_str(&format!(
            r#"try {{ var r = JSON.parse("{escaped}"); window.__resolveIpc(r.id, r); }} catch(e) {{}}"#
        ));
    }
    for (label, mut script) in per_window {
        script.push_str(" }");
        let Some(shell) = shells.iter().find(|s| s.label == label) else {
            continue;
        };
        if let Err(e) = shell.webview.evaluate_script(&script) {
            log::warn!("IPC evaluate_script failed for '{label}': {e}");
        }
    }
    true
}

fn push_state_script(json: &str) -> String {
    format!(
        r#"if (window.__onConfigSync) {{ try {{ window.__onConfigSync(JSON.parse("{}")); }} catch(e) {{}} }}"#,
        escape_json_for_js(json)
    )
}

fn save_bounds(storage: &Storage, shell: &WindowShell) {
    if let Ok(pos) = shell.window.outer_position() {
        let size = shell.window.inner_size();
        storage.save_window_bounds(
            shell.label,
            WindowBounds {
                x: pos.x,
                y: pos.y,
                width: size.width,
                height: size.height,
            },
        );
    }
}

/// Runs the tao event loop until exit.
///
/// Uses `ControlFlow::Poll` after draining IPC so the loop re-runs
/// immediately when there is pending work; otherwise `Wait`.
pub fn run_event_loop(
    event_loop: tao::event_loop::EventLoop<UserEvent>,
    shells: Vec<WindowShell>,
    storage: Arc<Storage>,
    event_proxy: tao::event_loop::EventLoopProxy<UserEvent>,
    pending_ipc: Arc<AtomicUsize>,
    ipc_queue: Arc<Mutex<Vec<(String, String)>>>,
) {
    let mut tray_icon_holder: Option<tray_icon::TrayIcon> = None;

    event_loop.run(move |event, _event_loop, control_flow| {
        *control_flow = tao::event_loop::ControlFlow::Wait;

        // Create the tray on first run (required on macOS: the loop must be
        // running).
        if tray_icon_holder.is_none()
            && let Some(icon) = crate::window::tray_icon()
        {
            let menu = tray_icon::menu::Menu::new();
            let viewer_id = tray_icon::menu::MenuId::new("show-viewer");
            let config_id = tray_icon::menu::MenuId::new("show-config");
            let quit_id = tray_icon::menu::MenuId::new("quit");
            menu.append(&tray_icon::menu::MenuItem::with_id(
                viewer_id.clone(),
                "Show Viewer",
                true,
                None,
            ))
            .ok();
            menu.append(&tray_icon::menu::MenuItem::with_id(
                config_id.clone(),
                "Model Configuration",
                true,
                None,
            ))
            .ok();
            menu.append(&tray_icon::menu::MenuItem::with_id(
                quit_id.clone(),
                "Quit",
                true,
                None,
            ))
            .ok();

            let tray_proxy = event_proxy.clone();
            tray_icon::TrayIconEvent::set_event_handler(Some(move |_| {
                let _ = tray_proxy.send_event(UserEvent::FocusWindow(VIEWER_LABEL.to_string()));
            }));
            let menu_proxy = event_proxy.clone();
            tray_icon::menu::MenuEvent::set_event_handler(Some(
                move |event: tray_icon::menu::MenuEvent| {
                    if event.id == viewer_id {
                        let _ = menu_proxy
                            .send_event(UserEvent::FocusWindow(VIEWER_LABEL.to_string()));
                    } else if event.id == config_id {
                        let _ = menu_proxy
                            .send_event(UserEvent::FocusWindow(CONFIG_LABEL.to_string()));
                    } else if event.id == quit_id {
                        let _ = menu_proxy.send_event(UserEvent::Quit);
                    }
                },
            ));
            if let Ok(tray) = tray_icon::TrayIconBuilder::new()
                .with_menu(Box::new(menu))
                .with_tooltip("Modelview")
                .with_icon(icon)
                .build()
            {
                tray_icon_holder = Some(tray);
            }
        }

        match event {
            tao::event::Event::UserEvent(ev) => match ev {
                UserEvent::ShowWindow(label) => {
                    if let Some(shell) = shells.iter().find(|s| s.label == label) {
                        shell.window.set_visible(true);
                    }
                }
                UserEvent::FocusWindow(label) => {
                    if let Some(shell) = shells.iter().find(|s| s.label == label) {
                        shell.window.set_visible(true);
                        shell.window.set_focus();
                    }
                }
                UserEvent::PushState { label, json } => {
                    if let Some(shell) = shells.iter().find(|s| s.label == label) {
                        let script = push_state_script(&json);
                        if let Err(e) = shell.webview.evaluate_script(&script) {
                            log::warn!("Config push failed for '{label}': {e}");
                        }
                    }
                }
                UserEvent::Quit => {
                    for shell in &shells {
                        save_bounds(&storage, shell);
                        shell.context.dispose();
                    }
                    *control_flow = tao::event_loop::ControlFlow::Exit;
                }
                UserEvent::IpcFlush => {
                    if drain_ipc_queue_and_deliver(&ipc_queue, &pending_ipc, &shells) {
                        *control_flow = tao::event_loop::ControlFlow::Poll;
                    }
                }
            },

            tao::event::Event::WindowEvent {
                window_id,
                event: window_event,
                ..
            } => {
                let Some(shell) = shells.iter().find(|s| s.window.id() == window_id) else {
                    return;
                };
                match window_event {
                    tao::event::WindowEvent::CloseRequested => {
                        save_bounds(&storage, shell);
                        if shell.label == CONFIG_LABEL {
                            // Hide only; listeners and state stay live so a
                            // reopen needs no catch-up.
                            shell.window.set_visible(false);
                        } else {
                            for s in &shells {
                                if s.window.id() != window_id {
                                    save_bounds(&storage, s);
                                }
                                s.context.dispose();
                            }
                            *control_flow = tao::event_loop::ControlFlow::Exit;
                        }
                    }
                    tao::event::WindowEvent::Focused(true) => {
                        // A window becoming active pulls current config from
                        // its peer (late-joiner catch-up).
                        shell.context.coordinator.sync_from_other_window();
                    }
                    _ => {}
                }
            }

            tao::event::Event::MainEventsCleared => {
                if drain_ipc_queue_and_deliver(&ipc_queue, &pending_ipc, &shells) {
                    *control_flow = tao::event_loop::ControlFlow::Poll;
                }
            }
            _ => {}
        }
    });
}
