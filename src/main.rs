// main.rs — window, event loop, metadata overlay and status bar

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

mod animation;
mod assets;
mod camera;
mod focus;
mod fonts;
mod gesture;
mod layout;
mod media;
mod mesh;
mod orchestrator;
mod panel;
mod params;
mod renderer;

use assets::LoadEvent;
use media::{LaunchOptions, Manifest};
use orchestrator::{CarouselState, ScrollSource};
use renderer::Renderer;

use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, WindowBuilder},
};

use serde::Deserialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const APP_TITLE: &str = "Depth Carousel";
/// Pixels per wheel line on devices that report lines.
const WHEEL_LINE_PX: f32 = 40.0;

/// Scroll position posted by an embedding host, one JSON object per stdin line.
#[derive(Debug, Deserialize)]
struct ScrollMessage {
    #[serde(rename = "scrollY")]
    scroll_y: f32,
}

fn parse_scroll_message(line: &str) -> Option<f32> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<ScrollMessage>(line) {
        Ok(msg) if msg.scroll_y.is_finite() => Some(msg.scroll_y),
        Ok(_) => None,
        Err(e) => {
            log::debug!("Ignoring scroll message {:?}: {}", line, e);
            None
        }
    }
}

fn spawn_external_scroll_reader(tx: Sender<f32>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(y) = parse_scroll_message(&line) {
                if tx.send(y).is_err() {
                    break;
                }
            }
        }
        log::debug!("External scroll input closed");
    });
}

fn wheel_pixels(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y * WHEEL_LINE_PX,
        MouseScrollDelta::PixelDelta(pos) => -pos.y as f32,
    }
}

/// Events that close a gesture. They are never swallowed by the overlay.
fn ends_interaction(event: &WindowEvent) -> bool {
    matches!(
        event,
        WindowEvent::MouseInput { state: ElementState::Released, .. }
            | WindowEvent::Touch(Touch { phase: TouchPhase::Ended | TouchPhase::Cancelled, .. })
            | WindowEvent::CursorLeft { .. }
    )
}

fn pick_manifest() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Carousel manifest", &["json"])
        .pick_file()
}

fn is_manifest_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Pushes the ring to the GPU and queues decoding of every texture not cached yet.
fn sync_gpu(renderer: &mut Renderer, state: &CarouselState, tx: &Sender<LoadEvent>) -> usize {
    let missing = renderer.sync_ring(&state.ring);
    let pending = missing.len();
    if !missing.is_empty() {
        assets::spawn_loader(missing, state.ring.generation, tx.clone());
    }
    pending
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = LaunchOptions::from_args(std::env::args().skip(1));
    let manifest = media::load_or_demo(&options);

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(APP_TITLE)
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .unwrap(),
    );

    let mut renderer = pollster::block_on(Renderer::new(window.clone()));
    fonts::install(
        &renderer.egui_ctx,
        &fonts::candidates(manifest.font.as_deref().map(|f| manifest.resolve_path(f))),
    );

    let clock = Instant::now();
    let size = window.inner_size();
    let mut state = CarouselState::new(manifest, (size.width, size.height), 0.0);

    // 异步加载通道
    let (tx, rx): (Sender<LoadEvent>, Receiver<LoadEvent>) = channel();
    let mut pending_textures = sync_gpu(&mut renderer, &state, &tx);

    let (scroll_tx, scroll_rx) = channel();
    if options.external_scroll {
        state.set_scroll_source(ScrollSource::External);
        spawn_external_scroll_reader(scroll_tx);
        log::info!("Reading scroll positions from stdin");
    }

    // 交互状态
    let mut cursor: Option<PhysicalPosition<f64>> = None;
    let mut is_fullscreen = false;
    let mut show_status = true;

    // FPS 计算
    let mut last_frame_time = Instant::now();
    let mut frame_count = 0;
    let mut fps = 0.0;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        let now_ms = clock.elapsed().as_secs_f64() * 1000.0;

        // 检查是否有新加载的纹理
        while let Ok(load) = rx.try_recv() {
            if load.generation() == state.ring.generation {
                pending_textures = pending_textures.saturating_sub(1);
            }
            if let LoadEvent::Loaded { texture, .. } = load {
                renderer.upload_texture(texture);
            }
        }
        while let Ok(y) = scroll_rx.try_recv() {
            state.external_scroll(y);
        }

        let mut next_manifest: Option<PathBuf> = None;

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理事件
                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);
                if let WindowEvent::CursorMoved { position, .. } = &event {
                    cursor = Some(*position);
                }
                // releases must reach the carousel even over egui widgets
                if response.consumed && !ends_interaction(&event) {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                        state.resized(new_size.width, new_size.height, now_ms);
                    }

                    // 键盘快捷键
                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state == ElementState::Pressed {
                            match input.virtual_keycode {
                                Some(VirtualKeyCode::O) => next_manifest = pick_manifest(),
                                Some(VirtualKeyCode::F11) => {
                                    is_fullscreen = !is_fullscreen;
                                    if is_fullscreen {
                                        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                                    } else {
                                        window.set_fullscreen(None);
                                    }
                                }
                                Some(VirtualKeyCode::Escape) if is_fullscreen => {
                                    is_fullscreen = false;
                                    window.set_fullscreen(None);
                                }
                                _ => {}
                            }
                        }
                    }

                    // 鼠标交互
                    WindowEvent::MouseInput { state: button_state, button: MouseButton::Left, .. } => {
                        match (button_state, cursor) {
                            (ElementState::Pressed, Some(pos)) => {
                                state.pointer_pressed(pos.x as f32, pos.y as f32, now_ms)
                            }
                            (ElementState::Released, _) => state.pointer_released(now_ms),
                            _ => {}
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        state.pointer_moved(position.x as f32, position.y as f32, now_ms);
                    }

                    WindowEvent::CursorLeft { .. } => {
                        cursor = None;
                        state.pointer_left();
                    }

                    WindowEvent::Touch(Touch { phase, location, id, .. }) => {
                        let (x, y) = (location.x as f32, location.y as f32);
                        match phase {
                            TouchPhase::Started => state.touch_started(id, x, y, now_ms),
                            TouchPhase::Moved => state.touch_moved(id, x, y, now_ms),
                            TouchPhase::Ended | TouchPhase::Cancelled => state.touch_ended(id, now_ms),
                        }
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        state.wheel(wheel_pixels(delta));
                    }

                    WindowEvent::DroppedFile(path) => {
                        if is_manifest_file(&path) {
                            next_manifest = Some(path);
                        } else {
                            log::warn!("Dropped file {} is not a manifest", path.display());
                        }
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                // FPS 统计
                frame_count += 1;
                let now = Instant::now();
                if now.duration_since(last_frame_time).as_secs_f32() >= 1.0 {
                    fps = frame_count as f32 / now.duration_since(last_frame_time).as_secs_f32();
                    frame_count = 0;
                    last_frame_time = now;
                }

                let frame = state.tick(now_ms / 1000.0);
                if frame.rebuilt {
                    pending_textures = sync_gpu(&mut renderer, &state, &tx);
                }

                let render_result = renderer.render_with_ui(&window, &state, |ctx| {
                    draw_ui(
                        ctx,
                        &state,
                        frame.rotation,
                        &mut next_manifest,
                        &mut show_status,
                        &mut is_fullscreen,
                        fps,
                        pending_textures,
                        &window,
                    );
                });

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.resize(renderer.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory");
                        *control_flow = ControlFlow::Exit;
                    }
                    Err(e) => log::warn!("Render error: {:?}", e),
                }
            }

            Event::MainEventsCleared => {
                window.request_redraw();
            }

            _ => {}
        }

        if let Some(path) = next_manifest {
            match Manifest::load(&path) {
                Ok(manifest) => {
                    log::info!("Switching to manifest {}", path.display());
                    fonts::install(
                        &renderer.egui_ctx,
                        &fonts::candidates(manifest.font.as_deref().map(|f| manifest.resolve_path(f))),
                    );
                    state.replace_manifest(manifest);
                    pending_textures = sync_gpu(&mut renderer, &state, &tx);
                }
                Err(e) => log::error!("{:#}", e),
            }
        }
    });
}

#[allow(clippy::too_many_arguments)]
fn draw_ui(
    ctx: &egui::Context,
    state: &CarouselState,
    rotation: f32,
    next_manifest: &mut Option<PathBuf>,
    show_status: &mut bool,
    is_fullscreen: &mut bool,
    fps: f32,
    pending_textures: usize,
    window: &winit::window::Window,
) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open manifest…").clicked() {
                    ui.close_menu();
                    *next_manifest = pick_manifest();
                }
                if ui.button("Exit").clicked() {
                    std::process::exit(0);
                }
            });

            ui.menu_button("View", |ui| {
                if ui
                    .button(if *is_fullscreen { "Exit fullscreen" } else { "Fullscreen" })
                    .clicked()
                {
                    *is_fullscreen = !*is_fullscreen;
                    if *is_fullscreen {
                        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                    } else {
                        window.set_fullscreen(None);
                    }
                    ui.close_menu();
                }
                if ui.checkbox(show_status, "Status bar").clicked() {
                    ui.close_menu();
                }
            });
        });
    });

    // 当前面板信息
    if let Some(meta) = state.focused_meta().filter(|m| !m.is_empty()) {
        egui::Area::new("focused_meta")
            .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(24.0, -48.0))
            .interactable(true)
            .show(ctx, |ui| {
                if let Some(category) = &meta.category {
                    ui.label(egui::RichText::new(category.to_uppercase()).small().color(egui::Color32::LIGHT_GRAY));
                }
                if let Some(title) = &meta.title {
                    ui.label(egui::RichText::new(title).heading().strong().color(egui::Color32::WHITE));
                }
                if let Some(link) = &meta.link {
                    ui.hyperlink_to("Open", link);
                }
            });
    }

    if !*show_status {
        return;
    }

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if pending_textures > 0 {
                ui.label(
                    egui::RichText::new(format!("Loading {} textures", pending_textures))
                        .color(egui::Color32::YELLOW),
                );
                ui.label("|");
            }

            ui.label(format!("Panels: {}", state.ring.item_count));
            ui.label("|");
            ui.label(format!("Mode: {:?}", state.controller.mode()));
            if let Some(target) = state.controller.snap_target() {
                ui.label(format!("→ {:.1}°", target.to_degrees()));
            }
            ui.label("|");
            ui.label(format!("Rotation: {:.1}°", rotation.to_degrees()));
            ui.label("|");
            ui.label(format!("Layout: {:?}", state.breakpoint()));
            ui.label("|");
            match state.focus.focused {
                Some(i) => ui.label(format!("Focus: #{}", state.ring.panels[i].item)),
                None => ui.label("Focus: none"),
            };
            if state.is_hovered() {
                ui.label("(hover)");
            }
            ui.label("|");
            ui.label(format!("Animations: {}", state.animations.len()));
            ui.label("|");
            ui.label(egui::RichText::new(format!("FPS: {:.1}", fps)).color(egui::Color32::GREEN));
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_messages_parse() {
        assert_eq!(parse_scroll_message(r#"{"scrollY": 1200}"#), Some(1200.0));
        assert_eq!(parse_scroll_message(r#"  {"scrollY":0.5}  "#), Some(0.5));
        assert_eq!(parse_scroll_message(""), None);
        assert_eq!(parse_scroll_message("not json"), None);
        assert_eq!(parse_scroll_message(r#"{"scrollX": 3}"#), None);
    }

    #[test]
    fn wheel_down_scrolls_forward() {
        assert_eq!(wheel_pixels(MouseScrollDelta::LineDelta(0.0, -1.0)), WHEEL_LINE_PX);
        assert_eq!(
            wheel_pixels(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 25.0))),
            -25.0
        );
    }

    #[test]
    fn gesture_ends_bypass_the_overlay() {
        let device_id = unsafe { winit::event::DeviceId::dummy() };
        let touch = |phase| {
            WindowEvent::Touch(Touch {
                device_id,
                phase,
                location: PhysicalPosition::new(10.0, 10.0),
                force: None,
                id: 1,
            })
        };
        assert!(ends_interaction(&touch(TouchPhase::Ended)));
        assert!(ends_interaction(&touch(TouchPhase::Cancelled)));
        assert!(!ends_interaction(&touch(TouchPhase::Started)));
        assert!(!ends_interaction(&touch(TouchPhase::Moved)));
        assert!(ends_interaction(&WindowEvent::CursorLeft { device_id }));
        assert!(!ends_interaction(&WindowEvent::Focused(true)));
    }

    #[test]
    fn only_json_files_are_manifests() {
        assert!(is_manifest_file(Path::new("a/carousel.JSON")));
        assert!(!is_manifest_file(Path::new("a/photo.png")));
        assert!(!is_manifest_file(Path::new("README")));
    }
}
