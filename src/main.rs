use std::{env, process, sync::Arc};

use dicom_mip::{enums::Axis, renderer::SliceStackRenderer, volume_loader::VolumeLoader};
use log::{error, info};
use web_time::Instant;
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window},
};

const WINDOW_TITLE: &str = "dicom-mip";
const WINDOW_WIDTH: f64 = 640.0;
const WINDOW_HEIGHT: f64 = 480.0;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    simple_logger::init_with_level(log::Level::Info).unwrap_or_else(|err| {
        eprintln!("Logger initialization failed: {err}");
        process::exit(1);
    });

    let Some(index_path) = env::args().nth(1) else {
        eprintln!("usage: dicom-mip <slice-index-file>");
        process::exit(1);
    };

    let start = Instant::now();
    let volume = VolumeLoader::load_from_index_file(&index_path).unwrap_or_else(|err| {
        error!("could not build volume from {index_path}: {err}");
        process::exit(1);
    });
    info!("volume assembled in {:.2?}", start.elapsed());

    let event_loop = EventLoop::new().unwrap_or_else(|err| {
        error!("could not create event loop: {err}");
        process::exit(1);
    });
    event_loop.set_control_flow(ControlFlow::Poll);

    #[allow(deprecated)]
    let window = event_loop
        .create_window(
            Window::default_attributes()
                .with_title(WINDOW_TITLE)
                .with_inner_size(LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT)),
        )
        .unwrap_or_else(|err| {
            error!("could not create window: {err}");
            process::exit(1);
        });
    let window = Arc::new(window);

    let mut renderer = SliceStackRenderer::new(window.clone(), &volume)
        .await
        .unwrap_or_else(|err| {
            error!("{err}");
            process::exit(1);
        });
    info!("renderer ready after {:.2?}", start.elapsed());

    let mut entered_fullscreen = false;

    #[allow(deprecated)]
    event_loop
        .run(move |event, target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => target.exit(),
                WindowEvent::Resized(size) => renderer.resize(size.width, size.height),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(code),
                            state: ElementState::Pressed,
                            ..
                        },
                    ..
                } => handle_key(code, target, &window, &mut renderer, &mut entered_fullscreen),
                WindowEvent::RedrawRequested => {
                    if let Err(err) = renderer.render_frame() {
                        error!("{err}");
                        process::exit(1);
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            _ => {}
        })
        .unwrap_or_else(|err| {
            error!("event loop failed: {err}");
            process::exit(1);
        });
}

fn handle_key(
    code: KeyCode,
    target: &ActiveEventLoop,
    window: &Window,
    renderer: &mut SliceStackRenderer,
    entered_fullscreen: &mut bool,
) {
    match code {
        KeyCode::Escape => target.exit(),
        KeyCode::KeyE => {
            // Fullscreen is a one-way switch.
            if !*entered_fullscreen {
                *entered_fullscreen = true;
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            }
        }
        KeyCode::KeyF => {
            renderer.cycle_filter_mode();
        }
        KeyCode::KeyL => {
            renderer.toggle_lighting();
        }
        KeyCode::KeyB => {
            renderer.toggle_blending();
        }
        KeyCode::KeyD => {
            renderer.toggle_depth_test();
        }
        KeyCode::ArrowLeft => renderer.rotate(Axis::Z, -1),
        KeyCode::ArrowRight => renderer.rotate(Axis::Z, 1),
        KeyCode::ArrowUp => renderer.rotate(Axis::X, 1),
        KeyCode::ArrowDown => renderer.rotate(Axis::X, -1),
        KeyCode::KeyJ => renderer.rotate(Axis::Y, -1),
        KeyCode::KeyK => renderer.rotate(Axis::Y, 1),
        _ => {}
    }
}
