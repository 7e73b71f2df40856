//! Model viewer demo
//!
//! Loads an OBJ model and its texture, then spins it in the offscreen
//! viewport with a small UI overlay on top. Escape or closing the window
//! exits.

use glfw::{Action, Key, WindowEvent};
use std::time::Instant;

use render_engine::assets;
use render_engine::prelude::*;

struct ViewerApp {
    window: Window,
    renderer: Renderer,
    ui: UiDrawData,
    start_time: Instant,
}

impl ViewerApp {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = EngineConfig::load("engine.toml")?;
        config.validate().map_err(|message| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, message)
        })?;

        log::info!("creating window...");
        let mut window = Window::new(
            &config.window.title,
            config.window.width,
            config.window.height,
        )?;

        let mesh = match assets::load_obj(&config.assets.model) {
            Ok(obj) => {
                let mesh = Mesh::from_obj(&obj);
                log::info!(
                    "loaded model {:?}: {} vertices, {} indices",
                    config.assets.model,
                    mesh.vertices.len(),
                    mesh.indices.len()
                );
                mesh
            }
            Err(e) => {
                log::warn!("failed to load {:?} ({}), using built-in quad", config.assets.model, e);
                Mesh::unit_quad()
            }
        };

        let pixels = match assets::load_rgba8(&config.assets.texture) {
            Ok(pixels) => pixels,
            Err(e) => {
                log::warn!(
                    "failed to load {:?} ({}), using white texture",
                    config.assets.texture,
                    e
                );
                assets::RgbaImage::white()
            }
        };

        log::info!("creating renderer...");
        let renderer = Renderer::new(&mut window, &config.renderer, &mesh, &pixels)?;

        Ok(Self {
            window,
            renderer,
            ui: UiDrawData::default(),
            start_time: Instant::now(),
        })
    }

    fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        while !self.window.should_close() {
            let events = self.window.poll_events();
            for event in events {
                if let WindowEvent::Key(Key::Escape, _, Action::Press, _) = event {
                    self.window.set_should_close(true);
                }
            }

            let elapsed = self.start_time.elapsed().as_secs_f32();
            let (width, height) = self.renderer.extent();
            let aspect = width as f32 / height.max(1) as f32;

            self.ui.clear();
            // Status strip along the top edge
            self.ui
                .push_panel(0.0, 0.0, width as f32, 28.0, [0.08, 0.08, 0.1, 0.85]);
            self.ui
                .push_panel(8.0, 8.0, 12.0, 12.0, [0.3, 0.9, 0.4, 1.0]);

            let input = FrameInput {
                model: rotation(Vec3::z_axis(), elapsed * 45f32.to_radians()),
                view: look_at(
                    Point3::new(2.0, 2.0, 2.0),
                    Point3::origin(),
                    Vec3::new(0.0, 0.0, 1.0),
                ),
                projection: perspective_vk(45f32.to_radians(), aspect, 0.1, 100.0),
                ui: &self.ui,
            };

            self.renderer.draw_frame(&mut self.window, &input)?;
        }

        log::info!("shutting down...");
        self.renderer.wait_idle()?;
        Ok(())
    }
}

fn main() {
    env_logger::init();

    let mut app = match ViewerApp::new() {
        Ok(app) => app,
        Err(e) => {
            log::error!("initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run() {
        log::error!("fatal render error: {}", e);
        std::process::exit(1);
    }
}
