// Bunnymark: bouncing sprites drawn either through the instanced pool or the
// immediate quad batcher. Space switches paths, Up adds a wave, Down clears.
//
//   cargo run --release -- [config.json]

use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use fsprites::{
    BatchConfig, BlendMode, Camera2D, FastSprite, FastSpriteLayer, Renderer, RenderNode, Rgba,
    SharedFastSprite, SpriteBatch, SpriteError, SpriteHandle, SpritePool, SpriteVariants,
    TextureRegion,
};

const WINDOW_W: u32 = 1280;
const WINDOW_H: u32 = 720;
const BUNNY_SIZE: u32 = 26;
const WAVE: usize = 1000;
const GRAVITY: f32 = 900.0;

// ── Procedural textures ──────────────────────────────────────────────────────

fn pseudo_rand(seed: u64) -> f32 {
    let x = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (x >> 40) as f32 / (1u64 << 24) as f32
}

/// A soft disc with a darker rim, tinted `rgb`.
fn disc_pixels(size: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut out = Vec::with_capacity((size * size * 4) as usize);
    let c = (size as f32 - 1.0) * 0.5;
    for y in 0..size {
        for x in 0..size {
            let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt() / c;
            let (shade, alpha) = match d {
                d if d > 1.0 => (0.0, 0),
                d if d > 0.8 => (0.6, 255),
                _ => (1.0, 255),
            };
            out.extend(rgb.iter().map(|&v| (v as f32 * shade) as u8));
            out.push(alpha);
        }
    }
    out
}

// ── Bunnies ──────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Path {
    Instanced,
    Immediate,
}

struct Bunny {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    spin: f32,
    angle: f32,
    handle: SpriteHandle,
    fast: SharedFastSprite,
}

struct Demo {
    renderer: Renderer,
    batch: SpriteBatch,
    layer: FastSpriteLayer,
    regions: [TextureRegion; 2],
    bunnies: Vec<Bunny>,
    path: Path,
    spawned: u64,
    frames: u32,
    fps_timer: f32,
}

impl Demo {
    fn new(mut renderer: Renderer, config: &BatchConfig) -> Result<Self, SpriteError> {
        let pink = disc_pixels(BUNNY_SIZE, [255, 140, 200]);
        let teal = disc_pixels(BUNNY_SIZE, [80, 220, 200]);
        let regions = [
            renderer
                .textures
                .insert_rgba(&renderer.device, &renderer.queue, BUNNY_SIZE, BUNNY_SIZE, &pink),
            renderer
                .textures
                .insert_rgba(&renderer.device, &renderer.queue, BUNNY_SIZE, BUNNY_SIZE, &teal),
        ];

        let variants = Arc::new(SpriteVariants::new(&renderer.device, renderer.surface_format())?);
        let pool = SpritePool::with_config(config)?;
        let caps = renderer.caps.limited(config.max_textures);
        let mut batch = SpriteBatch::new(&renderer.device, variants, caps, pool);
        for region in &regions {
            batch.add_texture(region.texture)?;
        }

        let layer = FastSpriteLayer::new(&renderer.device, renderer.surface_format(), config.max_quads);
        renderer.clear_color = wgpu::Color { r: 0.08, g: 0.09, b: 0.12, a: 1.0 };

        Ok(Self {
            renderer,
            batch,
            layer,
            regions,
            bunnies: Vec::new(),
            path: Path::Instanced,
            spawned: 0,
            frames: 0,
            fps_timer: 0.0,
        })
    }

    fn spawn_wave(&mut self) {
        let mut added = 0;
        for _ in 0..WAVE {
            let handle = match self.batch.pool.alloc() {
                Ok(h) => h,
                Err(e) => {
                    log::warn!("{e}");
                    break;
                }
            };
            let seed = self.spawned;
            self.spawned += 1;

            let slot = (seed % 2) as usize;
            let pool = &mut self.batch.pool;
            pool.set_region(handle, &self.regions[slot]);
            pool.set_tex_slot(handle, slot as u8);
            pool.set_anchor(handle, 0.5, 0.5);

            let tint = Rgba::from_f32(
                0.6 + pseudo_rand(seed.wrapping_add(3)) * 0.4,
                0.6 + pseudo_rand(seed.wrapping_add(5)) * 0.4,
                0.6 + pseudo_rand(seed.wrapping_add(7)) * 0.4,
                1.0,
            );
            pool.set_color(handle, tint);

            // The immediate path binds one texture, so every fast sprite uses the first.
            let mut sprite = FastSprite::new(&self.regions[0]);
            sprite.set_anchor(0.5, 0.5);
            sprite.set_color(tint);
            let fast = self.layer.container.add(sprite);

            self.bunnies.push(Bunny {
                x: 20.0,
                y: 20.0,
                vx: 100.0 + pseudo_rand(seed) * 400.0,
                vy: (pseudo_rand(seed.wrapping_add(1)) - 0.5) * 400.0,
                spin: (pseudo_rand(seed.wrapping_add(2)) - 0.5) * 6.0,
                angle: 0.0,
                handle,
                fast,
            });
            added += 1;
        }
        log::info!("{added} bunnies added, {} total", self.bunnies.len());
    }

    fn clear(&mut self) {
        self.bunnies.clear();
        self.batch.pool.reset();
        self.layer.container.clear();
        log::info!("bunnies cleared");
    }

    fn toggle_path(&mut self) {
        self.path = match self.path {
            Path::Instanced => Path::Immediate,
            Path::Immediate => Path::Instanced,
        };
        log::info!("drawing through the {:?} path", self.path);
    }

    fn update(&mut self, dt: f32) {
        let (w, h) = self.renderer.size();
        let (w, h) = (w as f32, h as f32);
        let immediate = self.path == Path::Immediate;

        for b in &mut self.bunnies {
            b.vy += GRAVITY * dt;
            b.x += b.vx * dt;
            b.y += b.vy * dt;
            b.angle += b.spin * dt;

            if b.x < 0.0 || b.x > w {
                b.vx = -b.vx;
                b.x = b.x.clamp(0.0, w);
            }
            if b.y > h {
                b.y = h;
                b.vy *= -0.85;
            } else if b.y < 0.0 {
                b.y = 0.0;
                b.vy = 0.0;
            }

            if immediate {
                let mut fast = b.fast.borrow_mut();
                fast.set_position(b.x, b.y);
                fast.set_rotation(b.angle);
            } else {
                self.batch.pool.set_position(b.handle, b.x, b.y);
                self.batch.pool.set_angle(b.handle, b.angle);
            }
        }

        self.frames += 1;
        self.fps_timer += dt;
        if self.fps_timer >= 2.0 {
            log::info!(
                "{:.1} fps, {} bunnies, {:?}",
                self.frames as f32 / self.fps_timer,
                self.bunnies.len(),
                self.path
            );
            self.frames = 0;
            self.fps_timer = 0.0;
        }
    }

    fn render(&mut self) -> Result<(), SpriteError> {
        let (w, h) = self.renderer.size();
        let camera = Camera2D::new(w as f32 * 0.5, h as f32 * 0.5).build_view_proj(w as f32, h as f32);
        let node: &mut dyn RenderNode = match self.path {
            Path::Instanced => &mut self.batch,
            Path::Immediate => &mut self.layer,
        };
        self.renderer.render(camera, &mut [(node, BlendMode::Normal)])
    }
}

// ── App (winit ApplicationHandler) ──────────────────────────────────────────

struct App {
    config: BatchConfig,
    demo: Option<Demo>,
    last_instant: Option<Instant>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.demo.is_some() {
            return;
        }
        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("fsprites bunnymark")
                .with_inner_size(winit::dpi::PhysicalSize::new(WINDOW_W, WINDOW_H)),
        ) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("window creation failed: {e}");
                event_loop.exit();
                return;
            }
        };

        let demo = pollster::block_on(Renderer::new(window))
            .and_then(|renderer| Demo::new(renderer, &self.config));
        match demo {
            Ok(mut demo) => {
                demo.spawn_wave();
                self.demo = Some(demo);
            }
            Err(e) => {
                log::error!("startup failed: {e}");
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(demo) = self.demo.as_ref() {
            demo.renderer.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(demo) = self.demo.as_mut() else { return };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => demo.renderer.resize(size),

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = match self.last_instant {
                    Some(prev) => now.duration_since(prev).as_secs_f32().min(0.05),
                    None => 1.0 / 60.0,
                };
                self.last_instant = Some(now);

                demo.update(dt);
                match demo.render() {
                    Ok(()) => {}
                    Err(SpriteError::Surface(wgpu::SurfaceError::Lost)) => {
                        let size = demo.renderer.window.inner_size();
                        demo.renderer.resize(size);
                    }
                    Err(e) => log::error!("render error: {e}"),
                }
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Space => demo.toggle_path(),
                KeyCode::ArrowUp => demo.spawn_wave(),
                KeyCode::ArrowDown => demo.clear(),
                KeyCode::Escape => event_loop.exit(),
                _ => {}
            },

            _ => {}
        }
    }
}

fn load_config() -> BatchConfig {
    let Some(path) = std::env::args().nth(1) else {
        return BatchConfig::default();
    };
    let loaded = std::fs::read_to_string(&path)
        .map_err(|e| SpriteError::InvalidConfig(format!("{path}: {e}")))
        .and_then(|text| BatchConfig::from_json(&text));
    match loaded {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{e}; using defaults");
            BatchConfig::default()
        }
    }
}

fn main() {
    env_logger::init();

    let mut app = App { config: load_config(), demo: None, last_instant: None };
    let event_loop = match EventLoop::new() {
        Ok(l) => l,
        Err(e) => {
            log::error!("event loop: {e}");
            return;
        }
    };
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("{e}");
    }
}
