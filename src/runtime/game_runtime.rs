/// Outer game loop
///
/// Per frame: time, input, minimize throttle, resize, the fixed-step loop
/// (game fixed update followed by the optionally registered physics world),
/// one variable update, audio, frame fence, draw.

use std::time::Duration;

use glam::Vec3;
use tracing::{error, info};

use super::input::InputState;
use super::platform::Platform;
use super::time_manager::TimeManager;
use crate::config::EngineConfig;
use crate::game::SceneApi;
use crate::physics::PhysicsWorld;

const MINIMIZED_SLEEP: Duration = Duration::from_millis(100);

/// Game hooks called by [`Runtime::run`]
pub trait GameCallbacks {
    fn on_init(&mut self, runtime: &mut Runtime);

    /// Variable rate, once per rendered frame
    fn on_update(&mut self, runtime: &mut Runtime, dt: f32);

    /// Fixed rate, zero or more times per frame
    fn on_fixed_update(&mut self, runtime: &mut Runtime, fixed_dt: f32);

    fn on_shutdown(&mut self, runtime: &mut Runtime);
}

pub trait AudioSystem {
    fn set_listener(&mut self, position: Vec3, forward: Vec3, up: Vec3);
    fn play_3d(&mut self, event: &str, position: Vec3);
    fn update(&mut self);
}

pub struct Runtime {
    platform: Box<dyn Platform>,
    time: TimeManager,
    input: InputState,
    scene: SceneApi,
    config: EngineConfig,
    physics: Option<Box<dyn PhysicsWorld>>,
    audio: Option<Box<dyn AudioSystem>>,
    quit_requested: bool,
}

impl Runtime {
    pub fn new(platform: Box<dyn Platform>, config: EngineConfig) -> Self {
        let mut time = TimeManager::new();
        time.set_fixed_delta_time(config.physics.fixed_dt);

        let mut scene = SceneApi::new();
        scene.debug_draw_mut().settings.segments = config.debug_draw.segments;
        scene.debug_draw_mut().settings.layer_mask = config.debug_draw.layer_mask;
        scene.set_debug_draw_enabled(config.debug_draw.enabled);

        Self {
            platform,
            time,
            input: InputState::new(),
            scene,
            config,
            physics: None,
            audio: None,
            quit_requested: false,
        }
    }

    /// Physics world stepped after every fixed update. Games that step their
    /// own world leave this unset.
    pub fn set_physics_world(&mut self, physics: Option<Box<dyn PhysicsWorld>>) {
        self.physics = physics;
    }

    pub fn physics(&self) -> Option<&dyn PhysicsWorld> {
        self.physics.as_deref()
    }

    pub fn physics_mut(&mut self) -> Option<&mut dyn PhysicsWorld> {
        match &mut self.physics {
            Some(p) => Some(p.as_mut() as &mut dyn PhysicsWorld),
            None => None,
        }
    }

    pub fn set_audio_system(&mut self, audio: Option<Box<dyn AudioSystem>>) {
        self.audio = audio;
    }

    pub fn time(&self) -> &TimeManager {
        &self.time
    }

    pub fn time_mut(&mut self) -> &mut TimeManager {
        &mut self.time
    }

    pub fn delta_time(&self) -> f32 {
        self.time.delta_time() as f32
    }

    pub fn fixed_delta_time(&self) -> f32 {
        self.time.fixed_delta_time() as f32
    }

    pub fn set_time_scale(&mut self, scale: f64) {
        self.time.set_time_scale(scale);
    }

    pub fn set_fixed_delta_time(&mut self, dt: f64) {
        self.time.set_fixed_delta_time(dt);
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn scene(&self) -> &SceneApi {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneApi {
        &mut self.scene
    }

    /// Input and scene borrowed together
    pub fn input_and_scene_mut(&mut self) -> (&InputState, &mut SceneApi) {
        (&self.input, &mut self.scene)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn run(&mut self, game: &mut dyn GameCallbacks) -> anyhow::Result<()> {
        self.quit_requested = false;
        game.on_init(self);

        let result = self.run_frames(game);
        if let Err(e) = &result {
            error!("Runtime loop aborted: {:#}", e);
        }

        game.on_shutdown(self);
        info!("Runtime stopped after {} frames", self.time.frame_count());
        result
    }

    fn run_frames(&mut self, game: &mut dyn GameCallbacks) -> anyhow::Result<()> {
        while !self.quit_requested {
            match self.platform.frame_delta() {
                Some(dt) => self.time.begin_frame_with(dt),
                None => self.time.begin_frame(),
            }

            self.input.begin_frame();
            self.platform.pump_events(&mut self.input);
            if self.input.quit_requested() {
                self.quit_requested = true;
                break;
            }
            self.input.ui_capture_keyboard = self.platform.ui_capture_keyboard();

            if self.platform.is_minimized() {
                self.platform.sleep(MINIMIZED_SLEEP);
                continue;
            }

            if self.platform.take_resize_request() {
                self.platform.recreate_swapchain()?;
            }

            self.scene
                .debug_draw_mut()
                .begin_frame(self.time.delta_time() as f32);

            while self.time.consume_fixed_step() {
                let fixed_dt = self.time.fixed_delta_time() as f32;
                game.on_fixed_update(self, fixed_dt);
                if let Some(physics) = self.physics.as_deref_mut() {
                    physics.step(fixed_dt);
                }
            }

            let dt = self.time.delta_time() as f32;
            game.on_update(self, dt);

            self.update_audio();

            self.platform.wait_for_frame();
            self.platform.draw(&self.scene)?;
        }
        Ok(())
    }

    fn update_audio(&mut self) {
        let Some(audio) = self.audio.as_deref_mut() else {
            return;
        };
        let camera = self.scene.camera;
        audio.set_listener(
            self.scene.camera_local_position(),
            camera.forward().normalize_or_zero(),
            camera.up().normalize_or_zero(),
        );
        audio.update();
    }
}
