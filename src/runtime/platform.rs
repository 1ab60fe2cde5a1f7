/// Window, input and presentation backends driven by the runtime loop
///
/// The windowed renderer is an external collaborator; the crate ships a
/// headless platform that replays scripted key states with a fixed frame delta.

use std::collections::BTreeMap;
use std::time::Duration;

use winit::keyboard::KeyCode;

use super::input::InputState;
use crate::game::{RenderItem, SceneApi};

pub trait Platform {
    /// Feed this frame's key state and quit requests into `input`
    fn pump_events(&mut self, input: &mut InputState);

    /// Fixed frame delta in seconds, or `None` to use the wall clock
    fn frame_delta(&self) -> Option<f64> {
        None
    }

    fn is_minimized(&self) -> bool {
        false
    }

    /// Returns true once per pending resize
    fn take_resize_request(&mut self) -> bool {
        false
    }

    fn recreate_swapchain(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn ui_capture_keyboard(&self) -> bool {
        false
    }

    /// Block until the previous frame's GPU work is done and release its
    /// deferred deletions
    fn wait_for_frame(&mut self) {}

    fn draw(&mut self, scene: &SceneApi) -> anyhow::Result<()>;

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Scripted, window-less platform
#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    frame_delta: f64,
    max_frames: u64,
    frame: u64,
    /// Frame index -> keys held from that frame on
    script: BTreeMap<u64, Vec<KeyCode>>,
    minimized_frames: Vec<u64>,
    resize_frames: Vec<u64>,
    draw_count: u64,
    last_render_list: Vec<RenderItem>,
    last_line_vertex_count: usize,
}

impl HeadlessPlatform {
    pub fn new(frame_delta: f64, max_frames: u64) -> Self {
        Self {
            frame_delta,
            max_frames,
            frame: 0,
            script: BTreeMap::new(),
            minimized_frames: Vec::new(),
            resize_frames: Vec::new(),
            draw_count: 0,
            last_render_list: Vec::new(),
            last_line_vertex_count: 0,
        }
    }

    /// Hold `keys` from frame `frame` until the next scripted entry
    pub fn hold_keys(mut self, frame: u64, keys: &[KeyCode]) -> Self {
        self.script.insert(frame, keys.to_vec());
        self
    }

    pub fn minimized_at(mut self, frame: u64) -> Self {
        self.minimized_frames.push(frame);
        self
    }

    pub fn resize_at(mut self, frame: u64) -> Self {
        self.resize_frames.push(frame);
        self
    }

    /// Frames pumped so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    pub fn last_render_list(&self) -> &[RenderItem] {
        &self.last_render_list
    }

    pub fn last_line_vertex_count(&self) -> usize {
        self.last_line_vertex_count
    }

    fn current_frame(&self) -> u64 {
        self.frame.saturating_sub(1)
    }
}

impl Platform for HeadlessPlatform {
    fn pump_events(&mut self, input: &mut InputState) {
        self.frame += 1;
        if self.max_frames > 0 && self.frame > self.max_frames {
            input.request_quit();
            return;
        }
        let frame = self.current_frame();
        if let Some((_, keys)) = self.script.range(..=frame).next_back() {
            input.apply_snapshot(keys);
        }
    }

    fn frame_delta(&self) -> Option<f64> {
        Some(self.frame_delta)
    }

    fn is_minimized(&self) -> bool {
        self.minimized_frames.contains(&self.current_frame())
    }

    fn take_resize_request(&mut self) -> bool {
        let frame = self.current_frame();
        let before = self.resize_frames.len();
        self.resize_frames.retain(|f| *f != frame);
        self.resize_frames.len() != before
    }

    fn draw(&mut self, scene: &SceneApi) -> anyhow::Result<()> {
        let origin = scene.world_origin();
        self.last_render_list = scene.build_render_list(origin);
        self.last_line_vertex_count = scene.build_debug_lines(origin).vertices.len();
        self.draw_count += 1;
        Ok(())
    }

    fn sleep(&mut self, _duration: Duration) {}
}
