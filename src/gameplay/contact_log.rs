/// Bounded log of collision begins on the player ship

use std::collections::VecDeque;

use glam::Vec3;
use tracing::info;

use crate::physics::{BodyId, CollisionEvent, ContactEventType};

pub const CONTACT_LOG_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactLogEntry {
    pub time_s: f64,
    pub event_type: ContactEventType,
    pub self_body: BodyId,
    pub other_body: BodyId,
    pub self_user_data: u64,
    pub other_user_data: u64,
    pub point: Vec3,
    pub normal: Vec3,
    pub penetration_depth: f32,
}

#[derive(Debug, Clone)]
pub struct ContactLog {
    entries: VecDeque<ContactLogEntry>,
    capacity: usize,
    pub enabled: bool,
    pub print_console: bool,
    now_s: f64,
}

impl Default for ContactLog {
    fn default() -> Self {
        Self::new(CONTACT_LOG_CAPACITY)
    }
}

impl ContactLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            enabled: true,
            print_console: false,
            now_s: 0.0,
        }
    }

    /// Timestamp applied to events recorded from now on
    pub fn set_time(&mut self, now_s: f64) {
        self.now_s = now_s;
    }

    /// Only Begin events are kept; the oldest entry drops when full
    pub fn record(&mut self, event: &CollisionEvent) {
        if !self.enabled || event.event_type != ContactEventType::Begin {
            return;
        }
        let entry = ContactLogEntry {
            time_s: self.now_s,
            event_type: event.event_type,
            self_body: event.self_body,
            other_body: event.other_body,
            self_user_data: event.self_user_data,
            other_user_data: event.other_user_data,
            point: event.point,
            normal: event.normal,
            penetration_depth: event.penetration_depth,
        };
        if self.print_console {
            info!(
                "[Contact] t={:.2}s body {} -> {} depth {:.3} normal ({:.2}, {:.2}, {:.2})",
                entry.time_s,
                entry.self_body.value(),
                entry.other_body.value(),
                entry.penetration_depth,
                entry.normal.x,
                entry.normal.y,
                entry.normal.z
            );
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &ContactLogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ContactLogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
