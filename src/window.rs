use chrono::{NaiveDateTime, TimeDelta};
use std::collections::VecDeque;

use crate::loot_log::LootEvent;

// Slides on event time, not wall-clock time: a quiet log keeps its window.
#[derive(Debug)]
pub struct LootWindow {
    duration: TimeDelta,
    events: VecDeque<LootEvent>,
    latest_timestamp: Option<NaiveDateTime>,
}

impl LootWindow {
    pub fn new(window_minutes: u32) -> Self {
        Self {
            duration: TimeDelta::minutes(i64::from(window_minutes)),
            events: VecDeque::new(),
            latest_timestamp: None,
        }
    }

    pub fn push(&mut self, event: LootEvent) {
        let is_newer = self
            .latest_timestamp
            .map(|latest| event.timestamp > latest)
            .unwrap_or(true);
        if is_newer {
            self.latest_timestamp = Some(event.timestamp);
        }

        self.events.push_back(event);
    }

    pub fn evict(&mut self, cutoff: NaiveDateTime) -> usize {
        let mut evicted_count = 0;
        while self
            .events
            .front()
            .map(|oldest| oldest.timestamp < cutoff)
            .unwrap_or(false)
        {
            self.events.pop_front();
            evicted_count += 1;
        }

        evicted_count
    }

    pub fn record(&mut self, event: LootEvent) -> usize {
        self.push(event);
        match self.cutoff() {
            Some(cutoff) => self.evict(cutoff),
            None => 0,
        }
    }

    pub fn cutoff(&self) -> Option<NaiveDateTime> {
        self.latest_timestamp
            .and_then(|latest| latest.checked_sub_signed(self.duration))
    }

    pub fn events(&self) -> &VecDeque<LootEvent> {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
