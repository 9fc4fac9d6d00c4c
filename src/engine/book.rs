use std::cmp::Reverse;
use std::time::Duration;

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, instrument, trace};

use crate::engine::types::{now_ms, OrderBookLevel, OrderBookSnapshot, Side};

/// Tunables for the synthetic ladder. `Default` carries the stock values.
#[derive(Debug, Clone, PartialEq)]
pub struct BookParams {
    pub initial_levels: usize,
    pub max_levels: usize,
    /// Removal only happens while a side holds more levels than this.
    pub min_levels: usize,
    /// Levels at the top of book that removal never touches.
    pub protected_levels: usize,
    pub spacing_base: f64,
    pub spacing_step: f64,
    pub spacing_multiplier_max: f64,
    pub size_min: f64,
    pub size_range: f64,
    /// Cumulative size that maps to a depth of 100.
    pub depth_scale: f64,
    pub modify_weight: f64,
    pub insert_weight: f64,
    pub max_size_delta: f64,
    pub insert_max_offset: f64,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub highlight: Duration,
}

impl Default for BookParams {
    fn default() -> Self {
        Self {
            initial_levels: 10,
            max_levels: 15,
            min_levels: 5,
            protected_levels: 3,
            spacing_base: 0.0001,
            spacing_step: 0.0002,
            spacing_multiplier_max: 2.0,
            size_min: 0.1,
            size_range: 5.0,
            depth_scale: 10.0,
            modify_weight: 0.4,
            insert_weight: 0.3,
            max_size_delta: 1.0,
            insert_max_offset: 0.002,
            min_interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(3000),
            highlight: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Modify,
    Insert,
    Remove,
}

/// What the last `tick` did to the ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mutation {
    Modified { side: Side, index: usize, delta: f64 },
    Inserted { side: Side, price: f64 },
    Merged { side: Side, price: f64 },
    Removed { side: Side, index: usize },
    Skipped { side: Side, branch: Branch },
}

#[derive(Debug)]
pub struct SyntheticBook<R = StdRng> {
    params: BookParams,
    rng: R,
    bids: Vec<OrderBookLevel>,
    asks: Vec<OrderBookLevel>,
    last_price: f64,
    spread: f64,
    spread_percent: f64,
    next_id: u64,
    last_mutation: Option<Mutation>,
}

impl<R: Rng> SyntheticBook<R> {
    pub fn new(params: BookParams, rng: R) -> Self {
        Self {
            params,
            rng,
            bids: Vec::new(),
            asks: Vec::new(),
            last_price: 0.0,
            spread: 0.0,
            spread_percent: 0.0,
            next_id: 1,
            last_mutation: None,
        }
    }

    pub fn params(&self) -> &BookParams {
        &self.params
    }

    /// Build a fresh ladder around `mid_price`, discarding any previous state.
    #[instrument(level = "debug", skip(self))]
    pub fn initialize(&mut self, mid_price: f64) -> OrderBookSnapshot {
        self.bids.clear();
        self.asks.clear();
        self.last_price = mid_price;
        self.last_mutation = None;

        let ts = now_ms();
        let mut offset = 0.0;
        for _ in 0..self.params.initial_levels {
            offset += self.level_spacing(mid_price);
            let level = self.new_level(mid_price - offset, ts, false);
            self.bids.push(level);
        }
        offset = 0.0;
        for _ in 0..self.params.initial_levels {
            offset += self.level_spacing(mid_price);
            let level = self.new_level(mid_price + offset, ts, false);
            self.asks.push(level);
        }

        recompute_totals(&mut self.bids, self.params.depth_scale);
        recompute_totals(&mut self.asks, self.params.depth_scale);
        self.refresh_spread();
        info!(mid_price, bids = self.bids.len(), asks = self.asks.len(), "Initialized synthetic book");
        self.snapshot()
    }

    /// Apply one random mutation against the live mid price.
    #[instrument(level = "trace", skip(self))]
    pub fn tick(&mut self, mid_price: f64) -> OrderBookSnapshot {
        self.last_price = mid_price;
        let draw = self.rng.gen::<f64>();
        let side = if self.rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
        let branch = self.choose_branch(draw);

        let mutation = match branch {
            Branch::Modify => self.modify_level(side),
            Branch::Insert => self.insert_level(side, mid_price),
            Branch::Remove => self.remove_level(side),
        };
        trace!(?mutation, "Book mutation");
        self.last_mutation = Some(mutation);

        self.refresh_spread();
        let snapshot = self.snapshot();
        if snapshot.is_crossed() {
            debug!(spread = self.spread, "Synthetic book is crossed");
        }
        snapshot
    }

    /// Map a uniform draw in `[0, 1)` onto the weighted branches.
    pub fn choose_branch(&self, draw: f64) -> Branch {
        if draw < self.params.modify_weight {
            Branch::Modify
        } else if draw < self.params.modify_weight + self.params.insert_weight {
            Branch::Insert
        } else {
            Branch::Remove
        }
    }

    /// Drop the transient highlight on every level; returns how many were cleared.
    pub fn clear_highlights(&mut self) -> usize {
        let mut cleared = 0;
        for level in self.bids.iter_mut().chain(self.asks.iter_mut()) {
            if level.is_new {
                level.is_new = false;
                cleared += 1;
            }
        }
        cleared
    }

    /// Random wait before the next tick.
    pub fn next_delay(&mut self) -> Duration {
        let min = self.params.min_interval.as_millis() as u64;
        let max = self.params.max_interval.as_millis() as u64;
        if max <= min {
            return self.params.min_interval;
        }
        Duration::from_millis(self.rng.gen_range(min..=max))
    }

    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot {
            bids: self.bids.clone(),
            asks: self.asks.clone(),
            last_price: self.last_price,
            spread: self.spread,
            spread_percent: self.spread_percent,
        }
    }

    pub fn last_mutation(&self) -> Option<Mutation> {
        self.last_mutation
    }

    fn modify_level(&mut self, side: Side) -> Mutation {
        let len = self.side(side).len();
        if len == 0 {
            return Mutation::Skipped { side, branch: Branch::Modify };
        }
        let index = self.rng.gen_range(0..len);
        let delta = (self.rng.gen::<f64>() - 0.5) * 2.0 * self.params.max_size_delta;
        let floor = self.params.size_min;
        let depth_scale = self.params.depth_scale;
        let ts = now_ms();

        let levels = self.side_mut(side);
        let level = &mut levels[index];
        level.amount = (level.amount + delta).max(floor);
        level.timestamp = ts;
        level.is_new = true;
        recompute_totals(levels, depth_scale);
        Mutation::Modified { side, index, delta }
    }

    fn insert_level(&mut self, side: Side, mid_price: f64) -> Mutation {
        let offset = mid_price * self.rng.gen::<f64>() * self.params.insert_max_offset;
        let price = match side {
            Side::Bid => mid_price - offset,
            Side::Ask => mid_price + offset,
        };
        let ts = now_ms();
        let level = self.new_level(price, ts, true);
        let max_levels = self.params.max_levels;
        let depth_scale = self.params.depth_scale;

        let levels = self.side_mut(side);
        // equal prices would break strict ordering, fold into the existing rung
        if let Some(existing) = levels.iter_mut().find(|l| l.price == price) {
            existing.amount += level.amount;
            existing.timestamp = ts;
            existing.is_new = true;
            recompute_totals(levels, depth_scale);
            return Mutation::Merged { side, price };
        }

        levels.push(level);
        sort_side(levels, side);
        levels.truncate(max_levels);
        recompute_totals(levels, depth_scale);
        Mutation::Inserted { side, price }
    }

    fn remove_level(&mut self, side: Side) -> Mutation {
        let len = self.side(side).len();
        if len <= self.params.min_levels || len <= self.params.protected_levels {
            return Mutation::Skipped { side, branch: Branch::Remove };
        }
        let index = self.rng.gen_range(self.params.protected_levels..len);
        let depth_scale = self.params.depth_scale;

        let levels = self.side_mut(side);
        levels.remove(index);
        recompute_totals(levels, depth_scale);
        Mutation::Removed { side, index }
    }

    fn level_spacing(&mut self, mid_price: f64) -> f64 {
        let multiplier = self.rng.gen_range(0.0..self.params.spacing_multiplier_max);
        mid_price * (self.params.spacing_base + multiplier * self.params.spacing_step)
    }

    fn new_level(&mut self, price: f64, timestamp: u64, is_new: bool) -> OrderBookLevel {
        let amount = self.params.size_min + self.rng.gen::<f64>() * self.params.size_range;
        let id = self.next_id;
        self.next_id += 1;
        OrderBookLevel { price, amount, total: 0.0, depth: 0.0, id, timestamp, is_new }
    }

    fn refresh_spread(&mut self) {
        match (self.bids.first(), self.asks.first()) {
            (Some(bid), Some(ask)) => {
                self.spread = ask.price - bid.price;
                self.spread_percent = if self.last_price > 0.0 {
                    self.spread / self.last_price * 100.0
                } else {
                    0.0
                };
            }
            _ => {
                self.spread = 0.0;
                self.spread_percent = 0.0;
            }
        }
    }

    fn side(&self, side: Side) -> &Vec<OrderBookLevel> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Vec<OrderBookLevel> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }
}

// Bids best (highest) first, asks best (lowest) first
fn sort_side(levels: &mut [OrderBookLevel], side: Side) {
    match side {
        Side::Bid => levels.sort_by_key(|l| Reverse(OrderedFloat(l.price))),
        Side::Ask => levels.sort_by_key(|l| OrderedFloat(l.price)),
    }
}

fn recompute_totals(levels: &mut [OrderBookLevel], depth_scale: f64) {
    let mut total = 0.0;
    for level in levels.iter_mut() {
        total += level.amount;
        level.total = total;
        level.depth = (total / depth_scale * 100.0).min(100.0);
    }
}
