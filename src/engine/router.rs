use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};
use log::{debug, info};
use roaring::RoaringTreemap;
use serde::{Deserialize, Serialize};

use crate::engine::environment::EnvironmentStore;
use crate::engine::mask::LandRaster;
use crate::engine::models::{Coordinate, CurrentSample};
use crate::error::SimulationError;

/// Grid cell as (row, col)
pub type Cell = (usize, usize);

/// Search radius used when moving a site off land.
pub const WATER_SEARCH_RADIUS_DEG: f64 = 10.0;

/// Weight bands laid around the coast. Pass `i` dilates the land mask
/// `iterations[i]` times with a square kernel and assigns `weights[i]` to every
/// covered cell, so later passes overwrite the inner part of earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShorelineWeights {
    pub weights: Vec<f64>,
    pub iterations: Vec<usize>,
    pub kernel_size: usize,
}

impl Default for ShorelineWeights {
    fn default() -> Self {
        Self {
            weights: vec![5.0, 0.5],
            iterations: vec![1, 4],
            kernel_size: 3,
        }
    }
}

impl ShorelineWeights {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.weights.len() != self.iterations.len() {
            return Err(SimulationError::invalid(format!(
                "{} shoreline weights for {} iteration counts",
                self.weights.len(),
                self.iterations.len()
            )));
        }
        if let Some(w) = self.weights.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(SimulationError::invalid(format!("shoreline weight {w} must be positive")));
        }
        if self.kernel_size == 0 {
            return Err(SimulationError::invalid("shoreline kernel size must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub shoreline: ShorelineWeights,
    /// Keep every n-th interior waypoint
    pub waypoint_interval: usize,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self { shoreline: ShorelineWeights::default(), waypoint_interval: 5 }
    }
}

/// Eight-connected raster graph: a wall set plus optional per-cell weights.
#[derive(Debug, Clone)]
pub struct CostGrid {
    height: usize,
    width: usize,
    walls: RoaringTreemap,
    weights: Option<Vec<f64>>,
}

impl CostGrid {
    /// Unweighted grid without walls
    pub fn open(height: usize, width: usize) -> Self {
        Self { height, width, walls: RoaringTreemap::new(), weights: None }
    }

    /// Land becomes walls; the water around it gets the shoreline bands.
    pub fn from_land_raster(raster: &LandRaster, shoreline: &ShorelineWeights) -> Result<Self, SimulationError> {
        shoreline.validate()?;
        let (height, width) = (raster.height(), raster.width());
        let land: Vec<bool> = (0..height * width)
            .map(|idx| raster.is_land(idx / width.max(1), idx % width.max(1)))
            .collect();

        let mut weights = vec![1.0; height * width];
        for (&weight, &iters) in shoreline.weights.iter().zip(&shoreline.iterations) {
            let band = dilate(&land, height, width, shoreline.kernel_size, iters);
            for (cell_weight, covered) in weights.iter_mut().zip(band) {
                if covered {
                    *cell_weight = weight;
                }
            }
        }

        Ok(Self {
            height,
            width,
            walls: raster.mask.clone(),
            weights: Some(weights),
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn index(&self, (row, col): Cell) -> usize {
        row * self.width + col
    }

    pub fn add_wall(&mut self, cell: Cell) {
        let idx = self.index(cell) as u64;
        self.walls.insert(idx);
    }

    pub fn in_bounds(&self, (row, col): Cell) -> bool {
        row < self.height && col < self.width
    }

    pub fn passable(&self, cell: Cell) -> bool {
        !self.walls.contains(self.index(cell) as u64)
    }

    /// Reachable neighbours. The visiting order flips on alternate cells so
    /// that ties do not always resolve in the same direction.
    pub fn neighbors(&self, (row, col): Cell) -> Vec<Cell> {
        let (r, c) = (row as i64, col as i64);
        let mut candidates = [
            (r + 1, c),
            (r - 1, c),
            (r, c + 1),
            (r, c - 1),
            (r + 1, c + 1),
            (r - 1, c - 1),
            (r + 1, c - 1),
            (r - 1, c + 1),
        ];
        if (row + col) % 2 == 0 {
            candidates.reverse();
        }
        candidates
            .into_iter()
            .filter(|&(r, c)| r >= 0 && c >= 0)
            .map(|(r, c)| (r as usize, c as usize))
            .filter(|&cell| self.in_bounds(cell) && self.passable(cell))
            .collect()
    }

    /// Cost of entering `to`.
    pub fn cost(&self, _from: Cell, to: Cell) -> f64 {
        match &self.weights {
            Some(weights) => weights[self.index(to)],
            None => 1.0,
        }
    }
}

/// Dilates a boolean raster `iterations` times with a `kernel`-wide square.
fn dilate(mask: &[bool], height: usize, width: usize, kernel: usize, iterations: usize) -> Vec<bool> {
    let half = (kernel / 2) as i64;
    let mut current = mask.to_vec();
    for _ in 0..iterations {
        let mut next = current.clone();
        for row in 0..height as i64 {
            for col in 0..width as i64 {
                if !current[(row * width as i64 + col) as usize] {
                    continue;
                }
                for r in (row - half).max(0)..=(row + half).min(height as i64 - 1) {
                    for c in (col - half).max(0)..=(col + half).min(width as i64 - 1) {
                        next[(r * width as i64 + c) as usize] = true;
                    }
                }
            }
        }
        current = next;
    }
    current
}

/// Manhattan distance in index space. With diagonal moves and weights below
/// one this overestimates, so routes are near-optimal rather than optimal.
pub fn heuristic(a: Cell, b: Cell) -> f64 {
    (a.0.abs_diff(b.0) + a.1.abs_diff(b.1)) as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Start to goal, both included
    pub cells: Vec<Cell>,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    priority: f64,
    cost: f64,
    cell: Cell,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    // BinaryHeap is a max-heap: lowest priority first, then the smaller cell
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* over a [`CostGrid`].
pub struct RouteSearch<'a> {
    grid: &'a CostGrid,
}

impl<'a> RouteSearch<'a> {
    pub fn new(grid: &'a CostGrid) -> Self {
        Self { grid }
    }

    pub fn search(&self, start: Cell, goal: Cell) -> Result<Route, SimulationError> {
        let grid = self.grid;
        for (name, cell) in [("start", start), ("goal", goal)] {
            if !grid.in_bounds(cell) || !grid.passable(cell) {
                return Err(SimulationError::invalid(format!(
                    "route {name} {cell:?} is outside the grid or on land"
                )));
            }
        }

        let size = grid.height * grid.width;
        let mut cost_so_far = vec![f64::INFINITY; size];
        let mut came_from = vec![usize::MAX; size];
        let mut frontier = BinaryHeap::new();

        cost_so_far[grid.index(start)] = 0.0;
        frontier.push(Frontier { priority: 0.0, cost: 0.0, cell: start });

        let mut expanded = 0usize;
        let mut reached = false;
        while let Some(Frontier { cost, cell: current, .. }) = frontier.pop() {
            if current == goal {
                reached = true;
                break;
            }
            if cost > cost_so_far[grid.index(current)] {
                continue;
            }
            expanded += 1;

            for next in grid.neighbors(current) {
                let new_cost = cost + grid.cost(current, next);
                let next_idx = grid.index(next);
                if new_cost < cost_so_far[next_idx] {
                    cost_so_far[next_idx] = new_cost;
                    came_from[next_idx] = grid.index(current);
                    frontier.push(Frontier {
                        priority: new_cost + heuristic(next, goal),
                        cost: new_cost,
                        cell: next,
                    });
                }
            }
        }
        debug!("A* expanded {expanded} cells");

        if !reached {
            return Err(SimulationError::NoRouteFound { start, goal });
        }

        let mut cells = vec![goal];
        let mut idx = grid.index(goal);
        while idx != grid.index(start) {
            idx = came_from[idx];
            cells.push((idx / grid.width, idx % grid.width));
        }
        cells.reverse();

        Ok(Route { cells, cost: cost_so_far[grid.index(goal)] })
    }
}

/// Keeps the first point, every `interval`-th interior point and the last point.
pub fn subsample<T: Clone>(points: &[T], interval: usize) -> Vec<T> {
    match points {
        [] => Vec::new(),
        [only] => vec![only.clone()],
        [first, interior @ .., last] => {
            let mut kept = vec![first.clone()];
            kept.extend(interior.iter().step_by(interval.max(1)).cloned());
            kept.push(last.clone());
            kept
        }
    }
}

/// Moves a site sitting on a land cell to the closest water cell.
pub fn snap_to_water<E: EnvironmentStore + ?Sized>(env: &E, site: &Coordinate, time: DateTime<Utc>) -> Coordinate {
    match env.local_current(site, time, false) {
        CurrentSample::Land => match env.nearest_water(site, WATER_SEARCH_RADIUS_DEG) {
            Some(water) => {
                info!(
                    "Moved site ({:.3}, {:.3}) off land to ({:.3}, {:.3})",
                    site.lat, site.lon, water.lat, water.lon
                );
                water
            }
            None => *site,
        },
        _ => *site,
    }
}

/// Coast-following waypoints from launch to landing.
pub fn plan_route<E: EnvironmentStore + ?Sized>(
    env: &E,
    time: DateTime<Utc>,
    launch: &Coordinate,
    landing: &Coordinate,
    config: &RouteConfig,
) -> Result<Vec<Coordinate>, SimulationError> {
    let raster = env
        .land_mask_raster(time)
        .ok_or_else(|| SimulationError::invalid(format!("no land mask available at {time}")))?;
    let grid = CostGrid::from_land_raster(&raster, &config.shoreline)?;

    let start = raster.nearest_index(launch);
    let goal = raster.nearest_index(landing);
    let route = RouteSearch::new(&grid).search(start, goal)?;
    info!("Route found: {} cells, cost {:.1}", route.cells.len(), route.cost);

    let points: Vec<Coordinate> = route
        .cells
        .iter()
        .map(|&(row, col)| raster.coordinate_of(row, col))
        .collect();
    Ok(subsample(&points, config.waypoint_interval))
}
