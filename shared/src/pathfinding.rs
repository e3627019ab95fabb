//! Grid A* over a level's obstacle matrix.
//!
//! Four-way movement at unit cost with a Manhattan heuristic. Ties on
//! f-cost go to whichever node was pushed first.

use log::debug;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::level::{ObstacleGrid, Tile};
use crate::Position;

const NEIGHBOURS: [(i32, i32); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

/// Tile path from `start` to `goal`, excluding `start` and including `goal`.
///
/// Returns `None` when the goal can't be reached. `start == goal` yields an
/// empty path.
pub fn astar(start: Tile, goal: Tile, grid: &ObstacleGrid) -> Option<Vec<Tile>> {
    // (f, push order, tile); Reverse turns the max-heap into a min-heap
    let mut open = BinaryHeap::new();
    let mut g_cost: HashMap<Tile, u32> = HashMap::new();
    let mut came_from: HashMap<Tile, Tile> = HashMap::new();
    let mut closed: HashSet<Tile> = HashSet::new();
    let mut pushed: u64 = 0;

    g_cost.insert(start, 0);
    open.push((Reverse(start.manhattan(goal)), Reverse(pushed), start));

    while let Some((_, _, current)) = open.pop() {
        if current == goal {
            return Some(reconstruct(&came_from, start, goal));
        }
        if !closed.insert(current) {
            continue;
        }

        let current_g = g_cost.get(&current).copied().unwrap_or(u32::MAX);
        for (dx, dy) in NEIGHBOURS {
            let neighbour = Tile::new(current.x + dx, current.y + dy);
            if !grid.is_walkable(neighbour) || closed.contains(&neighbour) {
                continue;
            }

            let tentative = current_g + 1;
            let known = g_cost.get(&neighbour).copied().unwrap_or(u32::MAX);
            if tentative < known {
                g_cost.insert(neighbour, tentative);
                came_from.insert(neighbour, current);
                pushed += 1;
                open.push((
                    Reverse(tentative + neighbour.manhattan(goal)),
                    Reverse(pushed),
                    neighbour,
                ));
            }
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<Tile, Tile>, start: Tile, goal: Tile) -> Vec<Tile> {
    let mut path = Vec::new();
    let mut current = goal;
    while current != start {
        path.push(current);
        match came_from.get(&current) {
            Some(previous) => current = *previous,
            None => break,
        }
    }
    path.reverse();
    path
}

/// World-space wrapper around [`astar`]. Positions are snapped to the tile
/// containing them and waypoints come back as tile origins.
pub fn find_path(start: Position, goal: Position, grid: &ObstacleGrid) -> Option<Vec<Position>> {
    let start_tile = Tile::from_world(start);
    let goal_tile = Tile::from_world(goal);

    match astar(start_tile, goal_tile, grid) {
        Some(tiles) => Some(tiles.into_iter().map(Tile::to_world).collect()),
        None => {
            debug!("no path from {:?} to {:?}", start_tile, goal_tile);
            None
        }
    }
}
