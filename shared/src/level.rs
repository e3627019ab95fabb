//! Tile levels.
//!
//! A level is a grid of tiles described by a text layout, one character per
//! tile:
//!
//! - `#` wall
//! - `.` floor
//! - `S` floor, and the player spawn point (exactly one)
//!
//! Asset-backed maps plug in through [`LevelSource`]; [`BuiltinLevels`]
//! ships a lobby and a couple of arenas so the server runs without assets.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{Position, TILE_SIZE};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LevelId {
    #[default]
    Lobby,
    Arena(u8),
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelId::Lobby => write!(f, "lobby"),
            LevelId::Arena(n) => write!(f, "arena {}", n),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("level layout is empty")]
    Empty,
    #[error("row {row} has {found} tiles, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown tile {tile:?} at row {row}, column {col}")]
    UnknownTile { tile: char, row: usize, col: usize },
    #[error("level has no spawn point")]
    MissingSpawn,
    #[error("level has more than one spawn point")]
    DuplicateSpawn,
    #[error("no such level: {0}")]
    UnknownLevel(LevelId),
}

/// Axis-aligned collision box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn contains(&self, point: Position) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    /// Overlap with a square box of side `size` anchored at `position`.
    pub fn overlaps(&self, position: Position, size: f64) -> bool {
        self.x < position.x + size
            && self.x + self.width > position.x
            && self.y < position.y + size
            && self.y + self.height > position.y
    }
}

/// Tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
}

impl Tile {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing a world position.
    pub fn from_world(position: Position) -> Self {
        Self {
            x: (position.x / TILE_SIZE).floor() as i32,
            y: (position.y / TILE_SIZE).floor() as i32,
        }
    }

    /// World position of the tile's top-left corner. A tile-sized entity
    /// anchored here sits exactly on the tile.
    pub fn to_world(self) -> Position {
        Position::new(f64::from(self.x) * TILE_SIZE, f64::from(self.y) * TILE_SIZE)
    }

    pub fn manhattan(self, other: Tile) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// Walkability matrix, one cell per tile, `true` = blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObstacleGrid {
    width: usize,
    height: usize,
    blocked: Vec<bool>,
}

impl ObstacleGrid {
    pub fn open(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            blocked: vec![false; width * height],
        }
    }

    /// Builds a grid from rows of blocked flags. Rows shorter than the first
    /// are padded as blocked.
    pub fn from_rows(rows: &[Vec<bool>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let mut grid = Self::open(width, rows.len());
        for (y, row) in rows.iter().enumerate() {
            for x in 0..width {
                grid.blocked[y * width + x] = row.get(x).copied().unwrap_or(true);
            }
        }
        grid
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set_blocked(&mut self, tile: Tile, blocked: bool) {
        if let Some(index) = self.index(tile) {
            self.blocked[index] = blocked;
        }
    }

    /// Inside the grid and not blocked.
    pub fn is_walkable(&self, tile: Tile) -> bool {
        self.index(tile).map_or(false, |index| !self.blocked[index])
    }

    fn index(&self, tile: Tile) -> Option<usize> {
        let x = usize::try_from(tile.x).ok()?;
        let y = usize::try_from(tile.y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub id: LevelId,
    /// Size in tiles.
    pub width: usize,
    pub height: usize,
    pub collisions: Vec<Rect>,
    pub spawn: Position,
    pub obstacles: ObstacleGrid,
}

impl Level {
    pub fn from_ascii(id: LevelId, layout: &str) -> Result<Self, LevelError> {
        let rows: Vec<&str> = layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let width = rows.first().map_or(0, |row| row.chars().count());
        if width == 0 {
            return Err(LevelError::Empty);
        }

        let mut collisions = Vec::new();
        let mut spawn = None;

        for (row, line) in rows.iter().enumerate() {
            let found = line.chars().count();
            if found != width {
                return Err(LevelError::Ragged {
                    row,
                    expected: width,
                    found,
                });
            }

            for (col, tile) in line.chars().enumerate() {
                let origin = Tile::new(col as i32, row as i32).to_world();
                match tile {
                    '#' => collisions.push(Rect {
                        x: origin.x,
                        y: origin.y,
                        width: TILE_SIZE,
                        height: TILE_SIZE,
                    }),
                    '.' => {}
                    'S' if spawn.is_some() => return Err(LevelError::DuplicateSpawn),
                    'S' => spawn = Some(origin),
                    _ => return Err(LevelError::UnknownTile { tile, row, col }),
                }
            }
        }

        let spawn = spawn.ok_or(LevelError::MissingSpawn)?;
        let obstacles = Self::sample_obstacles(&collisions, width, rows.len());

        Ok(Self {
            id,
            width,
            height: rows.len(),
            collisions,
            spawn,
            obstacles,
        })
    }

    /// Marks a tile blocked when its centre lies inside any collision box.
    fn sample_obstacles(collisions: &[Rect], width: usize, height: usize) -> ObstacleGrid {
        let mut grid = ObstacleGrid::open(width, height);
        for y in 0..height {
            for x in 0..width {
                let tile = Tile::new(x as i32, y as i32);
                let origin = tile.to_world();
                let centre = Position::new(origin.x + TILE_SIZE / 2.0, origin.y + TILE_SIZE / 2.0);
                if collisions.iter().any(|rect| rect.contains(centre)) {
                    grid.set_blocked(tile, true);
                }
            }
        }
        grid
    }

    pub fn pixel_width(&self) -> f64 {
        self.width as f64 * TILE_SIZE
    }

    pub fn pixel_height(&self) -> f64 {
        self.height as f64 * TILE_SIZE
    }

    /// First collision box a tile-sized entity at `position` overlaps.
    pub fn check_collision(&self, position: Position) -> Option<&Rect> {
        self.collisions
            .iter()
            .find(|rect| rect.overlaps(position, TILE_SIZE))
    }

    pub fn collides(&self, position: Position, size: f64) -> bool {
        self.collisions
            .iter()
            .any(|rect| rect.overlaps(position, size))
    }
}

/// Where levels come from. Implemented by asset loaders outside this crate.
pub trait LevelSource: Send + Sync {
    fn load(&self, id: LevelId) -> Result<Level, LevelError>;

    /// Arenas are numbered `1..=arena_count()`.
    fn arena_count(&self) -> u8;
}

/// Levels compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLevels;

const LOBBY: &str = "
    ####################
    #..................#
    #..................#
    #..................#
    #.......S..........#
    #..................#
    #..................#
    #..................#
    #..................#
    #..................#
    #..................#
    ####################
";

const ARENAS: [&str; 2] = [
    "
    ##############################
    #............................#
    #............................#
    #...###..............###.....#
    #...###..............###.....#
    #............................#
    #............................#
    #...........####.............#
    #...........#..#.............#
    #.............S..............#
    #...........#..#.............#
    #...........####.............#
    #............................#
    #............................#
    #...###..............###.....#
    #...###..............###.....#
    #............................#
    #............................#
    #............................#
    ##############################
",
    "
    ##############################
    #............................#
    #..######............######..#
    #..#......................#..#
    #..#......................#..#
    #............................#
    #.........##########.........#
    #............................#
    #............................#
    #..............S.............#
    #............................#
    #............................#
    #.........##########.........#
    #............................#
    #..#......................#..#
    #..#......................#..#
    #..######............######..#
    #............................#
    #............................#
    ##############################
",
];

impl LevelSource for BuiltinLevels {
    fn load(&self, id: LevelId) -> Result<Level, LevelError> {
        let layout = match id {
            LevelId::Lobby => LOBBY,
            LevelId::Arena(n) => n
                .checked_sub(1)
                .and_then(|index| ARENAS.get(index as usize))
                .copied()
                .ok_or(LevelError::UnknownLevel(id))?,
        };
        Level::from_ascii(id, layout)
    }

    fn arena_count(&self) -> u8 {
        ARENAS.len() as u8
    }
}
