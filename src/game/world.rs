//! Authoritative world state: snake, fruits, score

use std::collections::{HashMap, VecDeque};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use super::grid::{Direction, Grid, Position};

/// Session-scoped identity of a fruit player
pub type PlayerId = Uuid;

/// Segments in a freshly spawned snake
pub const START_LENGTH: i32 = 3;

/// Narrowest grid that fits the start snake left of center
pub const MIN_GRID_WIDTH: i32 = START_LENGTH + 1;

/// Random draws before fruit placement gives up avoiding occupied tiles
pub const FRUIT_PLACEMENT_ATTEMPTS: usize = 100;

/// Points per eaten fruit
pub const FRUIT_SCORE: u32 = 10;

/// The single shared game world (owned by the coordinator)
pub struct World {
    grid: Grid,
    /// Head first
    pub(super) snake: VecDeque<Position>,
    /// Direction applied on the last tick
    pub(super) direction: Direction,
    /// Buffered direction, applied on the next tick
    pub(super) pending_direction: Direction,
    pub(super) fruits: HashMap<PlayerId, Position>,
    pub(super) score: u32,
    pub(super) terminal: bool,
    rng: ChaCha8Rng,
}

impl World {
    /// Create a world with a centered snake heading right and no fruits.
    /// `grid` must be at least `MIN_GRID_WIDTH` wide.
    pub fn new(grid: Grid, rng: ChaCha8Rng) -> Self {
        Self {
            grid,
            snake: start_snake(grid),
            direction: Direction::Right,
            pending_direction: Direction::Right,
            fruits: HashMap::new(),
            score: 0,
            terminal: false,
            rng,
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn snake(&self) -> impl ExactSizeIterator<Item = &Position> + '_ {
        self.snake.iter()
    }

    pub fn snake_len(&self) -> usize {
        self.snake.len()
    }

    pub fn head(&self) -> Position {
        self.snake[0]
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn pending_direction(&self) -> Direction {
        self.pending_direction
    }

    pub fn fruits(&self) -> &HashMap<PlayerId, Position> {
        &self.fruits
    }

    pub fn fruit(&self, id: &PlayerId) -> Option<Position> {
        self.fruits.get(id).copied()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Give a new fruit player a fruit. No-op if it already has one.
    pub fn add_fruit_player(&mut self, id: PlayerId) {
        if self.fruits.contains_key(&id) {
            return;
        }
        let position = self.generate_fruit_position();
        self.fruits.insert(id, position);
    }

    /// Drop a fruit player's fruit. Returns whether one was present.
    pub fn remove_fruit_player(&mut self, id: &PlayerId) -> bool {
        self.fruits.remove(id).is_some()
    }

    /// Pick a random tile off the snake and off every fruit.
    ///
    /// Best effort: after `FRUIT_PLACEMENT_ATTEMPTS` misses the next draw is
    /// returned unchecked, so a nearly full board may yield an occupied tile.
    pub fn generate_fruit_position(&mut self) -> Position {
        for _ in 0..FRUIT_PLACEMENT_ATTEMPTS {
            let candidate = self.random_position();
            if !self.snake.contains(&candidate) && !self.fruits.values().any(|f| *f == candidate) {
                return candidate;
            }
        }
        self.random_position()
    }

    /// Move a fruit on behalf of its player.
    ///
    /// Rejected (returns false, nothing changes) for unknown players, tiles off
    /// the grid, and tiles under the snake. Stacking on other fruits is allowed.
    pub fn update_fruit_position(&mut self, id: &PlayerId, x: i32, y: i32) -> bool {
        let target = Position::new(x, y);
        if !self.grid.in_bounds(target) || self.snake.contains(&target) {
            return false;
        }
        match self.fruits.get_mut(id) {
            Some(fruit) => {
                *fruit = target;
                true
            }
            None => false,
        }
    }

    /// Back to the start position. Fruit players keep their ids, fruits get new tiles.
    pub fn reset(&mut self) {
        self.snake = start_snake(self.grid);
        self.direction = Direction::Right;
        self.pending_direction = Direction::Right;
        self.score = 0;
        self.terminal = false;

        let ids: Vec<PlayerId> = self.fruits.keys().copied().collect();
        for id in ids {
            let position = self.generate_fruit_position();
            self.fruits.insert(id, position);
        }
    }

    fn random_position(&mut self) -> Position {
        Position::new(
            self.rng.gen_range(0..self.grid.width()),
            self.rng.gen_range(0..self.grid.height()),
        )
    }
}

fn start_snake(grid: Grid) -> VecDeque<Position> {
    let center = grid.center();
    (0..START_LENGTH)
        .map(|i| Position::new(center.x - i, center.y))
        .collect()
}

#[cfg(test)]
pub(crate) fn test_world(width: i32, height: i32) -> World {
    use rand::SeedableRng;

    World::new(
        Grid::new(width, height).unwrap(),
        ChaCha8Rng::seed_from_u64(7),
    )
}
