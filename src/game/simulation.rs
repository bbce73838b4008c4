//! Fixed-step snake simulation

use std::collections::HashSet;

use tracing::debug;

use super::grid::Direction;
use super::world::{PlayerId, World, FRUIT_SCORE};

/// Outcome of a single tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickResult {
    /// The snake advanced one tile
    pub moved: bool,
    /// Fruit players whose fruit was eaten (and re-placed) this tick
    pub ate: HashSet<PlayerId>,
    /// This tick ended the game
    pub game_over: bool,
}

impl World {
    /// Buffer a direction by name for the next tick.
    ///
    /// Unknown names are ignored. Reversing the direction the snake last moved
    /// in is refused, whatever is already buffered. Returns whether the
    /// direction was buffered.
    pub fn set_direction(&mut self, name: &str) -> bool {
        match name.parse::<Direction>() {
            Ok(direction) => self.steer(direction),
            Err(e) => {
                debug!(error = %e, "Ignoring direction change");
                false
            }
        }
    }

    /// Typed form of [`World::set_direction`]
    pub fn steer(&mut self, direction: Direction) -> bool {
        if direction == self.direction.opposite() {
            return false;
        }
        self.pending_direction = direction;
        true
    }

    /// Advance the world by one step. Does nothing once the game is over.
    pub fn tick(&mut self) -> TickResult {
        let mut result = TickResult::default();
        if self.terminal {
            return result;
        }

        self.direction = self.pending_direction;
        let new_head = self.head().step(self.direction);

        // Tail still counts: it has not moved yet
        let collided = !self.grid().in_bounds(new_head)
            || self.snake.iter().skip(1).any(|segment| *segment == new_head);
        if collided {
            self.terminal = true;
            result.game_over = true;
            return result;
        }

        self.snake.push_front(new_head);
        result.moved = true;

        for (id, fruit) in &self.fruits {
            if *fruit == new_head {
                result.ate.insert(*id);
                self.score += FRUIT_SCORE;
            }
        }

        for id in &result.ate {
            let position = self.generate_fruit_position();
            self.fruits.insert(*id, position);
        }

        // Growth is one segment per tick no matter how many fruits were stacked
        if result.ate.is_empty() {
            self.snake.pop_back();
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::Position;
    use crate::game::world::test_world;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn snake_of(world: &World) -> Vec<Position> {
        world.snake().copied().collect()
    }

    fn assert_invariants(world: &World) {
        let grid = world.grid();
        assert!(world.snake_len() >= 1);
        assert!(world.snake().all(|s| grid.in_bounds(*s)));
        assert!(world.fruits().values().all(|f| grid.in_bounds(*f)));
        // Rest overlap: no fruit left under the snake once a tick completes
        assert!(world
            .fruits()
            .values()
            .all(|f| !world.snake().any(|s| s == f)));
    }

    #[test]
    fn test_single_tick_moves_right() {
        let mut world = test_world(20, 20);

        let result = world.tick();

        assert!(result.moved);
        assert!(!result.game_over);
        assert!(result.ate.is_empty());
        assert_eq!(
            snake_of(&world),
            vec![Position::new(11, 10), Position::new(10, 10), Position::new(9, 10)]
        );
        assert_eq!(world.score(), 0);
    }

    #[test]
    fn test_reversal_is_rejected() {
        let mut world = test_world(20, 20);

        assert!(!world.set_direction("LEFT"));
        assert_eq!(world.pending_direction(), Direction::Right);

        assert!(world.set_direction("UP"));
        assert_eq!(world.pending_direction(), Direction::Up);

        // Still moving right: LEFT is checked against the applied direction
        assert!(!world.set_direction("LEFT"));
        assert_eq!(world.pending_direction(), Direction::Up);

        assert!(world.set_direction("DOWN"));
        assert_eq!(world.pending_direction(), Direction::Down);
    }

    #[test]
    fn test_reversal_tracks_applied_direction() {
        let mut world = test_world(20, 20);
        world.set_direction("UP");
        world.tick();

        assert_eq!(world.direction(), Direction::Up);
        assert!(!world.set_direction("DOWN"));
        assert!(world.set_direction("LEFT"));
    }

    #[test]
    fn test_unknown_direction_is_ignored() {
        let mut world = test_world(20, 20);
        world.set_direction("UP");

        assert!(!world.set_direction("SIDEWAYS"));
        assert!(!world.set_direction(""));
        assert_eq!(world.pending_direction(), Direction::Up);
    }

    #[test]
    fn test_eating_grows_and_scores() {
        let mut world = test_world(20, 20);
        let id = Uuid::new_v4();
        world.add_fruit_player(id);
        assert!(world.update_fruit_position(&id, 11, 10));

        let result = world.tick();

        assert!(result.ate.contains(&id));
        assert_eq!(world.score(), 10);
        assert_eq!(world.snake_len(), 4);
        assert_eq!(world.head(), Position::new(11, 10));
        let fruit = world.fruit(&id).unwrap();
        assert!(!world.snake().any(|s| *s == fruit));
    }

    #[test]
    fn test_stacked_fruits_grow_once() {
        let mut world = test_world(20, 20);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        world.add_fruit_player(a);
        world.add_fruit_player(b);
        world.update_fruit_position(&a, 11, 10);
        world.update_fruit_position(&b, 11, 10);

        let result = world.tick();

        assert_eq!(result.ate.len(), 2);
        assert_eq!(world.score(), 20);
        assert_eq!(world.snake_len(), 4);
        for id in [a, b] {
            let fruit = world.fruit(&id).unwrap();
            assert!(!world.snake().any(|s| *s == fruit));
        }
    }

    #[test]
    fn test_border_collision_freezes_until_reset() {
        let mut world = test_world(20, 20);
        world.set_direction("UP");
        world.tick();
        world.set_direction("LEFT");

        let mut ticks = 0;
        let mut last = world.tick();
        while !last.game_over {
            ticks += 1;
            assert!(ticks < 50, "snake never reached the border");
            last = world.tick();
        }

        assert!(world.is_terminal());
        assert!(!last.moved);
        assert_eq!(world.head(), Position::new(0, 9));

        let frozen = snake_of(&world);
        for _ in 0..3 {
            assert_eq!(world.tick(), TickResult::default());
        }
        assert_eq!(snake_of(&world), frozen);

        world.reset();
        assert!(!world.is_terminal());
        assert_eq!(
            snake_of(&world),
            vec![Position::new(10, 10), Position::new(9, 10), Position::new(8, 10)]
        );
        assert!(world.tick().moved);
    }

    #[test]
    fn test_self_collision() {
        let mut world = test_world(20, 20);
        // Grow to length 5 so a tight turn bites the body
        let id = Uuid::new_v4();
        world.add_fruit_player(id);
        world.update_fruit_position(&id, 11, 10);
        world.tick();
        world.update_fruit_position(&id, 12, 10);
        world.tick();
        world.remove_fruit_player(&id);
        assert_eq!(world.snake_len(), 5);

        world.set_direction("UP");
        world.tick();
        world.set_direction("LEFT");
        world.tick();
        world.set_direction("DOWN");
        let result = world.tick();

        assert!(result.game_over);
        assert!(world.is_terminal());
        assert_eq!(world.snake_len(), 5);
    }

    #[test]
    fn test_moving_into_tail_tile_collides() {
        let mut world = test_world(20, 20);
        // Length 4 loop: head ends up next to the tail
        let id = Uuid::new_v4();
        world.add_fruit_player(id);
        world.update_fruit_position(&id, 11, 10);
        world.tick();
        world.remove_fruit_player(&id);
        // Snake: (11,10) (10,10) (9,10) (8,10)
        world.set_direction("UP");
        world.tick();
        world.set_direction("LEFT");
        world.tick();
        // Snake: (10,9) (11,9) (11,10) (10,10), tail at (10,10)
        world.set_direction("DOWN");

        assert!(world.tick().game_over);
    }

    #[test]
    fn test_random_play_keeps_invariants() {
        let mut world = test_world(12, 9);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let players: Vec<PlayerId> = (0..4).map(|_| Uuid::new_v4()).collect();
        for id in &players {
            world.add_fruit_player(*id);
        }
        let names = ["UP", "DOWN", "LEFT", "RIGHT"];

        for _ in 0..2_000 {
            if world.is_terminal() {
                world.reset();
            }
            world.set_direction(names[rng.gen_range(0..names.len())]);
            let id = players[rng.gen_range(0..players.len())];
            world.update_fruit_position(&id, rng.gen_range(-2..14), rng.gen_range(-2..11));

            let before = world.snake_len();
            let result = world.tick();

            if result.moved {
                let expected = if result.ate.is_empty() { before } else { before + 1 };
                assert_eq!(world.snake_len(), expected);
            } else {
                assert_eq!(world.snake_len(), before);
            }
            assert_invariants(&world);
        }
    }
}
