//! Text rendering of the arena.
//!
//! The arena square maps onto a fixed character grid: `+` marks the target,
//! `.` the desired ring, and digits the agents (index modulo 10). Agents
//! outside the arena are clamped to the border.

use std::f32::consts::TAU;

use crate::config::EncirclementConfig;
use crate::world::WorldState;

const COLS: usize = 41;
const ROWS: usize = 21;

fn cell(x: f32, y: f32, half_width: f32) -> (usize, usize) {
    let u = ((x + half_width) / (2.0 * half_width)).clamp(0.0, 1.0);
    let v = ((half_width - y) / (2.0 * half_width)).clamp(0.0, 1.0);
    let col = (u * (COLS - 1) as f32).round() as usize;
    let row = (v * (ROWS - 1) as f32).round() as usize;
    (row, col)
}

/// Draw one frame.
pub fn ascii_frame(state: &WorldState, config: &EncirclementConfig) -> String {
    let half = config.arena_half_width;
    let mut grid = vec![vec![' '; COLS]; ROWS];

    for k in 0..72 {
        let theta = TAU * k as f32 / 72.0;
        let (r, c) = cell(
            config.target[0] + config.radius * theta.cos(),
            config.target[1] + config.radius * theta.sin(),
            half,
        );
        grid[r][c] = '.';
    }

    let (r, c) = cell(config.target[0], config.target[1], half);
    grid[r][c] = '+';

    for i in 0..state.n_agents() {
        let (r, c) = cell(state.pos_x[i], state.pos_y[i], half);
        grid[r][c] = char::from_digit((i % 10) as u32, 10).unwrap_or('*');
    }

    let border = format!("+{}+", "-".repeat(COLS));
    let mut out = String::with_capacity((COLS + 3) * (ROWS + 2));
    out.push_str(&border);
    out.push('\n');
    for row in grid {
        out.push('|');
        out.extend(row);
        out.push_str("|\n");
    }
    out.push_str(&border);
    out
}
