use std::io::{self, Write};

use crate::game::Game;
use crate::utils::Point;

/// Numbers shown next to the board.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Overlay {
    pub episode: usize,
    pub score: u32,
    pub survival: u32,
    pub epsilon: f64,
    pub explored: u32,
    pub exploited: u32,
    pub mean_loss: Option<f32>,     // rolling window, None before the first fit
    pub mean_accuracy: Option<f32>, // percent, same window
}

pub trait Renderer {
    fn draw(&mut self, game: &Game, overlay: &Overlay) -> io::Result<()>;
}

/// Display turned off.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn draw(&mut self, _game: &Game, _overlay: &Overlay) -> io::Result<()> {
        Ok(())
    }
}

/// Plain-text frames written to any `Write` sink (stdout by default).
pub struct TextRenderer<W: Write> {
    out: W,
}

impl TextRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn draw(&mut self, game: &Game, overlay: &Overlay) -> io::Result<()> {
        // clear screen + home cursor
        write!(self.out, "\x1b[2J\x1b[H{}", frame(game))?;
        writeln!(
            self.out,
            "Score: {}  Episode: {}  Survival: {}",
            overlay.score, overlay.episode, overlay.survival
        )?;
        writeln!(
            self.out,
            "Epsilon: {:.3}  Explore: {}  Exploit: {}",
            overlay.epsilon, overlay.explored, overlay.exploited
        )?;
        writeln!(
            self.out,
            "Loss: {}  Accuracy: {}",
            metric(overlay.mean_loss, 4, ""),
            metric(overlay.mean_accuracy, 1, "%")
        )?;
        self.out.flush()
    }
}

fn metric(value: Option<f32>, precision: usize, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.precision$}{unit}"),
        None => "-".to_string(),
    }
}

/// Board as text: `#` walls, `@` head, `o` body, `*` food.
pub fn frame(game: &Game) -> String {
    let border = game.border();
    let width = border.width as usize;
    let mut s = String::with_capacity((width + 3) * (border.height as usize + 2));
    let wall = "#".repeat(width + 2);

    s.push_str(&wall);
    s.push('\n');
    for y in 0..border.height as i32 {
        s.push('#');
        for x in 0..border.width as i32 {
            let p = Point::new(x, y);
            let c = if p == game.snake().head() {
                '@'
            } else if game.snake().body_contains(p) {
                'o'
            } else if p == game.food() {
                '*'
            } else {
                ' '
            };
            s.push(c);
        }
        s.push_str("#\n");
    }
    s.push_str(&wall);
    s.push('\n');
    s
}
