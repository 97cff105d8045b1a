//! Thread palette: snap region colours to real threads.

use crate::types::{Rgb, ThreadSpec};

/// Built-in machine-thread colours: name and `#RRGGBB`.
const BUILTIN: &[(&str, Rgb)] = &[
    ("Black", Rgb::new(0x00, 0x00, 0x00)),
    ("White", Rgb::new(0xFF, 0xFF, 0xFF)),
    ("Silver Grey", Rgb::new(0xA8, 0xA9, 0xAD)),
    ("Charcoal", Rgb::new(0x4A, 0x4A, 0x4A)),
    ("Cream", Rgb::new(0xF3, 0xE5, 0xAB)),
    ("Lemon", Rgb::new(0xFF, 0xF0, 0x3A)),
    ("Sunflower", Rgb::new(0xFF, 0xC3, 0x0B)),
    ("Tangerine", Rgb::new(0xF2, 0x85, 0x00)),
    ("Red", Rgb::new(0xD1, 0x10, 0x1E)),
    ("Cardinal", Rgb::new(0x9E, 0x1B, 0x32)),
    ("Burgundy", Rgb::new(0x6A, 0x0D, 0x22)),
    ("Pink", Rgb::new(0xF4, 0x9A, 0xC1)),
    ("Magenta", Rgb::new(0xC4, 0x1E, 0x84)),
    ("Lavender", Rgb::new(0xB5, 0x9E, 0xD1)),
    ("Purple", Rgb::new(0x5E, 0x2C, 0x85)),
    ("Navy", Rgb::new(0x1B, 0x24, 0x5C)),
    ("Royal Blue", Rgb::new(0x1F, 0x4E, 0xB4)),
    ("Sky Blue", Rgb::new(0x7E, 0xC8, 0xE3)),
    ("Teal", Rgb::new(0x00, 0x80, 0x80)),
    ("Emerald", Rgb::new(0x00, 0x8C, 0x45)),
    ("Kelly Green", Rgb::new(0x4C, 0xBB, 0x17)),
    ("Olive", Rgb::new(0x6B, 0x70, 0x2A)),
    ("Tan", Rgb::new(0xD2, 0xB4, 0x8C)),
    ("Brown", Rgb::new(0x6B, 0x3E, 0x1E)),
];

/// A finite, ordered list of threads to match region colours against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPalette {
    threads: Vec<ThreadSpec>,
}

impl Default for ThreadPalette {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ThreadPalette {
    /// The built-in table.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            threads: BUILTIN
                .iter()
                .map(|&(name, color)| ThreadSpec::new(name, color))
                .collect(),
        }
    }

    /// A custom palette. Returns `None` when `threads` is empty.
    #[must_use]
    pub fn new(threads: Vec<ThreadSpec>) -> Option<Self> {
        (!threads.is_empty()).then_some(Self { threads })
    }

    /// The palette from the configuration, or the built-in table.
    #[must_use]
    pub fn from_config(custom: Option<&[ThreadSpec]>) -> Self {
        custom
            .and_then(|threads| Self::new(threads.to_vec()))
            .unwrap_or_default()
    }

    /// All threads in table order.
    #[must_use]
    pub fn threads(&self) -> &[ThreadSpec] {
        &self.threads
    }

    /// Index of the thread nearest to `color` in RGB space; the first
    /// entry wins a tie.
    #[must_use]
    pub fn nearest_index(&self, color: Rgb) -> usize {
        let mut best = 0;
        let mut best_dist = u32::MAX;
        for (i, thread) in self.threads.iter().enumerate() {
            let d = thread.color.distance_squared(color);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    }

    /// The thread nearest to `color`.
    #[must_use]
    pub fn nearest(&self, color: Rgb) -> &ThreadSpec {
        &self.threads[self.nearest_index(color)]
    }

    /// Match each colour in order.
    #[must_use]
    pub fn match_all(&self, colors: &[Rgb]) -> Vec<ThreadSpec> {
        colors.iter().map(|&c| self.nearest(c).clone()).collect()
    }
}
