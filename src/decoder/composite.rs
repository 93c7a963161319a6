//! Frame composition onto the running ARGB canvas.
//!
//! One [`Compositor`] backs one composition pass: sequential iteration keeps
//! a single instance alive across frames, and every random-access read
//! builds a fresh one seeded from a keyframe or cached canvas. The order per
//! frame is fixed: apply, let the caller observe the canvas, then dispose.

use alloc::vec;
use alloc::vec::Vec;

use crate::decoder::blocks::{ColorTable, DisposeMethod};
use crate::decoder::index::FrameMeta;

/// Fully transparent ARGB, used for cleared canvases and background fills
/// that cannot resolve a color.
pub(crate) const TRANSPARENT: u32 = 0x0000_0000;

const OPAQUE: u32 = 0xFF00_0000;

pub(crate) struct Compositor {
    width: usize,
    canvas: Vec<u32>,
    /// Canvas state immediately before the most recent apply that followed a
    /// frame not disposing to previous. Repeated previous-restores collapse
    /// toward this one reference.
    snapshot: Vec<u32>,
    prior_dispose: DisposeMethod,
}

impl Compositor {
    /// A compositor over a cleared (fully transparent) canvas.
    pub(crate) fn new(width: u16, height: u16) -> Self {
        let pixels = usize::from(width) * usize::from(height);
        Self {
            width: usize::from(width),
            canvas: vec![TRANSPARENT; pixels],
            snapshot: vec![TRANSPARENT; pixels],
            prior_dispose: DisposeMethod::Unspecified,
        }
    }

    /// Replace the canvas (and the restore reference) with a composed frame.
    pub(crate) fn seed(&mut self, argb: &[u32]) {
        self.canvas.copy_from_slice(argb);
        self.snapshot.copy_from_slice(argb);
        self.prior_dispose = DisposeMethod::Unspecified;
    }

    /// The composed canvas.
    pub(crate) fn canvas(&self) -> &[u32] {
        &self.canvas
    }

    /// Write one decoded frame's palette indices into its sub-rectangle.
    ///
    /// Pixels matching the frame's transparent index leave the canvas
    /// untouched; indices outside the color table compose as opaque black.
    pub(crate) fn apply(&mut self, meta: &FrameMeta, indices: &[u8], table: &ColorTable) {
        if self.prior_dispose != DisposeMethod::Previous {
            self.snapshot.copy_from_slice(&self.canvas);
        }
        self.prior_dispose = meta.dispose;

        let frame_width = usize::from(meta.width);
        let rows: Vec<usize> = if meta.interlaced {
            interlaced_rows(usize::from(meta.height)).collect()
        } else {
            (0..usize::from(meta.height)).collect()
        };

        for (source_row, &canvas_row) in rows.iter().enumerate() {
            let row = &indices[source_row * frame_width..(source_row + 1) * frame_width];
            let base = (usize::from(meta.top) + canvas_row) * self.width + usize::from(meta.left);
            for (x, &index) in row.iter().enumerate() {
                if meta.transparent_index == Some(index) {
                    continue;
                }
                self.canvas[base + x] = OPAQUE | table.rgb(index).unwrap_or(0);
            }
        }
    }

    /// Apply the frame's disposal transition. `background` is the resolved
    /// fill color for [`DisposeMethod::Background`]; the caller handles the
    /// local-table and out-of-range cases by passing [`TRANSPARENT`].
    pub(crate) fn dispose(&mut self, meta: &FrameMeta, background: u32) {
        match meta.dispose {
            DisposeMethod::Unspecified | DisposeMethod::Keep => {}
            DisposeMethod::Background => {
                self.for_each_rect_row(meta, |canvas, range| canvas[range].fill(background));
            }
            DisposeMethod::Previous => {
                let snapshot = core::mem::take(&mut self.snapshot);
                self.for_each_rect_row(meta, |canvas, range| {
                    canvas[range.clone()].copy_from_slice(&snapshot[range]);
                });
                self.snapshot = snapshot;
            }
        }
    }

    fn for_each_rect_row(
        &mut self,
        meta: &FrameMeta,
        mut f: impl FnMut(&mut [u32], core::ops::Range<usize>),
    ) {
        for row in 0..usize::from(meta.height) {
            let start = (usize::from(meta.top) + row) * self.width + usize::from(meta.left);
            f(&mut self.canvas, start..start + usize::from(meta.width));
        }
    }
}

/// Canvas rows of an interlaced frame in storage order: four passes with
/// starts 0, 4, 2, 1 and steps 8, 8, 4, 2.
fn interlaced_rows(height: usize) -> impl Iterator<Item = usize> {
    const PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];
    PASSES
        .into_iter()
        .flat_map(move |(start, step)| (start..height).step_by(step))
}
