//! Per-tile debug dumps.
//!
//! A `SparseGrid` built with a sink reports every tile it stepped, after all
//! tiles have stepped and before any topology change, with the full padded
//! buffers of the previous and the new generation.

use std::io::{self, Write};

use super::tile::TileBounds;

pub trait TileDumpSink: Send {
    /// `before` and `after` are `(width + 2) * (height + 2)` bytes each,
    /// one byte per cell, ghost margin included.
    fn tile_stepped(
        &mut self,
        generation: u64,
        bounds: TileBounds,
        before: &[u8],
        after: &[u8],
    ) -> io::Result<()>;
}

/// Plain-text dump. Per tile: the generation, the tile origin as `(x, y)`,
/// then one line per padded row holding the row before and after the step as
/// comma-separated hex cells.
///
/// ```text
/// 1
/// (0, 0)
/// 0,0,0,0 0,0,0,0
/// 0,1,1,0 0,1,0,0
/// ```
pub struct TextTileDump<W: Write> {
    out: W,
}

impl<W: Write> TextTileDump<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_row(&mut self, row: &[u8]) -> io::Result<()> {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                self.out.write_all(b",")?;
            }
            write!(self.out, "{cell:x}")?;
        }
        Ok(())
    }
}

impl<W: Write + Send> TileDumpSink for TextTileDump<W> {
    fn tile_stepped(
        &mut self,
        generation: u64,
        bounds: TileBounds,
        before: &[u8],
        after: &[u8],
    ) -> io::Result<()> {
        let stride = (bounds.width + 2) as usize;
        writeln!(self.out, "{generation}")?;
        writeln!(self.out, "({}, {})", bounds.x_min, bounds.y_min)?;
        for (old, new) in before.chunks_exact(stride).zip(after.chunks_exact(stride)) {
            self.write_row(old)?;
            self.out.write_all(b" ")?;
            self.write_row(new)?;
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }
}
