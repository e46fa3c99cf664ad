//! Image surface layout.
//!
//! Computes the memory footprint of an image surface: row and slice pitch,
//! total size, tiling, and the placement of NV12 planes. Linear surfaces are
//! addressed row by row; tiled surfaces use Y-major 4 KiB tiles made of
//! 16-byte columns (128 bytes x 32 rows per tile).
//!
//! # Example
//!
//! ```
//! use xpu_core::layout::{ImageQuery, SurfaceDimension};
//!
//! let layout = ImageQuery::new(SurfaceDimension::D2, 4, 4, 4).query();
//! assert_eq!(layout.row_pitch, 64);
//! assert_eq!(layout.size, 256);
//! ```

use crate::memory::align_up;

/// Row pitch alignment of linear surfaces.
pub const LINEAR_PITCH_ALIGNMENT: usize = 64;

/// Vertical alignment of linear surfaces.
pub const LINEAR_HEIGHT_ALIGNMENT: usize = 4;

/// Width of a Y-major tile in bytes.
pub const TILE_Y_WIDTH: usize = 128;

/// Height of a Y-major tile in rows.
pub const TILE_Y_HEIGHT: usize = 32;

/// Size of one Y-major tile.
pub const TILE_Y_SIZE: usize = TILE_Y_WIDTH * TILE_Y_HEIGHT;

/// Width of one column inside a Y-major tile.
const TILE_Y_COLUMN_WIDTH: usize = 16;

/// Surface dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceDimension {
    D1,
    D1Array,
    D2,
    D2Array,
    D3,
}

impl SurfaceDimension {
    /// Whether the surface has a single row per slice.
    pub fn is_1d(self) -> bool {
        matches!(self, Self::D1 | Self::D1Array)
    }
}

/// Plane of a planar YUV surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Plane {
    /// Not a plane view.
    #[default]
    None,
    /// Full resolution luma plane.
    Y,
    /// Half resolution interleaved chroma plane.
    U,
}

/// Memory tiling of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileMode {
    #[default]
    Linear,
    TileY,
}

/// Input to a layout query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageQuery {
    pub dimension: SurfaceDimension,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub array_size: usize,
    /// Bytes per element.
    pub element_size: usize,
    /// Two-plane 4:2:0 surface (NV12).
    pub planar_yuv: bool,
    pub plane: Plane,
    /// Whether the surface may be tiled.
    pub allow_tiling: bool,
    /// Row pitch imposed by the caller (images over buffers).
    pub row_pitch: Option<usize>,
}

impl ImageQuery {
    /// A linear query for a single-plane surface.
    pub fn new(
        dimension: SurfaceDimension,
        width: usize,
        height: usize,
        element_size: usize,
    ) -> Self {
        Self {
            dimension,
            width,
            height,
            depth: 1,
            array_size: 1,
            element_size,
            planar_yuv: false,
            plane: Plane::None,
            allow_tiling: false,
            row_pitch: None,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_array_size(mut self, array_size: usize) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_tiling(mut self, allow: bool) -> Self {
        self.allow_tiling = allow;
        self
    }

    pub fn with_planar_yuv(mut self, plane: Plane) -> Self {
        self.planar_yuv = true;
        self.plane = plane;
        self
    }

    pub fn with_row_pitch(mut self, row_pitch: Option<usize>) -> Self {
        self.row_pitch = row_pitch;
        self
    }

    /// Tile mode the surface ends up with.
    pub fn tile_mode(&self) -> TileMode {
        if self.allow_tiling && !self.dimension.is_1d() {
            TileMode::TileY
        } else {
            TileMode::Linear
        }
    }

    /// Compute the surface layout.
    pub fn query(&self) -> ImageLayout {
        let tile_mode = self.tile_mode();
        let (pitch_alignment, height_alignment) = match tile_mode {
            TileMode::Linear => (LINEAR_PITCH_ALIGNMENT, LINEAR_HEIGHT_ALIGNMENT),
            TileMode::TileY => (TILE_Y_WIDTH, TILE_Y_HEIGHT),
        };

        let width_bytes = self.width.max(1) * self.element_size;
        let row_pitch = match (self.row_pitch, tile_mode) {
            (Some(pitch), TileMode::Linear) if pitch >= width_bytes => pitch,
            _ => align_up(width_bytes, pitch_alignment),
        };

        let aligned_height = if self.dimension.is_1d() {
            1
        } else {
            align_up(self.height.max(1), height_alignment)
        };

        if self.planar_yuv {
            let aligned_uv_height = align_up((self.height / 2).max(1), height_alignment);
            let size = row_pitch * (aligned_height + aligned_uv_height);
            let offset = match self.plane {
                Plane::U => row_pitch * aligned_height,
                Plane::None | Plane::Y => 0,
            };
            return ImageLayout {
                size,
                row_pitch,
                slice_pitch: size,
                qpitch: aligned_height,
                offset,
                x_offset: 0,
                y_offset: 0,
                y_offset_for_uv_plane: aligned_height,
                tile_mode,
            };
        }

        let layers = match self.dimension {
            SurfaceDimension::D3 => self.depth.max(1),
            SurfaceDimension::D1Array | SurfaceDimension::D2Array => self.array_size.max(1),
            SurfaceDimension::D1 | SurfaceDimension::D2 => 1,
        };
        let slice_pitch = row_pitch * aligned_height;

        ImageLayout {
            size: slice_pitch * layers,
            row_pitch,
            slice_pitch,
            qpitch: aligned_height,
            offset: 0,
            x_offset: 0,
            y_offset: 0,
            y_offset_for_uv_plane: 0,
            tile_mode,
        }
    }

    /// Layout of an image placed over an existing buffer of `buffer_size` bytes.
    ///
    /// The buffer is addressed linearly with the caller's row pitch (or the
    /// packed width when none is given); the size is the buffer's.
    pub fn query_from_buffer_params(&self, buffer_size: usize) -> ImageLayout {
        let row_pitch = self
            .row_pitch
            .filter(|&pitch| pitch > 0)
            .unwrap_or(self.width.max(1) * self.element_size);
        ImageLayout {
            size: buffer_size,
            row_pitch,
            slice_pitch: row_pitch * self.height.max(1),
            qpitch: 0,
            offset: 0,
            x_offset: 0,
            y_offset: 0,
            y_offset_for_uv_plane: 0,
            tile_mode: TileMode::Linear,
        }
    }
}

/// Result of a layout query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageLayout {
    /// Total allocation size.
    pub size: usize,
    pub row_pitch: usize,
    pub slice_pitch: usize,
    /// Rows between array slices.
    pub qpitch: usize,
    /// Byte offset of the surface inside its allocation.
    pub offset: usize,
    pub x_offset: usize,
    pub y_offset: usize,
    /// First row of the UV plane in a planar YUV surface.
    pub y_offset_for_uv_plane: usize,
    pub tile_mode: TileMode,
}

impl ImageLayout {
    /// Whether the surface is tiled.
    pub fn is_tiled(&self) -> bool {
        self.tile_mode != TileMode::Linear
    }

    /// Byte offset of the element at byte column `x`, row `y` and slice `z`.
    pub fn byte_offset(&self, x: usize, y: usize, z: usize) -> usize {
        match self.tile_mode {
            TileMode::Linear => self.offset + z * self.slice_pitch + y * self.row_pitch + x,
            TileMode::TileY => self.offset + self.tile_y_offset(x, z * self.qpitch + y),
        }
    }

    fn tile_y_offset(&self, x: usize, y: usize) -> usize {
        let tiles_per_row = self.row_pitch / TILE_Y_WIDTH;
        let tile = (y / TILE_Y_HEIGHT) * tiles_per_row + x / TILE_Y_WIDTH;
        let xi = x % TILE_Y_WIDTH;
        let yi = y % TILE_Y_HEIGHT;
        tile * TILE_Y_SIZE
            + (xi / TILE_Y_COLUMN_WIDTH) * (TILE_Y_COLUMN_WIDTH * TILE_Y_HEIGHT)
            + yi * TILE_Y_COLUMN_WIDTH
            + xi % TILE_Y_COLUMN_WIDTH
    }

    /// Length of the contiguous run starting at byte column `x`, capped at `len`.
    ///
    /// Tiled rows are split at column boundaries.
    pub fn contiguous_run(&self, x: usize, len: usize) -> usize {
        match self.tile_mode {
            TileMode::Linear => len,
            TileMode::TileY => (TILE_Y_COLUMN_WIDTH - x % TILE_Y_COLUMN_WIDTH).min(len),
        }
    }
}
