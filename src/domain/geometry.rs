use crate::domain::models::Reservation;
use crate::domain::time_grid::TimeGrid;

/// Gradient stops used by the timetable bars, cycled per bench column.
const BAR_PALETTE: [&str; 12] = [
    "#667eea", "#764ba2", "#f093fb", "#f5576c", "#4facfe", "#00f2fe", "#43e97b", "#38f9d7",
    "#ffecd2", "#fcb69f", "#a8edea", "#fed6e3",
];

/// Vertical placement of a reservation bar along the grid's primary axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarGeometry {
    pub offset: f64,
    pub length: f64,
}

/// Maps reservation intervals onto pixel space. Every input comes from the
/// reservation itself; the mapper never consults a clock.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryMapper {
    grid: TimeGrid,
    pixels_per_slot: f64,
}

impl GeometryMapper {
    pub fn new(grid: TimeGrid, pixels_per_slot: f64) -> Self {
        Self {
            grid,
            pixels_per_slot,
        }
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn bar_geometry(&self, reservation: &Reservation) -> BarGeometry {
        let pixels_per_minute = self.pixels_per_slot / f64::from(self.grid.slot_minutes());
        let start_minutes = self.grid.minutes_from_operating_start(reservation.start_time);
        BarGeometry {
            offset: start_minutes as f64 * pixels_per_minute,
            length: reservation.duration_minutes() as f64 * pixels_per_minute,
        }
    }

    /// Deterministic color for the reservation at `index` within its bench's
    /// display-ordered list, wrapping modulo the palette.
    pub fn bar_color(index: usize) -> &'static str {
        BAR_PALETTE[index % BAR_PALETTE.len()]
    }
}

impl Default for GeometryMapper {
    fn default() -> Self {
        Self::new(TimeGrid::default(), 40.0)
    }
}
