//! Row classification against a plot's active filters

use ahash::AHashMap;
use lb_core::data::Table;
use lb_core::engine::BrushLayer;
use lb_core::field::FieldId;
use lb_core::filter::FilterSnapshot;
use rayon::prelude::*;

/// How a row is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Hidden,
    Base,
    /// Drawn on top of the base layer in the highlight colour
    Highlight,
}

/// Classify every row of `table`.
///
/// Without a brush a row is drawn when it passes `base`. An intersecting
/// brush (`blend = false`) additionally requires the row to pass the brush.
/// A blending brush keeps every base row and highlights those that also
/// pass the brush.
pub fn classify(
    table: &Table,
    columns: &AHashMap<FieldId, usize>,
    base: &FilterSnapshot,
    brush: Option<&BrushLayer>,
) -> Vec<Mark> {
    let value_at = |row: usize| {
        move |field: FieldId| columns.get(&field).map(|&c| table.column(c).value(row))
    };

    (0..table.num_rows())
        .into_par_iter()
        .map(|row| {
            if !base.admits(value_at(row)) {
                return Mark::Hidden;
            }
            match brush {
                None => Mark::Base,
                Some(layer) => {
                    let brushed = layer.filter.admits(value_at(row));
                    match (layer.blend, brushed) {
                        (false, true) => Mark::Base,
                        (false, false) => Mark::Hidden,
                        (true, true) => Mark::Highlight,
                        (true, false) => Mark::Base,
                    }
                }
            }
        })
        .collect()
}
