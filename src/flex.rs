use csv::StringRecord;

use crate::error::ConvertError;

/// A single priced cell of the flex grid.
#[derive(Debug, Clone, PartialEq)]
pub struct FlexEntry {
    pub row_header: String,
    pub col_header: String,
    pub price: f64,
}

impl FlexEntry {
    /// The flex rate code: row label followed by column label.
    pub fn code(&self) -> String {
        format!("{}{}", self.row_header, self.col_header)
    }
}

/// Flattens the grid into entries ordered by ascending price. Cells that are
/// not finite numbers are skipped; equal prices keep their grid order.
pub fn index_flex_grid(records: &[StringRecord]) -> Result<Vec<FlexEntry>, ConvertError> {
    let (headers, rows) = match records.split_first() {
        Some((headers, rows)) if !rows.is_empty() => (headers, rows),
        _ => return Err(ConvertError::Parse("flex data is empty or invalid".to_string())),
    };

    let mut entries = Vec::new();
    for row in rows {
        let row_header = row.get(0).unwrap_or_default();
        for (col, cell) in row.iter().enumerate().skip(1) {
            if let Some(price) = cell.parse::<f64>().ok().filter(|p| p.is_finite()) {
                entries.push(FlexEntry {
                    row_header: row_header.to_string(),
                    col_header: headers.get(col).unwrap_or_default().to_string(),
                    price,
                });
            }
        }
    }

    entries.sort_by(|a, b| a.price.total_cmp(&b.price));
    Ok(entries)
}

/// Returns the entry whose price is closest to `target`. The earliest entry
/// wins exact ties.
pub fn nearest_entry(entries: &[FlexEntry], target: f64) -> Option<&FlexEntry> {
    let mut iter = entries.iter();
    let mut best = iter.next()?;
    let mut best_diff = (best.price - target).abs();

    for entry in iter {
        let diff = (entry.price - target).abs();
        if diff < best_diff {
            best = entry;
            best_diff = diff;
        }
    }

    Some(best)
}
