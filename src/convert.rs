use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator};
use log::{debug, info};
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use crate::dates::{normalize_date, parse_sort_date};
use crate::error::ConvertError;
use crate::flex::{index_flex_grid, nearest_entry, FlexEntry};
use crate::records::{parse_input_rows, read_csv, InputRow};

const FIRST_BOOK_DATE: &str = "FIRST-BOOK-DATE";
const END_OF_FILE: &str = "END OF FILE\r\n";
const OUTPUT_PREFIX: &str = "processed_";

/// Rows whose drop-off date does not parse sort as if returned on this day.
fn undated() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2000, 1, 1)
}

/// Business rules applied to every Flexfile.
#[derive(Debug, Clone, PartialEq)]
pub struct Rules {
    pub excluded_from_days: HashSet<String>,
    pub excluded_vehicles: HashSet<String>,
    pub vehicle_aliases: HashMap<String, String>,
    /// Multiplier applied to a quote price before the flex grid lookup.
    pub price_factor: f64,
    pub availability: String,
}

impl Default for Rules {
    fn default() -> Self {
        let set = |items: &[&str]| -> HashSet<String> {
            items.iter().map(|s| s.to_string()).collect()
        };
        Rules {
            excluded_from_days: set(&["0", "1", "7", "14", "21", "29"]),
            excluded_vehicles: set(&[
                "Aventus 2-seater (AT)",
                "Mystery Machine 2",
                "Mystery Machine 2 Hightop",
                "Mystery Machine 3",
                "Budget Mini-Camper",
                "Grip 4x4",
            ]),
            vehicle_aliases: [
                ("D5AWD Adventure Camper", "D5"),
                ("Desert Sands", "DSANDS"),
                ("Johnny Feelgood", "JFG"),
            ]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect(),
            price_factor: 0.75,
            availability: "RQ".to_string(),
        }
    }
}

impl Rules {
    pub fn keeps(&self, row: &InputRow) -> bool {
        !self.excluded_from_days.contains(&row.from_day)
            && !self.excluded_vehicles.contains(&row.vehicle_code)
    }

    pub fn rewrite_vehicle(&self, row: &mut InputRow) {
        if let Some(alias) = self.vehicle_aliases.get(&row.vehicle_code) {
            row.vehicle_code = alias.clone();
        }
    }
}

/// Drops excluded rows, then rewrites the vehicle codes of the survivors.
pub fn filter_rows(rows: Vec<InputRow>, rules: &Rules) -> Vec<InputRow> {
    rows.into_iter()
        .filter(|row| rules.keeps(row))
        .map(|mut row| {
            rules.rewrite_vehicle(&mut row);
            row
        })
        .collect()
}

/// Sets the flex rate from the nearest grid price and marks every row with
/// the availability code. Rows with an unparseable price keep their flex rate.
pub fn assign_flex_rates(rows: &mut [InputRow], entries: &[FlexEntry], rules: &Rules) {
    for row in rows.iter_mut() {
        if let Ok(price) = row.price.parse::<f64>() {
            if let Some(entry) = nearest_entry(entries, price * rules.price_factor) {
                row.flex_rate = entry.code();
            }
        }
        row.availability = rules.availability.clone();
    }
}

/// Stable sort by drop-off date, then pick-up date. An unparseable pick-up
/// date sorts before any valid one.
pub fn sort_rows(rows: &mut [InputRow]) {
    rows.sort_by_key(|row| {
        (
            parse_sort_date(&row.pickup_date_to).or_else(undated),
            parse_sort_date(&row.pickup_date_from),
        )
    });
}

/// `<dir>/processed_<stem>.txt` next to the input file.
pub fn output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{OUTPUT_PREFIX}{stem}.txt"))
}

#[derive(Debug, Serialize)]
struct OutputLine<'a> {
    location: &'a str,
    vehicle: &'a str,
    reserved: &'a str,
    date_from: String,
    date_to: String,
    flex_rate: &'a str,
    availability: &'a str,
}

impl<'a> From<&'a InputRow> for OutputLine<'a> {
    fn from(row: &'a InputRow) -> Self {
        OutputLine {
            location: &row.pickup_location_code,
            vehicle: &row.vehicle_code,
            reserved: "",
            date_from: normalize_date(&row.pickup_date_from),
            date_to: normalize_date(&row.pickup_date_to),
            flex_rate: &row.flex_rate,
            availability: &row.availability,
        }
    }
}

/// Writes the quoted CRLF text layout and hands the underlying writer back.
pub fn write_output<W: Write>(writer: W, rows: &[InputRow]) -> csv::Result<W> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(writer);

    if let Some(first) = rows.first() {
        wtr.serialize((FIRST_BOOK_DATE, normalize_date(&first.pickup_date_from)))?;
    }
    for row in rows {
        wtr.serialize(OutputLine::from(row))?;
    }

    let mut inner = wtr.into_inner().map_err(|e| e.into_error())?;
    inner.write_all(END_OF_FILE.as_bytes())?;
    Ok(inner)
}

pub fn save_output(path: &Path, rows: &[InputRow]) -> Result<(), ConvertError> {
    let file = File::create(path).map_err(|e| ConvertError::io(path, e))?;
    let mut file = write_output(file, rows).map_err(|e| match e.into_kind() {
        csv::ErrorKind::Io(err) => ConvertError::io(path, err),
        kind => ConvertError::Parse(format!("error writing {}: {:?}", path.display(), kind)),
    })?;
    file.flush().map_err(|e| ConvertError::io(path, e))
}

/// Converts one Flexfile with the default rules. Returns the path written.
pub fn process_file(input: &Path, flex_grid: &Path) -> Result<PathBuf, ConvertError> {
    process_file_with(input, flex_grid, &Rules::default())
}

pub fn process_file_with(
    input: &Path,
    flex_grid: &Path,
    rules: &Rules,
) -> Result<PathBuf, ConvertError> {
    info!("reading input file: {}", input.display());
    let input_records = read_csv(input)?;
    let rows = parse_input_rows(&input_records)?;
    info!("parsed input rows: {}", rows.len());

    info!("reading flex file: {}", flex_grid.display());
    let flex_records = read_csv(flex_grid)?;
    let entries = index_flex_grid(&flex_records)?;
    if entries.is_empty() {
        return Err(ConvertError::Validation(format!(
            "flex grid {} has no prices",
            flex_grid.display()
        )));
    }
    debug!("indexed {} flex entries", entries.len());

    let mut rows = filter_rows(rows, rules);
    debug!("{} rows left after filtering", rows.len());
    assign_flex_rates(&mut rows, &entries, rules);
    sort_rows(&mut rows);

    let output = output_path(input);
    save_output(&output, &rows)?;
    info!("successfully saved output file: {}", output.display());

    Ok(output)
}
