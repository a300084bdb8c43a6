use csv::StringRecord;
use serde::Deserialize;
use std::{fs::File, io::Read, path::Path};

use crate::error::{ConvertError, CsvError};

/// One quote row of a Flexfile. Columns are matched by header name; the
/// computed fields are filled in after filtering.
#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct InputRow {
    pub pickup_location_code: String,
    pub vehicle_code: String,
    pub pickup_date_from: String,
    pub pickup_date_to: String,
    pub price: String,
    pub from_day: String,
    #[serde(skip)]
    pub flex_rate: String,
    #[serde(skip)]
    pub availability: String,
}

pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Vec<StringRecord>, ConvertError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    parse_csv(file).map_err(|e| ConvertError::csv(path, e))
}

/// Reads every record, header row included, dropping rows whose first field
/// is blank.
pub fn parse_csv<R: Read>(mut reader: R) -> Result<Vec<StringRecord>, CsvError> {
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|e| CsvError::Read(e.into()))?;
    check_quotes(&data)?;

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_slice());

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.get(0).is_some_and(|field| !field.trim().is_empty()) {
            records.push(record);
        }
    }

    Ok(records)
}

/// The `csv` reader accepts stray quotes, so quoting is checked up front: a
/// quote may only open a field, a closing quote must end the field, and every
/// quoted field must be closed.
fn check_quotes(data: &[u8]) -> Result<(), CsvError> {
    let mut line = 1;
    let mut open_since = None;
    let mut field_start = true;

    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if open_since.is_some() {
            match (b, data.get(i + 1)) {
                (b'"', Some(b'"')) => i += 1,
                (b'"', None | Some(b',' | b'\r' | b'\n')) => {
                    open_since = None;
                    field_start = false;
                }
                (b'"', Some(_)) => {
                    return Err(CsvError::Quote {
                        line,
                        reason: "extraneous or missing \" in quoted field",
                    })
                }
                (b'\n', _) => line += 1,
                _ => {}
            }
        } else {
            match b {
                b'"' if field_start => open_since = Some(line),
                b'"' => {
                    return Err(CsvError::Quote {
                        line,
                        reason: "bare \" in non-quoted field",
                    })
                }
                b',' => field_start = true,
                b'\n' => {
                    line += 1;
                    field_start = true;
                }
                _ => field_start = false,
            }
        }
        i += 1;
    }

    match open_since {
        Some(line) => Err(CsvError::Quote {
            line,
            reason: "quoted field is never closed",
        }),
        None => Ok(()),
    }
}

/// Maps the data rows onto `InputRow` using the first record as header row.
pub fn parse_input_rows(records: &[StringRecord]) -> Result<Vec<InputRow>, ConvertError> {
    let (headers, data) = match records.split_first() {
        Some((headers, data)) if !data.is_empty() => (headers, data),
        _ => {
            return Err(ConvertError::Validation(
                "input file is empty or invalid".to_string(),
            ))
        }
    };

    data.iter()
        .map(|record| {
            let headers = row_headers(headers, record.len());
            record
                .deserialize::<InputRow>(Some(&headers))
                .map_err(|e| ConvertError::Parse(format!("invalid input row: {e}")))
        })
        .collect()
}

/// Headers for a row of `len` cells. Columns the row does not reach are left
/// out so their fields stay empty, and a repeated name only keeps its last
/// occurrence within the row.
fn row_headers(headers: &StringRecord, len: usize) -> StringRecord {
    let names: Vec<&str> = headers.iter().take(len).collect();
    names
        .iter()
        .enumerate()
        .map(|(i, &name)| {
            if names[i + 1..].contains(&name) {
                ""
            } else {
                name
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(location: &str, vehicle: &str, from: &str, to: &str, price: &str, day: &str) -> InputRow {
        InputRow {
            pickup_location_code: location.to_string(),
            vehicle_code: vehicle.to_string(),
            pickup_date_from: from.to_string(),
            pickup_date_to: to.to_string(),
            price: price.to_string(),
            from_day: day.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_read_csv_drops_blank_rows() {
        let records = read_csv("test-inputs/Flexfiles_sample.csv").unwrap();

        assert_eq!(records.len(), 6);
        assert_eq!(records[0].get(0), Some("PickupLocationCode"));
        assert!(records
            .iter()
            .all(|r| !r.get(0).unwrap_or_default().trim().is_empty()));
    }

    #[test]
    fn test_read_csv_missing_file() {
        let err = read_csv("test-inputs/does_not_exist.csv").unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
    }

    #[test]
    fn parse_csv_handles_quoted_fields() {
        let data = "a,b\r\n\"x, y\",\"say \"\"hi\"\"\"\r\n   ,ignored\r\n";
        let records = parse_csv(data.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get(0), Some("x, y"));
        assert_eq!(records[1].get(1), Some("say \"hi\""));
    }

    #[test]
    fn parse_csv_rejects_invalid_utf8() {
        let data: &[u8] = b"a,b\n\xff\xfe,1\n";
        assert!(parse_csv(data).is_err());
    }

    #[test]
    fn parse_input_rows_maps_by_header_name() {
        let data = "Price,Unused,VehicleCode,FromDay,PickupLocationCode,PickupDateFrom,PickupDateTo\n\
                    99.50,zzz,Hitop,3,AKL,01/03/2025,05/03/2025\n";
        let records = parse_csv(data.as_bytes()).unwrap();
        let rows = parse_input_rows(&records).unwrap();

        assert_eq!(
            rows,
            vec![row("AKL", "Hitop", "01/03/2025", "05/03/2025", "99.50", "3")]
        );
    }

    #[test]
    fn parse_input_rows_short_row_leaves_fields_empty() {
        let data = "PickupLocationCode,VehicleCode,Price,FromDay\nAKL,Hitop\nCHC,Hitop,10,2,extra\n";
        let records = parse_csv(data.as_bytes()).unwrap();
        let rows = parse_input_rows(&records).unwrap();

        assert_eq!(rows[0], row("AKL", "Hitop", "", "", "", ""));
        assert_eq!(rows[1], row("CHC", "Hitop", "", "", "10", "2"));
    }

    #[test]
    fn parse_input_rows_missing_column_defaults_empty() {
        let data = "VehicleCode\nHitop\n";
        let records = parse_csv(data.as_bytes()).unwrap();
        let rows = parse_input_rows(&records).unwrap();

        assert_eq!(rows, vec![row("", "Hitop", "", "", "", "")]);
    }

    #[test]
    fn parse_input_rows_needs_header_and_data() {
        let records = parse_csv("PickupLocationCode,Price\n".as_bytes()).unwrap();
        let err = parse_input_rows(&records).unwrap_err();
        assert!(matches!(err, ConvertError::Validation(_)));

        let err = parse_input_rows(&[]).unwrap_err();
        assert!(matches!(err, ConvertError::Validation(_)));
    }

    #[test]
    fn parse_csv_rejects_unterminated_quote() {
        let data = "PickupLocationCode,VehicleCode,Price,FromDay\nAKL,\"Hitop,100,3\nCHC,X,10,2\n";
        let err = parse_csv(data.as_bytes()).unwrap_err();

        assert!(matches!(err, CsvError::Quote { line: 2, .. }));
    }

    #[test]
    fn parse_csv_rejects_bare_quote() {
        let err = parse_csv("a,b\nAK\"L,Hitop\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CsvError::Quote { line: 2, .. }));

        let err = parse_csv("a,b\nAKL, \"Hitop\"\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CsvError::Quote { line: 2, .. }));
    }

    #[test]
    fn parse_csv_rejects_text_after_closing_quote() {
        let err = parse_csv("a,b\n\"AKL\"x,Hitop\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CsvError::Quote { line: 2, .. }));
    }

    #[test]
    fn parse_csv_accepts_multiline_and_empty_quoted_fields() {
        let data = "a,b,c\n\"two\nlines\",\"\",\"\"\"\"\r\nnext,1,2\n";
        let records = parse_csv(data.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[1].get(0), Some("two\nlines"));
        assert_eq!(records[1].get(1), Some(""));
        assert_eq!(records[1].get(2), Some("\""));
        assert_eq!(records[2].get(0), Some("next"));
    }

    #[test]
    fn test_read_csv_malformed_file() {
        let err = read_csv("test-inputs/Flexfiles_unterminated.csv").unwrap_err();
        assert!(matches!(err, ConvertError::Csv { .. }));
    }

    #[test]
    fn parse_input_rows_repeated_header_last_wins() {
        let data = "VehicleCode,VehicleCode,FromDay\nA,B,3\n";
        let records = parse_csv(data.as_bytes()).unwrap();
        let rows = parse_input_rows(&records).unwrap();

        assert_eq!(rows, vec![row("", "B", "", "", "", "3")]);
    }

    #[test]
    fn parse_input_rows_repeated_header_beyond_short_row() {
        let data = "VehicleCode,FromDay,VehicleCode\nA,3\n";
        let records = parse_csv(data.as_bytes()).unwrap();
        let rows = parse_input_rows(&records).unwrap();

        assert_eq!(rows, vec![row("", "A", "", "", "", "3")]);
    }
}
