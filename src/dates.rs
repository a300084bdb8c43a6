use chrono::NaiveDate;
use log::warn;

/// A chrono format and the exact shape its input must have, `9` standing
/// for any ASCII digit.
struct Layout {
    format: &'static str,
    shape: &'static str,
}

/// Accepted input layouts, tried in order. `DD/MM/YYYY` wins over
/// `MM/DD/YYYY` whenever both would parse.
const INPUT_LAYOUTS: [Layout; 3] = [
    Layout {
        format: "%Y-%m-%d",
        shape: "9999-99-99",
    },
    Layout {
        format: "%d/%m/%Y",
        shape: "99/99/9999",
    },
    Layout {
        format: "%m/%d/%Y",
        shape: "99/99/9999",
    },
];
const SORT_LAYOUT: Layout = Layout {
    format: "%d/%m/%Y",
    shape: "99/99/9999",
};
const OUTPUT_FORMAT: &str = "%m/%d/%Y";

impl Layout {
    /// chrono does not enforce field widths, so the shape is checked first.
    fn parse(&self, s: &str) -> Option<NaiveDate> {
        let fits = s.len() == self.shape.len()
            && s.bytes().zip(self.shape.bytes()).all(|(c, p)| match p {
                b'9' => c.is_ascii_digit(),
                _ => c == p,
            });
        if !fits {
            return None;
        }
        NaiveDate::parse_from_str(s, self.format).ok()
    }
}

/// Reformats a date to `MM/DD/YYYY`. Unparseable input is logged and
/// becomes an empty string.
pub fn normalize_date(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    match INPUT_LAYOUTS.iter().find_map(|layout| layout.parse(s)) {
        Some(date) => date.format(OUTPUT_FORMAT).to_string(),
        None => {
            warn!("could not parse date: {}", s);
            String::new()
        }
    }
}

/// Parses the `DD/MM/YYYY` dates used to order output rows.
pub fn parse_sort_date(s: &str) -> Option<NaiveDate> {
    SORT_LAYOUT.parse(s)
}
