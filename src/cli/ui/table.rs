use std::fmt::{self, Display, Formatter};

use tabled::{builder::Builder, settings::Style as TableStyle};

use super::painter::Painter;

/// A structured table that renders via `Display`.
#[derive(Debug)]
pub(crate) struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table with column headers and data rows.
    pub(crate) fn grid(
        headers: impl IntoIterator<Item = impl Into<String>>,
        rows: impl IntoIterator<Item = Vec<String>>,
    ) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: rows.into_iter().collect(),
        }
    }

    /// Creates a two-column field/value table with muted field names.
    pub(crate) fn key_value(painter: &Painter, rows: Vec<(&str, String)>) -> Self {
        let records = rows
            .into_iter()
            .map(|(field, value)| vec![painter.muted(field), value]);
        Self::grid(["field", "value"], records)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        builder.push_record(&self.headers);
        for row in &self.rows {
            builder.push_record(row);
        }
        let mut table = builder.build();
        table.with(TableStyle::rounded());
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn grid_table_renders_headers_before_rows() {
        let table = Table::grid(
            ["piece", "location"],
            vec![
                vec!["33".into(), "3".into()],
                vec!["10".into(), "14".into()],
            ],
        );
        let rendered = table.to_string();

        assert_eq!(2, table.rows.len());
        let header = rendered.find("location").expect("header is rendered");
        let first_row = rendered.find("33").expect("first row is rendered");
        let second_row = rendered.find("14").expect("second row is rendered");
        assert!(header < first_row && first_row < second_row);
        assert!(rendered.starts_with('╭'));
    }

    #[test]
    fn key_value_table_renders_field_value_pairs() {
        let painter = Painter::new(false);
        let table = Table::key_value(
            &painter,
            vec![("address", "E6:12:AB:01:02:03".into()), ("rssi", "-51".into())],
        );
        let rendered = table.to_string();

        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[1].contains("field") && lines[1].contains("value"));
        assert!(rendered.contains("E6:12:AB:01:02:03"));
        assert!(rendered.contains("rssi"));
    }
}
