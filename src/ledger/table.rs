use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
    io,
};

use tracing::{debug, warn};

use crate::{
    error::{LedgerError, SaveError},
    utils::{duration::TrackedDuration, time::ledger_key_to_date},
};

pub const DATE_COLUMN: &str = "Date";

/// Checks that `title` can name a ledger column and returns it trimmed.
pub fn check_title(title: &str) -> Result<&str, SaveError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(SaveError::MissingTitle);
    }
    if title == DATE_COLUMN {
        return Err(SaveError::ReservedTitle(title.to_string()));
    }
    Ok(title)
}

/// One calendar day of the ledger. `cells` holds a value for every title the table knows, empty
/// when nothing was saved under that title on this day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub date: String,
    pub cells: BTreeMap<String, String>,
}

impl LedgerRow {
    fn empty<'a>(date: &str, titles: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            date: date.to_string(),
            cells: titles
                .into_iter()
                .map(|title| (title.clone(), String::new()))
                .collect(),
        }
    }

    pub fn cell(&self, title: &str) -> Option<&str> {
        self.cells.get(title).map(String::as_str)
    }
}

/// Date × title table of saved durations. Columns only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerTable {
    titles: BTreeSet<String>,
    rows: Vec<LedgerRow>,
}

impl LedgerTable {
    /// Reads a table with a header row. Rows may be shorter than the header, missing cells are
    /// empty. When two rows share a date the later one wins. Columns with a blank name are kept
    /// so their cells survive the next rewrite.
    pub fn from_reader(reader: impl io::Read) -> Result<Self, LedgerError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Ok(Self::default());
        }

        let date_index = headers
            .iter()
            .position(|v| v == DATE_COLUMN)
            .ok_or(LedgerError::MissingDateColumn(DATE_COLUMN))?;

        let title_columns = headers
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != date_index)
            .map(|(index, name)| (index, name.to_string()))
            .collect::<Vec<_>>();

        let mut table = Self::default();
        for (_, name) in &title_columns {
            if !table.titles.insert(name.clone()) {
                warn!("Ledger has several columns named {name:?}, keeping the last one");
            }
        }

        for record in reader.records() {
            let record = record?;
            let date = record.get(date_index).unwrap_or_default().trim();
            let mut row = LedgerRow::empty(date, &table.titles);
            for (index, title) in &title_columns {
                if let Some(value) = record.get(*index) {
                    row.cells.insert(title.clone(), value.to_string());
                }
            }

            match table.rows.iter_mut().find(|v| v.date == row.date) {
                Some(existing) => {
                    warn!("Ledger has several rows for {:?}, keeping the last one", row.date);
                    *existing = row;
                }
                None => table.rows.push(row),
            }
        }

        Ok(table)
    }

    /// Writes `Date` followed by the titles in lexicographic order. Rows go newest first, rows
    /// with a date that can't be read keep their relative order at the end.
    pub fn to_writer(&self, writer: impl io::Write) -> Result<(), LedgerError> {
        let mut writer = csv::Writer::from_writer(writer);

        writer.write_record(self.columns())?;

        let mut rows = self.rows.iter().collect::<Vec<_>>();
        rows.sort_by_key(|row| Reverse(ledger_key_to_date(&row.date)));

        for row in rows {
            let record = std::iter::once(row.date.as_str()).chain(
                self.titles
                    .iter()
                    .map(|title| row.cell(title).unwrap_or_default()),
            );
            writer.write_record(record)?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn columns(&self) -> Vec<&str> {
        std::iter::once(DATE_COLUMN)
            .chain(self.titles.iter().map(String::as_str))
            .collect()
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn row(&self, date: &str) -> Option<&LedgerRow> {
        self.rows.iter().find(|row| row.date == date)
    }

    pub fn cell(&self, date: &str, title: &str) -> Option<&str> {
        self.row(date).and_then(|row| row.cell(title))
    }

    /// Adds a title column. Every existing row gets an empty cell for it.
    pub fn ensure_column(&mut self, title: &str) {
        if self.titles.insert(title.to_string()) {
            debug!("Adding ledger column {title:?}");
            for row in &mut self.rows {
                row.cells.entry(title.to_string()).or_default();
            }
        }
    }

    /// Adds `total` to the cell at (`date`, `title`) and returns what the cell holds afterwards.
    ///
    /// An empty or missing cell simply takes `total`. A cell that can't be parsed as a duration
    /// is overwritten with `total` instead of failing the whole save.
    pub fn record_session(
        &mut self,
        date: &str,
        title: &str,
        total: TrackedDuration,
    ) -> Result<TrackedDuration, SaveError> {
        let title = check_title(title)?;

        self.ensure_column(title);

        let row = match self.rows.iter().position(|row| row.date == date) {
            Some(index) => &mut self.rows[index],
            None => {
                self.rows.push(LedgerRow::empty(date, &self.titles));
                let last = self.rows.len() - 1;
                &mut self.rows[last]
            }
        };

        let cell = row.cells.entry(title.to_string()).or_default();
        let previous = cell.trim();
        let merged = if previous.is_empty() {
            total
        } else {
            match previous.parse::<TrackedDuration>() {
                Ok(previous) => previous + total,
                Err(e) => {
                    warn!("Overwriting unreadable ledger cell ({date}, {title}): {e}");
                    total
                }
            }
        };

        *cell = merged.to_string();
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::{check_title, LedgerTable};
    use crate::{
        error::{LedgerError, SaveError},
        utils::duration::TrackedDuration,
    };

    fn serialize(table: &LedgerTable) -> Result<Vec<String>> {
        let mut buffer = vec![];
        table.to_writer(&mut buffer)?;
        Ok(String::from_utf8(buffer)?
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn seconds(value: u64) -> TrackedDuration {
        TrackedDuration::from_seconds(value)
    }

    #[test]
    fn empty_ledger_gets_date_and_title_columns() -> Result<()> {
        let mut table = LedgerTable::default();

        let cell = table.record_session("01.06.2024", "Coding", seconds(3661))?;

        assert_eq!(cell.to_string(), "1:01:01");
        assert_eq!(table.columns(), vec!["Date", "Coding"]);
        assert_eq!(serialize(&table)?, vec!["Date,Coding", "01.06.2024,1:01:01"]);
        Ok(())
    }

    #[test]
    fn existing_cell_is_summed() -> Result<()> {
        let mut table = LedgerTable::from_reader("Date,Coding\n01.06.2024,0:30:00\n".as_bytes())?;

        table.record_session("01.06.2024", "Coding", seconds(1800))?;

        assert_eq!(table.cell("01.06.2024", "Coding"), Some("1:00:00"));
        Ok(())
    }

    #[test]
    fn two_saves_add_up() -> Result<()> {
        let mut table = LedgerTable::default();

        table.record_session("02.06.2024", "Coding", seconds(125))?;
        table.record_session("02.06.2024", "Coding", seconds(4000))?;

        assert_eq!(
            table.cell("02.06.2024", "Coding"),
            Some(seconds(4125).to_string().as_str())
        );
        Ok(())
    }

    #[test]
    fn new_title_keeps_other_cells() -> Result<()> {
        let mut table = LedgerTable::from_reader(
            "Date,Coding\n02.06.2024,0:10:00\n01.06.2024,2:00:00\n".as_bytes(),
        )?;

        table.record_session("02.06.2024", "Drawing", seconds(60))?;

        assert_eq!(table.cell("02.06.2024", "Coding"), Some("0:10:00"));
        assert_eq!(table.cell("01.06.2024", "Coding"), Some("2:00:00"));
        assert_eq!(table.cell("02.06.2024", "Drawing"), Some("0:01:00"));
        assert_eq!(table.cell("01.06.2024", "Drawing"), Some(""));
        assert_eq!(
            serialize(&table)?,
            vec![
                "Date,Coding,Drawing",
                "02.06.2024,0:10:00,0:01:00",
                "01.06.2024,2:00:00,",
            ]
        );
        Ok(())
    }

    #[test]
    fn new_date_row_is_back_filled() -> Result<()> {
        let mut table =
            LedgerTable::from_reader("Date,Coding,Drawing\n01.06.2024,1:00:00,\n".as_bytes())?;

        table.record_session("03.06.2024", "Drawing", seconds(5))?;

        let row = table.row("03.06.2024").unwrap();
        assert_eq!(row.cell("Coding"), Some(""));
        assert_eq!(row.cell("Drawing"), Some("0:00:05"));
        Ok(())
    }

    #[test]
    fn empty_cell_takes_the_new_value() -> Result<()> {
        let mut table =
            LedgerTable::from_reader("Date,Coding,Drawing\n01.06.2024,1:00:00,\n".as_bytes())?;

        table.record_session("01.06.2024", "Drawing", seconds(90))?;

        assert_eq!(table.cell("01.06.2024", "Drawing"), Some("0:01:30"));
        Ok(())
    }

    #[test]
    fn malformed_cell_is_overwritten() -> Result<()> {
        let mut table =
            LedgerTable::from_reader("Date,Coding\n01.06.2024,\"1 day, 2:00:00\"\n".as_bytes())?;

        table.record_session("01.06.2024", "Coding", seconds(60))?;

        assert_eq!(table.cell("01.06.2024", "Coding"), Some("0:01:00"));
        Ok(())
    }

    #[test]
    fn rows_are_written_newest_first() -> Result<()> {
        let table = LedgerTable::from_reader(
            "Date,Coding\n\
             15.05.2024,0:00:01\n\
             someday,0:00:02\n\
             01.06.2024,0:00:03\n\
             31.12.2023,0:00:04\n"
                .as_bytes(),
        )?;

        assert_eq!(
            serialize(&table)?,
            vec![
                "Date,Coding",
                "01.06.2024,0:00:03",
                "15.05.2024,0:00:01",
                "31.12.2023,0:00:04",
                "someday,0:00:02",
            ]
        );
        Ok(())
    }

    #[test]
    fn columns_are_sorted_and_titles_with_commas_are_quoted() -> Result<()> {
        let mut table = LedgerTable::default();
        table.record_session("01.06.2024", "Zine", seconds(1))?;
        table.record_session("01.06.2024", "Art, digital", seconds(2))?;

        let lines = serialize(&table)?;

        assert_eq!(lines[0], "Date,\"Art, digital\",Zine");
        let reread = LedgerTable::from_reader(lines.join("\n").as_bytes())?;
        assert_eq!(reread.cell("01.06.2024", "Art, digital"), Some("0:00:02"));
        Ok(())
    }

    #[test]
    fn duplicate_dates_keep_the_last_row() -> Result<()> {
        let table = LedgerTable::from_reader(
            "Date,Coding\n01.06.2024,0:00:01\n01.06.2024,0:00:09\n".as_bytes(),
        )?;

        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.cell("01.06.2024", "Coding"), Some("0:00:09"));
        Ok(())
    }

    #[test]
    fn short_rows_get_empty_cells() -> Result<()> {
        let table = LedgerTable::from_reader("Date,A,B\n01.06.2024,0:00:01\n".as_bytes())?;

        assert_eq!(table.cell("01.06.2024", "A"), Some("0:00:01"));
        assert_eq!(table.cell("01.06.2024", "B"), Some(""));
        Ok(())
    }

    #[test]
    fn padded_date_matches_the_same_day() -> Result<()> {
        let mut table =
            LedgerTable::from_reader("Date,Coding\n 01.06.2024 ,0:10:00\n".as_bytes())?;

        table.record_session("01.06.2024", "Coding", seconds(600))?;

        assert_eq!(
            serialize(&table)?,
            vec!["Date,Coding", "01.06.2024,0:20:00"]
        );
        Ok(())
    }

    #[test]
    fn blank_column_survives_rewrite() -> Result<()> {
        let mut table =
            LedgerTable::from_reader("Date,Coding,\n01.06.2024,0:00:01,note\n".as_bytes())?;

        table.record_session("01.06.2024", "Coding", seconds(1))?;

        assert_eq!(table.cell("01.06.2024", ""), Some("note"));
        assert_eq!(
            serialize(&table)?,
            vec!["Date,,Coding", "01.06.2024,note,0:00:02"]
        );
        Ok(())
    }

    #[test]
    fn header_without_date_is_rejected() {
        let result = LedgerTable::from_reader("Day,Coding\n01.06.2024,0:00:01\n".as_bytes());
        assert!(matches!(result, Err(LedgerError::MissingDateColumn(_))));
    }

    #[test]
    fn blank_and_reserved_titles_are_rejected() {
        let mut table = LedgerTable::default();

        assert!(matches!(
            table.record_session("01.06.2024", "  ", seconds(1)),
            Err(SaveError::MissingTitle)
        ));
        assert!(matches!(
            table.record_session("01.06.2024", "Date", seconds(1)),
            Err(SaveError::ReservedTitle(_))
        ));
        assert_eq!(table, LedgerTable::default());
    }

    #[test]
    fn title_check_trims_and_rejects_the_date_column() -> Result<()> {
        assert_eq!(check_title(" Coding ")?, "Coding");
        assert!(matches!(check_title(" Date "), Err(SaveError::ReservedTitle(_))));
        assert!(matches!(check_title(""), Err(SaveError::MissingTitle)));
        Ok(())
    }
}
