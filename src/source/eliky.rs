use crate::record::Record;
use crate::source::{Fetched, cell_text, selector};

pub const DEFAULT_URL: &str = "https://eliky.in.ua/medicament/10986";

pub const IDENTITY_FIELDS: &[&str] = &["hospital", "quantity", "date"];

const COLUMNS: [&str; 5] = ["region", "form", "hospital", "quantity", "date"];

/// Reads the availability table. The page is dedicated to the tracked item,
/// so every row is relevant.
pub fn parse(html: &str) -> anyhow::Result<Fetched> {
    let document = scraper::Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td, th")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| anyhow::anyhow!("availability table not found on page"))?;

    let mut records = Vec::new();
    for row in table.select(&row_selector).skip(1) {
        let cells = row.select(&cell_selector).map(cell_text).collect::<Vec<_>>();
        if cells.len() < COLUMNS.len() {
            continue;
        }
        let mut record = Record::new();
        for (name, value) in COLUMNS.iter().zip(cells) {
            record.insert(name, value);
        }
        records.push(record);
    }

    Ok(Fetched {
        marker: None,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::parse;

    #[test]
    fn parses_rows_after_header() -> anyhow::Result<()> {
        let html = r#"<!doctype html>
<html><body>
<table>
  <tr><th>Область</th><th>Форма</th><th>Заклад</th><th>К-сть</th><th>Дата</th></tr>
  <tr><td>Київська</td><td>табл. 250 мг</td><td> Лікарня   №1 </td><td>5</td><td>01.01</td></tr>
  <tr><td>incomplete</td></tr>
  <tr><td>Львівська</td><td>табл. 500 мг</td><td>Онкоцентр</td><td>3</td><td>02.01</td></tr>
</table>
</body></html>"#;

        let fetched = parse(html)?;

        assert_eq!(fetched.marker, None);
        assert_eq!(fetched.records.len(), 2);
        assert_eq!(fetched.records[0].get("hospital"), "Лікарня №1");
        assert_eq!(fetched.records[0].get("region"), "Київська");
        assert_eq!(fetched.records[1].get("quantity"), "3");
        Ok(())
    }

    #[test]
    fn missing_table_is_an_error() {
        let err = parse("<html><body><p>maintenance</p></body></html>").unwrap_err();
        assert!(err.to_string().contains("table not found"));
    }
}
