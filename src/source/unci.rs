use crate::record::Record;
use crate::source::{Fetched, cell_text, selector};

pub const DEFAULT_URL: &str = "https://unci.org.ua/bezoplatni-liky";

// `storage` changes as stock moves between warehouses.
pub const IDENTITY_FIELDS: &[&str] = &["name", "substance", "expiry", "batch"];

pub const TRACKED_KEYWORDS: &[&str] = &["абірат", "abiraterone"];

const MARKER_PREFIX: &str = "Оновлено";

const COLUMNS: [&str; 5] = ["name", "substance", "storage", "expiry", "batch"];

pub fn parse(html: &str) -> anyhow::Result<Fetched> {
    let document = scraper::Html::parse_document(html);
    let any_selector = selector("body *")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;

    let marker = document.select(&any_selector).find_map(|element| {
        let own_text = element
            .children()
            .filter_map(|child| child.value().as_text().map(|text| &**text))
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ");
        own_text.starts_with(MARKER_PREFIX).then_some(own_text)
    });

    let mut records = Vec::new();
    for row in document.select(&row_selector) {
        let cells = row.select(&cell_selector).map(cell_text).collect::<Vec<_>>();
        if cells.len() < COLUMNS.len() || !mentions_tracked_item(&cells) {
            continue;
        }
        let mut record = Record::new();
        for (name, value) in COLUMNS.iter().zip(cells) {
            record.insert(name, value);
        }
        records.push(record);
    }

    if marker.is_none() {
        tracing::warn!("update marker not found on page");
    }

    Ok(Fetched { marker, records })
}

fn mentions_tracked_item(cells: &[String]) -> bool {
    let haystack = cells.join(" ").to_lowercase();
    TRACKED_KEYWORDS
        .iter()
        .any(|keyword| haystack.contains(keyword))
}
