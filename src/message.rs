use crate::record::Record;
use crate::source::{SourceId, SourceSpec};

pub fn render_record(source: &SourceSpec, record: &Record) -> String {
    let link = escape_html(source.url.as_str());
    match source.id {
        SourceId::Eliky => format!(
            "💊 <b>Абіратерон: новий запис на ЄЛіки</b>\n\n\
🏥 <b>Лікарня:</b> {}\n\
📍 <b>Область:</b> {}\n\
💊 <b>Кількість:</b> {}\n\
📅 <b>Дата оновлення:</b> {}\n\n\
🔗 <a href=\"{link}\">Переглянути на ЄЛіки</a>",
            escape_html(record.get("hospital")),
            escape_html(record.get("region")),
            escape_html(record.get("quantity")),
            escape_html(record.get("date")),
        ),
        SourceId::Unci => format!(
            "💊 <b>Абіратерон: новий запис у НІР</b>\n\n\
🏷 <b>Назва:</b> {}\n\
🧪 <b>Діюча речовина:</b> {}\n\
🏬 <b>Склад:</b> {}\n\
⏳ <b>Термін придатності:</b> {}\n\
🔢 <b>Серія:</b> {}\n\n\
🔗 <a href=\"{link}\">Переглянути сторінку</a>",
            escape_html(record.get("name")),
            escape_html(record.get("substance")),
            escape_html(record.get("storage")),
            escape_html(record.get("expiry")),
            escape_html(record.get("batch")),
        ),
    }
}

pub fn render_marker_changed(source: &SourceSpec, previous: &str, current: &str) -> String {
    format!(
        "🔔 <b>Сторінку оновлено ({})</b>\n\n\
Було: {}\n\
Стало: {}\n\n\
Записів про абіратерон не знайдено.\n\n\
🔗 <a href=\"{}\">Переглянути сторінку</a>",
        source.id,
        escape_html(previous),
        escape_html(current),
        escape_html(source.url.as_str()),
    )
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
