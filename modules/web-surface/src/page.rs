use scraper::{Html, Selector};

pub fn extract_title(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let sel = Selector::parse("title").ok()?;
    let t = doc.select(&sel).next()?.text().collect::<String>();
    let t = t.trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}

/// Non-empty HTML comments, in document order. Developers leave notes here.
pub fn extract_comments(body: &str) -> Vec<String> {
    let doc = Html::parse_document(body);
    doc.tree
        .values()
        .filter_map(|n| n.as_comment())
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
