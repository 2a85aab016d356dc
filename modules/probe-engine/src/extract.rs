//! Link and form extraction from HTML bodies.
//!
//! Parsing is tolerant: broken markup yields whatever the parser recovers,
//! possibly nothing, and never an error.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;
use webprobe_core::{HttpMethod, Payload, ProbeTask};

const LINK_ATTRS: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("link[href]", "href"),
    ("script[src]", "src"),
    ("img[src]", "src"),
    ("iframe[src]", "src"),
    ("frame[src]", "src"),
    ("form[action]", "action"),
];

const SKIPPED_PREFIXES: &[&str] = &["javascript:", "mailto:", "data:", "tel:", "#"];

/// Absolute http(s) URLs referenced by `html`, resolved against `base`
/// (or the document's `<base href>`), fragments removed, first occurrence kept.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let base = document_base(&doc, base);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (css, attr) in LINK_ATTRS {
        let Ok(sel) = Selector::parse(css) else { continue };
        for el in doc.select(&sel) {
            let Some(raw) = el.value().attr(attr) else { continue };
            let Some(url) = resolve(&base, raw) else { continue };
            if seen.insert(url.to_string()) {
                out.push(url);
            }
        }
    }
    out
}

fn document_base(doc: &Html, fallback: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| fallback.join(href.trim()).ok())
        .unwrap_or_else(|| fallback.clone())
}

fn resolve(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let lower = raw.to_ascii_lowercase();
    if SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return None;
    }
    let mut url = base.join(raw).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    pub name: String,
    /// Lowercased `type` attribute; `textarea` and `select` for those elements.
    pub kind: String,
    pub value: String,
}

impl FormInput {
    fn is_text_like(&self) -> bool {
        matches!(self.kind.as_str(), "" | "text" | "search" | "email" | "url" | "tel" | "textarea")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSpec {
    pub action: Url,
    pub method: HttpMethod,
    pub inputs: Vec<FormInput>,
}

impl FormSpec {
    /// Forms without a text-like field have nowhere to put a payload.
    pub fn is_injectable(&self) -> bool {
        self.inputs.iter().any(FormInput::is_text_like)
    }

    /// Fill every text-like field with `payload`, password fields with a
    /// placeholder, and leave the rest at their declared values.
    pub fn task_for(&self, payload: &str) -> ProbeTask {
        let fields = self
            .inputs
            .iter()
            .map(|i| {
                let v = if i.is_text_like() {
                    payload.to_string()
                } else if i.kind == "password" {
                    "password".to_string()
                } else {
                    i.value.clone()
                };
                (i.name.clone(), v)
            })
            .collect();
        ProbeTask::new(self.action.to_string(), self.method)
            .with_payload(Payload::Form { fields, value: payload.to_string() })
    }
}

/// All `<form>` elements of the page with their named fields.
pub fn extract_forms(html: &str, page: &Url) -> Vec<FormSpec> {
    let doc = Html::parse_document(html);
    let base = document_base(&doc, page);
    let (Ok(form_sel), Ok(field_sel)) = (Selector::parse("form"), Selector::parse("input[name], textarea[name], select[name]")) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for form in doc.select(&form_sel) {
        let action = match form.value().attr("action").map(str::trim).filter(|a| !a.is_empty()) {
            Some(a) => match resolve(&base, a) {
                Some(u) => u,
                None => continue,
            },
            None => page.clone(),
        };
        let method = match form.value().attr("method").map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "get" => HttpMethod::Get,
            _ => HttpMethod::Post,
        };
        let inputs = form.select(&field_sel).filter_map(field).collect();
        out.push(FormSpec { action, method, inputs });
    }
    out
}

fn field(el: ElementRef<'_>) -> Option<FormInput> {
    let v = el.value();
    let name = v.attr("name")?.trim();
    if name.is_empty() {
        return None;
    }
    let kind = match v.name() {
        "textarea" => "textarea".to_string(),
        "select" => "select".to_string(),
        _ => v.attr("type").unwrap_or("").trim().to_ascii_lowercase(),
    };
    if matches!(kind.as_str(), "submit" | "button" | "reset" | "image" | "file") {
        return None;
    }
    let value = match v.name() {
        "textarea" => el.text().collect::<String>(),
        _ => v.attr("value").unwrap_or("").to_string(),
    };
    Some(FormInput { name: name.to_string(), kind, value })
}
