use anyhow::Result;
use clap::ValueEnum;
use probe_engine::{ScanResult, TaskError};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use web_surface::headers::HeaderFinding;
use webprobe_core::{Payload, ProbeOutcome};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Jsonl,
    Csv,
}

impl OutputFormat {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "jsonl" | "json" => Some(OutputFormat::Jsonl),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

/// Stdout, or `path` truncated.
pub fn open_writer(out: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match out {
        Some(path) => {
            let file = OpenOptions::new().create(true).truncate(true).write(true).open(path)?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(std::io::stdout())),
    })
}

fn body_len(o: &ProbeOutcome) -> usize {
    o.body.as_ref().map(|b| b.len()).unwrap_or(0)
}

fn payload_param(p: Option<&Payload>) -> String {
    match p {
        Some(Payload::Query { param, .. }) => param.clone(),
        Some(Payload::Form { fields, value }) => fields
            .iter()
            .filter(|(_, v)| v == value)
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join("|"),
        None => String::new(),
    }
}

pub fn write_dir_hits<W: Write>(w: W, format: OutputFormat, result: &ScanResult) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let mut w = w;
            for o in &result.hits {
                let status = o.status.map(|s| s.to_string()).unwrap_or_default();
                write!(w, "[{}] {:<7} {} ({} bytes)", status, o.task.method, o.url, body_len(o))?;
                if o.final_url != o.url {
                    write!(w, " -> {}", o.final_url)?;
                }
                writeln!(w)?;
            }
            w.flush()?;
        }
        OutputFormat::Jsonl => {
            let mut w = w;
            for o in &result.hits {
                let obj = serde_json::json!({
                    "url": o.url,
                    "method": o.task.method,
                    "status": o.status,
                    "final_url": o.final_url,
                    "content_type": o.content_type,
                    "length": body_len(o),
                    "duration_ms": o.elapsed.as_millis() as u64,
                });
                writeln!(w, "{}", serde_json::to_string(&obj)?)?;
            }
            w.flush()?;
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(w);
            wtr.write_record(["url", "method", "status", "final_url", "content_type", "length", "duration_ms"])?;
            for o in &result.hits {
                wtr.write_record([
                    o.url.clone(),
                    o.task.method.to_string(),
                    o.status.map(|s| s.to_string()).unwrap_or_default(),
                    o.final_url.clone(),
                    o.content_type.clone().unwrap_or_default(),
                    body_len(o).to_string(),
                    o.elapsed.as_millis().to_string(),
                ])?;
            }
            wtr.flush()?;
        }
    }
    Ok(())
}

pub fn write_injection_hits<W: Write>(w: W, format: OutputFormat, result: &ScanResult) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let mut w = w;
            for o in &result.hits {
                let payload = o.task.payload.as_ref().map(|p| p.value()).unwrap_or_default();
                let status = o.status.map(|s| s.to_string()).unwrap_or_default();
                writeln!(
                    w,
                    "[{}] {:<7} {} {}={:?}",
                    status,
                    o.task.method,
                    o.task.url,
                    payload_param(o.task.payload.as_ref()),
                    payload
                )?;
            }
            w.flush()?;
        }
        OutputFormat::Jsonl => {
            let mut w = w;
            for o in &result.hits {
                let obj = serde_json::json!({
                    "url": o.task.url,
                    "method": o.task.method,
                    "param": payload_param(o.task.payload.as_ref()),
                    "payload": o.task.payload.as_ref().map(|p| p.value()),
                    "status": o.status,
                    "requested_url": o.url,
                });
                writeln!(w, "{}", serde_json::to_string(&obj)?)?;
            }
            w.flush()?;
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(w);
            wtr.write_record(["url", "method", "param", "payload", "status"])?;
            for o in &result.hits {
                wtr.write_record([
                    o.task.url.clone(),
                    o.task.method.to_string(),
                    payload_param(o.task.payload.as_ref()),
                    o.task.payload.as_ref().map(|p| p.value().to_string()).unwrap_or_default(),
                    o.status.map(|s| s.to_string()).unwrap_or_default(),
                ])?;
            }
            wtr.flush()?;
        }
    }
    Ok(())
}

/// Header audit plus page comments for one URL.
pub fn write_header_report<W: Write>(
    w: W,
    format: OutputFormat,
    url: &str,
    findings: &[HeaderFinding],
    comments: &[String],
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let mut w = w;
            writeln!(w, "{}", url)?;
            for f in findings {
                writeln!(w, "  {:<8} {:<26} {}", f.severity.as_str(), f.header, f.message)?;
            }
            if !comments.is_empty() {
                writeln!(w, "  comments:")?;
                for c in comments {
                    writeln!(w, "    <!--{}-->", c)?;
                }
            }
            w.flush()?;
        }
        OutputFormat::Jsonl => {
            let mut w = w;
            let items: Vec<_> = findings
                .iter()
                .map(|f| serde_json::json!({ "header": f.header, "severity": f.severity.as_str(), "message": f.message }))
                .collect();
            let obj = serde_json::json!({
                "url": url,
                "checked_at": now_rfc3339(),
                "findings": items,
                "comments": comments,
            });
            writeln!(w, "{}", serde_json::to_string(&obj)?)?;
            w.flush()?;
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(w);
            wtr.write_record(["url", "header", "severity", "message"])?;
            for f in findings {
                wtr.write_record([url, f.header.as_str(), f.severity.as_str(), f.message.as_str()])?;
            }
            for c in comments {
                wtr.write_record([url, "comment", "info", c.as_str()])?;
            }
            wtr.flush()?;
        }
    }
    Ok(())
}

pub fn summary_line(result: &ScanResult, elapsed_ms: u128) -> String {
    format!(
        "dispatched {} | hits {} | errors {} | {} ms",
        result.total_dispatched,
        result.hits.len(),
        result.errors.len(),
        elapsed_ms
    )
}

pub fn error_line(e: &TaskError) -> String {
    format!("{} {}", e.task, e.error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use webprobe_core::{HttpMethod, ProbeTask};

    fn hit(task: ProbeTask, url: &str, status: u16) -> ProbeOutcome {
        ProbeOutcome::response(task, url.into(), url.into(), status, Some("text/html".into()), b"hello".to_vec(), Duration::from_millis(12))
    }

    fn dir_result() -> ScanResult {
        ScanResult {
            hits: vec![hit(ProbeTask::get("http://h/login"), "http://h/login", 200)],
            errors: vec![],
            total_dispatched: 3,
        }
    }

    #[test]
    fn format_names() {
        assert_eq!(OutputFormat::from_name("JSONL"), Some(OutputFormat::Jsonl));
        assert_eq!(OutputFormat::from_name("csv"), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_name("xml"), None);
    }

    #[test]
    fn dir_text_and_jsonl() {
        let mut buf = Vec::new();
        write_dir_hits(&mut buf, OutputFormat::Text, &dir_result()).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "[200] GET     http://h/login (5 bytes)\n");

        let mut buf = Vec::new();
        write_dir_hits(&mut buf, OutputFormat::Jsonl, &dir_result()).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["url"], "http://h/login");
        assert_eq!(v["method"], "GET");
        assert_eq!(v["status"], 200);
        assert_eq!(v["length"], 5);
    }

    #[test]
    fn injection_csv_has_param_and_payload() {
        let t = ProbeTask::new("http://h/item", HttpMethod::Get).with_payload(Payload::query("id", "' OR 1=1"));
        let r = ScanResult { hits: vec![hit(t, "http://h/item?id=%27+OR+1%3D1", 200)], errors: vec![], total_dispatched: 1 };
        let mut buf = Vec::new();
        write_injection_hits(&mut buf, OutputFormat::Csv, &r).unwrap();
        let s = String::from_utf8(buf).unwrap();
        let mut lines = s.lines();
        assert_eq!(lines.next(), Some("url,method,param,payload,status"));
        assert_eq!(lines.next(), Some("http://h/item,GET,id,' OR 1=1,200"));
    }

    #[test]
    fn form_payload_param_lists_injected_fields() {
        let p = Payload::Form {
            fields: vec![("user".into(), "x'".into()), ("pass".into(), "password".into()), ("q".into(), "x'".into())],
            value: "x'".into(),
        };
        assert_eq!(payload_param(Some(&p)), "user|q");
    }

    #[test]
    fn summary_counts() {
        assert_eq!(summary_line(&dir_result(), 40), "dispatched 3 | hits 1 | errors 0 | 40 ms");
    }
}
