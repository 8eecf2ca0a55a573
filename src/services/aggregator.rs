// src/services/aggregator.rs

//! Frame aggregation: pick one answer out of every frame's extraction.

use serde_json::{Map, Value};

use crate::models::{AggregatorConfig, ExtractionResult, RawRecord};
use crate::page::FrameResult;

/// What one extraction attempt amounted to across all frames.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated {
    /// Some frame is showing a sign-in form
    NeedsLogin { frame_url: String },
    /// The best frame's records, screened for navigation chrome
    Data {
        frame_url: String,
        records: Vec<RawRecord>,
    },
    /// No frame produced records
    Empty {
        frames: usize,
        errors: Vec<String>,
        diag: Value,
    },
}

impl Aggregated {
    /// Message for an empty result: the frames' own errors, joined, or a
    /// count of the frames checked.
    pub fn empty_message(frames: usize, errors: &[String]) -> String {
        if errors.is_empty() {
            format!("No data found (checked {} frames)", frames)
        } else {
            errors.join(" | ")
        }
    }
}

/// Ranks per-frame extraction results.
#[derive(Debug, Clone)]
pub struct FrameAggregator {
    preferred_patterns: Vec<String>,
    garbage_phrases: Vec<String>,
    garbage_max_len: usize,
}

impl FrameAggregator {
    pub fn new(config: &AggregatorConfig) -> Self {
        Self {
            preferred_patterns: config.preferred_frame_patterns.clone(),
            garbage_phrases: config
                .garbage_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            garbage_max_len: config.garbage_max_len,
        }
    }

    fn is_preferred(&self, url: &str) -> bool {
        self.preferred_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    /// Short text carrying every garbage phrase at once.
    pub fn is_garbage(&self, record: &RawRecord) -> bool {
        if self.garbage_phrases.is_empty() {
            return false;
        }
        let text = record.text().to_lowercase();
        text.chars().count() < self.garbage_max_len
            && self
                .garbage_phrases
                .iter()
                .all(|phrase| text.contains(phrase.as_str()))
    }

    /// Choose among complete per-frame results.
    ///
    /// Login wins over any data. Frames with data are ranked preferred-URL
    /// first, then by record count; ties keep frame order.
    pub fn select(&self, results: Vec<FrameResult<ExtractionResult>>) -> Aggregated {
        if let Some(login) = results.iter().find(|r| r.value.needs_login) {
            return Aggregated::NeedsLogin {
                frame_url: login.frame_url.clone(),
            };
        }

        let frames = results.len();
        let mut errors = Vec::new();
        let mut diag = Map::new();
        let mut qualified = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            if result.value.has_data() {
                qualified.push(result);
                continue;
            }
            if let Some(error) = &result.value.error {
                errors.push(error.clone());
            }
            if !result.value.diag.is_empty() {
                diag.insert(format!("frame{}", index), result.value.diag.into_value());
            }
        }

        // Stable sort: equal ranks keep document frame order.
        qualified.sort_by_key(|r| {
            (
                !self.is_preferred(&r.frame_url),
                std::cmp::Reverse(r.value.data.len()),
            )
        });

        match qualified.into_iter().next() {
            Some(best) => {
                let records = best.value.data;
                let screened: Vec<RawRecord> = records
                    .iter()
                    .filter(|record| !self.is_garbage(record))
                    .cloned()
                    .collect();
                Aggregated::Data {
                    frame_url: best.frame_url,
                    records: if screened.is_empty() { records } else { screened },
                }
            }
            None => Aggregated::Empty {
                frames,
                errors,
                diag: Value::Object(diag),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CalendarEvent, Diag, LegacyTicket};

    fn frame(url: &str, value: ExtractionResult) -> FrameResult<ExtractionResult> {
        FrameResult {
            frame_url: url.to_string(),
            value,
        }
    }

    fn events(labels: &[&str]) -> Vec<RawRecord> {
        labels
            .iter()
            .map(|l| RawRecord::CalendarEvent(CalendarEvent { label: l.to_string() }))
            .collect()
    }

    fn aggregator() -> FrameAggregator {
        FrameAggregator::new(&AggregatorConfig::default())
    }

    #[test]
    fn login_beats_data() {
        let results = vec![
            frame("https://a.vf.force.com/", ExtractionResult::found(events(&["x"]), Diag::new())),
            frame("https://login.example.com/", ExtractionResult::login()),
        ];
        assert_eq!(
            aggregator().select(results),
            Aggregated::NeedsLogin {
                frame_url: "https://login.example.com/".to_string()
            }
        );
    }

    #[test]
    fn preferred_frame_beats_larger_one() {
        let results = vec![
            frame("https://top.example.com/", ExtractionResult::found(events(&["a", "b", "c"]), Diag::new())),
            frame("https://acme--c.vf.force.com/apex", ExtractionResult::found(events(&["d"]), Diag::new())),
            frame("https://acme--c.vf.force.com/other", ExtractionResult::found(events(&["e", "f"]), Diag::new())),
        ];
        match aggregator().select(results) {
            Aggregated::Data { frame_url, records } => {
                assert_eq!(frame_url, "https://acme--c.vf.force.com/other");
                assert_eq!(records.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn garbage_screen_keeps_original_when_everything_is_garbage() {
        let chrome = RawRecord::LegacyTicket(LegacyTicket {
            project_name: "Dashboards List".into(),
            description: "Revision".into(),
            estimated_hours: 1.0,
            due_date: String::new(),
        });
        let real = RawRecord::LegacyTicket(LegacyTicket {
            project_name: "Acme County".into(),
            description: "Design Revisions".into(),
            estimated_hours: 1.0,
            due_date: String::new(),
        });

        let agg = aggregator();
        let mixed = vec![frame(
            "https://x.project_cloud/",
            ExtractionResult::found(vec![chrome.clone(), real.clone()], Diag::new()),
        )];
        match agg.select(mixed) {
            Aggregated::Data { records, .. } => assert_eq!(records, vec![real]),
            other => panic!("unexpected {:?}", other),
        }

        let only = vec![frame(
            "https://x.project_cloud/",
            ExtractionResult::found(vec![chrome.clone()], Diag::new()),
        )];
        match agg.select(only) {
            Aggregated::Data { records, .. } => assert_eq!(records, vec![chrome]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_frames_collect_errors() {
        let results = vec![
            frame("https://a/", ExtractionResult::failed("Report table not found", Diag::new())),
            frame("https://b/", ExtractionResult::found(Vec::new(), Diag::new())),
            frame("https://c/", ExtractionResult::failed("tbody missing", Diag::new())),
        ];
        match aggregator().select(results) {
            Aggregated::Empty { frames, errors, .. } => {
                assert_eq!(frames, 3);
                assert_eq!(
                    Aggregated::empty_message(frames, &errors),
                    "Report table not found | tbody missing"
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(Aggregated::empty_message(2, &[]), "No data found (checked 2 frames)");
    }
}
