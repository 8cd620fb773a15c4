use std::path::Path;

use anyhow::{anyhow, Context};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::lang::normalize_lang;
use crate::sources::record::{RecordKey, TranslationRecord};
use crate::textutil::{clean_bundle_text, decode_entities, decode_text_bytes};

const UNAPPROVED_STATES: [&str; 2] = ["new", "needs-translation"];

#[derive(Clone, Debug, Default)]
pub struct Bundle {
    pub sections: Vec<BundleSection>,
}

/// One `<file>` element: the translations of one survey document into one language.
#[derive(Clone, Debug, Default)]
pub struct BundleSection {
    pub original: String,
    pub source_language: String,
    pub target_language: Option<String>,
    pub units: Vec<BundleUnit>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BundleUnit {
    pub id: String,
    pub resname: Option<String>,
    pub source: String,
    pub target: Option<String>,
    pub state: Option<String>,
}

impl BundleUnit {
    /// Approved means a non-empty target that is not flagged as needing translation.
    pub fn is_approved(&self) -> bool {
        let has_target = self.target.as_deref().is_some_and(|t| !t.is_empty());
        let pending = self
            .state
            .as_deref()
            .is_some_and(|s| UNAPPROVED_STATES.iter().any(|u| s.eq_ignore_ascii_case(u)));
        has_target && !pending
    }
}

#[derive(Clone, Debug, Default)]
pub struct SectionRecords {
    pub records: Vec<TranslationRecord>,
    pub unapproved: usize,
    pub fallbacks: usize,
}

impl BundleSection {
    /// File stem of `original`, used to resolve the destination survey document.
    pub fn document_stem(&self) -> Option<String> {
        let original = self.original.trim().replace('\\', "/");
        let name = original.rsplit('/').next()?;
        let stem = Path::new(name).file_stem()?.to_str()?;
        let stem = stem.strip_suffix(".json").unwrap_or(stem);
        if stem.is_empty() {
            None
        } else {
            Some(stem.to_string())
        }
    }

    /// Converts approved units to records for `language` (defaults to the section's
    /// target language). Unapproved units are dropped, unless the language is listed in
    /// `fallback_languages`, where the unit's source text stands in for the translation.
    pub fn records(
        &self,
        language: Option<&str>,
        fallback_languages: &[String],
    ) -> anyhow::Result<SectionRecords> {
        let language = language
            .or(self.target_language.as_deref())
            .map(normalize_lang)
            .ok_or_else(|| anyhow!("section {} declares no target language", self.original))?;
        let falls_back = fallback_languages
            .iter()
            .any(|l| normalize_lang(l) == language);

        let mut out = SectionRecords::default();
        for (idx, unit) in self.units.iter().enumerate() {
            let target = if unit.is_approved() {
                unit.target.clone().unwrap_or_default()
            } else if falls_back && !unit.source.is_empty() {
                out.fallbacks += 1;
                unit.source.clone()
            } else {
                out.unapproved += 1;
                continue;
            };
            let key = unit
                .resname
                .as_deref()
                .filter(|r| !r.is_empty())
                .or(Some(unit.id.as_str()).filter(|id| !id.is_empty()))
                .map(|id| RecordKey::Identifier(id.to_string()))
                .unwrap_or(RecordKey::Row(idx));
            out.records.push(TranslationRecord {
                key,
                language: language.clone(),
                source: Some(unit.source.clone()).filter(|s| !s.is_empty()),
                target,
            });
        }
        Ok(out)
    }
}

pub fn read_bundle(path: &Path) -> anyhow::Result<Bundle> {
    let bytes = std::fs::read(path).with_context(|| format!("read bundle: {}", path.display()))?;
    parse_bundle(&decode_text_bytes(&bytes)).with_context(|| format!("parse bundle: {}", path.display()))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Source,
    Target,
}

struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

pub fn parse_bundle(text: &str) -> anyhow::Result<Bundle> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut bundle = Bundle::default();
    let mut section: Option<BundleSection> = None;
    let mut unit: Option<BundleUnit> = None;
    let mut capture: Option<Capture> = None;
    let mut alt_trans_depth = 0usize;

    loop {
        let ev = reader.read_event().context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => {
                if let Some(cap) = capture.as_mut() {
                    cap.depth += 1;
                    continue;
                }
                match s.local_name().as_ref() {
                    b"file" => {
                        if let Some(done) = section.replace(section_from_attrs(&s)?) {
                            bundle.sections.push(done);
                        }
                    }
                    b"trans-unit" => unit = Some(unit_from_attrs(&s)?),
                    b"alt-trans" => alt_trans_depth += 1,
                    b"source" if unit.is_some() && alt_trans_depth == 0 => {
                        capture = Some(Capture {
                            field: Field::Source,
                            depth: 0,
                            text: String::new(),
                        });
                    }
                    b"target" if alt_trans_depth == 0 => {
                        if let Some(u) = unit.as_mut() {
                            u.state = attr_value(&s, b"state")?;
                            capture = Some(Capture {
                                field: Field::Target,
                                depth: 0,
                                text: String::new(),
                            });
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(s) => {
                if capture.is_some() {
                    continue;
                }
                match s.local_name().as_ref() {
                    b"file" => {
                        if let Some(done) = section.take() {
                            bundle.sections.push(done);
                        }
                        bundle.sections.push(section_from_attrs(&s)?);
                    }
                    b"target" if alt_trans_depth == 0 => {
                        if let Some(u) = unit.as_mut() {
                            u.state = attr_value(&s, b"state")?;
                            u.target = Some(String::new());
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                if let Some(cap) = capture.as_mut() {
                    let raw = t.into_inner();
                    cap.text.push_str(&decode_entities(&String::from_utf8_lossy(&raw)));
                }
            }
            Event::CData(t) => {
                if let Some(cap) = capture.as_mut() {
                    let raw = t.into_inner();
                    cap.text.push_str(&String::from_utf8_lossy(&raw));
                }
            }
            Event::End(e) => {
                if let Some(cap) = capture.as_mut() {
                    if cap.depth > 0 {
                        cap.depth -= 1;
                        continue;
                    }
                }
                if let Some(cap) = capture.take() {
                    if let Some(u) = unit.as_mut() {
                        let text = clean_bundle_text(&cap.text);
                        match cap.field {
                            Field::Source => u.source = text,
                            Field::Target => u.target = Some(text),
                        }
                    }
                    continue;
                }
                match e.local_name().as_ref() {
                    b"alt-trans" => alt_trans_depth = alt_trans_depth.saturating_sub(1),
                    b"trans-unit" => {
                        if let Some(done) = unit.take() {
                            section.get_or_insert_with(BundleSection::default).units.push(done);
                        }
                    }
                    b"file" => {
                        if let Some(done) = section.take() {
                            bundle.sections.push(done);
                        }
                    }
                    _ => {}
                }
            }
            Event::Decl(_)
            | Event::Comment(_)
            | Event::PI(_)
            | Event::DocType(_) => {}
        }
    }
    if let Some(done) = section.take() {
        bundle.sections.push(done);
    }
    Ok(bundle)
}

fn attr_value(s: &BytesStart<'_>, key: &[u8]) -> anyhow::Result<Option<String>> {
    for a in s.attributes() {
        let a = a.context("attr")?;
        if a.key.as_ref() == key {
            let raw = String::from_utf8_lossy(a.value.as_ref());
            return Ok(Some(decode_entities(&raw)));
        }
    }
    Ok(None)
}

fn section_from_attrs(s: &BytesStart<'_>) -> anyhow::Result<BundleSection> {
    Ok(BundleSection {
        original: attr_value(s, b"original")?.unwrap_or_default(),
        source_language: attr_value(s, b"source-language")?
            .map(|l| normalize_lang(&l))
            .unwrap_or_default(),
        target_language: attr_value(s, b"target-language")?
            .filter(|l| !l.trim().is_empty())
            .map(|l| normalize_lang(&l)),
        units: Vec::new(),
    })
}

fn unit_from_attrs(s: &BytesStart<'_>) -> anyhow::Result<BundleUnit> {
    Ok(BundleUnit {
        id: attr_value(s, b"id")?.unwrap_or_default(),
        resname: attr_value(s, b"resname")?,
        ..BundleUnit::default()
    })
}
