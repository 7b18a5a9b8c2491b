//! Ad opportunity descriptors extracted from media playlist daterange tags.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use m3u8_rs::{DateRange, QuotedOrUnquoted};

use crate::scte35::SpliceInfoSection;

/// Custom (`X-`-prefixed) daterange attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomAttributeValue {
    String(String),
    Number(f64),
}

/// One ad break as it appears in the manifest, keyed by its stable daterange
/// id. Descriptors are ephemeral: they are rebuilt on every manifest parse
/// and merged by the broker across fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityDescriptor {
    pub id: String,
    pub start_date: DateTime<FixedOffset>,
    pub class: Option<String>,
    pub end_date: Option<DateTime<FixedOffset>>,
    pub duration: Option<f64>,
    pub planned_duration: Option<f64>,
    pub end_on_next: bool,
    pub scte35_cmd: Option<SpliceInfoSection>,
    pub scte35_out: Option<SpliceInfoSection>,
    pub scte35_in: Option<SpliceInfoSection>,
    pub custom_attributes: HashMap<String, CustomAttributeValue>,
}

impl OpportunityDescriptor {
    pub fn from_daterange(daterange: &DateRange) -> Self {
        let custom_attributes = daterange
            .x_prefixed
            .iter()
            .flatten()
            .map(|(name, value)| (name.clone(), custom_attribute(value)))
            .collect();

        Self {
            id: daterange.id.clone(),
            start_date: daterange.start_date,
            class: daterange.class.clone(),
            end_date: daterange.end_date,
            duration: daterange.duration,
            planned_duration: daterange.planned_duration,
            end_on_next: daterange.end_on_next,
            scte35_cmd: splice_section(daterange, "SCTE35-CMD"),
            scte35_out: splice_section(daterange, "SCTE35-OUT"),
            scte35_in: splice_section(daterange, "SCTE35-IN"),
            custom_attributes,
        }
    }

    /// Folds a later observation of the same id into this descriptor.
    /// Information is only ever gained: the first non-null value wins for
    /// every optional field, `end_on_next` is OR'd, and custom attributes
    /// captured earlier win over later ones.
    pub fn merge(&mut self, later: &OpportunityDescriptor) {
        debug_assert_eq!(self.id, later.id);

        merge_option(&mut self.class, &later.class);
        merge_option(&mut self.end_date, &later.end_date);
        merge_option(&mut self.duration, &later.duration);
        merge_option(&mut self.planned_duration, &later.planned_duration);
        merge_option(&mut self.scte35_cmd, &later.scte35_cmd);
        merge_option(&mut self.scte35_out, &later.scte35_out);
        merge_option(&mut self.scte35_in, &later.scte35_in);
        self.end_on_next |= later.end_on_next;
        for (name, value) in &later.custom_attributes {
            self.custom_attributes
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// The scheduled length of this break in seconds: the declared duration
    /// if present, otherwise the planned duration, otherwise the break
    /// duration decoded from the splice signal.
    pub fn scheduled_break_duration(&self) -> Option<f64> {
        self.duration
            .or(self.planned_duration)
            .or_else(|| {
                self.scte35_out
                    .as_ref()
                    .and_then(|section| section.scheduled_break_duration())
                    .map(|duration| duration.seconds())
            })
            .or_else(|| {
                self.scte35_cmd
                    .as_ref()
                    .and_then(|section| section.scheduled_break_duration())
                    .map(|duration| duration.seconds())
            })
    }
}

fn merge_option<T: Clone>(earlier: &mut Option<T>, later: &Option<T>) {
    if earlier.is_none() {
        *earlier = later.clone();
    }
}

fn attribute_str(value: &QuotedOrUnquoted) -> &str {
    match value {
        QuotedOrUnquoted::Quoted(s) | QuotedOrUnquoted::Unquoted(s) => s,
    }
}

fn custom_attribute(value: &QuotedOrUnquoted) -> CustomAttributeValue {
    match value {
        QuotedOrUnquoted::Quoted(s) => CustomAttributeValue::String(s.clone()),
        QuotedOrUnquoted::Unquoted(s) => s
            .parse::<f64>()
            .map(CustomAttributeValue::Number)
            .unwrap_or_else(|_| CustomAttributeValue::String(s.clone())),
    }
}

fn splice_section(daterange: &DateRange, attribute: &str) -> Option<SpliceInfoSection> {
    let payload = daterange
        .other_attributes
        .as_ref()
        .and_then(|attributes| attributes.get(attribute))
        .map(attribute_str)?;
    match SpliceInfoSection::parse_hex(payload) {
        Ok(section) => Some(section),
        Err(error) => {
            log::warn!("Ignoring undecodable {attribute} on daterange {}: {error}", daterange.id);
            None
        }
    }
}
