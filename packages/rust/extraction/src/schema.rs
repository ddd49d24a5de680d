//! The scientific fields the model is asked to fill, and how its answers are
//! folded into an [`ExtractionRecord`].

use gcnwatch_shared::{ExtractionRecord, Measurement};
use serde_json::{Map, Value};

/// JSON type a field is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Text,
    TextOrNumber,
}

impl FieldKind {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Bool => "boolean: true or false",
            Self::Text => "string",
            Self::TextOrNumber => "string or number",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

/// Model-populated fields, in prompt order.
pub const SCIENTIFIC_FIELDS: [FieldSpec; 12] = [
    FieldSpec {
        name: "is_trigger_event",
        kind: FieldKind::Bool,
        description: "true if the circular announces the initial trigger or discovery of the event, false for follow-ups or when unclear",
    },
    FieldSpec {
        name: "event_time_utc",
        kind: FieldKind::Text,
        description: "UTC time of the trigger (for trigger circulars) or of the reported observation (for follow-ups), as YYYY-MM-DDTHH:MM:SSZ or as written",
    },
    FieldSpec {
        name: "time_since_trigger",
        kind: FieldKind::Text,
        description: "elapsed time from the trigger to this observation, e.g. '1.2 hours' or 'T0+3 days'; '0 seconds' for the trigger itself",
    },
    FieldSpec {
        name: "ra",
        kind: FieldKind::Text,
        description: "right ascension as HH:MM:SS.ss or decimal degrees; null when this circular gives no new coordinates",
    },
    FieldSpec {
        name: "dec",
        kind: FieldKind::Text,
        description: "declination as +/-DD:MM:SS.s or decimal degrees; null when this circular gives no new coordinates",
    },
    FieldSpec {
        name: "magnitude",
        kind: FieldKind::TextOrNumber,
        description: "observed magnitude; with several bands the brightest (smallest) detection; for an upper limit the limit value",
    },
    FieldSpec {
        name: "magnitude_error",
        kind: FieldKind::TextOrNumber,
        description: "uncertainty of the reported magnitude",
    },
    FieldSpec {
        name: "is_upper_limit",
        kind: FieldKind::Bool,
        description: "true if the reported magnitude is an upper limit",
    },
    FieldSpec {
        name: "wavelength_band",
        kind: FieldKind::Text,
        description: "band of the reported magnitude, e.g. Optical, X-ray, r-band",
    },
    FieldSpec {
        name: "multiple_bands_reported",
        kind: FieldKind::Bool,
        description: "true if observations in more than one band are mentioned",
    },
    FieldSpec {
        name: "telescope",
        kind: FieldKind::Text,
        description: "telescope or instrument, e.g. 'Swift/XRT', 'ZTF'",
    },
    FieldSpec {
        name: "observatory",
        kind: FieldKind::Text,
        description: "observatory, facility, or mission, e.g. 'Palomar Observatory', 'Swift'",
    },
];

/// Fold every known scientific field present in `answer` into `record`.
///
/// Identifying, raw, and status fields are never taken from the model.
/// Booleans accept JSON booleans and the strings "true"/"false" in any case;
/// anything else becomes `false`.
pub fn merge_into(record: &mut ExtractionRecord, answer: &Map<String, Value>) {
    for field in &SCIENTIFIC_FIELDS {
        let Some(value) = answer.get(field.name) else {
            continue;
        };
        match field.name {
            "is_trigger_event" => record.is_trigger_event = coerce_bool(value),
            "is_upper_limit" => record.is_upper_limit = coerce_bool(value),
            "multiple_bands_reported" => record.multiple_bands_reported = coerce_bool(value),
            "event_time_utc" => record.event_time_utc = coerce_text(value),
            "time_since_trigger" => record.time_since_trigger = coerce_text(value),
            "ra" => record.ra = coerce_text(value),
            "dec" => record.dec = coerce_text(value),
            "magnitude" => record.magnitude = coerce_measurement(value),
            "magnitude_error" => record.magnitude_error = coerce_measurement(value),
            "wavelength_band" => record.wavelength_band = coerce_text(value),
            "telescope" => record.telescope = coerce_text(value),
            "observatory" => record.observatory = coerce_text(value),
            _ => {}
        }
    }
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn coerce_measurement(value: &Value) -> Option<Measurement> {
    match value {
        Value::Null => None,
        Value::Number(n) => Some(Measurement::Number(n.clone())),
        Value::String(s) => Some(Measurement::Text(s.clone())),
        other => Some(Measurement::Text(other.to_string())),
    }
}
