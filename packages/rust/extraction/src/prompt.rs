//! Extraction prompt.

use crate::schema::{FieldKind, SCIENTIFIC_FIELDS};

/// Build the extraction prompt for one circular.
pub fn build_prompt(circular_text: &str) -> String {
    let skeleton = SCIENTIFIC_FIELDS
        .iter()
        .map(|f| {
            let placeholder = match f.kind {
                FieldKind::Bool => "false",
                _ => "\"extracted_value_or_null\"",
            };
            format!("  \"{}\": {placeholder}", f.name)
        })
        .collect::<Vec<_>>()
        .join(",\n");

    let descriptions = SCIENTIFIC_FIELDS
        .iter()
        .map(|f| format!("- {} ({}): {}", f.name, f.kind.describe(), f.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You extract structured observational data from GCN Circulars.\n\
Read the circular below and answer with a single JSON object using exactly this structure.\n\
Use null for anything the circular does not state. The boolean fields\n\
(is_trigger_event, is_upper_limit, multiple_bands_reported) default to false.\n\
Return only the JSON object, with nothing before or after it.\n\
\n\
Structure:\n\
{{\n{skeleton}\n}}\n\
\n\
Fields:\n\
{descriptions}\n\
\n\
Rules:\n\
1. is_trigger_event is true only for the first announcement of an event (\"Swift detection of GRB ...\",\n   \"discovery of a new transient ...\"). Follow-ups, updates, and analyses are false.\n\
2. event_time_utc is the trigger time for trigger circulars and the observation time otherwise.\n\
3. time_since_trigger is \"0 seconds\" for a trigger circular; for follow-ups give the offset from T0,\n   or null when the trigger time is not referenced.\n\
4. Leave ra and dec null when the circular refers back to an earlier position instead of giving one.\n\
5. When several bands are reported, set multiple_bands_reported to true and report magnitude,\n   magnitude_error, is_upper_limit and wavelength_band for the brightest detection (smallest magnitude\n   that is not a limit). If every value is a limit, report the faintest limit.\n\
6. is_upper_limit is true for phrasing such as \"mag > 19.0\", \"limit of 20.5\", \"not detected down to 21\".\n\
7. observatory may be a ground facility or the mission itself (Swift, Fermi); ZTF is a telescope,\n   Palomar an observatory.\n\
\n\
Circular:\n\
---\n\
{circular_text}\n\
---\n\
\n\
JSON:\n"
    )
}
