use serde::Serialize;

/// Group assigned to keys the catalog does not know about.
pub const OTHER_GROUP: &str = "Other";

/// Display metadata for one telemetry key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub group: String,
    pub key: String,
    pub label: String,
    /// Empty when the value is unitless.
    pub unit: String,
}

impl FieldSpec {
    fn new(group: &str, key: &str, label: &str, unit: &str) -> Self {
        Self {
            group: group.to_string(),
            key: key.to_string(),
            label: label.to_string(),
            unit: unit.to_string(),
        }
    }

    /// Spec for a key that only ever showed up on the wire.
    pub fn discovered(key: &str) -> Self {
        Self::new(OTHER_GROUP, key, key, "")
    }

    pub fn has_unit(&self) -> bool {
        !self.unit.is_empty()
    }
}

/// Labels and units for the keys the car's logger is known to send.
///
/// The catalog only decorates; keys missing from it are still displayed.
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    fields: Vec<FieldSpec>,
}

const CURRENT_LAP: &str = "Current lap";
const PREVIOUS_LAP: &str = "Previous lap";
const TOTALS: &str = "Totals";

impl FieldCatalog {
    pub fn builtin() -> Self {
        let fields = [
            (CURRENT_LAP, "ntime", "Lap time", ""),
            (CURRENT_LAP, "kmph", "Speed", "km/h"),
            (CURRENT_LAP, "v", "Main bus voltage", "V"),
            (CURRENT_LAP, "im", "Motor current", "A"),
            (CURRENT_LAP, "ipv", "PV current", "A"),
            (CURRENT_LAP, "ib", "Battery current", "A"),
            (CURRENT_LAP, "pm", "Motor power", "W"),
            (CURRENT_LAP, "ppv", "PV power", "W"),
            (CURRENT_LAP, "pb", "Battery power", "W"),
            (CURRENT_LAP, "pim", "Lap motor energy", "Wh"),
            (CURRENT_LAP, "pipv", "Lap PV energy", "Wh"),
            (CURRENT_LAP, "pib", "Lap battery energy", "Wh"),
            (PREVIOUS_LAP, "otime", "Previous lap time", ""),
            (PREVIOUS_LAP, "pimo", "Previous lap motor energy", "Wh"),
            (PREVIOUS_LAP, "pipvo", "Previous lap PV energy", "Wh"),
            (PREVIOUS_LAP, "pibo", "Previous lap battery energy", "Wh"),
            (TOTALS, "lc", "Lap count", ""),
            (TOTALS, "ttime", "Total time", ""),
            (TOTALS, "pimt", "Total motor energy", "Wh"),
            (TOTALS, "pipvt", "Total PV energy", "Wh"),
            (TOTALS, "pibt", "Total battery energy", "Wh"),
        ]
        .into_iter()
        .map(|(group, key, label, unit)| FieldSpec::new(group, key, label, unit))
        .collect();
        Self { fields }
    }

    pub fn lookup(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.key == key)
    }

    /// Catalog entry for `key`, or a generic one labelled with the key itself.
    pub fn describe(&self, key: &str) -> FieldSpec {
        self.lookup(key)
            .cloned()
            .unwrap_or_else(|| FieldSpec::discovered(key))
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }
}
