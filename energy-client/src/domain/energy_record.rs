use serde_json::{Map, Value};

use super::RequestMonth;

/// Column holding the request month in every energy file.
pub const REQUEST_MONTH_COLUMN: &str = "requestMonth";

/// The five semantic energy categories reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnergyCategory {
    Heating,
    HotWater,
    Gas,
    Electricity,
    ColdWater,
}

impl EnergyCategory {
    pub fn display_name(self) -> &'static str {
        match self {
            EnergyCategory::Heating => "난방 사용량",
            EnergyCategory::HotWater => "급탕 사용량",
            EnergyCategory::Gas => "가스 사용량",
            EnergyCategory::Electricity => "전기 사용량",
            EnergyCategory::ColdWater => "수도 사용량",
        }
    }

    /// Map a reading column (base or `h`-prefixed) to its category.
    pub fn from_column(column: &str) -> Option<Self> {
        let base = match column {
            "hheat" | "hwaterHot" | "hgas" | "helect" | "hwaterCool" => &column[1..],
            other => other,
        };
        match base {
            "heat" => Some(EnergyCategory::Heating),
            "waterHot" => Some(EnergyCategory::HotWater),
            "gas" => Some(EnergyCategory::Gas),
            "elect" => Some(EnergyCategory::Electricity),
            "waterCool" => Some(EnergyCategory::ColdWater),
            _ => None,
        }
    }
}

/// Reading columns analysed per complex, in report order.
pub const ENERGY_COLUMNS: [&str; 10] = [
    "heat",
    "hheat",
    "waterHot",
    "hwaterHot",
    "gas",
    "hgas",
    "elect",
    "helect",
    "waterCool",
    "hwaterCool",
];

/// Display name for a reading column; unknown columns are returned as-is.
pub fn energy_display_name(column: &str) -> &str {
    EnergyCategory::from_column(column)
        .map(EnergyCategory::display_name)
        .unwrap_or(column)
}

/// One month of energy readings for one complex.
///
/// `fields` keeps the API item object in the order it was received; its keys
/// become the file columns after `requestMonth`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyRecord {
    pub kapt_code: String,
    pub request_month: RequestMonth,
    pub fields: Map<String, Value>,
}

impl EnergyRecord {
    pub fn new(kapt_code: impl Into<String>, request_month: RequestMonth, fields: Map<String, Value>) -> Self {
        Self {
            kapt_code: kapt_code.into(),
            request_month,
            fields,
        }
    }

    /// Column names of this record: `requestMonth` followed by the item keys.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(REQUEST_MONTH_COLUMN).chain(
            self.fields
                .keys()
                .map(String::as_str)
                .filter(|k| *k != REQUEST_MONTH_COLUMN),
        )
    }

    /// CSV cell for `column`; absent fields render as an empty cell.
    pub fn cell(&self, column: &str) -> String {
        if column == REQUEST_MONTH_COLUMN {
            return self.request_month.to_string();
        }
        match self.fields.get(column) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> EnergyRecord {
        let fields = json!({"kaptCode": "A1", "heat": 120, "helect": "35.5", "gas": null})
            .as_object()
            .cloned()
            .unwrap();
        EnergyRecord::new("A1", "202003".parse().unwrap(), fields)
    }

    #[test]
    fn prefixed_columns_share_a_category() {
        assert_eq!(EnergyCategory::from_column("hheat"), Some(EnergyCategory::Heating));
        assert_eq!(EnergyCategory::from_column("heat"), Some(EnergyCategory::Heating));
        assert_eq!(EnergyCategory::from_column("hwaterCool"), Some(EnergyCategory::ColdWater));
        assert_eq!(EnergyCategory::from_column("kaptCode"), None);
        assert_eq!(energy_display_name("helect"), "전기 사용량");
        assert_eq!(energy_display_name("other"), "other");
    }

    #[test]
    fn columns_start_with_request_month_and_keep_item_order() {
        let r = record();
        let cols: Vec<&str> = r.columns().collect();
        assert_eq!(cols, vec!["requestMonth", "kaptCode", "heat", "helect", "gas"]);
    }

    #[test]
    fn cells_render_scalars() {
        let r = record();
        assert_eq!(r.cell("requestMonth"), "202003");
        assert_eq!(r.cell("heat"), "120");
        assert_eq!(r.cell("helect"), "35.5");
        assert_eq!(r.cell("gas"), "");
        assert_eq!(r.cell("missing"), "");
    }
}
