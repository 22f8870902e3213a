pub mod complex;
pub mod energy_record;
pub mod request_month;
pub mod trend;

pub use complex::{parse_approval_date, Complex, ComplexProfile};
pub use energy_record::{energy_display_name, EnergyCategory, EnergyRecord, ENERGY_COLUMNS, REQUEST_MONTH_COLUMN};
pub use request_month::RequestMonth;
pub use trend::{MergedTrendRow, Trend, TrendRow};
