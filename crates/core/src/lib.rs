pub mod money;
pub mod period;
pub mod table;

pub use money::Money;
pub use period::YearMonth;
pub use table::{Row, Table, TableError, Value};
