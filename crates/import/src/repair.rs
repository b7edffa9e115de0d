use backoffice_core::{Table, TableError, Value};
use regex::Regex;
use std::sync::OnceLock;

use crate::parse::{self, NotParseable};

/// Type rule a primary column is expected to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairRule {
    /// Parseable date; normalized to a plain `Date` (no time-of-day).
    Date,
    /// Alphanumeric reference code, `^[A-Za-z0-9-]*$`.
    Reference,
}

fn reference_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9\-]*$").expect("static pattern"))
}

impl RepairRule {
    /// Try-parse a non-empty cell under this rule.
    pub fn try_parse(self, value: &Value) -> Result<Value, NotParseable> {
        match self {
            RepairRule::Date => parse::parse_date(value).map(Value::Date),
            RepairRule::Reference => {
                let text = value.to_string();
                if matches!(value, Value::Text(_) | Value::Number(_))
                    && reference_pattern().is_match(&text)
                {
                    Ok(Value::Text(text))
                } else {
                    Err(NotParseable(text))
                }
            }
        }
    }
}

/// Moves values that do not belong in `primary` into `overflow`.
///
/// Aged-payables exports print each supplier as a group header whose ID sits
/// in the date column and whose name sits in the reference column; this pulls
/// those into their own columns so the rows can be forward-filled.
#[derive(Debug, Clone)]
pub struct ColumnRepair {
    pub primary: String,
    pub overflow: String,
    pub rule: RepairRule,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub parsed: usize,
    pub relocated: usize,
    pub empty: usize,
}

impl RepairReport {
    /// True when the column held values but none of them parsed, which
    /// usually means the header-skip offset is wrong for this sheet.
    pub fn looks_misaligned(&self) -> bool {
        self.parsed == 0 && self.relocated > 0
    }
}

impl ColumnRepair {
    pub fn new(primary: &str, overflow: &str, rule: RepairRule) -> Self {
        Self {
            primary: primary.to_string(),
            overflow: overflow.to_string(),
            rule,
        }
    }

    pub fn apply(&self, table: &mut Table) -> Result<RepairReport, TableError> {
        let primary = table.column_index(&self.primary)?;
        let overflow = table.ensure_column(&self.overflow);
        let mut report = RepairReport::default();

        for idx in 0..table.len() {
            let value = table.rows()[idx].get(primary).clone();
            if value.is_empty() {
                report.empty += 1;
                continue;
            }
            match self.rule.try_parse(&value) {
                Ok(normalized) => {
                    table.set_value(idx, primary, normalized)?;
                    report.parsed += 1;
                }
                Err(NotParseable(raw)) => {
                    tracing::debug!(row = idx, column = %self.primary, value = %raw, "relocating value");
                    table.set_value(idx, overflow, value)?;
                    table.set_value(idx, primary, Value::Empty)?;
                    report.relocated += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn t(s: &str) -> Value {
        Value::text(s)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_rule_relocates_supplier_ids() {
        let mut table = Table::with_rows(
            ["Transaction Date", "Total"],
            vec![
                vec![t("SUP-001 Acme"), Value::Empty],
                vec![t("2024-01-15"), t("10")],
                vec![
                    Value::DateTime(date(2024, 2, 1).and_hms_opt(9, 30, 0).unwrap()),
                    t("5"),
                ],
            ],
        );
        let repair = ColumnRepair::new("Transaction Date", "Supplier ID", RepairRule::Date);
        let report = repair.apply(&mut table).unwrap();

        assert_eq!(report, RepairReport { parsed: 2, relocated: 1, empty: 0 });
        assert!(table.value(0, "Transaction Date").unwrap().is_empty());
        assert_eq!(table.value(0, "Supplier ID").unwrap(), &t("SUP-001 Acme"));
        assert_eq!(table.value(1, "Transaction Date").unwrap(), &Value::Date(date(2024, 1, 15)));
        // time-of-day stripped
        assert_eq!(table.value(2, "Transaction Date").unwrap(), &Value::Date(date(2024, 2, 1)));
        assert!(table.value(1, "Supplier ID").unwrap().is_empty());
    }

    #[test]
    fn reference_rule_relocates_names() {
        let mut table = Table::with_rows(
            ["Transaction Reference"],
            vec![
                vec![t("Acme Supplies Ltd")],
                vec![t("INV-2024-001")],
                vec![Value::Number(Decimal::from(12345))],
                vec![Value::Empty],
            ],
        );
        let repair = ColumnRepair::new("Transaction Reference", "Supplier Name", RepairRule::Reference);
        let report = repair.apply(&mut table).unwrap();

        assert_eq!(report, RepairReport { parsed: 2, relocated: 1, empty: 1 });
        assert_eq!(table.value(0, "Supplier Name").unwrap(), &t("Acme Supplies Ltd"));
        assert!(table.value(0, "Transaction Reference").unwrap().is_empty());
        assert_eq!(table.value(2, "Transaction Reference").unwrap(), &t("12345"));
    }

    #[test]
    fn existing_overflow_values_are_kept_on_success() {
        let mut table = Table::with_rows(
            ["Transaction Date", "Supplier ID"],
            vec![vec![t("2024-01-15"), t("S1")]],
        );
        ColumnRepair::new("Transaction Date", "Supplier ID", RepairRule::Date)
            .apply(&mut table)
            .unwrap();
        assert_eq!(table.value(0, "Supplier ID").unwrap(), &t("S1"));
    }

    #[test]
    fn missing_primary_column_is_an_error() {
        let mut table = Table::new(["Other"]);
        let err = ColumnRepair::new("Transaction Date", "Supplier ID", RepairRule::Date)
            .apply(&mut table)
            .unwrap_err();
        assert_eq!(err, TableError::MissingColumn("Transaction Date".into()));
    }

    #[test]
    fn wholly_unparseable_column_looks_misaligned() {
        let mut table = Table::with_rows(
            ["Transaction Date"],
            vec![vec![t("Supplier")], vec![t("Another header")]],
        );
        let report = ColumnRepair::new("Transaction Date", "Supplier ID", RepairRule::Date)
            .apply(&mut table)
            .unwrap();
        assert!(report.looks_misaligned());
    }

    #[test]
    fn all_empty_column_is_not_misaligned() {
        let report = RepairReport { parsed: 0, relocated: 0, empty: 4 };
        assert!(!report.looks_misaligned());
    }

    fn cell() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Empty),
            "[A-Za-z0-9 ./-]{0,12}".prop_map(Value::text),
            (2000i32..2030, 1u32..13, 1u32..29)
                .prop_map(|(y, m, d)| Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())),
            (-1000i64..1000).prop_map(|n| Value::Number(Decimal::from(n))),
        ]
    }

    proptest! {
        #[test]
        fn primary_is_normalized_or_empty(cells in prop::collection::vec(cell(), 0..40)) {
            let rows: Vec<Vec<Value>> = cells.iter().map(|c| vec![c.clone(), c.clone()]).collect();
            let mut table = Table::with_rows(["date", "reference"], rows);

            ColumnRepair::new("date", "date_overflow", RepairRule::Date).apply(&mut table).unwrap();
            ColumnRepair::new("reference", "ref_overflow", RepairRule::Reference).apply(&mut table).unwrap();

            for i in 0..table.len() {
                let d = table.value(i, "date").unwrap();
                prop_assert!(matches!(d, Value::Empty | Value::Date(_)));

                let r = table.value(i, "reference").unwrap();
                match r {
                    Value::Empty => {}
                    Value::Text(s) => prop_assert!(reference_pattern().is_match(s)),
                    other => prop_assert!(false, "unexpected reference {:?}", other),
                }
            }
        }
    }
}
