use crate::decimal::Decimal;
use crate::error::{DiscrepancyError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// An untyped key-value mapping as produced by a record store or an extractor.
pub type RawRecord = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Decimal,
    OptionalDecimal,
    OptionalText,
    OptionalInteger,
}

impl FieldType {
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Text | Self::Decimal)
    }
}

/// Identifies one tracked attribute of a [`CanonicalRecord`].
///
/// Discriminants are positions in [`FIELDS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    CompanyName,
    Industry,
    MarketCapitalization,
    Revenue,
    Ebitda,
    NetIncome,
    Debt,
    Equity,
    EnterpriseValue,
    PeRatio,
    RevenueGrowthRate,
    EbitdaMargin,
    NetIncomeMargin,
    Roe,
    Roa,
    CurrentRatio,
    DebtToEquityRatio,
    Location,
    Ceo,
    NumberOfEmployees,
}

impl Field {
    pub fn spec(self) -> &'static FieldSpec {
        &FIELDS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: Field,
    /// Canonical field name
    pub name: &'static str,
    /// Label used by the reference data source (e.g. a CSV header)
    pub label: &'static str,
    pub field_type: FieldType,
}

impl FieldSpec {
    const fn new(
        field: Field,
        name: &'static str,
        label: &'static str,
        field_type: FieldType,
    ) -> Self {
        Self {
            field,
            name,
            label,
            field_type,
        }
    }

    pub fn is_required(&self) -> bool {
        self.field_type.is_required()
    }

    /// Coerces a raw value to this field's declared type. `None` and JSON
    /// `null` both mean "not provided".
    pub fn coerce(&self, raw: Option<&Value>) -> Result<FieldValue> {
        let raw = match raw {
            None | Some(Value::Null) => {
                return if self.is_required() {
                    Err(DiscrepancyError::missing_field(self.name))
                } else {
                    Ok(FieldValue::Absent)
                };
            }
            Some(value) => value,
        };

        match self.field_type {
            FieldType::Text | FieldType::OptionalText => match raw {
                Value::String(s) => Ok(FieldValue::Text(s.clone())),
                Value::Number(n) => Ok(FieldValue::Text(n.to_string())),
                _ => Err(DiscrepancyError::bad_type(self.name)),
            },
            FieldType::Decimal | FieldType::OptionalDecimal => {
                self.coerce_decimal(raw).map(FieldValue::Decimal)
            }
            FieldType::OptionalInteger => self
                .coerce_decimal(raw)?
                .to_i64()
                .map(FieldValue::Integer)
                .ok_or_else(|| DiscrepancyError::bad_type(self.name)),
        }
    }

    fn coerce_decimal(&self, raw: &Value) -> Result<Decimal> {
        let parsed = match raw {
            Value::Number(n) => Decimal::from_json_number(n),
            Value::String(s) => s.parse(),
            _ => return Err(DiscrepancyError::bad_type(self.name)),
        };
        parsed.map_err(|_| DiscrepancyError::bad_type(self.name))
    }
}

const FIELD_TABLE: [FieldSpec; 20] = [
    FieldSpec::new(Field::CompanyName, "company_name", "Company Name", FieldType::Text),
    FieldSpec::new(Field::Industry, "industry", "Industry", FieldType::Text),
    FieldSpec::new(
        Field::MarketCapitalization,
        "market_capitalization",
        "Market Capitalization",
        FieldType::Decimal,
    ),
    FieldSpec::new(Field::Revenue, "revenue", "Revenue (in millions)", FieldType::Decimal),
    FieldSpec::new(Field::Ebitda, "ebitda", "EBITDA (in millions)", FieldType::Decimal),
    FieldSpec::new(Field::NetIncome, "net_income", "Net Income (in millions)", FieldType::Decimal),
    FieldSpec::new(Field::Debt, "debt", "Debt (in millions)", FieldType::Decimal),
    FieldSpec::new(Field::Equity, "equity", "Equity (in millions)", FieldType::Decimal),
    FieldSpec::new(
        Field::EnterpriseValue,
        "enterprise_value",
        "Enterprise Value (in millions)",
        FieldType::Decimal,
    ),
    FieldSpec::new(Field::PeRatio, "pe_ratio", "P/E Ratio", FieldType::Decimal),
    FieldSpec::new(
        Field::RevenueGrowthRate,
        "revenue_growth_rate",
        "Revenue Growth Rate (%)",
        FieldType::Decimal,
    ),
    FieldSpec::new(Field::EbitdaMargin, "ebitda_margin", "EBITDA Margin (%)", FieldType::Decimal),
    FieldSpec::new(
        Field::NetIncomeMargin,
        "net_income_margin",
        "Net Income Margin (%)",
        FieldType::OptionalDecimal,
    ),
    FieldSpec::new(Field::Roe, "roe", "ROE (Return on Equity) (%)", FieldType::Decimal),
    FieldSpec::new(Field::Roa, "roa", "ROA (Return on Assets) (%)", FieldType::Decimal),
    FieldSpec::new(
        Field::CurrentRatio,
        "current_ratio",
        "Current Ratio",
        FieldType::OptionalDecimal,
    ),
    FieldSpec::new(
        Field::DebtToEquityRatio,
        "debt_to_equity_ratio",
        "Debt to Equity Ratio",
        FieldType::Decimal,
    ),
    FieldSpec::new(Field::Location, "location", "Location", FieldType::Text),
    FieldSpec::new(Field::Ceo, "ceo", "CEO", FieldType::OptionalText),
    FieldSpec::new(
        Field::NumberOfEmployees,
        "number_of_employees",
        "Number of Employees",
        FieldType::OptionalInteger,
    ),
];

// `Field::spec` indexes the table by discriminant.
const _: () = {
    let mut i = 0;
    while i < FIELD_TABLE.len() {
        assert!(FIELD_TABLE[i].field as usize == i);
        i += 1;
    }
};

/// Every tracked field, in declaration order. Both the mapper and the
/// reconciler walk this table; report order follows it.
pub static FIELDS: [FieldSpec; 20] = FIELD_TABLE;

pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|spec| spec.name == name)
}

/// A single field value read out of a [`CanonicalRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Decimal(Decimal),
    Integer(i64),
    #[default]
    Absent,
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    fn from_option<T>(value: Option<T>, wrap: impl FnOnce(T) -> FieldValue) -> Self {
        value.map(wrap).unwrap_or(FieldValue::Absent)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Absent => write!(f, "<absent>"),
        }
    }
}

/// One company's tracked attributes, normalized and typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalRecord {
    #[schemars(description = "The legal name of the company")]
    pub company_name: String,
    pub industry: String,
    #[schemars(with = "String")]
    pub market_capitalization: Decimal,
    #[schemars(with = "String", description = "Revenue in millions")]
    pub revenue: Decimal,
    #[schemars(with = "String", description = "EBITDA in millions")]
    pub ebitda: Decimal,
    #[schemars(with = "String", description = "Net income in millions")]
    pub net_income: Decimal,
    #[schemars(with = "String", description = "Debt in millions")]
    pub debt: Decimal,
    #[schemars(with = "String", description = "Equity in millions")]
    pub equity: Decimal,
    #[schemars(with = "String", description = "Enterprise value in millions")]
    pub enterprise_value: Decimal,
    #[schemars(with = "String")]
    pub pe_ratio: Decimal,
    #[schemars(with = "String", description = "Percentage")]
    pub revenue_growth_rate: Decimal,
    #[schemars(with = "String", description = "Percentage")]
    pub ebitda_margin: Decimal,
    #[serde(default)]
    #[schemars(with = "Option<String>", description = "Percentage")]
    pub net_income_margin: Option<Decimal>,
    #[schemars(with = "String", description = "Return on equity, percentage")]
    pub roe: Decimal,
    #[schemars(with = "String", description = "Return on assets, percentage")]
    pub roa: Decimal,
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub current_ratio: Option<Decimal>,
    #[schemars(with = "String")]
    pub debt_to_equity_ratio: Decimal,
    #[schemars(description = "Headquarters location, e.g. 'New York, NY'")]
    pub location: String,
    #[serde(default)]
    pub ceo: Option<String>,
    #[serde(default)]
    pub number_of_employees: Option<i64>,
}

impl CanonicalRecord {
    /// Builds a record from a mapping keyed by canonical field names.
    pub fn from_canonical(raw: &RawRecord) -> Result<Self> {
        Self::from_lookup(|spec| raw.get(spec.name))
    }

    /// Builds a record by asking `lookup` for each field's raw value in
    /// declaration order. The first field that fails coercion aborts construction.
    pub fn from_lookup<'a, F>(mut lookup: F) -> Result<Self>
    where
        F: FnMut(&FieldSpec) -> Option<&'a Value>,
    {
        let mut coerced = CoercedFields(Vec::with_capacity(FIELDS.len()));
        for spec in FIELDS.iter() {
            coerced.0.push(spec.coerce(lookup(spec))?);
        }

        Ok(Self {
            company_name: coerced.text(Field::CompanyName)?,
            industry: coerced.text(Field::Industry)?,
            market_capitalization: coerced.decimal(Field::MarketCapitalization)?,
            revenue: coerced.decimal(Field::Revenue)?,
            ebitda: coerced.decimal(Field::Ebitda)?,
            net_income: coerced.decimal(Field::NetIncome)?,
            debt: coerced.decimal(Field::Debt)?,
            equity: coerced.decimal(Field::Equity)?,
            enterprise_value: coerced.decimal(Field::EnterpriseValue)?,
            pe_ratio: coerced.decimal(Field::PeRatio)?,
            revenue_growth_rate: coerced.decimal(Field::RevenueGrowthRate)?,
            ebitda_margin: coerced.decimal(Field::EbitdaMargin)?,
            net_income_margin: coerced.optional_decimal(Field::NetIncomeMargin)?,
            roe: coerced.decimal(Field::Roe)?,
            roa: coerced.decimal(Field::Roa)?,
            current_ratio: coerced.optional_decimal(Field::CurrentRatio)?,
            debt_to_equity_ratio: coerced.decimal(Field::DebtToEquityRatio)?,
            location: coerced.text(Field::Location)?,
            ceo: coerced.optional_text(Field::Ceo)?,
            number_of_employees: coerced.optional_integer(Field::NumberOfEmployees)?,
        })
    }

    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::CompanyName => FieldValue::Text(self.company_name.clone()),
            Field::Industry => FieldValue::Text(self.industry.clone()),
            Field::MarketCapitalization => FieldValue::Decimal(self.market_capitalization),
            Field::Revenue => FieldValue::Decimal(self.revenue),
            Field::Ebitda => FieldValue::Decimal(self.ebitda),
            Field::NetIncome => FieldValue::Decimal(self.net_income),
            Field::Debt => FieldValue::Decimal(self.debt),
            Field::Equity => FieldValue::Decimal(self.equity),
            Field::EnterpriseValue => FieldValue::Decimal(self.enterprise_value),
            Field::PeRatio => FieldValue::Decimal(self.pe_ratio),
            Field::RevenueGrowthRate => FieldValue::Decimal(self.revenue_growth_rate),
            Field::EbitdaMargin => FieldValue::Decimal(self.ebitda_margin),
            Field::NetIncomeMargin => {
                FieldValue::from_option(self.net_income_margin, FieldValue::Decimal)
            }
            Field::Roe => FieldValue::Decimal(self.roe),
            Field::Roa => FieldValue::Decimal(self.roa),
            Field::CurrentRatio => FieldValue::from_option(self.current_ratio, FieldValue::Decimal),
            Field::DebtToEquityRatio => FieldValue::Decimal(self.debt_to_equity_ratio),
            Field::Location => FieldValue::Text(self.location.clone()),
            Field::Ceo => FieldValue::from_option(self.ceo.clone(), FieldValue::Text),
            Field::NumberOfEmployees => {
                FieldValue::from_option(self.number_of_employees, FieldValue::Integer)
            }
        }
    }

    /// Reads a field by canonical name. Returns `None` for unknown names.
    pub fn value(&self, name: &str) -> Option<FieldValue> {
        field_spec(name).map(|spec| self.get(spec.field))
    }

    /// Iterates `(spec, value)` pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static FieldSpec, FieldValue)> + '_ {
        FIELDS
            .iter()
            .map(move |spec| (spec, self.get(spec.field)))
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CanonicalRecord)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Coerced values in [`FIELDS`] order.
struct CoercedFields(Vec<FieldValue>);

impl CoercedFields {
    fn take(&mut self, field: Field) -> FieldValue {
        self.0
            .get_mut(field as usize)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    fn text(&mut self, field: Field) -> Result<String> {
        match self.take(field) {
            FieldValue::Text(s) => Ok(s),
            FieldValue::Absent => Err(DiscrepancyError::missing_field(field.name())),
            _ => Err(DiscrepancyError::bad_type(field.name())),
        }
    }

    fn decimal(&mut self, field: Field) -> Result<Decimal> {
        match self.take(field) {
            FieldValue::Decimal(d) => Ok(d),
            FieldValue::Absent => Err(DiscrepancyError::missing_field(field.name())),
            _ => Err(DiscrepancyError::bad_type(field.name())),
        }
    }

    fn optional_decimal(&mut self, field: Field) -> Result<Option<Decimal>> {
        match self.take(field) {
            FieldValue::Decimal(d) => Ok(Some(d)),
            FieldValue::Absent => Ok(None),
            _ => Err(DiscrepancyError::bad_type(field.name())),
        }
    }

    fn optional_text(&mut self, field: Field) -> Result<Option<String>> {
        match self.take(field) {
            FieldValue::Text(s) => Ok(Some(s)),
            FieldValue::Absent => Ok(None),
            _ => Err(DiscrepancyError::bad_type(field.name())),
        }
    }

    fn optional_integer(&mut self, field: Field) -> Result<Option<i64>> {
        match self.take(field) {
            FieldValue::Integer(i) => Ok(Some(i)),
            FieldValue::Absent => Ok(None),
            _ => Err(DiscrepancyError::bad_type(field.name())),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ViolationKind;
    use serde_json::json;

    pub(crate) fn healthinc_canonical() -> RawRecord {
        let value = json!({
            "company_name": "HealthInc",
            "industry": "Healthcare",
            "market_capitalization": 3000,
            "revenue": 1000,
            "ebitda": 250,
            "net_income": 80,
            "debt": 150,
            "equity": 666,
            "enterprise_value": 3150,
            "pe_ratio": 15,
            "revenue_growth_rate": 12,
            "ebitda_margin": 40,
            "net_income_margin": 8,
            "roe": 13.33,
            "roa": 10,
            "current_ratio": 1,
            "debt_to_equity_ratio": 0.25,
            "location": "New York, NY",
            "ceo": "Jane Smith",
            "number_of_employees": 3000
        });
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_field_table_is_consistent() {
        let record = CanonicalRecord::from_canonical(&healthinc_canonical()).unwrap();
        for (i, spec) in FIELDS.iter().enumerate() {
            assert_eq!(spec.field as usize, i);
            assert_eq!(spec.field.spec(), spec);
            assert_eq!(field_spec(spec.name), Some(spec));
            assert_eq!(record.value(spec.name), Some(record.get(spec.field)));
        }
        assert_eq!(record.fields().count(), FIELDS.len());
        assert!(record.value("not_a_field").is_none());
    }

    #[test]
    fn test_accessors_match_declared_types() {
        let full = CanonicalRecord::from_canonical(&healthinc_canonical()).unwrap();
        let mut sparse_raw = healthinc_canonical();
        for spec in FIELDS.iter().filter(|spec| !spec.is_required()) {
            sparse_raw.remove(spec.name);
        }
        let sparse = CanonicalRecord::from_canonical(&sparse_raw).unwrap();

        for (spec, value) in full.fields() {
            let matches_type = match spec.field_type {
                FieldType::Text | FieldType::OptionalText => matches!(value, FieldValue::Text(_)),
                FieldType::Decimal | FieldType::OptionalDecimal => {
                    matches!(value, FieldValue::Decimal(_))
                }
                FieldType::OptionalInteger => matches!(value, FieldValue::Integer(_)),
            };
            assert!(matches_type, "field '{}' read back as {:?}", spec.name, value);
        }
        for (spec, value) in sparse.fields() {
            assert_eq!(value.is_absent(), !spec.is_required(), "field '{}'", spec.name);
        }
    }

    #[test]
    fn test_optional_fields_default_to_absent() {
        let mut raw = healthinc_canonical();
        raw.remove("ceo");
        raw.remove("number_of_employees");
        raw.insert("net_income_margin".to_string(), Value::Null);

        let record = CanonicalRecord::from_canonical(&raw).unwrap();
        assert_eq!(record.ceo, None);
        assert_eq!(record.number_of_employees, None);
        assert_eq!(record.net_income_margin, None);
        assert_eq!(record.value("ceo"), Some(FieldValue::Absent));
    }

    #[test]
    fn test_missing_required_field() {
        let mut raw = healthinc_canonical();
        raw.remove("revenue");

        match CanonicalRecord::from_canonical(&raw) {
            Err(DiscrepancyError::SchemaViolation { kind, field }) => {
                assert_eq!(kind, ViolationKind::MissingField);
                assert_eq!(field, "revenue");
            }
            other => panic!("expected missing field violation, got {:?}", other),
        }
    }

    #[test]
    fn test_uncoercible_numeric_field() {
        let mut raw = healthinc_canonical();
        raw.insert("ebitda".to_string(), json!("a lot"));

        match CanonicalRecord::from_canonical(&raw) {
            Err(DiscrepancyError::SchemaViolation { kind, field }) => {
                assert_eq!(kind, ViolationKind::BadType);
                assert_eq!(field, "ebitda");
            }
            other => panic!("expected bad type violation, got {:?}", other),
        }
    }

    #[test]
    fn test_fractional_headcount_is_rejected() {
        let mut raw = healthinc_canonical();
        raw.insert("number_of_employees".to_string(), json!(2999.5));

        assert!(matches!(
            CanonicalRecord::from_canonical(&raw),
            Err(DiscrepancyError::SchemaViolation {
                kind: ViolationKind::BadType,
                ..
            })
        ));
    }

    #[test]
    fn test_numeric_text_matches_number() {
        let numeric = CanonicalRecord::from_canonical(&healthinc_canonical()).unwrap();

        let mut textual = healthinc_canonical();
        textual.insert("revenue".to_string(), json!("1000.00"));
        textual.insert("roe".to_string(), json!("13.33"));
        textual.insert("number_of_employees".to_string(), json!("3000"));
        let textual = CanonicalRecord::from_canonical(&textual).unwrap();

        assert_eq!(numeric, textual);
    }

    #[test]
    fn test_boolean_is_bad_type() {
        let mut raw = healthinc_canonical();
        raw.insert("industry".to_string(), json!(true));

        assert!(matches!(
            CanonicalRecord::from_canonical(&raw),
            Err(DiscrepancyError::SchemaViolation {
                kind: ViolationKind::BadType,
                ..
            })
        ));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = CanonicalRecord::schema_as_json().unwrap();
        assert!(schema_json.contains("company_name"));
        assert!(schema_json.contains("number_of_employees"));
    }

    #[test]
    fn test_serialization() {
        let record = CanonicalRecord::from_canonical(&healthinc_canonical()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["revenue"], json!("1000"));
        assert_eq!(json["roe"], json!("13.33"));

        let back: CanonicalRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
