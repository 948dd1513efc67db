use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const COL_PARCEL_ID: &str = "id. Matricula";
pub const COL_PLANTED: &str = "Área Plantada";
pub const COL_NATIVE_VEGETATION: &str = "Área VEG";
pub const COL_PROTECTED_AREA: &str = "Total APP";
pub const COL_LEGAL_RESERVE: &str = "Área RL (sem sobreposição da APP)";
pub const COL_HAUL_ROAD: &str = "Área Carreador";
pub const COL_ROAD: &str = "Área Estrada";
pub const COL_INFRASTRUCTURE: &str = "Área INF";

/// A named magnitude subtracted from the running balance, in priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DeductionCategory {
    pub name: String,
    pub amount: f64,
}

impl DeductionCategory {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    #[schemars(description = "Opening balance (the manually supplied total area)")]
    Start,

    #[schemars(description = "A category subtracted in full")]
    FullDeduction,

    #[schemars(
        description = "The part of the crossing category that brings the balance exactly to zero"
    )]
    ZeroCrossing,

    #[schemars(
        description = "The remainder of the crossing category, applied after the balance reached zero"
    )]
    Surplus,

    #[schemars(description = "Closing balance after every category was applied")]
    Final,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Start => "START",
            StepKind::FullDeduction => "FULL_DEDUCTION",
            StepKind::ZeroCrossing => "ZERO_CROSSING",
            StepKind::Surplus => "SURPLUS",
            StepKind::Final => "FINAL",
        }
    }

    /// START and FINAL carry absolute values; every other kind is a signed delta.
    pub fn is_absolute(&self) -> bool {
        matches!(self, StepKind::Start | StepKind::Final)
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerStep {
    /// 1-based position in the ledger
    pub sequence: usize,
    pub label: String,
    /// Name of the deduction category this step belongs to (absent for START/FINAL)
    pub category: Option<String>,
    pub delta: f64,
    pub running_balance: f64,
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ZeroCrossingInfo {
    pub category_name: String,
    pub amount_consumed_to_zero: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerResult {
    pub steps: Vec<LedgerStep>,
    pub starting_balance: f64,
    pub final_balance: f64,
    pub crossing: Option<ZeroCrossingInfo>,
}

impl LedgerResult {
    pub fn crossing_step(&self) -> Option<&LedgerStep> {
        self.steps.iter().find(|s| s.kind == StepKind::ZeroCrossing)
    }

    pub fn surplus_step(&self) -> Option<&LedgerStep> {
        self.steps.iter().find(|s| s.kind == StepKind::Surplus)
    }

    /// Amount of the crossing category left over once the balance hit zero.
    pub fn surplus(&self) -> f64 {
        self.surplus_step().map(|s| -s.delta).unwrap_or(0.0)
    }

    /// Steps that carry a category's magnitude, i.e. everything but START and FINAL.
    pub fn deduction_steps(&self) -> impl Iterator<Item = &LedgerStep> {
        self.steps.iter().filter(|s| !s.kind.is_absolute())
    }

    pub fn is_fully_consumed(&self) -> bool {
        self.crossing.is_some()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One deduction in a plan: the category name and the source columns summed into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategorySpec {
    #[schemars(description = "Display name of the deduction category")]
    pub name: String,

    #[schemars(
        description = "Source columns whose aggregated totals are added together to form this category. More than one column makes a composite category."
    )]
    pub columns: Vec<String>,
}

impl CategorySpec {
    pub fn single(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![column.into()],
        }
    }

    pub fn composite(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DeductionPlan {
    #[schemars(
        description = "Ordered deduction categories. Order is the deduction priority and is never changed."
    )]
    pub categories: Vec<CategorySpec>,
}

impl DeductionPlan {
    /// Planted area, protected overlays, legal reserve, improvements, native vegetation.
    pub fn land_use() -> Self {
        Self {
            categories: vec![
                CategorySpec::single("Área Plantada", COL_PLANTED),
                CategorySpec::single("APP", COL_PROTECTED_AREA),
                CategorySpec::single("RL (sem APP)", COL_LEGAL_RESERVE),
                CategorySpec::composite(
                    "Benfeitorias",
                    &[COL_HAUL_ROAD, COL_ROAD, COL_INFRASTRUCTURE],
                ),
                CategorySpec::single("Vegetação Nativa", COL_NATIVE_VEGETATION),
            ],
        }
    }

    /// Every source column once, in first-use order.
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for spec in &self.categories {
            for column in &spec.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        columns
    }
}

impl Default for DeductionPlan {
    fn default() -> Self {
        Self::land_use()
    }
}

fn default_id_column() -> String {
    COL_PARCEL_ID.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LandUseConfig {
    #[schemars(description = "Manually supplied total area of the selected parcels")]
    pub total_area: f64,

    #[schemars(description = "Parcel identifiers whose rows are aggregated")]
    pub parcel_ids: Vec<String>,

    #[serde(default = "default_id_column")]
    #[schemars(description = "Column holding the parcel identifier. Defaults to 'id. Matricula'.")]
    pub id_column: String,

    #[serde(default)]
    #[schemars(description = "Deduction plan. Defaults to the standard land-use plan.")]
    pub plan: DeductionPlan,
}

impl LandUseConfig {
    pub fn new(total_area: f64, parcel_ids: Vec<String>) -> Self {
        Self {
            total_area,
            parcel_ids,
            id_column: default_id_column(),
            plan: DeductionPlan::default(),
        }
    }

    /// Columns the parcel table must carry: the id column followed by the plan's columns.
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns = vec![self.id_column.clone()];
        for column in self.plan.required_columns() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(LandUseConfig)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = LandUseConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("total_area"));
        assert!(schema_json.contains("parcel_ids"));
        assert!(schema_json.contains("plan"));
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config = LandUseConfig::from_json(r#"{"total_area": 120.5, "parcel_ids": ["101"]}"#)
            .unwrap();
        assert_eq!(config.id_column, COL_PARCEL_ID);
        assert_eq!(config.plan, DeductionPlan::land_use());
        assert_eq!(config.plan.categories.len(), 5);
    }

    #[test]
    fn test_land_use_plan_columns() {
        let plan = DeductionPlan::land_use();
        let names: Vec<&str> = plan.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Área Plantada", "APP", "RL (sem APP)", "Benfeitorias", "Vegetação Nativa"]
        );

        let columns = plan.required_columns();
        assert_eq!(columns.len(), 7);
        assert_eq!(columns[0], COL_PLANTED);
        assert_eq!(columns[6], COL_NATIVE_VEGETATION);
    }

    #[test]
    fn test_required_columns_start_with_id() {
        let config = LandUseConfig::new(10.0, vec!["1".to_string()]);
        let columns = config.required_columns();
        assert_eq!(columns[0], COL_PARCEL_ID);
        assert_eq!(columns.len(), 8);
    }

    #[test]
    fn test_step_kind_serialization() {
        let json = serde_json::to_string(&StepKind::ZeroCrossing).unwrap();
        assert_eq!(json, "\"ZERO_CROSSING\"");
        assert_eq!(StepKind::FullDeduction.to_string(), "FULL_DEDUCTION");
        assert!(StepKind::Start.is_absolute());
        assert!(!StepKind::Surplus.is_absolute());
    }
}
