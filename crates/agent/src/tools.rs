use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use soundchain_core::domain::terms::{normalize_rights, BaseTerms, NegotiationRequest, Territory};
use soundchain_core::licensing::contract::ContractTerms;
use soundchain_core::licensing::LicensingRuntime;

pub const CALCULATE_PRICE: &str = "calculate_license_price";
pub const VALIDATE_RIGHTS: &str = "validate_usage_rights";
pub const VALIDATE_PRICE: &str = "validate_price";
pub const GENERATE_CONTRACT: &str = "generate_contract";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Other names an agent may use for the same tool.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    async fn execute(&self, input: Value) -> Result<Value>;
}

/// One executed tool invocation as reported back to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// The name the tool was invoked under.
    pub tool: String,
    pub arguments: Value,
    pub result: Value,
    #[serde(skip)]
    pub resolved: Option<&'static str>,
}

impl ToolCallRecord {
    pub fn is_error(&self) -> bool {
        self.result.get("error").is_some()
    }

    pub fn resolves_to(&self, name: &str) -> bool {
        self.resolved == Some(name)
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// The licensing tools bound to one track's base terms.
    pub fn for_terms(runtime: Arc<dyn LicensingRuntime>, base_terms: &BaseTerms) -> Self {
        let mut registry = Self::default();
        registry.register(CalculatePriceTool::new(runtime.clone(), base_terms.clone()));
        registry.register(ValidateRightsTool::new(runtime.clone(), base_terms.clone()));
        registry.register(ValidatePriceTool::new(runtime.clone(), base_terms.clone()));
        registry.register(GenerateContractTool::new(runtime, base_terms.clone()));
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        for alias in tool.aliases() {
            self.tools.insert((*alias).to_string(), tool.clone());
        }
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Runs a tool by name. Unknown names and execution failures are recorded
    /// as `{"error": ...}` results instead of failing the turn.
    pub async fn invoke(&self, name: &str, arguments: Value) -> ToolCallRecord {
        let Some(tool) = self.resolve(name) else {
            return ToolCallRecord {
                tool: name.to_string(),
                arguments,
                result: json!({ "error": format!("Unknown tool: {name}") }),
                resolved: None,
            };
        };

        let result = match tool.execute(arguments.clone()).await {
            Ok(result) => result,
            Err(error) => json!({ "error": error.to_string() }),
        };
        ToolCallRecord { tool: name.to_string(), arguments, result, resolved: Some(tool.name()) }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, input: Value) -> Result<T> {
    let input = if input.is_null() { json!({}) } else { input };
    serde_json::from_value(input).map_err(|error| anyhow!("invalid arguments for {tool}: {error}"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceArgs {
    #[serde(default)]
    usage_rights: Vec<String>,
    #[serde(default)]
    exclusivity: Option<bool>,
    #[serde(default)]
    territory: Option<String>,
    #[serde(default, alias = "duration")]
    duration_months: Option<u32>,
}

/// Prices against the producer's minimum; any base price the agent supplies is ignored.
pub struct CalculatePriceTool {
    runtime: Arc<dyn LicensingRuntime>,
    base_terms: BaseTerms,
}

impl CalculatePriceTool {
    pub fn new(runtime: Arc<dyn LicensingRuntime>, base_terms: BaseTerms) -> Self {
        Self { runtime, base_terms }
    }
}

#[async_trait]
impl Tool for CalculatePriceTool {
    fn name(&self) -> &'static str {
        CALCULATE_PRICE
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["calculate_price"]
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: PriceArgs = parse_args(CALCULATE_PRICE, input)?;
        let request = NegotiationRequest {
            usage_rights: normalize_rights(&args.usage_rights),
            exclusivity: args.exclusivity.unwrap_or(false),
            territory: args.territory.as_deref().map(Territory::from_label).unwrap_or_default(),
            duration_months: args.duration_months,
        };
        let breakdown = self.runtime.calculate_price(self.base_terms.min_price, &request);
        Ok(serde_json::to_value(breakdown)?)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RightsArgs {
    #[serde(default)]
    requested_rights: Option<Vec<String>>,
    #[serde(default)]
    usage_rights: Option<Vec<String>>,
}

pub struct ValidateRightsTool {
    runtime: Arc<dyn LicensingRuntime>,
    base_terms: BaseTerms,
}

impl ValidateRightsTool {
    pub fn new(runtime: Arc<dyn LicensingRuntime>, base_terms: BaseTerms) -> Self {
        Self { runtime, base_terms }
    }
}

#[async_trait]
impl Tool for ValidateRightsTool {
    fn name(&self) -> &'static str {
        VALIDATE_RIGHTS
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["validate_rights"]
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: RightsArgs = parse_args(VALIDATE_RIGHTS, input)?;
        let requested = args.requested_rights.or(args.usage_rights).unwrap_or_default();
        let validation = self.runtime.validate_usage_rights(&requested, &self.base_terms);
        Ok(serde_json::to_value(validation)?)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferArgs {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    offered_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    price: Option<Decimal>,
}

pub struct ValidatePriceTool {
    runtime: Arc<dyn LicensingRuntime>,
    base_terms: BaseTerms,
}

impl ValidatePriceTool {
    pub fn new(runtime: Arc<dyn LicensingRuntime>, base_terms: BaseTerms) -> Self {
        Self { runtime, base_terms }
    }
}

#[async_trait]
impl Tool for ValidatePriceTool {
    fn name(&self) -> &'static str {
        VALIDATE_PRICE
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: OfferArgs = parse_args(VALIDATE_PRICE, input)?;
        let offered = args
            .offered_price
            .or(args.price)
            .ok_or_else(|| anyhow!("{VALIDATE_PRICE} requires offeredPrice"))?;
        let validation = self.runtime.validate_price(offered, &self.base_terms);
        Ok(serde_json::to_value(validation)?)
    }
}

pub struct GenerateContractTool {
    runtime: Arc<dyn LicensingRuntime>,
    base_terms: BaseTerms,
}

impl GenerateContractTool {
    pub fn new(runtime: Arc<dyn LicensingRuntime>, base_terms: BaseTerms) -> Self {
        Self { runtime, base_terms }
    }
}

#[async_trait]
impl Tool for GenerateContractTool {
    fn name(&self) -> &'static str {
        GENERATE_CONTRACT
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["generate_license_contract"]
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let terms: ContractTerms = parse_args(GENERATE_CONTRACT, input)?;
        let contract = self.runtime.generate_contract(&terms, Some(self.base_terms.min_price));
        Ok(serde_json::to_value(contract)?)
    }
}
