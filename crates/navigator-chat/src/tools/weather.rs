use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ToolPipeline, ToolSpecification};
use crate::providers::ChatModel;

pub const NAME: &str = "get_weather";
pub const DESCRIPTION: &str = "Weather search parameters";

/// Weather search parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Weather {
    #[schemars(description = "City to search for weather")]
    pub city: String,
    #[schemars(description = "State abbreviation to search for weather")]
    pub state: String,
}

pub fn specification() -> ToolSpecification {
    ToolSpecification::for_type::<Weather>(NAME, DESCRIPTION)
}

pub fn pipeline(model: Arc<dyn ChatModel>) -> ToolPipeline<Weather> {
    ToolPipeline::new(model, specification())
}
