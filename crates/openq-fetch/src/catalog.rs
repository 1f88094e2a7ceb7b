//! Operation catalog built from an OpenAPI v3 document.
//!
//! The catalog records, for every `(method, path)` the document defines, which
//! parameters are required and where they go. [`HttpFetchClient`] uses it to
//! refuse requests the schema does not allow before anything is sent.
//!
//! [`HttpFetchClient`]: crate::HttpFetchClient

use openapiv3::{OpenAPI, Operation, Parameter, PathItem, ReferenceOr};
use openq_core::{FetchError, FetchInit, HttpMethod};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Location where a parameter appears in the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
        }
    }
}

/// A parameter declared by an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
}

/// One `(method, path)` pair of the document.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub method: HttpMethod,
    pub path: String,
    pub operation_id: Option<String>,
    pub parameters: Vec<ParameterSpec>,
    pub body_required: bool,
}

impl OperationSpec {
    /// Whether a caller has to pass an init for this operation.
    pub fn requires_init(&self) -> bool {
        self.body_required || self.parameters.iter().any(|p| p.required)
    }

    /// Check that `init` carries every required parameter and body.
    pub fn validate(&self, init: &FetchInit) -> Result<(), FetchError> {
        for param in self.parameters.iter().filter(|p| p.required) {
            let present = match param.location {
                ParameterLocation::Path => init.params.path.contains_key(&param.name),
                ParameterLocation::Query => init.params.query.contains_key(&param.name),
                ParameterLocation::Cookie => init.params.cookie.contains_key(&param.name),
                ParameterLocation::Header => {
                    init.params
                        .header
                        .keys()
                        .any(|k| k.eq_ignore_ascii_case(&param.name))
                        || init.headers.keys().any(|k| k.eq_ignore_ascii_case(&param.name))
                }
            };

            if !present {
                return Err(FetchError::missing_parameter(
                    param.location.to_string(),
                    param.name.clone(),
                ));
            }
        }

        if self.body_required && init.body.is_none() {
            return Err(FetchError::missing_parameter("body", "body"));
        }

        Ok(())
    }
}

/// All operations of an OpenAPI document, indexed by path then method.
#[derive(Debug, Clone, Default)]
pub struct OperationCatalog {
    operations: HashMap<String, BTreeMap<String, OperationSpec>>,
}

impl OperationCatalog {
    /// Load a catalog from a file. Supports both JSON and YAML formats.
    pub fn from_file(path: &str) -> Result<Self, FetchError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| FetchError::Other(e.to_string()))?;
        Self::from_str(&content)
    }

    /// Parse a catalog from a string, trying JSON first and then YAML.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, FetchError> {
        let spec: OpenAPI = serde_json::from_str(content)
            .or_else(|_| serde_yaml::from_str(content))
            .map_err(|e| FetchError::Decode(format!("Failed to parse OpenAPI spec: {}", e)))?;
        Ok(Self::from_spec(&spec))
    }

    pub fn from_spec(spec: &OpenAPI) -> Self {
        let mut operations: HashMap<String, BTreeMap<String, OperationSpec>> = HashMap::new();

        for (path, path_item_ref) in &spec.paths.paths {
            let path_item = match path_item_ref {
                ReferenceOr::Item(item) => item,
                ReferenceOr::Reference { .. } => {
                    warn!("Path references not supported: {}", path);
                    continue;
                }
            };

            for (method, operation) in operations_of(path_item) {
                let spec_op = parse_operation(spec, path, method, operation, &path_item.parameters);
                operations
                    .entry(path.clone())
                    .or_default()
                    .insert(method.as_str().to_string(), spec_op);
            }
        }

        debug!("Catalogued {} paths", operations.len());
        Self { operations }
    }

    pub fn get(&self, method: HttpMethod, path: &str) -> Option<&OperationSpec> {
        self.operations.get(path)?.get(method.as_str())
    }

    /// Methods the document defines for `path`.
    pub fn methods(&self, path: &str) -> Vec<HttpMethod> {
        self.operations
            .get(path)
            .map(|ops| ops.values().map(|op| op.method).collect())
            .unwrap_or_default()
    }

    /// `Some(true)` when the operation needs an init, `None` when it is not defined.
    pub fn requires_init(&self, method: HttpMethod, path: &str) -> Option<bool> {
        self.get(method, path).map(OperationSpec::requires_init)
    }

    /// Reject undefined operations and inits missing required parameters.
    pub fn validate(
        &self,
        method: HttpMethod,
        path: &str,
        init: &FetchInit,
    ) -> Result<(), FetchError> {
        self.get(method, path)
            .ok_or_else(|| FetchError::unknown_operation(method, path))?
            .validate(init)
    }

    /// Number of `(method, path)` operations.
    pub fn len(&self) -> usize {
        self.operations.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn operations_of(item: &PathItem) -> Vec<(HttpMethod, &Operation)> {
    [
        (HttpMethod::Get, &item.get),
        (HttpMethod::Put, &item.put),
        (HttpMethod::Post, &item.post),
        (HttpMethod::Delete, &item.delete),
        (HttpMethod::Options, &item.options),
        (HttpMethod::Head, &item.head),
        (HttpMethod::Patch, &item.patch),
        (HttpMethod::Trace, &item.trace),
    ]
    .into_iter()
    .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
    .collect()
}

fn parse_operation(
    spec: &OpenAPI,
    path: &str,
    method: HttpMethod,
    operation: &Operation,
    path_params: &[ReferenceOr<Parameter>],
) -> OperationSpec {
    let mut parameters: Vec<ParameterSpec> = Vec::new();

    // operation-level parameters override path-level ones with the same name and location
    for param_ref in path_params.iter().chain(&operation.parameters) {
        let Some(param) = resolve_parameter(spec, param_ref) else {
            continue;
        };
        let parsed = parse_parameter(param);
        parameters.retain(|p| !(p.name == parsed.name && p.location == parsed.location));
        parameters.push(parsed);
    }

    let body_required = match &operation.request_body {
        Some(ReferenceOr::Item(body)) => body.required,
        Some(ReferenceOr::Reference { reference }) => {
            let name = reference.trim_start_matches("#/components/requestBodies/");
            spec.components
                .as_ref()
                .and_then(|c| c.request_bodies.get(name))
                .and_then(|b| b.as_item())
                .map(|b| b.required)
                .unwrap_or(false)
        }
        None => false,
    };

    OperationSpec {
        method,
        path: path.to_string(),
        operation_id: operation.operation_id.clone(),
        parameters,
        body_required,
    }
}

fn resolve_parameter<'a>(
    spec: &'a OpenAPI,
    param_ref: &'a ReferenceOr<Parameter>,
) -> Option<&'a Parameter> {
    match param_ref {
        ReferenceOr::Item(param) => Some(param),
        ReferenceOr::Reference { reference } => {
            let name = reference.trim_start_matches("#/components/parameters/");
            let resolved = spec
                .components
                .as_ref()
                .and_then(|c| c.parameters.get(name))
                .and_then(|p| p.as_item());
            if resolved.is_none() {
                warn!("Unresolvable parameter reference: {}", reference);
            }
            resolved
        }
    }
}

fn parse_parameter(param: &Parameter) -> ParameterSpec {
    let (data, location) = match param {
        Parameter::Query { parameter_data, .. } => (parameter_data, ParameterLocation::Query),
        Parameter::Header { parameter_data, .. } => (parameter_data, ParameterLocation::Header),
        Parameter::Path { parameter_data, .. } => (parameter_data, ParameterLocation::Path),
        Parameter::Cookie { parameter_data, .. } => (parameter_data, ParameterLocation::Cookie),
    };

    ParameterSpec {
        name: data.name.clone(),
        location,
        // path parameters are always required in OpenAPI
        required: data.required || location == ParameterLocation::Path,
    }
}
