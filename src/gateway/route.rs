// ============================================================================
// Route Compilation
// ============================================================================
//
// Turns a declarative route into a compiled matcher:
// - literal segments match verbatim
// - `{name}` matches exactly one non-slash segment and captures it
// - a trailing `*` matches the rest of the path, slashes included
//
// The matcher is anchored to the whole path. Each compiled route carries a
// specificity score used to order the route table once at load time.
//
// ============================================================================

use hub_error::{GatewayError, GatewayResult};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

const SCORE_EXACT: u32 = 1000;
const SCORE_VARIABLES: u32 = 500;
const SCORE_WILDCARD: u32 = 100;
const SCORE_EXPLICIT_METHOD: u32 = 50;

/// Route declaration as read from the route file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RouteDefinition {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub method: Option<String>,
    /// Logical backend service name (connection + breaker key)
    pub service: String,
    pub grpc_service: String,
    pub grpc_method: String,
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
    /// `500ms`, `5s`, `1m`, `1h` or bare seconds
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub per: RatePeriod,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RatePeriod {
    Second,
    Minute,
    Hour,
}

/// Backend operation a route targets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId {
    pub service: String,
    pub method: String,
}

impl OperationId {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }

    /// `/package.Service/Method`
    pub fn full_method(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service, self.method)
    }
}

/// A route definition plus its compiled matcher. Read-only after load.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    definition: RouteDefinition,
    matcher: Regex,
    variables: Vec<String>,
    method: Option<String>,
    has_wildcard: bool,
    timeout: Option<Duration>,
    specificity: u32,
}

impl CompiledRoute {
    /// Compile a route definition. Fails with `GatewayError::Pattern` on a
    /// malformed path pattern and `GatewayError::Config` on a bad timeout.
    pub fn compile(definition: RouteDefinition) -> GatewayResult<Self> {
        let (regex_source, variables, has_wildcard) = translate_pattern(&definition.path)?;

        let matcher = Regex::new(&regex_source).map_err(|e| GatewayError::Pattern {
            pattern: definition.path.clone(),
            reason: e.to_string(),
        })?;

        let method = definition
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_ascii_uppercase);

        let timeout = match definition.timeout.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_duration(raw).ok_or_else(|| {
                GatewayError::config(format!(
                    "route '{}' has an invalid timeout '{}'",
                    definition.name, raw
                ))
            })?),
            _ => None,
        };

        let specificity = specificity(&definition.path, &variables, has_wildcard, method.is_some());

        Ok(Self {
            definition,
            matcher,
            variables,
            method,
            has_wildcard,
            timeout,
            specificity,
        })
    }

    /// Whether `path` matches and the method is unset or equal (case-insensitive)
    pub fn matches(&self, path: &str, method: &str) -> bool {
        if let Some(expected) = &self.method {
            if !expected.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        self.matcher.is_match(path)
    }

    /// Captured path variables, keyed by the names declared in the pattern
    pub fn extract_variables(&self, path: &str) -> HashMap<String, String> {
        let mut variables = HashMap::with_capacity(self.variables.len());
        if let Some(captures) = self.matcher.captures(path) {
            for (index, name) in self.variables.iter().enumerate() {
                if let Some(value) = captures.get(index + 1) {
                    variables.insert(name.clone(), value.as_str().to_string());
                }
            }
        }
        variables
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn path(&self) -> &str {
        &self.definition.path
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn service(&self) -> &str {
        &self.definition.service
    }

    pub fn operation(&self) -> OperationId {
        OperationId::new(&self.definition.grpc_service, &self.definition.grpc_method)
    }

    pub fn requires_auth(&self) -> bool {
        self.definition.auth_required
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn specificity(&self) -> u32 {
        self.specificity
    }

    pub fn definition(&self) -> &RouteDefinition {
        &self.definition
    }

    /// 0 = exact, 1 = variables, 2 = wildcard only
    pub(crate) fn category_rank(&self) -> u8 {
        if !self.variables.is_empty() {
            1
        } else if self.has_wildcard {
            2
        } else {
            0
        }
    }
}

impl fmt::Display for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = if self.requires_auth() {
            "protected"
        } else {
            "public"
        };
        write!(
            f,
            "{} {} -> {}.{} ({})",
            self.method().unwrap_or("*"),
            self.path(),
            self.definition.grpc_service,
            self.definition.grpc_method,
            access
        )
    }
}

/// Escape literal runs, substitute variables and the trailing wildcard,
/// and anchor the result. Returns (regex, variable names, has wildcard).
fn translate_pattern(pattern: &str) -> GatewayResult<(String, Vec<String>, bool)> {
    let malformed = |reason: &str| GatewayError::Pattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if !pattern.starts_with('/') {
        return Err(malformed("pattern must start with '/'"));
    }

    let mut regex_source = String::from("^");
    let mut variables: Vec<String> = Vec::new();
    let mut literal = String::new();
    let mut has_wildcard = false;
    let mut chars = pattern.char_indices();

    while let Some((index, ch)) = chars.next() {
        match ch {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    match inner {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(malformed("nested '{' in variable")),
                        '/' => return Err(malformed("variable spans a '/'")),
                        c => name.push(c),
                    }
                }
                if !closed {
                    return Err(malformed("unbalanced '{'"));
                }
                if !is_valid_variable_name(&name) {
                    return Err(malformed("variable name must be alphanumeric, '_' or '-'"));
                }
                if variables.contains(&name) {
                    return Err(malformed("duplicate variable name"));
                }

                regex_source.push_str(&regex::escape(&literal));
                literal.clear();
                regex_source.push_str("([^/]+)");
                variables.push(name);
            }
            '}' => return Err(malformed("unbalanced '}'")),
            '*' => {
                if index != pattern.len() - 1 {
                    return Err(malformed("'*' is only allowed at the end of a pattern"));
                }
                regex_source.push_str(&regex::escape(&literal));
                literal.clear();
                regex_source.push_str(".*");
                has_wildcard = true;
            }
            c => literal.push(c),
        }
    }

    regex_source.push_str(&regex::escape(&literal));
    regex_source.push('$');

    Ok((regex_source, variables, has_wildcard))
}

fn is_valid_variable_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Exact > variables > wildcard, then pattern length, then explicit method
fn specificity(pattern: &str, variables: &[String], has_wildcard: bool, has_method: bool) -> u32 {
    let base = if variables.is_empty() && !has_wildcard {
        SCORE_EXACT
    } else if !variables.is_empty() {
        SCORE_VARIABLES
    } else {
        SCORE_WILDCARD
    };

    let method_bonus = if has_method { SCORE_EXPLICIT_METHOD } else { 0 };

    base + pattern.chars().count() as u32 + method_bonus
}

/// `500ms`, `5s`, `2m`, `1h`, or a bare number of seconds
pub(crate) fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits.parse().ok()?;

    match unit.trim() {
        "ms" => Some(Duration::from_millis(value)),
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(value.checked_mul(3600)?)),
        _ => None,
    }
}
