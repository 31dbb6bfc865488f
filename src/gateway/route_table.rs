// ============================================================================
// Route Table
// ============================================================================
//
// Ordered list of compiled routes. Sorted once at load time by descending
// specificity, then read concurrently without locking.
//
// Lookup walks the table in order and returns the first route whose
// pattern matches the path and whose method is unset or equal.
//
// ============================================================================

use super::route::{CompiledRoute, RouteDefinition};
use hub_error::{GatewayError, GatewayResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Top-level shape of the route file
#[derive(Debug, Deserialize)]
struct RouteFile {
    routes: Vec<RouteDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Compile and order a set of definitions. Any bad pattern fails the
    /// whole load.
    pub fn new(definitions: Vec<RouteDefinition>) -> GatewayResult<Self> {
        let mut routes = definitions
            .into_iter()
            .map(CompiledRoute::compile)
            .collect::<GatewayResult<Vec<_>>>()?;

        // Stable sort keeps declaration order for fully equal keys
        routes.sort_by(|a, b| {
            b.specificity()
                .cmp(&a.specificity())
                .then_with(|| a.category_rank().cmp(&b.category_rank()))
                .then_with(|| b.path().len().cmp(&a.path().len()))
                .then_with(|| b.method().is_some().cmp(&a.method().is_some()))
        });

        Ok(Self { routes })
    }

    /// Parse a YAML document of the form `routes: [...]`
    pub fn from_yaml_str(yaml: &str) -> GatewayResult<Self> {
        let file: RouteFile = serde_yaml::from_str(yaml)
            .map_err(|e| GatewayError::config(format!("invalid route file: {}", e)))?;
        Self::new(file.routes)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!("failed to read route file {}: {}", path.display(), e))
        })?;

        let table = Self::from_yaml_str(&yaml)?;
        tracing::info!(
            path = %path.display(),
            routes = table.len(),
            "Route table loaded"
        );
        Ok(table)
    }

    /// First route (in specificity order) accepting this path and method
    pub fn find_route(&self, path: &str, method: &str) -> GatewayResult<&CompiledRoute> {
        match self.routes.iter().find(|route| route.matches(path, method)) {
            Some(route) => {
                tracing::debug!(
                    route = %route.name(),
                    service = %route.service(),
                    method = %method,
                    path = %path,
                    "Route matched"
                );
                Ok(route)
            }
            None => Err(GatewayError::RouteNotFound {
                method: method.to_string(),
                path: path.to_string(),
            }),
        }
    }

    /// Captured path variables of `route` for `path`
    pub fn extract_variables(&self, route: &CompiledRoute, path: &str) -> HashMap<String, String> {
        route.extract_variables(path)
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    pub fn routes_for_service<'a>(
        &'a self,
        service: &'a str,
    ) -> impl Iterator<Item = &'a CompiledRoute> + 'a {
        self.routes.iter().filter(move |r| r.service() == service)
    }

    pub fn protected_routes(&self) -> impl Iterator<Item = &CompiledRoute> {
        self.routes.iter().filter(|r| r.requires_auth())
    }

    pub fn public_routes(&self) -> impl Iterator<Item = &CompiledRoute> {
        self.routes.iter().filter(|r| !r.requires_auth())
    }

    /// Distinct backend services referenced by at least one route
    pub fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.routes.iter().map(|r| r.service().to_string()).collect();
        services.sort();
        services.dedup();
        services
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn log_summary(&self) {
        for route in &self.routes {
            tracing::info!(
                route = %route.name(),
                specificity = route.specificity(),
                "  {}",
                route
            );
        }
        tracing::info!(
            total = self.len(),
            protected = self.protected_routes().count(),
            public = self.public_routes().count(),
            services = self.services().len(),
            "Routes configured"
        );
    }
}
